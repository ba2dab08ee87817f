//! NetServer publication search (vergabe.vmstart.de and
//! saarvpsl.vmstart.de) — keyword search over label/value result blocks with
//! a result-count banner. The Saarland instance additionally paginates and
//! renders an English "no matching notices" placeholder.

use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, warn};

use atis_core::dates::format_date;
use atis_core::{TenderRecord, NOT_SPECIFIED};
use atis_net::session::BrowserSession;

use crate::{
    element_text, first_text, next_page_url, selector, text_or_none, AdapterError, Interaction,
    PortalAdapter, PortalId, PortalTarget, RecordMap, ScrapeContext,
};

const RESULTS_CONTAINER: &str = "div.border.col-lg-12";
const RESULT_BLOCK: &str = r#"tbody.tableLeftHeaderBlock[tabindex="0"]"#;
const BLOCK_ROW: &str = "tr.tableRowLeft";
const COUNT_BANNER: &str = "h3.color-main";
const NEXT_PAGE: &str = r#"a[title="Nächste Seite"]"#;
const NO_MATCHING_NOTICES: &str = "There were no matching notices found.";

pub struct NetserverSearchAdapter {
    portal: PortalId,
    paginate: bool,
}

impl NetserverSearchAdapter {
    /// Search-only variant with the result-count banner check (vmstart).
    pub fn single_page(portal: PortalId) -> Self {
        Self {
            portal,
            paginate: false,
        }
    }

    /// Paginating variant (saarvpsl).
    pub fn paginated(portal: PortalId) -> Self {
        Self {
            portal,
            paginate: true,
        }
    }
}

#[async_trait]
impl PortalAdapter for NetserverSearchAdapter {
    fn portal(&self) -> PortalId {
        self.portal
    }

    fn interaction(&self) -> Interaction {
        if self.paginate {
            Interaction::SearchPaginated
        } else {
            Interaction::SearchOnly
        }
    }

    async fn scrape(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &ScrapeContext,
        target: &PortalTarget,
        keywords: &[String],
    ) -> Result<Vec<TenderRecord>, AdapterError> {
        session.navigate(&target.search_url).await?;

        let mut found = RecordMap::default();
        for keyword in keywords {
            if let Err(err) = self
                .search_keyword(session, ctx, target, keyword, &mut found)
                .await
            {
                warn!(
                    portal = %self.portal,
                    keyword = keyword.as_str(),
                    error = %err,
                    "abandoning keyword after failure"
                );
            }
        }
        Ok(found.into_records())
    }
}

impl NetserverSearchAdapter {
    async fn search_keyword(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &ScrapeContext,
        target: &PortalTarget,
        keyword: &str,
        found: &mut RecordMap,
    ) -> Result<(), AdapterError> {
        // The landing page and the post-search page expose different search
        // controls; pick by what the current page carries.
        let html = session.page_source().await?;
        let (input, submit) = if html.contains("searchVisible") {
            ("#searchVisible", "button.btn-mainSearch")
        } else {
            ("#inputSearchKey", "#btnSearchSubmit")
        };

        session.wait_for(input, ctx.waits.element_timeout).await?;
        session.fill(input, keyword).await?;
        session.wait_for(submit, ctx.waits.element_timeout).await?;
        session.click(submit).await?;

        loop {
            session
                .wait_for(RESULTS_CONTAINER, ctx.waits.element_timeout)
                .await?;
            tokio::time::sleep(ctx.waits.settle).await;

            let html = session.page_source().await?;
            let page = self.parse_results_page(&html, keyword, target)?;
            if page.stop {
                debug!(keyword, "no results reported");
                break;
            }
            for record in page.records {
                found.upsert(record);
            }
            match page.next_url {
                Some(next) => session.navigate(&next).await?,
                None => break,
            }
        }
        Ok(())
    }

    fn parse_results_page(
        &self,
        html: &str,
        keyword: &str,
        target: &PortalTarget,
    ) -> Result<ParsedPage, AdapterError> {
        let doc = Html::parse_document(html);

        if let Some(cell) = first_text(&doc, &selector(r#"td[colspan="6"]"#)?) {
            if cell.contains(NO_MATCHING_NOTICES) {
                return Ok(ParsedPage::stopped());
            }
        }
        if let Some(banner) = first_text(&doc, &selector(COUNT_BANNER)?) {
            if banner.contains("gefundene Ausschreibung") {
                let count: Option<u32> =
                    banner.split_whitespace().next().and_then(|n| n.parse().ok());
                if count == Some(0) {
                    return Ok(ParsedPage::stopped());
                }
            }
        }

        let block_sel = selector(RESULT_BLOCK)?;
        let row_sel = selector(BLOCK_ROW)?;
        let cell_sel = selector("td")?;

        let mut records = Vec::new();
        for block in doc.select(&block_sel) {
            let mut record = TenderRecord::new("", &target.source_url);
            for row in block.select(&row_sel) {
                let cells: Vec<_> = row.select(&cell_sel).collect();
                if cells.len() < 2 {
                    continue;
                }
                let header = element_text(cells[0]);
                let data = text_or_none(element_text(cells[1]))
                    .unwrap_or_else(|| NOT_SPECIFIED.to_string());

                if header.contains("Ausschreibung") {
                    record.tender_name = data;
                } else if header.contains("Vergabestelle") {
                    record.tender_authority = data;
                } else if header.contains("Verfahrensart") {
                    record.tender_type = data;
                } else if header.contains("Abgabefrist") {
                    record.tender_deadline = if data == NOT_SPECIFIED {
                        data
                    } else {
                        format_date(&data)
                    };
                } else if header.contains("Erschienen am") {
                    record.date_published = if data == NOT_SPECIFIED {
                        data
                    } else {
                        format_date(&data)
                    };
                }
            }
            // A block without a usable name is below the minimum viable row.
            if record.tender_name.is_empty() || record.tender_name == NOT_SPECIFIED {
                continue;
            }
            record.push_keyword(keyword);
            records.push(record);
        }

        let next_url = if self.paginate {
            next_page_url(&doc, NEXT_PAGE, &target.search_url)?
        } else {
            None
        };
        Ok(ParsedPage {
            records,
            stop: false,
            next_url,
        })
    }
}

struct ParsedPage {
    records: Vec<TenderRecord>,
    stop: bool,
    next_url: Option<String>,
}

impl ParsedPage {
    fn stopped() -> Self {
        Self {
            records: Vec::new(),
            stop: true,
            next_url: None,
        }
    }
}
