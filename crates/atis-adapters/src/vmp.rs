//! Vergabemarktplatz family (rlp, nrw, metropoleruhr, niedersachsen,
//! brandenburg) — the five portals run the same VMP software: search field,
//! results table with five columns, next-page links.

use async_trait::async_trait;
use scraper::Html;
use tracing::{debug, warn};

use atis_core::dates::format_date;
use atis_core::{TenderRecord, NOT_SPECIFIED};
use atis_net::session::BrowserSession;

use crate::{
    element_text, first_text_in, next_page_url, selector, text_or_none, AdapterError, Interaction,
    PortalAdapter, PortalId, PortalTarget, RecordMap, ScrapeContext,
};

const SEARCH_INPUT: &str = "#searchText";
const SEARCH_BUTTON: &str = "#searchStart";
const RESULTS_CONTAINER: &str = "#listTemplate";
const ROW_CSS: &str = "div#listTemplate tbody tr";
const NEXT_PAGE: &str = r#"a[title="Nächste Seite"]"#;
/// Placeholder row the VMP software renders instead of an empty table.
const NO_RESULTS: &str = "Es wurden keine passenden Bekanntmachungen gefunden.";

pub struct VmpSearchAdapter {
    portal: PortalId,
}

impl VmpSearchAdapter {
    pub fn new(portal: PortalId) -> Self {
        Self { portal }
    }
}

#[async_trait]
impl PortalAdapter for VmpSearchAdapter {
    fn portal(&self) -> PortalId {
        self.portal
    }

    fn interaction(&self) -> Interaction {
        Interaction::SearchPaginated
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
            if let Err(err) = search_keyword(session, ctx, target, keyword, &mut found).await {
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

async fn search_keyword(
    session: &mut dyn BrowserSession,
    ctx: &ScrapeContext,
    target: &PortalTarget,
    keyword: &str,
    found: &mut RecordMap,
) -> Result<(), AdapterError> {
    session
        .wait_for(SEARCH_INPUT, ctx.waits.element_timeout)
        .await?;
    session.fill(SEARCH_INPUT, keyword).await?;
    session.click(SEARCH_BUTTON).await?;

    loop {
        session
            .wait_for(RESULTS_CONTAINER, ctx.waits.element_timeout)
            .await?;
        tokio::time::sleep(ctx.waits.settle).await;

        let html = session.page_source().await?;
        let page = parse_results_page(&html, keyword, target)?;
        if page.row_count == 0 {
            debug!(keyword, "no result rows");
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

struct ParsedPage {
    records: Vec<TenderRecord>,
    row_count: usize,
    next_url: Option<String>,
}

fn parse_results_page(
    html: &str,
    keyword: &str,
    target: &PortalTarget,
) -> Result<ParsedPage, AdapterError> {
    let doc = Html::parse_document(html);
    let row_sel = selector(ROW_CSS)?;
    let cell_sel = selector("td")?;
    let abbr_sel = selector("abbr")?;

    let mut records = Vec::new();
    let mut row_count = 0;
    for row in doc.select(&row_sel) {
        row_count += 1;
        let cells: Vec<_> = row.select(&cell_sel).collect();
        if cells.len() < 5 || element_text(cells[0]).contains(NO_RESULTS) {
            continue;
        }

        let Some(tender_name) = text_or_none(element_text(cells[2])) else {
            continue;
        };

        let mut record = TenderRecord::new(tender_name, &target.source_url);
        record.date_published = first_text_in(cells[0], &abbr_sel)
            .map(|raw| format_date(&raw))
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());
        // "nv" is the portal's own not-available marker.
        record.tender_deadline = match first_text_in(cells[1], &abbr_sel) {
            Some(raw) if raw != "nv" => format_date(&raw),
            _ => NOT_SPECIFIED.to_string(),
        };
        record.tender_type =
            text_or_none(element_text(cells[3])).unwrap_or_else(|| NOT_SPECIFIED.to_string());
        record.tender_authority =
            text_or_none(element_text(cells[4])).unwrap_or_else(|| NOT_SPECIFIED.to_string());
        record.push_keyword(keyword);
        records.push(record);
    }

    let next_url = next_page_url(&doc, NEXT_PAGE, &target.search_url)?;
    Ok(ParsedPage {
        records,
        row_count,
        next_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use atis_core::states::StateResolver;
    use atis_net::session::{PlaybackSession, WaitPolicy};
    use std::sync::Arc;

    fn target() -> PortalTarget {
        PortalTarget {
            search_url: "https://www.evergabe.nrw.de/search".to_string(),
            source_url: "https://www.evergabe.nrw.de".to_string(),
        }
    }

    fn search_page() -> &'static str {
        r#"<input id="searchText"><button id="searchStart">Suchen</button>"#
    }

    fn results_page(rows: &str, next: Option<&str>) -> String {
        let pager = next
            .map(|href| format!(r#"<a title="Nächste Seite" href="{href}">»</a>"#))
            .unwrap_or_default();
        format!(
            r#"{}<div id="listTemplate"><table><tbody>{rows}</tbody></table></div>{pager}"#,
            search_page()
        )
    }

    fn row(name: &str, published: &str, deadline: &str) -> String {
        format!(
            "<tr><td><abbr>{published}</abbr></td><td><abbr>{deadline}</abbr></td>\
             <td>{name}</td><td>Öffentliche Ausschreibung</td><td>Stadt Köln</td></tr>"
        )
    }

    fn ctx() -> ScrapeContext {
        ScrapeContext::new(Arc::new(StateResolver::new()), WaitPolicy::immediate())
    }

    #[tokio::test]
    async fn searches_each_keyword_and_paginates() {
        let adapter = VmpSearchAdapter::new(PortalId::Nrw);
        let page_one = results_page(
            &row("Tourismuskonzept Rheinschiene", "01.02.2024", "15.02.2024"),
            Some("/page/2"),
        );
        let page_two = results_page(&row("Freizeitpark Gutachten", "02.02.2024", "nv"), None);

        let mut session = PlaybackSession::new()
            .with_route("https://www.evergabe.nrw.de/search", search_page())
            .with_route("https://www.evergabe.nrw.de/page/2", page_two)
            .with_result_page(page_one);

        let records = adapter
            .scrape(
                &mut session,
                &ctx(),
                &target(),
                &["Tourismus".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tender_name, "Tourismuskonzept Rheinschiene");
        assert_eq!(records[0].date_published, "01.02.24");
        assert_eq!(records[0].tender_deadline, "15.02.24");
        assert_eq!(records[0].tender_authority, "Stadt Köln");
        assert_eq!(records[1].tender_deadline, NOT_SPECIFIED);
        assert_eq!(records[1].found_keywords, vec!["Tourismus"]);
    }

    #[tokio::test]
    async fn same_tender_under_two_keywords_unions_keyword_list() {
        let adapter = VmpSearchAdapter::new(PortalId::Rlp);
        let hit = results_page(
            &row("Masterplan Tourismus Eifel", "01.02.2024", "15.02.2024"),
            None,
        );

        let mut session = PlaybackSession::new()
            .with_route("https://www.evergabe.nrw.de/search", search_page())
            .with_result_page(hit.clone())
            .with_result_page(hit);

        let records = adapter
            .scrape(
                &mut session,
                &ctx(),
                &target(),
                &["Tourismus".to_string(), "Masterplan".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].found_keywords, vec!["Tourismus", "Masterplan"]);
    }

    #[tokio::test]
    async fn no_results_placeholder_row_is_skipped() {
        let adapter = VmpSearchAdapter::new(PortalId::Brandenburg);
        let empty = results_page(
            r#"<tr><td colspan="5">Es wurden keine passenden Bekanntmachungen gefunden.</td></tr>"#,
            None,
        );
        let mut session = PlaybackSession::new()
            .with_route("https://www.evergabe.nrw.de/search", search_page())
            .with_result_page(empty);

        let records = adapter
            .scrape(&mut session, &ctx(), &target(), &["Museum".to_string()])
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn results_timeout_abandons_keyword_but_not_portal() {
        let adapter = VmpSearchAdapter::new(PortalId::Niedersachsen);
        let hit = results_page(
            &row("Machbarkeitsstudie Gartenschau", "01.02.2024", "15.02.2024"),
            None,
        );
        // First keyword's results container never appears; second succeeds.
        let mut session = PlaybackSession::new()
            .with_route("https://www.evergabe.nrw.de/search", search_page())
            .with_result_page(search_page().to_string())
            .with_result_page(hit);

        let records = adapter
            .scrape(
                &mut session,
                &ctx(),
                &target(),
                &["Museum".to_string(), "Gartenschau".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].found_keywords, vec!["Gartenschau"]);
    }
}
