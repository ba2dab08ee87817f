//! myorder.rib.de (Bavaria) — infinite-scroll listing parsed in one pass
//! once the page height stops growing, then explicit next-page links.

use async_trait::async_trait;
use scraper::{ElementRef, Html};

use atis_core::dates::{format_date, parse_application_period};
use atis_core::{TenderRecord, NOT_SPECIFIED};
use atis_net::session::BrowserSession;

use crate::{
    element_text, first_text_in, matched_keywords, next_page_url, selector, text_or_none,
    AdapterError, Interaction, PortalAdapter, PortalId, PortalTarget, ScrapeContext,
};

const BLOCK_CSS: &str = "div.item";
const TITLE_CSS: &str = r#"div[style*="overflow: hidden"] strong"#;
const NEXT_PAGE: &str = r#"a[aria-label="Next"]"#;

pub struct RibScrollAdapter;

#[async_trait]
impl PortalAdapter for RibScrollAdapter {
    fn portal(&self) -> PortalId {
        PortalId::RibBayern
    }

    fn interaction(&self) -> Interaction {
        Interaction::ScrollPaginated
    }

    async fn scrape(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &ScrapeContext,
        target: &PortalTarget,
        keywords: &[String],
    ) -> Result<Vec<TenderRecord>, AdapterError> {
        session.navigate(&target.search_url).await?;

        // Keep scrolling until one scroll adds no height.
        let mut last_height = session.page_height().await?;
        loop {
            session.scroll_to_bottom().await?;
            tokio::time::sleep(ctx.waits.scroll_settle).await;
            let height = session.page_height().await?;
            if height == last_height {
                break;
            }
            last_height = height;
        }

        let mut records = Vec::new();
        loop {
            let html = session.page_source().await?;
            let next = {
                let doc = Html::parse_document(&html);
                collect_blocks(&doc, ctx, target, keywords, &mut records)?;
                next_page_url(&doc, NEXT_PAGE, &target.search_url)?
            };
            match next {
                Some(url) => {
                    session.navigate(&url).await?;
                    tokio::time::sleep(ctx.waits.settle).await;
                }
                None => break,
            }
        }
        Ok(records)
    }
}

fn collect_blocks(
    doc: &Html,
    ctx: &ScrapeContext,
    target: &PortalTarget,
    keywords: &[String],
    records: &mut Vec<TenderRecord>,
) -> Result<(), AdapterError> {
    let block_sel = selector(BLOCK_CSS)?;
    let title_sel = selector(TITLE_CSS)?;
    let description_sel = selector("div.text-muted")?;
    let label_sel = selector("div.info-label")?;
    let meta_sel = selector("div.item-right.meta")?;
    let day_sel = selector("div.date")?;
    let month_sel = selector("div.month")?;

    for block in doc.select(&block_sel) {
        let Some(title) = first_text_in(block, &title_sel) else {
            continue;
        };
        let matched = matched_keywords(&title, keywords);
        if matched.is_empty() {
            continue;
        }

        let mut record = TenderRecord::new(title.clone(), &target.source_url);
        record.tender_code = extract_tender_code(&title);

        if let Some(description) = first_text_in(block, &description_sel) {
            record.tender_authority = match description.rsplit_once(" by ") {
                Some((_, authority)) => authority.to_string(),
                None => description,
            };
        }

        for label in block.select(&label_sel) {
            let text = element_text(label);
            let Some(value) = next_div_text(label) else {
                continue;
            };
            if text.contains("Application period") {
                let (start, _end) = parse_application_period(&value);
                record.application_start_date = start;
            } else if text.contains("Application deadline") || text.contains("Expiration time") {
                record.tender_deadline = format_date(&value);
            } else if text.contains("Period") {
                record.period = value;
            } else if text.contains("Execution place") {
                record.tender_location = value;
            }
        }

        record.date_published = block
            .select(&meta_sel)
            .next()
            .and_then(|meta| {
                let day = first_text_in(meta, &day_sel)?;
                let month_year = first_text_in(meta, &month_sel)?;
                Some(format_date(&format!("{day} {month_year}")))
            })
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());

        record.state = ctx.resolver.resolve(&record.tender_location);

        for keyword in matched {
            record.push_keyword(&keyword);
        }
        records.push(record);
    }
    Ok(())
}

fn next_div_text(label: ElementRef<'_>) -> Option<String> {
    label
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")
        .map(element_text)
        .and_then(text_or_none)
}

/// RIB titles embed the tender code in parentheses; without one the first
/// whitespace token stands in.
fn extract_tender_code(title: &str) -> String {
    if let Some(start) = title.find('(') {
        if let Some(len) = title[start + 1..].find(')') {
            return title[start + 1..start + 1 + len].to_string();
        }
    }
    title.split_whitespace().next().unwrap_or_default().to_string()
}
