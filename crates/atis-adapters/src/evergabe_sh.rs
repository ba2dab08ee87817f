//! e-vergabe-sh.de (Schleswig-Holstein) — typed search form over a result
//! list of announcement cards; single results page per keyword.

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use atis_core::dates::format_date;
use atis_core::TenderRecord;
use atis_net::session::BrowserSession;

use crate::{
    first_text_in, selector, text_or_none, AdapterError, Interaction, PortalAdapter, PortalId,
    PortalTarget, RecordMap, ScrapeContext,
};

const SEARCH_INPUT: &str =
    r#"input.search[type="text"][name="tx_ncevergabe_pi2[searchDemand][searchTerm]"]"#;
const SEARCH_BUTTON: &str = r#"input.btn[type="submit"][value="Suchen"]"#;
const RESULTS_CONTAINER: &str = "div.bek_list_scroll";
const RESULT_BLOCK: &str = "div.bek_list_item_w_hover.js-list-detaillink";
const NO_RESULTS: &str = "Es wurden keine Vergabeinformationen zu Ihren Suchkriterien gefunden!";
const AUTHORITY_PREFIX: &str = "Beauftragtes Unternehmen: ";
const DATE_PREFIX: &str = "Datum: ";

pub struct EvergabeShAdapter;

#[async_trait]
impl PortalAdapter for EvergabeShAdapter {
    fn portal(&self) -> PortalId {
        PortalId::SchleswigHolstein
    }

    fn interaction(&self) -> Interaction {
        Interaction::SearchOnly
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
                    portal = %PortalId::SchleswigHolstein,
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
    session
        .wait_for(RESULTS_CONTAINER, ctx.waits.element_timeout)
        .await?;
    tokio::time::sleep(ctx.waits.settle).await;

    let html = session.page_source().await?;
    if html.contains(NO_RESULTS) {
        debug!(keyword, "no announcements for keyword");
        return Ok(());
    }
    for record in parse_result_blocks(&html, keyword, target)? {
        found.upsert(record);
    }
    Ok(())
}

fn parse_result_blocks(
    html: &str,
    keyword: &str,
    target: &PortalTarget,
) -> Result<Vec<TenderRecord>, AdapterError> {
    let doc = Html::parse_document(html);
    let block_sel = selector(RESULT_BLOCK)?;
    let headline_sel = selector("div.bek_list_item_headline")?;
    let info_sel = selector("div.bek_list_item_info")?;
    let code_sel = selector("div.bek_list_item_left")?;
    let date_sel = selector("div.bek-date")?;

    let mut records = Vec::new();
    for block in doc.select(&block_sel) {
        let Some(tender_name) = first_text_in(block, &headline_sel) else {
            continue;
        };

        let mut record = TenderRecord::new(tender_name, &target.source_url);
        if let Some(info) = first_text_in(block, &info_sel) {
            record.tender_authority = info
                .strip_prefix(AUTHORITY_PREFIX)
                .unwrap_or(&info)
                .to_string();
        }
        if let Some(code) = block.select(&code_sel).next().and_then(first_text_child) {
            record.tender_code = code;
        }
        if let Some(date) = first_text_in(block, &date_sel) {
            record.date_published =
                format_date(date.strip_prefix(DATE_PREFIX).unwrap_or(&date));
        }
        record.push_keyword(keyword);
        records.push(record);
    }
    Ok(records)
}

/// First non-empty direct text child; the code cell nests further markup
/// after the bare identifier.
fn first_text_child(el: ElementRef<'_>) -> Option<String> {
    el.children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .and_then(text_or_none)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atis_core::states::StateResolver;
    use atis_core::NOT_SPECIFIED;
    use atis_net::session::{PlaybackSession, WaitPolicy};
    use std::sync::Arc;

    fn target() -> PortalTarget {
        PortalTarget {
            search_url: "https://www.e-vergabe-sh.de/vergabeplattform/vergabeinformationen"
                .to_string(),
            source_url: "https://www.e-vergabe-sh.de".to_string(),
        }
    }

    fn search_page() -> &'static str {
        r#"<input class="search" type="text" name="tx_ncevergabe_pi2[searchDemand][searchTerm]">
           <input class="btn" type="submit" value="Suchen">"#
    }

    fn results_page(blocks: &str) -> String {
        format!(r#"{}<div class="bek_list_scroll">{blocks}</div>"#, search_page())
    }

    fn block() -> &'static str {
        r#"<div class="bek_list_item_w_hover js-list-detaillink">
            <div class="bek_list_item_left">SH-2024-031<span class="tag">neu</span></div>
            <div class="bek_list_item_headline">Besucherinformationszentrum Wattenmeer</div>
            <div class="bek_list_item_info">Beauftragtes Unternehmen: Landesbetrieb Küstenschutz</div>
            <div class="bek-date">Datum: 05.02.2024</div>
          </div>"#
    }

    fn ctx() -> ScrapeContext {
        ScrapeContext::new(Arc::new(StateResolver::new()), WaitPolicy::immediate())
    }

    #[tokio::test]
    async fn parses_announcement_cards_and_strips_label_prefixes() {
        let mut session = PlaybackSession::new()
            .with_route(target().search_url, search_page())
            .with_result_page(results_page(block()));

        let records = EvergabeShAdapter
            .scrape(&mut session, &ctx(), &target(), &["Besucher".to_string()])
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.tender_name, "Besucherinformationszentrum Wattenmeer");
        assert_eq!(record.tender_authority, "Landesbetrieb Küstenschutz");
        assert_eq!(record.tender_code, "SH-2024-031");
        assert_eq!(record.date_published, "05.02.24");
        assert_eq!(record.tender_deadline, NOT_SPECIFIED);
    }

    #[tokio::test]
    async fn no_results_message_moves_to_next_keyword() {
        let none = format!(
            r#"{}<div class="bek_list_scroll"><div style="text-align:center; margin-top:50px;">{NO_RESULTS}</div></div>"#,
            search_page()
        );
        let mut session = PlaybackSession::new()
            .with_route(target().search_url, search_page())
            .with_result_page(none)
            .with_result_page(results_page(block()));

        let records = EvergabeShAdapter
            .scrape(
                &mut session,
                &ctx(),
                &target(),
                &["Gartenschau".to_string(), "Besucher".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].found_keywords, vec!["Besucher"]);
    }

    #[tokio::test]
    async fn missing_results_container_abandons_keyword_only() {
        let mut session = PlaybackSession::new()
            .with_route(target().search_url, search_page())
            .with_result_page(search_page().to_string())
            .with_result_page(results_page(block()));

        let records = EvergabeShAdapter
            .scrape(
                &mut session,
                &ctx(),
                &target(),
                &["Museum".to_string(), "Besucher".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].found_keywords, vec!["Besucher"]);
    }
}
