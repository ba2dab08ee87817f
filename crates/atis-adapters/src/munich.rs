//! vergabe.muenchen.de — static publication table, one fetch, no scripting.

use async_trait::async_trait;

use atis_core::dates::format_date;
use atis_core::{TenderRecord, NOT_SPECIFIED};
use atis_net::session::BrowserSession;
use scraper::Html;

use crate::{
    element_text, first_text_in, matched_keywords, selector, AdapterError, Interaction,
    PortalAdapter, PortalId, PortalTarget, ScrapeContext,
};

pub struct MunichTableAdapter;

#[async_trait]
impl PortalAdapter for MunichTableAdapter {
    fn portal(&self) -> PortalId {
        PortalId::Muenchen
    }

    fn interaction(&self) -> Interaction {
        Interaction::StaticHtml
    }

    async fn scrape(
        &self,
        session: &mut dyn BrowserSession,
        _ctx: &ScrapeContext,
        target: &PortalTarget,
        keywords: &[String],
    ) -> Result<Vec<TenderRecord>, AdapterError> {
        session.navigate(&target.search_url).await?;
        let html = session.page_source().await?;
        parse_listing(&html, target, keywords)
    }
}

fn parse_listing(
    html: &str,
    target: &PortalTarget,
    keywords: &[String],
) -> Result<Vec<TenderRecord>, AdapterError> {
    let doc = Html::parse_document(html);
    let row_sel = selector("tr.tableRow.clickable-row.publicationDetail")?;
    let cell_sel = selector("td")?;
    let name_sel = selector("td.tender")?;
    let authority_sel = selector("td.tenderAuthority")?;
    let type_sel = selector("td.tenderType")?;
    let deadline_sel = selector("td.tenderDeadline")?;

    let mut records = Vec::new();
    for row in doc.select(&row_sel) {
        let cells: Vec<_> = row.select(&cell_sel).collect();
        if cells.len() < 5 {
            continue;
        }

        let Some(tender_name) = first_text_in(row, &name_sel) else {
            continue;
        };
        let matched = matched_keywords(&tender_name, keywords);
        if matched.is_empty() {
            continue;
        }

        let mut record = TenderRecord::new(tender_name, &target.source_url);
        record.date_published = format_date(&element_text(cells[0]));
        record.tender_authority =
            first_text_in(row, &authority_sel).unwrap_or_else(|| NOT_SPECIFIED.to_string());
        record.tender_type =
            first_text_in(row, &type_sel).unwrap_or_else(|| NOT_SPECIFIED.to_string());
        // Deadline cells carry a trailing time of day; format_date keeps the
        // date portion only.
        record.tender_deadline = first_text_in(row, &deadline_sel)
            .map(|raw| format_date(&raw))
            .unwrap_or_else(|| NOT_SPECIFIED.to_string());
        for keyword in matched {
            record.push_keyword(&keyword);
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atis_core::states::StateResolver;
    use atis_net::session::{PlaybackSession, WaitPolicy};
    use std::sync::Arc;

    const LISTING: &str = r#"
        <table>
          <tr class="tableRow clickable-row publicationDetail">
            <td>01.02.2024</td>
            <td class="tender">Machbarkeitsstudie Besucherzentrum Olympiapark</td>
            <td class="tenderAuthority">Landeshauptstadt München</td>
            <td class="tenderType">Öffentliche Ausschreibung</td>
            <td class="tenderDeadline">15.02.2024 12:00</td>
          </tr>
          <tr class="tableRow clickable-row publicationDetail">
            <td>02.02.2024</td>
            <td class="tender">Straßensanierung Nordring</td>
            <td class="tenderAuthority">Baureferat</td>
            <td class="tenderType">Öffentliche Ausschreibung</td>
            <td class="tenderDeadline">20.02.2024 10:00</td>
          </tr>
          <tr class="tableRow clickable-row publicationDetail">
            <td>03.02.2024</td>
            <td class="tender">Museumskonzept Stadtarchiv</td>
            <td class="tenderAuthority">Kulturreferat</td>
          </tr>
        </table>
    "#;

    fn keywords() -> Vec<String> {
        vec!["Machbarkeitsstudie".to_string(), "Museum".to_string()]
    }

    #[test]
    fn keeps_keyword_matches_and_normalizes_dates() {
        let target = PortalTarget {
            search_url: "https://vergabe.muenchen.de/list".to_string(),
            source_url: "https://vergabe.muenchen.de".to_string(),
        };
        let records = parse_listing(LISTING, &target, &keywords()).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(
            record.tender_name,
            "Machbarkeitsstudie Besucherzentrum Olympiapark"
        );
        assert_eq!(record.tender_authority, "Landeshauptstadt München");
        assert_eq!(record.date_published, "01.02.24");
        assert_eq!(record.tender_deadline, "15.02.24");
        assert_eq!(record.found_keywords, vec!["Machbarkeitsstudie"]);
        assert_eq!(record.source_url, "https://vergabe.muenchen.de");
    }

    #[test]
    fn short_rows_are_skipped_not_fatal() {
        // The third row matches "Museum" but only has 3 of 5 cells.
        let target = PortalTarget {
            search_url: "u".to_string(),
            source_url: "s".to_string(),
        };
        let records = parse_listing(LISTING, &target, &keywords()).unwrap();
        assert!(records
            .iter()
            .all(|r| r.tender_name != "Museumskonzept Stadtarchiv"));
    }

    #[tokio::test]
    async fn scrape_drives_a_session_end_to_end() {
        let target = PortalTarget {
            search_url: "https://vergabe.muenchen.de/list".to_string(),
            source_url: "https://vergabe.muenchen.de".to_string(),
        };
        let mut session =
            PlaybackSession::new().with_route("https://vergabe.muenchen.de/list", LISTING);
        let ctx = ScrapeContext::new(Arc::new(StateResolver::new()), WaitPolicy::immediate());

        let records = MunichTableAdapter
            .scrape(&mut session, &ctx, &target, &keywords())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }
}
