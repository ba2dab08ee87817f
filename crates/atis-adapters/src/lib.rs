//! Portal adapter contract, registry, and the per-portal implementations.
//!
//! Each German procurement portal gets one adapter that knows that site's
//! markup and interaction sequence. Adapters normalize whatever they find
//! into [`TenderRecord`]s; everything downstream (dispatch, consolidation,
//! emission) is portal-agnostic.

mod evergabe_sh;
mod munich;
mod netserver;
mod rib;
mod vmp;

pub use evergabe_sh::EvergabeShAdapter;
pub use munich::MunichTableAdapter;
pub use netserver::NetserverSearchAdapter;
pub use rib::RibScrollAdapter;
pub use vmp::VmpSearchAdapter;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use atis_core::states::StateResolver;
use atis_core::TenderRecord;
use atis_net::session::{BrowserSession, SessionError, WaitPolicy};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Message(String),
}

/// How an adapter interacts with its portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    /// One fetch, one fixed table.
    StaticHtml,
    /// Scroll until the page height stabilizes, then parse.
    ScrollPaginated,
    /// Per-keyword search with next-page links.
    SearchPaginated,
    /// Per-keyword search, single results page.
    SearchOnly,
}

/// The ten supported portals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortalId {
    Muenchen,
    Vmstart,
    RibBayern,
    Rlp,
    Nrw,
    MetropoleRuhr,
    Niedersachsen,
    Brandenburg,
    Saarland,
    SchleswigHolstein,
}

impl PortalId {
    pub fn all() -> [PortalId; 10] {
        [
            PortalId::Muenchen,
            PortalId::Vmstart,
            PortalId::RibBayern,
            PortalId::Rlp,
            PortalId::Nrw,
            PortalId::MetropoleRuhr,
            PortalId::Niedersachsen,
            PortalId::Brandenburg,
            PortalId::Saarland,
            PortalId::SchleswigHolstein,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortalId::Muenchen => "muenchen",
            PortalId::Vmstart => "vmstart",
            PortalId::RibBayern => "rib-bayern",
            PortalId::Rlp => "rlp",
            PortalId::Nrw => "nrw",
            PortalId::MetropoleRuhr => "metropole-ruhr",
            PortalId::Niedersachsen => "niedersachsen",
            PortalId::Brandenburg => "brandenburg",
            PortalId::Saarland => "saarland",
            PortalId::SchleswigHolstein => "schleswig-holstein",
        }
    }
}

impl std::fmt::Display for PortalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an adapter starts and what it stamps on its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalTarget {
    /// Entry URL the session navigates to (search page or listing).
    pub search_url: String,
    /// Canonical portal origin written into `TenderRecord::source_url`.
    pub source_url: String,
}

/// Per-run context shared by all adapters.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub resolver: Arc<StateResolver>,
    pub waits: WaitPolicy,
}

impl ScrapeContext {
    pub fn new(resolver: Arc<StateResolver>, waits: WaitPolicy) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            resolver,
            waits,
        }
    }
}

/// Contract every portal implementation fulfills. A keyword-level failure is
/// handled inside `scrape`; an `Err` here means the whole portal attempt
/// failed and the dispatcher records zero results for it.
#[async_trait]
pub trait PortalAdapter: Send + Sync {
    fn portal(&self) -> PortalId;
    fn interaction(&self) -> Interaction;

    async fn scrape(
        &self,
        session: &mut dyn BrowserSession,
        ctx: &ScrapeContext,
        target: &PortalTarget,
        keywords: &[String],
    ) -> Result<Vec<TenderRecord>, AdapterError>;
}

/// Resolves a portal to its adapter. Called once at configuration time; the
/// portal table never dispatches on URL substrings at scrape time.
pub fn adapter_for(portal: PortalId) -> Box<dyn PortalAdapter> {
    match portal {
        PortalId::Muenchen => Box::new(MunichTableAdapter),
        PortalId::RibBayern => Box::new(RibScrollAdapter),
        PortalId::Vmstart => Box::new(NetserverSearchAdapter::single_page(PortalId::Vmstart)),
        PortalId::Saarland => Box::new(NetserverSearchAdapter::paginated(PortalId::Saarland)),
        PortalId::SchleswigHolstein => Box::new(EvergabeShAdapter),
        PortalId::Rlp
        | PortalId::Nrw
        | PortalId::MetropoleRuhr
        | PortalId::Niedersachsen
        | PortalId::Brandenburg => Box::new(VmpSearchAdapter::new(portal)),
    }
}

// ---- shared extraction helpers ----

pub(crate) fn selector(css: &str) -> Result<Selector, AdapterError> {
    Selector::parse(css).map_err(|_| AdapterError::Selector(css.to_string()))
}

/// Whitespace-collapsed text content of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

pub(crate) fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel).next().and_then(|el| text_or_none(element_text(el)))
}

pub(crate) fn first_text_in(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel).next().and_then(|el| text_or_none(element_text(el)))
}

/// Keywords whose lowercase form occurs in the title, original casing kept.
pub(crate) fn matched_keywords(title: &str, keywords: &[String]) -> Vec<String> {
    let title = title.to_lowercase();
    keywords
        .iter()
        .filter(|keyword| title.contains(&keyword.to_lowercase()))
        .cloned()
        .collect()
}

pub(crate) fn join_url(base: &str, href: &str) -> String {
    match Url::parse(base).and_then(|base| base.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Resolves an enabled next-page link, if any. A link carrying a `disabled`
/// class counts as absent.
pub(crate) fn next_page_url(
    doc: &Html,
    anchor_css: &str,
    base: &str,
) -> Result<Option<String>, AdapterError> {
    let sel = selector(anchor_css)?;
    let Some(anchor) = doc.select(&sel).next() else {
        return Ok(None);
    };
    let classes = anchor.value().attr("class").unwrap_or_default();
    if classes.split_whitespace().any(|class| class == "disabled") {
        return Ok(None);
    }
    Ok(anchor
        .value()
        .attr("href")
        .map(|href| join_url(base, href)))
}

/// Per-portal accumulator: dedups by tender name while keeping first-seen
/// order, unioning keyword lists on repeat sightings.
#[derive(Debug, Default)]
pub(crate) struct RecordMap {
    order: Vec<String>,
    by_name: HashMap<String, TenderRecord>,
}

impl RecordMap {
    pub(crate) fn upsert(&mut self, record: TenderRecord) {
        match self.by_name.get_mut(&record.tender_name) {
            Some(existing) => existing.merge_keywords_from(&record),
            None => {
                self.order.push(record.tender_name.clone());
                self.by_name.insert(record.tender_name.clone(), record);
            }
        }
    }

    pub(crate) fn into_records(self) -> Vec<TenderRecord> {
        let mut by_name = self.by_name;
        self.order
            .into_iter()
            .filter_map(|name| by_name.remove(&name))
            .collect()
    }
}
