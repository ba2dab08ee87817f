//! Cross-portal consolidation: merge records by identity, union keyword
//! lists, apply per-portal fallbacks.

use std::collections::HashMap;

use atis_core::states::State;
use atis_core::{TenderRecord, NOT_SPECIFIED};

use crate::PortalEntry;

/// Per-portal fallback states, keyed by canonical source URL.
#[derive(Debug, Clone, Default)]
pub struct StateDefaults {
    by_source: HashMap<String, State>,
}

impl StateDefaults {
    pub fn from_entries(entries: &[PortalEntry]) -> Self {
        let by_source = entries
            .iter()
            .filter_map(|entry| {
                entry
                    .default_state
                    .map(|state| (entry.source_url.clone(), state))
            })
            .collect();
        Self { by_source }
    }

    pub fn lookup(&self, source_url: &str) -> Option<State> {
        self.by_source.get(source_url).copied()
    }
}

/// Merges raw adapter output into the deduplicated dataset.
///
/// Identity is `(source_url, tender_name)` — two portals publishing tenders
/// under the same title stay separate records. On first sight the record
/// gets its portal's fallback state (if its own location resolved to
/// nothing) and an application start date backfilled from the publication
/// date; repeat sightings only union keyword lists, every other field keeps
/// the first-seen value. Output preserves first-occurrence order.
pub fn consolidate(records: Vec<TenderRecord>, defaults: &StateDefaults) -> Vec<TenderRecord> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut merged: HashMap<(String, String), TenderRecord> = HashMap::new();

    for mut record in records {
        let key = (record.source_url.clone(), record.tender_name.clone());
        match merged.get_mut(&key) {
            Some(existing) => {
                existing.merge_keywords_from(&record);
            }
            None => {
                if record.state == State::NotSpecified {
                    if let Some(default) = defaults.lookup(&record.source_url) {
                        record.state = default;
                    }
                }
                if record.application_start_date == NOT_SPECIFIED {
                    record.application_start_date = record.date_published.clone();
                }
                order.push(key.clone());
                merged.insert(key, record);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| merged.remove(&key))
        .collect()
}
