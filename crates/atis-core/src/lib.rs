//! Core domain model for ATIS: the canonical tender record, the federal-state
//! enumeration with location resolution, and the date/field normalizers shared
//! by every portal adapter.

pub mod dates;
pub mod states;

use serde::{Deserialize, Serialize};

use states::State;

/// Sentinel for any field a portal leaves blank or unparseable. Emitted
/// datasets never contain empty/null fields, only this literal.
pub const NOT_SPECIFIED: &str = "not specified";

/// Canonical unit of the system: one procurement notice as extracted from a
/// portal. `tender_name` together with `source_url` identifies a logical
/// tender within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderRecord {
    pub tender_name: String,
    pub tender_authority: String,
    pub tender_type: String,
    pub tender_code: String,
    pub tender_location: String,
    /// Free-text execution period; only some portals publish one.
    pub period: String,
    pub state: State,
    pub date_published: String,
    pub application_start_date: String,
    pub tender_deadline: String,
    pub source_url: String,
    /// Every keyword whose search surfaced this record, in discovery order.
    pub found_keywords: Vec<String>,
}

impl TenderRecord {
    /// A record with all optional fields set to the sentinel.
    pub fn new(tender_name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            tender_name: tender_name.into(),
            tender_authority: NOT_SPECIFIED.to_string(),
            tender_type: NOT_SPECIFIED.to_string(),
            tender_code: NOT_SPECIFIED.to_string(),
            tender_location: NOT_SPECIFIED.to_string(),
            period: NOT_SPECIFIED.to_string(),
            state: State::NotSpecified,
            date_published: NOT_SPECIFIED.to_string(),
            application_start_date: NOT_SPECIFIED.to_string(),
            tender_deadline: NOT_SPECIFIED.to_string(),
            source_url: source_url.into(),
            found_keywords: Vec::new(),
        }
    }

    /// Appends a keyword unless it is already present.
    pub fn push_keyword(&mut self, keyword: &str) {
        if !self.found_keywords.iter().any(|k| k == keyword) {
            self.found_keywords.push(keyword.to_string());
        }
    }

    /// Unions another record's keywords into this one.
    pub fn merge_keywords_from(&mut self, other: &TenderRecord) {
        for keyword in &other.found_keywords {
            self.push_keyword(keyword);
        }
    }

    /// Rendering used by the dataset emitter: deduplicated, comma-joined.
    pub fn keywords_joined(&self) -> String {
        self.found_keywords.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_defaults_every_optional_field_to_the_sentinel() {
        let record = TenderRecord::new("Neubau Besucherzentrum", "https://vergabe.muenchen.de");
        assert_eq!(record.tender_authority, NOT_SPECIFIED);
        assert_eq!(record.tender_deadline, NOT_SPECIFIED);
        assert_eq!(record.state, State::NotSpecified);
        assert!(record.found_keywords.is_empty());
    }

    #[test]
    fn push_keyword_deduplicates_and_preserves_order() {
        let mut record = TenderRecord::new("t", "s");
        record.push_keyword("Tourismus");
        record.push_keyword("Freizeit");
        record.push_keyword("Tourismus");
        assert_eq!(record.found_keywords, vec!["Tourismus", "Freizeit"]);
        assert_eq!(record.keywords_joined(), "Tourismus, Freizeit");
    }
}
