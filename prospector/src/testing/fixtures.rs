//! Record and parser fixtures.

use crate::aggregate::{CompanyIntelligence, EnrichableRecord};
use crate::errors::CollectError;
use crate::pipeline::{Record, RowParser};
use crate::sources::RawRow;
use serde::{Deserialize, Serialize};

/// Builds a [`RawRow`] from field/value pairs.
#[must_use]
pub fn raw_row(pairs: &[(&str, &str)]) -> RawRow {
    pairs
        .iter()
        .map(|(field, value)| ((*field).to_string(), (*value).to_string()))
        .collect()
}

/// A company identity record keyed by domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// The company's domain; doubles as the dedupe key.
    pub domain: String,
    /// Human-readable company name.
    pub name: String,
    /// Enrichment result, attached after aggregation.
    pub intelligence: Option<CompanyIntelligence>,
}

impl CompanyRecord {
    /// Creates a record with no intelligence attached.
    #[must_use]
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            intelligence: None,
        }
    }
}

impl Record for CompanyRecord {
    fn dedupe_key(&self) -> String {
        self.domain.clone()
    }
}

impl EnrichableRecord for CompanyRecord {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn attach(&mut self, intelligence: CompanyIntelligence) {
        self.intelligence = Some(intelligence);
    }
}

/// Parses rows with a required `domain` field.
///
/// Accepts an optional `name` (defaults to the domain) and rejects rows
/// whose `status` field is present and not `OK`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompanyRowParser;

impl RowParser<CompanyRecord> for CompanyRowParser {
    fn parse_row(&self, row: &RawRow) -> Result<CompanyRecord, CollectError> {
        let domain = row
            .get("domain")
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| CollectError::validation("missing field 'domain'"))?;

        if let Some(status) = row.get("status") {
            if status != "OK" {
                return Err(CollectError::validation(format!(
                    "row flagged with status '{status}'"
                )));
            }
        }

        let name = row.get("name").cloned().unwrap_or_else(|| domain.clone());
        Ok(CompanyRecord::new(domain.clone(), name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_well_formed_row() {
        let parser = CompanyRowParser;
        let record = parser
            .parse_row(&raw_row(&[("domain", "acme.com"), ("name", "Acme")]))
            .unwrap();

        assert_eq!(record.domain, "acme.com");
        assert_eq!(record.name, "Acme");
        assert_eq!(record.dedupe_key(), "acme.com");
    }

    #[test]
    fn test_name_defaults_to_domain() {
        let parser = CompanyRowParser;
        let record = parser.parse_row(&raw_row(&[("domain", "acme.com")])).unwrap();
        assert_eq!(record.name, "acme.com");
    }

    #[test]
    fn test_missing_domain_rejected() {
        let parser = CompanyRowParser;
        assert!(parser.parse_row(&raw_row(&[("name", "Acme")])).is_err());
        assert!(parser.parse_row(&raw_row(&[("domain", "  ")])).is_err());
    }

    #[test]
    fn test_bad_status_rejected() {
        let parser = CompanyRowParser;
        let result = parser.parse_row(&raw_row(&[("domain", "acme.com"), ("status", "BAD")]));
        assert!(result.is_err());

        let result = parser.parse_row(&raw_row(&[("domain", "acme.com"), ("status", "OK")]));
        assert!(result.is_ok());
    }
}
