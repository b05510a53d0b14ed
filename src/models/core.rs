// src/models/core.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single entity as delivered by the upstream record producer.
///
/// Records are immutable once loaded for a run. Fields absent from a record,
/// or present with a null value, are treated identically by the comparator:
/// both yield the `Unknown` sentinel for that comparison dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: HashMap<String, Option<String>>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), Some(value.into()));
        self
    }

    /// Returns the field value, treating an explicit null the same as absence.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.trim().is_empty())
    }
}

/// Canonically ordered pair of record ids (`record_id_a < record_id_b`).
///
/// The ordering guarantees that (A, B) and (B, A) collapse to one entry, so a
/// pair can never appear in both directions across blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidatePair {
    pub record_id_a: String,
    pub record_id_b: String,
}

impl CandidatePair {
    /// Builds a canonical pair. Returns `None` for self-pairs.
    pub fn new(id_1: impl Into<String>, id_2: impl Into<String>) -> Option<Self> {
        let (id_1, id_2) = (id_1.into(), id_2.into());
        match id_1.cmp(&id_2) {
            std::cmp::Ordering::Less => Some(Self {
                record_id_a: id_1,
                record_id_b: id_2,
            }),
            std::cmp::Ordering::Greater => Some(Self {
                record_id_a: id_2,
                record_id_b: id_1,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl std::fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<->{}", self.record_id_a, self.record_id_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_canonical_ordering() {
        let forward = CandidatePair::new("a1", "b2").unwrap();
        let reverse = CandidatePair::new("b2", "a1").unwrap();
        assert_eq!(forward, reverse);
        assert_eq!(forward.record_id_a, "a1");
        assert_eq!(forward.record_id_b, "b2");
    }

    #[test]
    fn test_self_pair_excluded() {
        assert!(CandidatePair::new("a1", "a1").is_none());
    }

    #[test]
    fn test_field_treats_null_and_blank_as_missing() {
        let mut record = Record::new("r1").with_field("name", "Acme");
        record.fields.insert("email".to_string(), None);
        record
            .fields
            .insert("phone".to_string(), Some("   ".to_string()));

        assert_eq!(record.field("name"), Some("Acme"));
        assert_eq!(record.field("email"), None);
        assert_eq!(record.field("phone"), None);
        assert_eq!(record.field("address"), None);
    }
}
