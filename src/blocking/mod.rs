// src/blocking/mod.rs
//! Blocking engine: partitions records into candidate buckets so scoring
//! never has to consider all pairs.
use anyhow::{anyhow, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::features::normalize::{email_domain, normalize_string};
use crate::models::{CandidatePair, Record};

/// Derives blocking keys from one field. A record may produce keys under
/// several strategies and so belong to multiple blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum KeyStrategy {
    /// First `len` characters of the normalized field value.
    NormalizedPrefix { field: String, len: usize },
    /// Soundex phonetic code of the field value.
    Phonetic { field: String },
    /// The normalized field value itself (e.g. postal code).
    FieldExact { field: String },
    /// Digits extracted from a postal-code field. Errors on values that
    /// contain no digits at all, which marks malformed upstream data.
    PostalCode { field: String },
    /// Domain part of an email field.
    EmailDomain { field: String },
}

impl KeyStrategy {
    fn field(&self) -> &str {
        match self {
            KeyStrategy::NormalizedPrefix { field, .. }
            | KeyStrategy::Phonetic { field }
            | KeyStrategy::FieldExact { field }
            | KeyStrategy::PostalCode { field }
            | KeyStrategy::EmailDomain { field } => field,
        }
    }

    /// Derives this strategy's key for one record. `Ok(None)` means the field
    /// is absent or unusable (no key, not an error); `Err` means the value is
    /// present but malformed for this strategy.
    fn key_for(&self, record: &Record) -> Result<Option<String>> {
        let Some(value) = record.field(self.field()) else {
            return Ok(None);
        };
        match self {
            KeyStrategy::NormalizedPrefix { len, .. } => {
                let normalized = normalize_string(value).replace(' ', "");
                if normalized.is_empty() {
                    return Ok(None);
                }
                let prefix: String = normalized.chars().take(*len).collect();
                Ok(Some(format!("pfx:{}", prefix)))
            }
            KeyStrategy::Phonetic { .. } => Ok(soundex(value).map(|code| format!("snd:{}", code))),
            KeyStrategy::FieldExact { .. } => {
                let normalized = normalize_string(value);
                if normalized.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(format!("fld:{}", normalized)))
                }
            }
            KeyStrategy::PostalCode { .. } => {
                let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    return Err(anyhow!(
                        "postal code '{}' on record {} contains no digits",
                        value,
                        record.id
                    ));
                }
                Ok(Some(format!("zip:{}", digits)))
            }
            KeyStrategy::EmailDomain { .. } => {
                Ok(email_domain(value).map(|domain| format!("dom:{}", domain)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingConfig {
    pub strategies: Vec<KeyStrategy>,
}

impl BlockingConfig {
    pub fn new(strategies: Vec<KeyStrategy>) -> Self {
        Self { strategies }
    }

    /// Default blocking for organisation/contact records: name prefix,
    /// name phonetics, and email domain.
    pub fn default_config() -> Self {
        Self::new(vec![
            KeyStrategy::NormalizedPrefix {
                field: "name".to_string(),
                len: 6,
            },
            KeyStrategy::Phonetic {
                field: "name".to_string(),
            },
            KeyStrategy::EmailDomain {
                field: "email".to_string(),
            },
        ])
    }

    pub fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(anyhow!("blocking config has no key strategies"));
        }
        for strategy in &self.strategies {
            if strategy.field().trim().is_empty() {
                return Err(anyhow!("blocking strategy names a blank field"));
            }
            if let KeyStrategy::NormalizedPrefix { len, .. } = strategy {
                if *len == 0 {
                    return Err(anyhow!("normalized-prefix length must be at least 1"));
                }
            }
        }
        Ok(())
    }
}

/// Mapping from blocking key to the record ids sharing that key, plus the
/// dedicated "unblocked" bucket of records that produced no usable key.
/// Unblocked records are compared against nothing: reported, never scored.
#[derive(Debug, Default)]
pub struct BlockIndex {
    pub blocks: BTreeMap<String, Vec<String>>,
    pub unblocked: Vec<String>,
    pub key_error_count: usize,
}

impl BlockIndex {
    /// Candidate pairs grouped by block, deduplicated across the whole index:
    /// a pair shared by several blocks is attributed to the first block (in
    /// key order) that contains it. Self-pairs are excluded by construction.
    pub fn candidate_pairs_by_block(&self) -> Vec<(String, Vec<CandidatePair>)> {
        let mut seen: HashSet<CandidatePair> = HashSet::new();
        let mut result = Vec::new();
        for (key, ids) in &self.blocks {
            let mut pairs = Vec::new();
            for i in 0..ids.len() {
                for j in (i + 1)..ids.len() {
                    if let Some(pair) = CandidatePair::new(ids[i].clone(), ids[j].clone()) {
                        if seen.insert(pair.clone()) {
                            pairs.push(pair);
                        }
                    }
                }
            }
            if !pairs.is_empty() {
                result.push((key.clone(), pairs));
            }
        }
        result
    }

    pub fn total_pairs(&self) -> usize {
        self.candidate_pairs_by_block()
            .iter()
            .map(|(_, pairs)| pairs.len())
            .sum()
    }
}

/// Builds the block index. A key-derivation error on a single record routes
/// that record to the unblocked bucket instead of aborting the run.
pub fn build_index(records: &[Record], config: &BlockingConfig) -> BlockIndex {
    let mut index = BlockIndex::default();
    for record in records {
        let mut keys: Vec<String> = Vec::new();
        let mut errored = false;
        for strategy in &config.strategies {
            match strategy.key_for(record) {
                Ok(Some(key)) => keys.push(key),
                Ok(None) => {}
                Err(e) => {
                    debug!("blocking key failed for record {}: {}", record.id, e);
                    errored = true;
                    break;
                }
            }
        }
        // A key error disqualifies the record outright: keys from other
        // strategies are discarded and the record is reported, not scored.
        if errored {
            index.key_error_count += 1;
            index.unblocked.push(record.id.clone());
            continue;
        }
        if keys.is_empty() {
            index.unblocked.push(record.id.clone());
            continue;
        }
        keys.sort();
        keys.dedup();
        for key in keys {
            index.blocks.entry(key).or_default().push(record.id.clone());
        }
    }
    index
}

/// Classic Soundex code (letter + three digits). Returns `None` when the
/// input contains no ASCII letters.
pub fn soundex(value: &str) -> Option<String> {
    let letters: Vec<char> = value
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let first = *letters.first()?;

    fn code(c: char) -> Option<char> {
        match c {
            'B' | 'F' | 'P' | 'V' => Some('1'),
            'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
            'D' | 'T' => Some('3'),
            'L' => Some('4'),
            'M' | 'N' => Some('5'),
            'R' => Some('6'),
            _ => None,
        }
    }

    let mut out = String::new();
    out.push(first);
    let mut last_code = code(first);
    for &c in &letters[1..] {
        let current = code(c);
        // Vowels reset the run; H and W do not.
        if let Some(digit) = current {
            if Some(digit) != last_code {
                out.push(digit);
                if out.len() == 4 {
                    break;
                }
            }
        }
        if c != 'H' && c != 'W' {
            last_code = current;
        }
    }
    while out.len() < 4 {
        out.push('0');
    }
    Some(out)
}
