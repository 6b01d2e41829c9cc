// 🏷️ Term Normalizer - Rules as Data
// Canonicalizes free-text field values with a static alias table

use crate::config::TermAlias;
use crate::error::{InventoryError, Result};
use crate::store::{RecordStore, Replacement};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Comparison form: surrounding whitespace trimmed, case folded
fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

// ============================================================================
// TERM NORMALIZER
// ============================================================================

pub struct TermNormalizer {
    aliases: Vec<TermAlias>,

    /// (field, folded alternate) -> canonical term
    lookup: HashMap<(String, String), String>,
}

impl TermNormalizer {
    /// Build a normalizer from alias triples. Later duplicates of the same
    /// alternate are ignored here; `validate` reports them.
    pub fn new(aliases: Vec<TermAlias>) -> Self {
        let mut lookup = HashMap::new();
        for alias in &aliases {
            lookup
                .entry((alias.field.clone(), fold(&alias.alt)))
                .or_insert_with(|| alias.term.clone());
        }
        TermNormalizer { aliases, lookup }
    }

    /// Canonical value for (field, value), or the value unchanged
    pub fn normalize<'a>(&'a self, field: &str, value: &'a str) -> &'a str {
        match self.lookup.get(&(field.to_string(), fold(value))) {
            Some(term) => term.as_str(),
            None => value,
        }
    }

    /// Reject tables where one alternate maps to two terms, or where a
    /// canonical term is itself an alternate of a different term.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashMap<(&str, String), &str> = HashMap::new();

        for alias in &self.aliases {
            let key = (alias.field.as_str(), fold(&alias.alt));
            if let Some(first) = seen.get(&key) {
                if fold(first) != fold(&alias.term) {
                    return Err(InventoryError::AliasConflict {
                        field: alias.field.clone(),
                        alternate: alias.alt.clone(),
                        first: first.to_string(),
                        second: alias.term.clone(),
                    });
                }
            } else {
                seen.insert(key, alias.term.as_str());
            }
        }

        for alias in &self.aliases {
            let key = (alias.field.as_str(), fold(&alias.term));
            if let Some(target) = seen.get(&key) {
                if fold(target) != fold(&alias.term) {
                    return Err(InventoryError::AliasConflict {
                        field: alias.field.clone(),
                        alternate: alias.term.clone(),
                        first: alias.term.clone(),
                        second: target.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Fields that have at least one alias
    pub fn fields(&self) -> BTreeSet<&str> {
        self.aliases.iter().map(|a| a.field.as_str()).collect()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Bulk cleanup pass over a loaded table, committed as one batch.
    /// Returns the number of rows rewritten.
    pub fn apply<S: RecordStore + ?Sized>(&self, store: &mut S, table: &str) -> Result<usize> {
        let mut replacements = Vec::new();

        for field in self.fields() {
            let distinct = store.group_count(table, &[field], None)?;

            for group in distinct {
                let raw = match group.key.first() {
                    Some(cell) => cell.to_string(),
                    None => continue,
                };
                let canonical = self.normalize(field, &raw);
                if canonical == raw {
                    continue;
                }

                debug!(field, from = %raw, to = canonical, rows = group.count, "normalizing term");
                replacements.push(Replacement::new(field, &raw, canonical));
            }
        }

        let rewritten = store.replace_values(table, &replacements)?;
        info!(
            table,
            terms = replacements.len(),
            rows = rewritten,
            "term normalization complete"
        );
        Ok(rewritten)
    }
}

// ============================================================================
// TESTS
// ============================================================================
