//! Discount note reference table
//!
//! Maps a note's short code (e.g. `S15G5`) to its maturity date and redemption
//! value. Built once from configuration and immutable afterwards.

use crate::infrastructure::config::NoteEntry;
use crate::{DeskError, Result};
use std::collections::HashMap;
use time::macros::format_description;
use time::Date;

/// Static reference data for one discount note
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscountNote {
    pub maturity: Date,
    /// Value paid at maturity
    pub redemption: f64,
}

/// Immutable code -> note table
#[derive(Debug, Clone, Default)]
pub struct NoteTable {
    notes: HashMap<String, DiscountNote>,
}

impl NoteTable {
    /// Build the table from configuration entries
    ///
    /// # Errors
    /// Returns `DeskError::Config` for a malformed maturity date or a
    /// non-positive redemption value.
    pub fn from_entries(entries: &[NoteEntry]) -> Result<Self> {
        let format = format_description!("[year]-[month]-[day]");
        let mut notes = HashMap::with_capacity(entries.len());

        for entry in entries {
            let maturity = Date::parse(&entry.maturity, &format).map_err(|e| {
                DeskError::Config(format!(
                    "note {}: invalid maturity '{}': {}",
                    entry.code, entry.maturity, e
                ))
            })?;
            if !(entry.redemption > 0.0) {
                return Err(DeskError::Config(format!(
                    "note {}: redemption must be positive",
                    entry.code
                )));
            }
            notes.insert(
                entry.code.clone(),
                DiscountNote {
                    maturity,
                    redemption: entry.redemption,
                },
            );
        }

        Ok(Self { notes })
    }

    #[inline]
    pub fn get(&self, code: &str) -> Option<&DiscountNote> {
        self.notes.get(code)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
