//! Discount note yields
//!
//! For each subscribed discount note: days to maturity, return to redemption,
//! nominal (TNA) and effective (TEA) annual rates, the MEP rate carried forward
//! at that nominal rate, and its distance from the regulatory FX band ceiling
//! for the maturity month.

use crate::core::symbol::clean_symbol;
use crate::core::{MarketStateStore, NoteTable};
use crate::infrastructure::config::BandsConfig;
use crate::{DeskError, Result};
use serde::Serialize;
use time::{Date, Month, OffsetDateTime};

/// Codes never treated as discount notes (equities, the MEP pair)
pub const EXCLUDED_CODES: [&str; 7] = ["GGAL", "YPFD", "PAMP", "ALUA", "CEPU", "AL30", "AL30D"];
/// Option contract markers, also excluded
pub const EXCLUDED_MARKERS: [&str; 2] = ["GFGC", "GFGV"];

const DAYS_PER_YEAR: f64 = 365.0;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Monthly widening FX band
///
/// `n` months after the epoch month the ceiling is `ceiling_base * (1 + step * n)`
/// and the floor `floor_base * (1 - step * n)`. Dates before the epoch use `n = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSchedule {
    epoch_year: i32,
    epoch_month: Month,
    floor_base: f64,
    ceiling_base: f64,
    step: f64,
}

/// Band values for one date
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bands {
    pub floor: f64,
    pub ceiling: f64,
}

impl BandSchedule {
    pub const fn new(epoch_year: i32, epoch_month: Month, floor_base: f64, ceiling_base: f64, step: f64) -> Self {
        Self {
            epoch_year,
            epoch_month,
            floor_base,
            ceiling_base,
            step,
        }
    }

    /// # Errors
    /// Returns `DeskError::Config` when the epoch is not `YYYY-MM`.
    pub fn from_config(config: &BandsConfig) -> Result<Self> {
        let invalid = || DeskError::Config(format!("bands.epoch must be YYYY-MM, got '{}'", config.epoch));

        let (year, month) = config.epoch.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.trim().parse().map_err(|_| invalid())?;
        let month: u8 = month.trim().parse().map_err(|_| invalid())?;
        let month = Month::try_from(month).map_err(|_| invalid())?;

        Ok(Self::new(
            year,
            month,
            config.floor_base,
            config.ceiling_base,
            config.monthly_step,
        ))
    }

    /// Whole months from the epoch month to `date`'s month, floored at 0
    pub fn months_since_epoch(&self, date: Date) -> u32 {
        let months = (date.year() - self.epoch_year) * 12 + (date.month() as i32 - self.epoch_month as i32);
        months.max(0) as u32
    }

    pub fn ceiling(&self, date: Date) -> f64 {
        self.ceiling_base * (1.0 + self.step * f64::from(self.months_since_epoch(date)))
    }

    pub fn floor(&self, date: Date) -> f64 {
        self.floor_base * (1.0 - self.step * f64::from(self.months_since_epoch(date)))
    }

    pub fn bands(&self, date: Date) -> Bands {
        Bands {
            floor: self.floor(date),
            ceiling: self.ceiling(date),
        }
    }
}

impl Default for BandSchedule {
    fn default() -> Self {
        Self::new(2025, Month::April, 1000.0, 1400.0, 0.01)
    }
}

/// One discount note line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteRow {
    pub symbol: String,
    /// Display label (`S31O5 - 24hs`)
    pub label: String,
    pub code: String,
    pub bid: Option<f64>,
    pub bid_size: Option<f64>,
    pub ask: Option<f64>,
    pub ask_size: Option<f64>,
    pub last: Option<f64>,
    /// last - close
    pub change: Option<f64>,
    pub change_pct: Option<f64>,
    #[serde(with = "iso_date")]
    pub maturity: Date,
    pub days_to_maturity: i64,
    pub redemption: f64,
    pub pct_to_gain: Option<f64>,
    pub tna: Option<f64>,
    pub tea: Option<f64>,
    /// MEP carried to maturity at the note's TNA
    pub mep_fair_value: Option<f64>,
    pub band_ceiling: f64,
    pub pct_over_band: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Return to redemption and annualized rates for a price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteYield {
    pub pct_to_gain: f64,
    pub tna: f64,
    pub tea: f64,
}

/// Yields of a note bought at `last` and redeemed at `redemption` in `days`
///
/// `None` unless `last` and `days` are positive.
pub fn note_yield(last: f64, redemption: f64, days: i64) -> Option<NoteYield> {
    if !(last > 0.0) || days <= 0 {
        return None;
    }
    let days = days as f64;
    let ratio = redemption / last;

    Some(NoteYield {
        pct_to_gain: (ratio - 1.0) * 100.0,
        tna: (ratio - 1.0) * DAYS_PER_YEAR / days * 100.0,
        tea: (ratio.powf(DAYS_PER_YEAR / days) - 1.0) * 100.0,
    })
}

/// Days left as of `today`, excluding settlement day, floored at 0
pub fn days_to_maturity(maturity: Date, today: Date) -> i64 {
    ((maturity - today).whole_days() - 1).max(0)
}

/// Note code for a subscribed symbol, if it can be one
///
/// The cleaned label must have a `" - "` separator; the left part is the code.
/// Equities, the MEP pair and option contracts are rejected.
pub fn note_code(symbol: &str) -> Option<(String, String)> {
    let label = clean_symbol(symbol);
    let (code, _) = label.split_once(" - ")?;
    let code = code.trim().to_string();

    let upper = code.to_uppercase();
    if EXCLUDED_CODES.contains(&upper.as_str()) || EXCLUDED_MARKERS.iter().any(|m| upper.contains(m)) {
        return None;
    }
    Some((code, label))
}

/// Build the note table in subscription order
pub fn build_note_rows<S: AsRef<str>>(
    subscribed: &[S],
    store: &MarketStateStore,
    notes: &NoteTable,
    mep: Option<f64>,
    bands: &BandSchedule,
    today: Date,
) -> Vec<NoteRow> {
    subscribed
        .iter()
        .filter_map(|symbol| {
            let symbol = symbol.as_ref();
            let (code, label) = note_code(symbol)?;
            let note = notes.get(&code)?;
            let record = store.get(symbol);

            let days = days_to_maturity(note.maturity, today);
            let yields = record.last.and_then(|last| note_yield(last, note.redemption, days));
            let tna = yields.map(|y| y.tna);

            let mep_fair_value = mep
                .zip(tna)
                .map(|(mep, tna)| mep * (1.0 + tna / 100.0 / DAYS_PER_YEAR * days as f64));

            let band_ceiling = bands.ceiling(note.maturity);
            let pct_over_band = mep_fair_value
                .filter(|_| band_ceiling != 0.0)
                .map(|fv| (fv - band_ceiling) / band_ceiling * 100.0);

            let close = record.close.filter(|c| *c != 0.0);
            let change = record.last.zip(close).map(|(last, close)| last - close);
            let change_pct = change.zip(close).map(|(change, close)| change / close * 100.0);

            Some(NoteRow {
                symbol: symbol.to_string(),
                label,
                code,
                bid: record.bid,
                bid_size: record.bid_size,
                ask: record.ask,
                ask_size: record.ask_size,
                last: record.last,
                change,
                change_pct,
                maturity: note.maturity,
                days_to_maturity: days,
                redemption: note.redemption,
                pct_to_gain: yields.map(|y| y.pct_to_gain),
                tna,
                tea: yields.map(|y| y.tea),
                mep_fair_value,
                band_ceiling,
                pct_over_band,
                updated_at: record.updated_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::QuoteUpdate;
    use crate::infrastructure::config::NoteEntry;
    use time::macros::date;

    const NOTE: &str = "MERV - XMEV - S31O5 - 24hs";

    fn table(code: &str, maturity: &str, redemption: f64) -> NoteTable {
        NoteTable::from_entries(&[NoteEntry {
            code: code.to_string(),
            maturity: maturity.to_string(),
            redemption,
        }])
        .unwrap()
    }

    #[test]
    fn test_yields_equal_at_one_year() {
        let y = note_yield(90.0, 100.0, 365).unwrap();
        assert!((y.pct_to_gain - 11.111).abs() < 1e-3);
        assert!((y.tna - 11.111).abs() < 1e-3);
        assert!((y.tea - 11.111).abs() < 1e-3);
    }

    #[test]
    fn test_yield_requires_positive_inputs() {
        assert!(note_yield(0.0, 100.0, 30).is_none());
        assert!(note_yield(90.0, 100.0, 0).is_none());
        assert!(note_yield(f64::NAN, 100.0, 30).is_none());
    }

    #[test]
    fn test_days_to_maturity() {
        assert_eq!(days_to_maturity(date!(2025 - 10 - 31), date!(2025 - 10 - 01)), 29);
        assert_eq!(days_to_maturity(date!(2025 - 10 - 31), date!(2025 - 10 - 31)), 0);
        assert_eq!(days_to_maturity(date!(2025 - 10 - 31), date!(2025 - 11 - 15)), 0);
    }

    #[test]
    fn test_note_code_filter() {
        assert_eq!(
            note_code(NOTE),
            Some(("S31O5".to_string(), "S31O5 - 24hs".to_string()))
        );
        assert!(note_code("MERV - XMEV - GGAL - 24hs").is_none());
        assert!(note_code("MERV - XMEV - AL30D - 24hs").is_none());
        assert!(note_code("MERV - XMEV - GFGC6263OC - 24hs").is_none());
        assert!(note_code("S31O5").is_none());
        // membership is exact, not prefix based
        assert!(note_code("MERV - XMEV - GGALD - 24hs").is_some());
    }

    #[test]
    fn test_band_schedule() {
        let bands = BandSchedule::default();

        assert_eq!(bands.bands(date!(2025 - 04 - 15)), Bands { floor: 1000.0, ceiling: 1400.0 });
        assert_eq!(bands.months_since_epoch(date!(2024 - 12 - 01)), 0);
        assert_eq!(bands.months_since_epoch(date!(2026 - 01 - 31)), 9);
        assert!((bands.ceiling(date!(2026 - 01 - 31)) - 1526.0).abs() < 1e-9);
        assert!((bands.floor(date!(2026 - 01 - 31)) - 910.0).abs() < 1e-9);
    }

    #[test]
    fn test_band_schedule_from_config() {
        let config = BandsConfig::default();
        assert_eq!(BandSchedule::from_config(&config).unwrap(), BandSchedule::default());

        let bad = BandsConfig {
            epoch: "April 2025".into(),
            ..BandsConfig::default()
        };
        assert!(matches!(BandSchedule::from_config(&bad), Err(DeskError::Config(_))));
    }

    #[test]
    fn test_build_note_rows_full() {
        let today = date!(2025 - 04 - 01);
        let maturity = today + time::Duration::days(366);
        let notes = table("S31O5", &maturity.to_string(), 100.0);

        let mut store = MarketStateStore::new();
        store.apply(&QuoteUpdate::new(NOTE).with_last(90.0).with_close(88.0));

        let rows = build_note_rows(&[NOTE], &store, &notes, Some(1200.0), &BandSchedule::default(), today);
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.code, "S31O5");
        assert_eq!(row.days_to_maturity, 365);
        assert!((row.pct_to_gain.unwrap() - 11.111).abs() < 1e-3);
        assert!((row.tna.unwrap() - 11.111).abs() < 1e-3);
        assert!((row.tea.unwrap() - 11.111).abs() < 1e-3);

        let fv = 1200.0 * (1.0 + 0.11111111 / 365.0 * 365.0);
        assert!((row.mep_fair_value.unwrap() - fv).abs() < 1e-3);

        // maturity is April 2026, twelve months after the epoch
        assert!((row.band_ceiling - 1568.0).abs() < 1e-9);
        let over = (fv - 1568.0) / 1568.0 * 100.0;
        assert!((row.pct_over_band.unwrap() - over).abs() < 1e-3);

        assert_eq!(row.change, Some(2.0));
        assert!((row.change_pct.unwrap() - 2.0 / 88.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_build_note_rows_missing_inputs() {
        let notes = table("S31O5", "2025-10-31", 132.8);
        let mut store = MarketStateStore::new();
        store.apply(&QuoteUpdate::new(NOTE).with_close(0.0));

        let rows = build_note_rows(&[NOTE], &store, &notes, None, &BandSchedule::default(), date!(2025 - 10 - 01));
        let row = &rows[0];
        assert_eq!(row.last, None);
        assert_eq!(row.tna, None);
        assert_eq!(row.mep_fair_value, None);
        assert_eq!(row.pct_over_band, None);
        assert_eq!(row.change, None);
        assert_eq!(row.days_to_maturity, 29);
    }

    #[test]
    fn test_build_note_rows_filters_and_keeps_order() {
        let notes = NoteTable::from_entries(&crate::infrastructure::config::default_notes()).unwrap();
        let store = MarketStateStore::new();
        let subscribed = [
            "MERV - XMEV - T15D5 - 24hs",
            "MERV - XMEV - GGAL - 24hs",
            "MERV - XMEV - XXXX - 24hs",
            "MERV - XMEV - GFGV5000OC - 24hs",
            "MERV - XMEV - S12S5 - 24hs",
        ];

        let rows = build_note_rows(&subscribed, &store, &notes, None, &BandSchedule::default(), date!(2025 - 08 - 01));
        let codes: Vec<&str> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["T15D5", "S12S5"]);
    }
}
