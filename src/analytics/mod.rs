//! Derived analytics over the market state
//!
//! - black_scholes: option pricing and implied volatility
//! - option_chain: strike-paired call/put table with IVs
//! - fixed_income: discount note yields and FX band comparison
//! - reference: underlying and MEP summaries

pub mod black_scholes;
pub mod fixed_income;
pub mod option_chain;
pub mod reference;

pub use black_scholes::{implied_volatility, OptionInputs, SolverError};
pub use fixed_income::{build_note_rows, BandSchedule, Bands, NoteRow};
pub use option_chain::{build_chain, ChainParams, ChainRow, IvScale, OptionChain, SideQuote};
pub use reference::{mep_change, price_change, PriceChange};
