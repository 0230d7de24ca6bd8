//! Black-Scholes-Merton pricing and implied volatility
//!
//! European options with a continuous dividend yield. Implied volatility is
//! found by bisection: the initial interval is widened upward a bounded number
//! of times to bracket the observed price, then halved until narrow enough.
//! Anything that cannot be bracketed or does not converge has no volatility.

// Standard option pricing notation (s, k, t, r, q)
#![allow(clippy::many_single_char_names)]

use crate::core::OptionSide;
use std::f64::consts::SQRT_2;
use thiserror::Error;

/// Lower end of the initial volatility interval
pub const VOL_LOW: f64 = 1e-4;
/// Upper end of the initial volatility interval
pub const VOL_HIGH: f64 = 5.0;
/// Bisection stops once the half-interval is below this
pub const VOL_TOLERANCE: f64 = 1e-4;
pub const MAX_ITERATIONS: usize = 60;
/// How many times the upper bound may be doubled to find a bracket
pub const MAX_BRACKET_EXPANSIONS: usize = 5;

/// Implied volatility failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("Observed price {price} not bracketed up to volatility {max_vol}")]
    Unbracketed { price: f64, max_vol: f64 },

    #[error("Bisection did not converge in {iterations} iterations")]
    NotConverged { iterations: usize },
}

/// Market inputs for one option (rates are decimal, time in years)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionInputs {
    pub spot: f64,
    pub strike: f64,
    pub time: f64,
    pub rate: f64,
    pub dividend_yield: f64,
    pub side: OptionSide,
}

/// Standard normal CDF
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * libm::erfc(-x / SQRT_2)
}

/// Theoretical option value at `volatility`
///
/// `None` when spot, strike, time or volatility is not positive.
pub fn price(inputs: &OptionInputs, volatility: f64) -> Option<f64> {
    let OptionInputs {
        spot: s,
        strike: k,
        time: t,
        rate: r,
        dividend_yield: q,
        side,
    } = *inputs;

    if !(s > 0.0 && k > 0.0 && t > 0.0 && volatility > 0.0) {
        return None;
    }

    let sqrt_t = t.sqrt();
    let d1 = ((s / k).ln() + (r - q + 0.5 * volatility * volatility) * t) / (volatility * sqrt_t);
    let d2 = d1 - volatility * sqrt_t;

    let spot_df = (-q * t).exp();
    let strike_df = (-r * t).exp();

    let value = match side {
        OptionSide::Call => s * spot_df * norm_cdf(d1) - k * strike_df * norm_cdf(d2),
        OptionSide::Put => k * strike_df * norm_cdf(-d2) - s * spot_df * norm_cdf(-d1),
    };

    value.is_finite().then_some(value)
}

/// Volatility at which the model reproduces `observed`
///
/// # Errors
/// - `InvalidInput` for non-positive spot, strike or time, or a non-finite price
/// - `Unbracketed` when no volatility up to `VOL_HIGH * 2^5` reaches the price
/// - `NotConverged` if the iteration cap is hit before the tolerance. This is a
///   guard: halving a bracket of at most `[VOL_LOW, VOL_HIGH * 2^5]` reaches the
///   tolerance well inside `MAX_ITERATIONS`
pub fn implied_volatility(observed: f64, inputs: &OptionInputs) -> Result<f64, SolverError> {
    if !observed.is_finite() {
        return Err(SolverError::InvalidInput("observed price is not finite"));
    }
    if !(inputs.spot > 0.0 && inputs.strike > 0.0 && inputs.time > 0.0) {
        return Err(SolverError::InvalidInput("spot, strike and time must be positive"));
    }

    let diff = |vol: f64| -> Result<f64, SolverError> {
        price(inputs, vol)
            .map(|p| p - observed)
            .ok_or(SolverError::InvalidInput("pricer undefined"))
    };

    let mut a = VOL_LOW;
    let mut b = VOL_HIGH;
    let mut fa = diff(a)?;
    let fb = diff(b)?;

    if fa * fb > 0.0 {
        let mut bracketed = false;
        let mut hi = b;
        for _ in 0..MAX_BRACKET_EXPANSIONS {
            hi *= 2.0;
            if fa * diff(hi)? <= 0.0 {
                b = hi;
                bracketed = true;
                break;
            }
        }
        if !bracketed {
            return Err(SolverError::Unbracketed {
                price: observed,
                max_vol: hi,
            });
        }
    }

    for _ in 0..MAX_ITERATIONS {
        let m = 0.5 * (a + b);
        let fm = diff(m)?;
        if fm == 0.0 || (b - a) / 2.0 < VOL_TOLERANCE {
            return Ok(m.max(0.0));
        }
        if fa * fm < 0.0 {
            b = m;
        } else {
            a = m;
            fa = fm;
        }
    }

    Err(SolverError::NotConverged {
        iterations: MAX_ITERATIONS,
    })
}
