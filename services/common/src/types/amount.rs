//! Fixed-point monetary amount

use crate::constants::{FIXED_POINT_SCALE, FIXED_POINT_SCALE_F64, FIXED_POINT_SCALE_I128};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monetary amount (stored as i64 ticks for exact comparison, 4 decimal places)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(i64); // Internal: amount in ticks (1 tick = 0.0001)

impl Amount {
    /// Create an amount from a floating point value, rounding to the nearest tick
    /// For external API compatibility only - prefer `from_i64`
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        let scaled = (value * FIXED_POINT_SCALE_F64).round();
        const MAX_SAFE: f64 = 9_223_372_036_854_775_807.0;
        const MIN_SAFE: f64 = -9_223_372_036_854_775_808.0;

        let clamped = if scaled.is_nan() {
            0
        } else if scaled >= MAX_SAFE {
            i64::MAX
        } else if scaled <= MIN_SAFE {
            i64::MIN
        } else {
            #[allow(clippy::cast_possible_truncation)]
            // SAFETY: bounds checked above
            let ticks = scaled as i64;
            ticks
        };
        Self(clamped)
    }

    /// Exact conversion from a floating point value, rounding to the nearest tick
    ///
    /// Returns None for NaN, infinities and values outside the i64 tick range,
    /// where `from_f64` would clamp.
    #[must_use]
    pub fn try_from_f64(value: f64) -> Option<Self> {
        const TICK_LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
        let scaled = (value * FIXED_POINT_SCALE_F64).round();
        if !scaled.is_finite() || scaled >= TICK_LIMIT || scaled < -TICK_LIMIT {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        // SAFETY: bounds checked above
        let ticks = scaled as i64;
        Some(Self(ticks))
    }

    /// Get the amount as f64 for external APIs only
    /// WARNING: For values > 2^53 / 10000, this may lose precision
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        {
            self.0 as f64 / FIXED_POINT_SCALE_F64
        }
    }

    /// Create from whole currency units (e.g. 80 -> 80.0000)
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units.saturating_mul(FIXED_POINT_SCALE))
    }

    /// Create from i64 ticks
    #[must_use]
    pub const fn from_i64(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Get amount as i64 ticks
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Narrow an i128 tick total back to an amount, None if it does not fit
    #[must_use]
    pub fn from_i128(ticks: i128) -> Option<Self> {
        i64::try_from(ticks).ok().map(Self)
    }

    /// Mean of `count` amounts summing to `sum` ticks, rounded half away from zero
    ///
    /// Returns None when `count` is zero or the mean does not fit in an amount.
    #[must_use]
    pub fn mean(sum: i128, count: u64) -> Option<Self> {
        if count == 0 {
            return None;
        }
        let count = i128::from(count);
        let quotient = sum / count;
        let remainder = sum % count;
        let rounded = if remainder.abs() * 2 >= count {
            quotient + sum.signum()
        } else {
            quotient
        };
        Self::from_i128(rounded)
    }

    /// Whole units of the amount, truncated toward zero
    #[must_use]
    pub const fn whole_units(&self) -> i64 {
        self.0 / FIXED_POINT_SCALE
    }

    /// Zero amount
    pub const ZERO: Self = Self(0);
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ticks = i128::from(self.0);
        let sign = if ticks < 0 { "-" } else { "" };
        let abs = ticks.abs();
        write!(
            f,
            "{}{}.{:04}",
            sign,
            abs / FIXED_POINT_SCALE_I128,
            abs % FIXED_POINT_SCALE_I128
        )
    }
}
