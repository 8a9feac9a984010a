//! Running scalar aggregates over recorded amounts

use services_common::Amount;

/// Count, sum and extremes of every recorded amount
///
/// The sum is kept in i128 ticks so that it cannot overflow for any
/// realistic number of i64 amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateState {
    count: u64,
    sum: i128,
    min: Option<Amount>,
    max: Option<Amount>,
}

impl AggregateState {
    /// Empty aggregates
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: None,
            max: None,
        }
    }

    /// Fold one amount into the aggregates - O(1)
    ///
    /// Returns `None` without touching the state when the count or sum would
    /// overflow.
    #[must_use]
    pub fn record(&mut self, amount: Amount) -> Option<()> {
        let count = self.count.checked_add(1)?;
        let sum = self.sum.checked_add(i128::from(amount.as_i64()))?;

        self.count = count;
        self.sum = sum;
        self.min = Some(self.min.map_or(amount, |min| min.min(amount)));
        self.max = Some(self.max.map_or(amount, |max| max.max(amount)));
        Some(())
    }

    /// Back to the empty state
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Number of recorded amounts
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Sum of recorded amounts in ticks
    #[must_use]
    pub const fn sum(&self) -> i128 {
        self.sum
    }

    /// Smallest recorded amount
    #[must_use]
    pub const fn min(&self) -> Option<Amount> {
        self.min
    }

    /// Largest recorded amount
    #[must_use]
    pub const fn max(&self) -> Option<Amount> {
        self.max
    }

    /// Mean amount, None when nothing has been recorded
    #[must_use]
    pub fn average(&self) -> Option<Amount> {
        Amount::mean(self.sum, self.count)
    }

    /// Check the internal consistency of the aggregates
    pub fn check_invariants(&self) -> Result<(), String> {
        match (self.count, self.min, self.max) {
            (0, None, None) if self.sum == 0 => Ok(()),
            (0, _, _) => Err(format!(
                "empty aggregates carry data: sum={} min={:?} max={:?}",
                self.sum, self.min, self.max
            )),
            (_, Some(min), Some(max)) if min > max => {
                Err(format!("min {min} is greater than max {max}"))
            }
            (count, Some(min), Some(max)) => {
                let count = i128::from(count);
                let low = i128::from(min.as_i64()) * count;
                let high = i128::from(max.as_i64()) * count;
                if self.sum < low || self.sum > high {
                    Err(format!(
                        "sum {} outside [{low}, {high}] for {count} amounts",
                        self.sum
                    ))
                } else {
                    Ok(())
                }
            }
            (count, min, max) => Err(format!(
                "{count} amounts recorded but extremes missing: min={min:?} max={max:?}"
            )),
        }
    }
}
