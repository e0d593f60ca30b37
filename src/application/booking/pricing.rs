//! Rental pricing

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::Interval;

/// Decimal places of the billing currency.
pub const CURRENCY_SCALE: u32 = 2;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Fractional days covered by `window`, never less than one.
pub fn billable_days(window: &Interval) -> Decimal {
    let days = Decimal::from(window.duration().num_milliseconds()) / Decimal::from(MILLIS_PER_DAY);
    days.max(Decimal::ONE)
}

/// Total price of renting an asset at `rate_per_day` for `window`.
///
/// Anything shorter than a day is billed as a full day; the result is
/// rounded half away from zero to [`CURRENCY_SCALE`] places.
pub fn compute_cost(rate_per_day: Decimal, window: &Interval) -> Decimal {
    (rate_per_day * billable_days(window))
        .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
