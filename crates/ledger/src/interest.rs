//! Interest accrual math.
//!
//! Simple (non-compounding) proration of an annualized rate:
//! `interest = balance * rate * elapsed_days / 365`. All arithmetic is
//! fixed-point; the result is rounded to two decimal places.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const SECONDS_PER_DAY: i64 = 86_400;

/// Interest accrued on `balance` at annualized `rate` over `elapsed`.
///
/// Negative elapsed time (clock skew) accrues nothing.
pub fn accrued_interest(balance: Decimal, rate: Decimal, elapsed: Duration) -> Decimal {
    let seconds = elapsed.num_seconds().max(0);
    let days = Decimal::from(seconds) / Decimal::from(SECONDS_PER_DAY);
    (balance * rate * days / dec!(365)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn one_year_at_ten_percent_on_one_thousand() {
        let interest = accrued_interest(dec!(1000.00), dec!(0.10), Duration::days(365));
        assert_eq!(interest, dec!(100.00));
    }

    #[test]
    fn half_year_prorates() {
        // 182.5 days of 365 at 10% on 1000.00 -> 50.00
        let interest = accrued_interest(dec!(1000.00), dec!(0.10), Duration::hours(182 * 24 + 12));
        assert_eq!(interest, dec!(50.00));
    }

    #[test]
    fn zero_elapsed_accrues_nothing() {
        assert_eq!(
            accrued_interest(dec!(1000.00), dec!(0.10), Duration::zero()),
            Decimal::ZERO
        );
    }

    #[test]
    fn negative_elapsed_is_clamped() {
        assert_eq!(
            accrued_interest(dec!(1000.00), dec!(0.10), Duration::days(-3)),
            Decimal::ZERO
        );
    }

    #[test]
    fn zero_rate_accrues_nothing() {
        assert_eq!(
            accrued_interest(dec!(1000.00), Decimal::ZERO, Duration::days(365)),
            Decimal::ZERO
        );
    }

    proptest! {
        /// Interest is never negative and never exceeds balance * rate for
        /// periods of at most one year.
        #[test]
        fn interest_is_bounded(
            balance_cents in 0i64..1_000_000_000i64,
            rate_bp in 0u32..=10_000u32,
            days in 0i64..=365i64,
        ) {
            let balance = Decimal::new(balance_cents, 2);
            let rate = Decimal::new(rate_bp as i64, 4);
            let interest = accrued_interest(balance, rate, Duration::days(days));

            prop_assert!(interest >= Decimal::ZERO);
            // Full-year cap, with rounding slack of half a cent.
            prop_assert!(interest <= (balance * rate).round_dp(2) + Decimal::new(1, 2));
        }

        /// More elapsed time never accrues less interest.
        #[test]
        fn interest_is_monotonic_in_time(
            balance_cents in 0i64..1_000_000_000i64,
            rate_bp in 0u32..=10_000u32,
            days_a in 0i64..=1000i64,
            days_b in 0i64..=1000i64,
        ) {
            let balance = Decimal::new(balance_cents, 2);
            let rate = Decimal::new(rate_bp as i64, 4);
            let (lo, hi) = if days_a <= days_b { (days_a, days_b) } else { (days_b, days_a) };

            let a = accrued_interest(balance, rate, Duration::days(lo));
            let b = accrued_interest(balance, rate, Duration::days(hi));
            prop_assert!(a <= b);
        }
    }
}
