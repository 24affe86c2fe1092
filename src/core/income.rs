use super::{IncomeError, PricePoint, PriceSeries, RewardEvent};
use rust_decimal::Decimal;

/// Staking income totals for one tax year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearlyTotal {
    pub year: i32,
    pub total_native: Decimal,
    pub total_usd: Decimal,
}

/// Reward paired with the price sample used to value it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedReward {
    pub event: RewardEvent,
    pub price: PricePoint,
}

impl MatchedReward {
    pub fn value_usd(&self) -> Decimal {
        self.event.amount * self.price.usd_price
    }
}

/// Income report
#[derive(Debug)]
pub struct IncomeReport {
    pub total: YearlyTotal,
    /// Individual rewards received in the year, in input order
    pub rewards: Vec<MatchedReward>,
}

/// Value every reward received in `year` at its nearest daily price and sum them.
///
/// Rewards from other years are ignored. A reward in the year with no price
/// sample fails the whole calculation.
pub fn calculate_staking_income(
    events: Vec<RewardEvent>,
    prices: &PriceSeries,
    year: i32,
) -> Result<IncomeReport, IncomeError> {
    let total_events = events.len();
    let rewards = events
        .into_iter()
        .filter(|event| event.year() == year)
        .map(|event| {
            let price = *prices
                .nearest(event.timestamp)
                .ok_or(IncomeError::PriceUnavailable {
                    timestamp: event.timestamp,
                })?;
            Ok(MatchedReward { event, price })
        })
        .collect::<Result<Vec<_>, IncomeError>>()?;

    log::info!(
        "{} of {} rewards received in {}",
        rewards.len(),
        total_events,
        year
    );

    let (total_native, total_usd) = rewards.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(native, usd), reward| (native + reward.event.amount, usd + reward.value_usd()),
    );

    Ok(IncomeReport {
        total: YearlyTotal {
            year,
            total_native,
            total_usd,
        },
        rewards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn reward(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32, amount: Decimal) -> RewardEvent {
        RewardEvent::new(Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap(), amount)
    }

    fn daily_prices(start: NaiveDate, prices: &[Decimal]) -> PriceSeries {
        PriceSeries::new(
            start
                .iter_days()
                .zip(prices)
                .map(|(date, price)| PricePoint {
                    date,
                    usd_price: *price,
                })
                .collect(),
        )
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rewards_valued_at_matched_price() {
        let prices = daily_prices(ymd(2024, 6, 1), &[dec!(150.00)]);
        let events = vec![reward(2024, 6, 1, 0, 0, 0, dec!(1.5))];

        let report = calculate_staking_income(events, &prices, 2024).unwrap();
        assert_eq!(report.total.total_native, dec!(1.5));
        assert_eq!(report.total.total_usd, dec!(225.00));
        assert_eq!(report.rewards.len(), 1);
    }

    #[test]
    fn year_boundaries_are_utc_calendar_days() {
        let prices = daily_prices(ymd(2024, 12, 31), &[dec!(100), dec!(200)]);
        let events = vec![
            reward(2024, 12, 31, 23, 59, 59, dec!(1)),
            reward(2025, 1, 1, 0, 0, 0, dec!(2)),
        ];

        let report = calculate_staking_income(events, &prices, 2024).unwrap();
        assert_eq!(report.total.total_native, dec!(1));
        // 23:59:59 is closer to the Jan 1 sample
        assert_eq!(report.total.total_usd, dec!(200));
    }

    #[test]
    fn totals_independent_of_input_order() {
        let prices = daily_prices(ymd(2024, 3, 1), &[dec!(100), dec!(110), dec!(120)]);
        let events = vec![
            reward(2024, 3, 1, 1, 0, 0, dec!(0.25)),
            reward(2023, 12, 31, 12, 0, 0, dec!(9)),
            reward(2024, 3, 2, 3, 0, 0, dec!(0.5)),
            reward(2024, 3, 3, 4, 0, 0, dec!(0.125)),
        ];
        let mut reversed = events.clone();
        reversed.reverse();

        let forward = calculate_staking_income(events, &prices, 2024).unwrap();
        let backward = calculate_staking_income(reversed, &prices, 2024).unwrap();
        assert_eq!(forward.total, backward.total);
        assert_eq!(forward.total.total_native, dec!(0.875));
        assert_eq!(forward.total.total_usd, dec!(95));
    }

    #[test]
    fn missing_price_fails_calculation() {
        let prices = daily_prices(ymd(2024, 6, 1), &[dec!(150)]);
        let events = vec![
            reward(2024, 6, 1, 0, 0, 0, dec!(1)),
            reward(2024, 7, 1, 0, 0, 0, dec!(1)),
        ];

        let err = calculate_staking_income(events, &prices, 2024).unwrap_err();
        assert!(matches!(err, IncomeError::PriceUnavailable { .. }), "{err:?}");
    }

    #[test]
    fn empty_price_series_fails_calculation() {
        let events = vec![reward(2024, 6, 1, 0, 0, 0, dec!(1))];
        let err = calculate_staking_income(events, &PriceSeries::default(), 2024).unwrap_err();
        assert!(matches!(err, IncomeError::PriceUnavailable { .. }));
    }

    #[test]
    fn rewards_outside_year_need_no_price() {
        let events = vec![reward(2023, 6, 1, 0, 0, 0, dec!(1))];
        let report = calculate_staking_income(events, &PriceSeries::default(), 2024).unwrap();
        assert_eq!(report.total.total_native, Decimal::ZERO);
        assert_eq!(report.total.total_usd, Decimal::ZERO);
        assert!(report.rewards.is_empty());
    }
}
