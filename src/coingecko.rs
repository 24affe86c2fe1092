//! Daily USD prices from the CoinGecko public API

use crate::core::{Clock, DateRange, IncomeError, PricePoint, PriceSeries, Protocol};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

/// How far back the public API serves historical prices
const RETENTION_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
struct MarketChart {
    /// `[unix_millis, price]` pairs
    prices: Vec<(i64, Decimal)>,
}

pub struct CoinGeckoClient {
    agent: ureq::Agent,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("stakc/", env!("CARGO_PKG_VERSION")))
            .build();
        CoinGeckoClient {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Download one USD price per day in `range` for the given protocol's coin
    pub fn fetch_daily_prices(
        &self,
        protocol: Protocol,
        range: DateRange,
    ) -> Result<PriceSeries, IncomeError> {
        let from = range.start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // end of the last day in range
        let to = (range.end + Duration::days(1))
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp()
            - 1;
        let url = format!(
            "{}/coins/{}/market_chart/range",
            self.base_url,
            protocol.coingecko_id()
        );
        log::debug!("GET {} from={} to={}", url, from, to);

        let response = self
            .agent
            .get(&url)
            .query("vs_currency", "usd")
            .query("from", &from.to_string())
            .query("to", &to.to_string())
            .call()
            .map_err(|e| IncomeError::Fetch(e.to_string()))?;
        log::info!("Received response for historical prices: {}", response.status());

        let chart: MarketChart = response
            .into_json()
            .map_err(|e| IncomeError::Fetch(format!("invalid price response: {e}")))?;
        let series = daily_series(chart, range);
        log::info!("{} {} prices fetched", series.points().len(), protocol);
        Ok(series)
    }
}

/// Collapse raw samples to the first sample of each UTC day inside `range`
fn daily_series(chart: MarketChart, range: DateRange) -> PriceSeries {
    let mut samples = chart.prices;
    samples.sort_by_key(|(millis, _)| *millis);

    let mut by_date = BTreeMap::new();
    for (millis, usd_price) in samples {
        let Some(at) = DateTime::from_timestamp_millis(millis) else {
            log::warn!("Skipping price sample with invalid timestamp {}", millis);
            continue;
        };
        let date = at.date_naive();
        if date < range.start || date > range.end {
            continue;
        }
        by_date.entry(date).or_insert(usd_price);
    }

    PriceSeries::new(
        by_date
            .into_iter()
            .map(|(date, usd_price)| PricePoint { date, usd_price })
            .collect(),
    )
}

/// Days of `year` the price API can serve, given its retention window.
///
/// The range is cut short at today. A year the window does not fully cover is
/// rejected with [`IncomeError::DataUnavailable`] rather than silently shortened.
pub fn available_range(year: i32, clock: &impl Clock) -> Result<DateRange, IncomeError> {
    let unsupported = |reason: String| IncomeError::UnsupportedYear { year, reason };
    let (start, end) = NaiveDate::from_ymd_opt(year, 1, 1)
        .zip(NaiveDate::from_ymd_opt(year, 12, 31))
        .ok_or_else(|| unsupported("not a valid calendar year".to_string()))?;

    let today = clock.today();
    let earliest = earliest_whole_day(clock.now() - Duration::days(RETENTION_DAYS));

    if start > today {
        return Err(unsupported("it has not started yet".to_string()));
    }
    if start < earliest {
        return Err(IncomeError::DataUnavailable {
            requested: start,
            earliest,
        });
    }

    Ok(DateRange {
        start,
        end: end.min(today),
    })
}

/// First day whose 00:00 UTC sample is at or after `cutoff`
fn earliest_whole_day(cutoff: DateTime<Utc>) -> NaiveDate {
    let day = cutoff.date_naive();
    if cutoff.time() == NaiveTime::MIN {
        day
    } else {
        day + Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn clock(y: i32, m: u32, d: u32) -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap())
    }

    #[test]
    fn market_chart_collapsed_to_daily_samples() {
        let json = r#"{
            "prices": [
                [1717286400000, 165.25],
                [1717200000000, 150.5],
                [1717203600000, 151.0],
                [1717372800000, 170.0]
            ],
            "market_caps": [],
            "total_volumes": []
        }"#;
        let chart: MarketChart = serde_json::from_str(json).unwrap();
        let range = DateRange {
            start: ymd(2024, 6, 1),
            end: ymd(2024, 6, 2),
        };

        let series = daily_series(chart, range);
        assert_eq!(
            series.points(),
            &[
                PricePoint {
                    date: ymd(2024, 6, 1),
                    usd_price: dec!(150.5)
                },
                PricePoint {
                    date: ymd(2024, 6, 2),
                    usd_price: dec!(165.25)
                },
            ]
        );
    }

    #[test]
    fn current_year_range_ends_today() {
        let range = available_range(2024, &clock(2024, 8, 15)).unwrap();
        assert_eq!(range.start, ymd(2024, 1, 1));
        assert_eq!(range.end, ymd(2024, 8, 15));
    }

    #[test]
    fn year_within_retention_covers_whole_year() {
        let range = available_range(2023, &clock(2023, 12, 31)).unwrap();
        assert_eq!(range.start, ymd(2023, 1, 1));
        assert_eq!(range.end, ymd(2023, 12, 31));
    }

    #[test]
    fn range_older_than_retention_is_data_unavailable() {
        let err = available_range(2024, &clock(2025, 3, 1)).unwrap_err();
        match err {
            IncomeError::DataUnavailable { requested, earliest } => {
                assert_eq!(requested, ymd(2024, 1, 1));
                // 2024-03-01 09:30 is the cutoff, so its midnight sample is gone
                assert_eq!(earliest, ymd(2024, 3, 2));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn year_entirely_outside_retention_is_data_unavailable() {
        let err = available_range(2022, &clock(2025, 3, 1)).unwrap_err();
        match err {
            IncomeError::DataUnavailable { requested, earliest } => {
                assert_eq!(requested, ymd(2022, 1, 1));
                assert_eq!(earliest, ymd(2024, 3, 2));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn first_day_must_be_whole_inside_window() {
        let midnight = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(available_range(2023, &midnight).unwrap().start, ymd(2023, 1, 1));

        // later that day the 2023-01-01 00:00 sample has left the window
        let err = available_range(2023, &clock(2024, 1, 1)).unwrap_err();
        assert!(
            matches!(err, IncomeError::DataUnavailable { earliest, .. } if earliest == ymd(2023, 1, 2)),
            "{err:?}"
        );
    }

    #[test]
    fn future_year_is_unsupported() {
        let err = available_range(2026, &clock(2025, 3, 1)).unwrap_err();
        assert!(matches!(err, IncomeError::UnsupportedYear { year: 2026, .. }));
    }
}
