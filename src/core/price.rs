use super::IncomeError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Daily USD price sample, taken at 00:00 UTC of `date`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub usd_price: Decimal,
}

impl PricePoint {
    /// The instant the sample was taken
    pub fn sampled_at(&self) -> DateTime<Utc> {
        self.date.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Daily price samples ordered by date, at most one per day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series from samples in any order. When a date repeats, the first
    /// sample supplied for it is kept.
    pub fn new(points: Vec<PricePoint>) -> Self {
        let mut points = points;
        // stable, so the first sample of each date stays first
        points.sort_by_key(|p| p.date);
        let before = points.len();
        points.dedup_by_key(|p| p.date);
        if points.len() < before {
            log::warn!(
                "Dropped {} duplicate price samples",
                before - points.len()
            );
        }
        PriceSeries { points }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Price sample closest in time to `at`.
    ///
    /// Returns `None` when the series is empty or `at` falls on a day outside
    /// the series. When `at` is equidistant from two samples the earlier one
    /// is chosen.
    pub fn nearest(&self, at: DateTime<Utc>) -> Option<&PricePoint> {
        let (first, last) = (self.points.first()?, self.points.last()?);
        let date = at.date_naive();
        if date < first.date || date > last.date {
            return None;
        }

        // index of the first sample taken at or after `at`
        let idx = self.points.partition_point(|p| p.sampled_at() < at);
        let before = idx.checked_sub(1).map(|i| &self.points[i]);
        let after = self.points.get(idx);

        match (before, after) {
            (Some(before), Some(after)) => {
                if at - before.sampled_at() <= after.sampled_at() - at {
                    Some(before)
                } else {
                    Some(after)
                }
            }
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }

    /// Read a price file with `date,usd_price` columns
    pub fn read_csv<R: Read>(reader: R) -> Result<PriceSeries, IncomeError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let points = rdr
            .deserialize::<PricePoint>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(IncomeError::from_csv)?;
        log::info!("Read {} price records", points.len());
        Ok(PriceSeries::new(points))
    }

    /// Write the series in the format accepted by [`PriceSeries::read_csv`]
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for point in self.points() {
            wtr.serialize(point)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
