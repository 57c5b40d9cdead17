//! Refill-aware consumption aggregation.
//!
//! Consumption is the sum of every decrease between consecutive readings of
//! the same cylinder. Increases are refills and contribute nothing, so a
//! cylinder that drains, is refilled and drains again counts both draining
//! intervals.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, TimeZone};
use serde::Serialize;

use crate::measurement::FuelMeasurement;
use crate::types::CylinderId;

/// Minimum increase in kilograms counted as a refill in summaries.
pub const REFILL_THRESHOLD_KG: f64 = 1.0;

/// Fuel consumed on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyConsumption {
    pub day: NaiveDate,
    pub kilograms: f64,
}

/// Aggregated consumption over a set of measurements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionSummary {
    pub total_kg: f64,
    pub days_with_data: usize,
    pub average_daily_kg: f64,
    pub refills: usize,
    pub series: Vec<DailyConsumption>,
}

/// Groups measurements by cylinder, each group sorted by time.
fn by_cylinder<'a, I>(measurements: I) -> HashMap<CylinderId, Vec<&'a FuelMeasurement>>
where
    I: IntoIterator<Item = &'a FuelMeasurement>,
{
    let mut groups: HashMap<CylinderId, Vec<&FuelMeasurement>> = HashMap::new();
    for measurement in measurements {
        groups
            .entry(measurement.cylinder_id)
            .or_default()
            .push(measurement);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    }
    groups
}

/// Sums positive decreases across consecutive readings of one cylinder.
fn drained(sorted: &[&FuelMeasurement]) -> f64 {
    sorted
        .windows(2)
        .map(|pair| pair[0].fuel_kilograms - pair[1].fuel_kilograms)
        .filter(|delta| *delta > 0.0)
        .fold(0.0, |total, delta| total + delta)
}

/// Total fuel consumed across all cylinders, ignoring refills.
pub fn total_consumed(measurements: &[FuelMeasurement]) -> f64 {
    by_cylinder(measurements)
        .values()
        .map(|group| drained(group))
        .fold(0.0, |total, kg| total + kg)
}

/// Fuel consumed per cylinder, ignoring refills.
pub fn per_cylinder(measurements: &[FuelMeasurement]) -> BTreeMap<CylinderId, f64> {
    by_cylinder(measurements)
        .into_iter()
        .map(|(id, group)| (id, drained(&group)))
        .collect()
}

/// Per-day consumption in the given timezone, ordered by day.
///
/// Only pairs of readings that fall on the same calendar day contribute to
/// that day. Every value is non-negative.
pub fn chart_series<Tz: TimeZone>(measurements: &[FuelMeasurement], tz: &Tz) -> Vec<DailyConsumption> {
    let mut days: BTreeMap<NaiveDate, Vec<&FuelMeasurement>> = BTreeMap::new();
    for measurement in measurements {
        let day = measurement.timestamp.with_timezone(tz).date_naive();
        days.entry(day).or_default().push(measurement);
    }

    days.into_iter()
        .map(|(day, readings)| {
            let kilograms = by_cylinder(readings)
                .values()
                .map(|group| drained(group))
                .fold(0.0, |total, kg| total + kg);
            DailyConsumption { day, kilograms }
        })
        .collect()
}

/// Counts increases of at least [`REFILL_THRESHOLD_KG`].
fn count_refills(measurements: &[FuelMeasurement]) -> usize {
    by_cylinder(measurements)
        .values()
        .map(|group| {
            group
                .windows(2)
                .filter(|pair| pair[1].fuel_kilograms - pair[0].fuel_kilograms >= REFILL_THRESHOLD_KG)
                .count()
        })
        .sum()
}

/// Builds the totals, daily average and chart series shown in summaries.
///
/// The average spreads the total over the days that have readings, so drains
/// spanning midnight still count toward it.
#[allow(clippy::cast_precision_loss)]
pub fn summarize<Tz: TimeZone>(measurements: &[FuelMeasurement], tz: &Tz) -> ConsumptionSummary {
    let series = chart_series(measurements, tz);
    let total_kg = total_consumed(measurements);
    let days_with_data = series.len();
    let average_daily_kg = if days_with_data == 0 {
        0.0
    } else {
        total_kg / days_with_data as f64
    };
    ConsumptionSummary {
        total_kg,
        days_with_data,
        average_daily_kg,
        refills: count_refills(measurements),
        series,
    }
}

/// Days until the remaining fuel runs out at the given daily rate.
pub fn estimated_days_remaining(current_fuel_kg: f64, average_daily_kg: f64) -> Option<f64> {
    if !average_daily_kg.is_finite() || average_daily_kg <= 0.0 || !current_fuel_kg.is_finite() {
        return None;
    }
    Some(current_fuel_kg.max(0.0) / average_daily_kg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MeasurementId;
    use chrono::{DateTime, Duration, FixedOffset, Utc};

    fn reading(id: i64, cylinder: i64, at: &str, kilograms: f64) -> FuelMeasurement {
        FuelMeasurement {
            id: MeasurementId::new(id),
            cylinder_id: CylinderId::new(cylinder),
            cylinder_name: format!("cylinder-{cylinder}"),
            timestamp: DateTime::parse_from_rfc3339(at)
                .unwrap()
                .with_timezone(&Utc),
            fuel_kilograms: kilograms,
            fuel_percentage: kilograms / 20.0 * 100.0,
            total_weight_kg: kilograms + 5.0,
            is_calibrated: true,
            is_historical: false,
        }
    }

    fn hourly(cylinder: i64, kilograms: &[f64]) -> Vec<FuelMeasurement> {
        let start = DateTime::parse_from_rfc3339("2025-03-01T06:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        kilograms
            .iter()
            .enumerate()
            .map(|(idx, &kg)| {
                let idx = i64::try_from(idx).unwrap();
                let mut m = reading(idx + 1, cylinder, "2025-03-01T00:00:00Z", kg);
                m.timestamp = start + Duration::hours(idx);
                m
            })
            .collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_and_single_readings_consume_nothing() {
        assert_close(total_consumed(&[]), 0.0);
        assert_close(total_consumed(&hourly(1, &[10.0])), 0.0);
    }

    #[test]
    fn empty_and_single_readings_are_positive_zero() {
        assert!(!total_consumed(&[]).is_sign_negative());
        assert!(!total_consumed(&hourly(1, &[10.0])).is_sign_negative());
        assert_eq!(format!("{:.2}", total_consumed(&[])), "0.00");

        let single_day = vec![reading(1, 1, "2025-03-01T08:00:00Z", 10.0)];
        let series = chart_series(&single_day, &Utc);
        assert_eq!(series.len(), 1);
        assert!(!series[0].kilograms.is_sign_negative());

        let summary = summarize(&single_day, &Utc);
        assert!(!summary.total_kg.is_sign_negative());
        assert!(!summary.average_daily_kg.is_sign_negative());
    }

    #[test]
    fn simple_decrease_is_consumption() {
        assert_close(total_consumed(&hourly(1, &[10.0, 8.0])), 2.0);
    }

    #[test]
    fn refill_is_never_negative() {
        assert_close(total_consumed(&hourly(1, &[5.0, 15.0])), 0.0);
    }

    #[test]
    fn drain_refill_drain_counts_both_drains() {
        let readings = hourly(1, &[15.0, 12.0, 9.0, 6.0, 3.0, 15.0, 13.0, 11.0]);
        assert_close(total_consumed(&readings), 16.0);
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut readings = hourly(1, &[15.0, 12.0, 9.0, 6.0, 3.0, 15.0, 13.0, 11.0]);
        readings.reverse();
        assert_close(total_consumed(&readings), 16.0);
    }

    #[test]
    fn cylinders_are_aggregated_independently() {
        let readings = vec![
            reading(1, 1, "2025-03-01T08:00:00Z", 10.0),
            reading(2, 2, "2025-03-01T08:30:00Z", 15.0),
            reading(3, 1, "2025-03-01T09:00:00Z", 8.0),
            reading(4, 2, "2025-03-01T09:30:00Z", 12.0),
        ];
        assert_close(total_consumed(&readings), 5.0);

        let per = per_cylinder(&readings);
        assert_close(per[&CylinderId::new(1)], 2.0);
        assert_close(per[&CylinderId::new(2)], 3.0);
    }

    #[test]
    fn chart_series_buckets_by_day() {
        let readings = vec![
            reading(1, 1, "2025-03-01T08:00:00Z", 10.0),
            reading(2, 1, "2025-03-01T20:00:00Z", 9.0),
            reading(3, 1, "2025-03-02T08:00:00Z", 8.5),
            reading(4, 1, "2025-03-02T12:00:00Z", 20.0),
            reading(5, 1, "2025-03-02T20:00:00Z", 19.0),
        ];
        let series = chart_series(&readings, &Utc);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].day, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_close(series[0].kilograms, 1.0);
        assert_eq!(series[1].day, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        // The overnight drop from 9.0 to 8.5 spans two days and is not counted.
        assert_close(series[1].kilograms, 1.0);
    }

    #[test]
    fn chart_series_respects_timezone() {
        let readings = vec![
            reading(1, 1, "2025-03-01T22:00:00Z", 10.0),
            reading(2, 1, "2025-03-01T23:30:00Z", 9.0),
        ];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let series = chart_series(&readings, &plus_two);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].day, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_close(series[0].kilograms, 1.0);
    }

    #[test]
    fn chart_series_is_never_negative() {
        let readings = vec![
            reading(1, 1, "2025-03-01T08:00:00Z", 2.0),
            reading(2, 1, "2025-03-01T09:00:00Z", 18.0),
            reading(3, 2, "2025-03-01T10:00:00Z", 4.0),
            reading(4, 2, "2025-03-01T11:00:00Z", 11.0),
            reading(5, 1, "2025-03-02T08:00:00Z", 3.0),
            reading(6, 1, "2025-03-02T09:00:00Z", 19.0),
        ];
        let series = chart_series(&readings, &Utc);
        assert!(series.iter().all(|day| day.kilograms >= 0.0));
        assert!(series.iter().all(|day| day.kilograms.abs() < f64::EPSILON));
    }

    #[test]
    fn summary_reports_average_and_refills() {
        let readings = vec![
            reading(1, 1, "2025-03-01T08:00:00Z", 10.0),
            reading(2, 1, "2025-03-01T20:00:00Z", 8.0),
            reading(3, 1, "2025-03-02T08:00:00Z", 18.0),
            reading(4, 1, "2025-03-02T20:00:00Z", 14.0),
        ];
        let summary = summarize(&readings, &Utc);
        assert_close(summary.total_kg, 6.0);
        assert_eq!(summary.days_with_data, 2);
        assert_close(summary.average_daily_kg, 3.0);
        assert_eq!(summary.refills, 1);
        assert_eq!(summary.series.len(), 2);
    }

    #[test]
    fn summary_average_counts_overnight_drains() {
        let readings = vec![
            reading(1, 1, "2025-03-01T08:00:00Z", 10.0),
            reading(2, 1, "2025-03-02T08:00:00Z", 9.0),
            reading(3, 1, "2025-03-03T08:00:00Z", 8.0),
            reading(4, 1, "2025-03-04T08:00:00Z", 7.0),
        ];
        let summary = summarize(&readings, &Utc);
        assert_close(summary.total_kg, 3.0);
        assert_eq!(summary.days_with_data, 4);
        assert_close(summary.average_daily_kg, 0.75);
        assert!(summary.series.iter().all(|day| day.kilograms.abs() < f64::EPSILON));

        let remaining = estimated_days_remaining(7.0, summary.average_daily_kg).unwrap();
        assert!(remaining > 0.0);
    }

    #[test]
    fn summary_of_nothing_is_zero() {
        let summary = summarize(&[], &Utc);
        assert_close(summary.total_kg, 0.0);
        assert_eq!(summary.days_with_data, 0);
        assert_close(summary.average_daily_kg, 0.0);
        assert!(summary.series.is_empty());
    }

    #[test]
    fn days_remaining_needs_positive_rate() {
        assert_eq!(estimated_days_remaining(6.0, 0.0), None);
        assert_eq!(estimated_days_remaining(6.0, f64::NAN), None);
        assert_close(estimated_days_remaining(6.0, 1.5).unwrap(), 4.0);
    }
}
