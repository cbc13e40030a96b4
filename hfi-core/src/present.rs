//! Unit conversion, HFI tiers, and text rendering of forecasts. No I/O.

use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use std::{cmp::Ordering, fmt::Write as _};

use crate::model::{ForecastInterval, ForecastSet, ForecastSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Imperial,
    Metric,
}

impl Units {
    pub fn from_metric_flag(metric: bool) -> Self {
        if metric { Units::Metric } else { Units::Imperial }
    }
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    ((f - 32.0) * 5.0 / 9.0).round()
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn mph_to_kph(mph: f64) -> f64 {
    (mph * 1.60934).round()
}

/// Formats a temperature, preferring the server's own Celsius value when metric.
pub fn format_temperature(fahrenheit: f64, native_celsius: Option<f64>, units: Units) -> String {
    match units {
        Units::Imperial => format!("{}°F", fmt_number(fahrenheit)),
        Units::Metric => {
            let c = native_celsius.map(f64::round).unwrap_or_else(|| fahrenheit_to_celsius(fahrenheit));
            format!("{}°C", fmt_number(c))
        }
    }
}

pub fn format_wind(mph: f64, native_kph: Option<f64>, units: Units) -> String {
    match units {
        Units::Imperial => format!("{} mph", fmt_number(mph)),
        Units::Metric => {
            let kph = native_kph.map(f64::round).unwrap_or_else(|| mph_to_kph(mph));
            format!("{} km/h", fmt_number(kph))
        }
    }
}

/// At most one decimal, and none for whole numbers.
fn fmt_number(v: f64) -> String {
    let rounded = (v * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.1}")
    }
}

/// Three-way classification of a Hair Forecast Index score.
///
/// Lower bounds are inclusive: 8 is good, 5 is moderate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HfiTier {
    Good,
    Moderate,
    Poor,
}

impl HfiTier {
    pub const GOOD_MIN: f64 = 8.0;
    pub const MODERATE_MIN: f64 = 5.0;

    /// NaN is treated as poor.
    pub fn from_score(hfi: f64) -> Self {
        if hfi >= Self::GOOD_MIN {
            HfiTier::Good
        } else if hfi >= Self::MODERATE_MIN {
            HfiTier::Moderate
        } else {
            HfiTier::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HfiTier::Good => "good",
            HfiTier::Moderate => "moderate",
            HfiTier::Poor => "poor",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HfiTier::Good => "Great Hair Day",
            HfiTier::Moderate => "Moderate Hair Day",
            HfiTier::Poor => "Bad Hair Day",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            HfiTier::Good => {
                "Perfect conditions for your hair! Low humidity and gentle winds mean your style should stay in place all day."
            }
            HfiTier::Moderate => "Some frizz possible. Consider using anti-frizz products today.",
            HfiTier::Poor => {
                "High frizz alert! Consider wearing your hair up or using strong hold products today."
            }
        }
    }

    /// Foreground color token.
    pub fn accent_color(&self) -> &'static str {
        match self {
            HfiTier::Good => "#1890ff",
            HfiTier::Moderate => "#faad14",
            HfiTier::Poor => "#f5222d",
        }
    }

    pub fn background_color(&self) -> &'static str {
        match self {
            HfiTier::Good => "#e6f7ff",
            HfiTier::Moderate => "#fff7e6",
            HfiTier::Poor => "#ffe6e6",
        }
    }
}

/// "Now", "+6 hours", "+2 days", "+1d 6h".
pub fn format_offset(hours: u32) -> String {
    match hours {
        0 => "Now".to_string(),
        1 => "+1 hour".to_string(),
        2..=24 => format!("+{hours} hours"),
        _ => {
            let (days, rem) = (hours / 24, hours % 24);
            match (days, rem) {
                (1, 0) => "+1 day".to_string(),
                (d, 0) => format!("+{d} days"),
                (d, h) => format!("+{d}d {h}h"),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Offset,
    Temperature,
    Dewpoint,
    Wind,
    Hfi,
}

impl SortKey {
    fn value(&self, interval: &ForecastInterval) -> f64 {
        match self {
            SortKey::Offset => f64::from(interval.offset_hours),
            SortKey::Temperature => interval.temperature_f,
            SortKey::Dewpoint => interval.dewpoint_f,
            SortKey::Wind => interval.wind_mph,
            SortKey::Hfi => interval.hfi,
        }
    }
}

/// The intervals that get displayed: ascending by offset, first `max` only.
pub fn display_intervals(intervals: &[ForecastInterval], max: usize) -> Vec<&ForecastInterval> {
    let mut rows: Vec<_> = intervals.iter().collect();
    rows.sort_by_key(|i| i.offset_hours);
    rows.truncate(max);
    rows
}

/// Reorders displayed rows by a column. Ties keep ascending offset order.
pub fn sort_rows(rows: &mut [&ForecastInterval], key: SortKey, descending: bool) {
    rows.sort_by(|a, b| {
        let ord = key.value(a).total_cmp(&key.value(b));
        let ord = if descending { ord.reverse() } else { ord };
        ord.then_with(|| a.offset_hours.cmp(&b.offset_hours))
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableOptions {
    pub units: Units,
    pub sort: SortKey,
    pub descending: bool,
    pub max_rows: usize,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self { units: Units::Imperial, sort: SortKey::Offset, descending: false, max_rows: 8 }
    }
}

fn valid_at(fetched_at: DateTime<Utc>, offset_hours: u32) -> String {
    let at = fetched_at + ChronoDuration::hours(i64::from(offset_hours));
    at.with_timezone(&Local).format("%a %H:%M").to_string()
}

/// Renders the detailed forecast as a plain-text table.
pub fn render_table(set: &ForecastSet, opts: &TableOptions) -> String {
    let mut rows = display_intervals(&set.intervals, opts.max_rows);
    sort_rows(&mut rows, opts.sort, opts.descending);

    let header = ["When", "Valid", "Temp", "Dewpoint", "Wind", "HFI", "Tier"];
    let body: Vec<[String; 7]> = rows
        .iter()
        .map(|i| {
            [
                format_offset(i.offset_hours),
                valid_at(set.fetched_at, i.offset_hours),
                format_temperature(i.temperature_f, i.temperature_c, opts.units),
                format_temperature(i.dewpoint_f, i.dewpoint_c, opts.units),
                format_wind(i.wind_mph, i.wind_kph, opts.units),
                fmt_number(i.hfi),
                HfiTier::from_score(i.hfi).as_str().to_string(),
            ]
        })
        .collect();

    let mut widths = header.map(|h| h.chars().count());
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, header.iter().copied(), &widths);
    for row in &body {
        push_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells.zip(widths).map(|(c, w)| format!("{c:<w$}", w = *w)).collect();
    let _ = writeln!(out, "{}", line.join("  ").trim_end());
}

/// Renders the HFI score block: number, label, advice.
pub fn render_hfi(hfi: f64) -> String {
    let tier = HfiTier::from_score(hfi);
    format!("Hair Forecast Index: {} ({})\n{}\n", fmt_number(hfi), tier.label(), tier.advice())
}

/// Renders the compact default view.
pub fn render_summary(summary: &ForecastSummary, units: Units) -> String {
    let mut out = render_hfi(summary.average_hfi);
    let _ = writeln!(
        out,
        "High: {}   Avg wind: {}   ({} intervals analyzed)",
        format_temperature(summary.high_temperature_f, None, units),
        format_wind(summary.average_wind_mph, None, units),
        summary.intervals_analyzed,
    );
    out
}

/// Highest-HFI interval; the earliest one wins a tie.
pub fn best_interval(intervals: &[ForecastInterval]) -> Option<&ForecastInterval> {
    intervals.iter().max_by(|a, b| {
        a.hfi.total_cmp(&b.hfi).then_with(|| b.offset_hours.cmp(&a.offset_hours))
    })
}

impl PartialOrd for HfiTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HfiTier {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank = |t: &HfiTier| match t {
            HfiTier::Poor => 0,
            HfiTier::Moderate => 1,
            HfiTier::Good => 2,
        };
        rank(self).cmp(&rank(other))
    }
}
