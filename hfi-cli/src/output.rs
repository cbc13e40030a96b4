//! Runs the resolution pipeline for a coordinate and prints the result.

use anyhow::Result;
use chrono::Local;
use std::{fmt::Write as _, sync::Arc};
use tokio::sync::watch;

use hfi_core::{
    Config, Coordinate, HfiTier, Resolution, Resolver, SortKey, Stage, TableOptions, Units, View,
    present::{best_interval, format_offset, render_summary, render_table},
    service::WxApiClient,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    pub units: Units,
    pub detail: bool,
    pub sort: SortKey,
    pub descending: bool,
    pub max_rows: usize,
    pub json: bool,
}

impl OutputOptions {
    fn table(&self) -> TableOptions {
        TableOptions {
            units: self.units,
            sort: self.sort,
            descending: self.descending,
            max_rows: self.max_rows,
        }
    }
}

/// Resolves `coordinate` to a forecast and prints it.
///
/// Whatever was resolved is printed even when a later stage failed; the
/// failure is then returned so the process exits non-zero.
pub async fn resolve_and_render(config: &Config, coordinate: Coordinate, opts: &OutputOptions) -> Result<()> {
    let backend = WxApiClient::new(&config.endpoints.wxapi_base_url, config.timing.request_timeout())?;
    let resolver = Resolver::new(Arc::new(backend));
    if opts.detail {
        resolver.set_view(View::Detail);
    }

    let progress = (!opts.json).then(|| tokio::spawn(report_progress(resolver.subscribe())));
    let resolution = resolver.resolve(coordinate).await;
    if let Some(task) = progress {
        task.abort();
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        print!("{}", render(&resolution, opts));
    }

    match resolution.failure() {
        Some(failure) => Err(failure.clone().into()),
        None => Ok(()),
    }
}

async fn report_progress(mut rx: watch::Receiver<Resolution>) {
    let mut last: Option<Stage> = None;
    while rx.changed().await.is_ok() {
        let stage = rx.borrow_and_update().stage();
        if last == Some(stage) {
            continue;
        }
        last = Some(stage);
        if let Some(message) = stage.loading_message() {
            eprintln!("{message}");
        }
    }
}

/// Human-readable rendering of a finished resolution.
pub fn render(resolution: &Resolution, opts: &OutputOptions) -> String {
    let mut out = String::new();

    if let Some(coordinate) = resolution.coordinate {
        let _ = writeln!(out, "Location: {coordinate} ({})", coordinate.map_link());
    }
    if let Some(geohash) = resolution.geohash.value() {
        let _ = writeln!(out, "Forecast location: {geohash}");
    }

    match resolution.view {
        View::Summary => {
            if let Some(summary) = resolution.summary.value() {
                out.push('\n');
                out.push_str(&render_summary(summary, opts.units));
            }
        }
        View::Detail => {
            if let Some(set) = resolution.detail.value() {
                let fetched = set.fetched_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
                let _ = writeln!(out, "Fetched: {fetched}\n");
                out.push_str(&render_table(set, &opts.table()));

                if let Some(best) = best_interval(&set.intervals) {
                    let tier = HfiTier::from_score(best.hfi);
                    let _ = writeln!(
                        out,
                        "\nBest window: {} ({}). {}",
                        format_offset(best.offset_hours),
                        tier.label(),
                        tier.advice()
                    );
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hfi_core::{ForecastInterval, ForecastSet, ForecastSummary, Geohash, RequestState};

    fn opts() -> OutputOptions {
        OutputOptions {
            units: Units::Imperial,
            detail: false,
            sort: SortKey::Offset,
            descending: false,
            max_rows: 8,
            json: false,
        }
    }

    fn resolution(view: View) -> Resolution {
        Resolution {
            attempt: 1,
            view,
            coordinate: Some(Coordinate::new(40.0, -74.0)),
            geohash: RequestState::Done(Geohash::new("dr5r").unwrap()),
            summary: RequestState::Idle,
            detail: RequestState::Idle,
        }
    }

    fn interval(offset_hours: u32, hfi: f64) -> ForecastInterval {
        ForecastInterval {
            offset_hours,
            temperature_f: 70.0,
            dewpoint_f: 40.0,
            wind_mph: 5.0,
            hfi,
            temperature_c: None,
            dewpoint_c: None,
            wind_kph: None,
        }
    }

    #[test]
    fn summary_view() {
        let mut r = resolution(View::Summary);
        r.summary = RequestState::Done(ForecastSummary {
            average_hfi: 9.0,
            average_wind_mph: 4.0,
            high_temperature_f: 72.0,
            intervals_analyzed: 8,
        });

        let text = render(&r, &opts());
        assert!(text.starts_with(
            "Location: 40.0000, -74.0000 (https://www.google.com/maps?q=40,-74)\nForecast location: dr5r\n"
        ));
        assert!(text.contains("Great Hair Day"), "{text}");
        assert!(text.contains("72°F"));
    }

    #[test]
    fn detail_view_names_best_window() {
        let mut r = resolution(View::Detail);
        r.detail = RequestState::Done(ForecastSet {
            geohash: Geohash::new("dr5r").unwrap(),
            fetched_at: Utc::now(),
            intervals: vec![interval(0, 4.0), interval(6, 8.5), interval(12, 6.0)],
        });

        let text = render(&r, &OutputOptions { detail: true, ..opts() });
        assert!(text.contains("When"));
        assert!(text.contains("Best window: +6 hours (Great Hair Day)"), "{text}");
    }

    #[test]
    fn failed_forecast_still_shows_geohash() {
        let mut r = resolution(View::Summary);
        r.summary = RequestState::Failed(hfi_core::Failure::new(
            hfi_core::ErrorKind::ForecastFailed,
            "Failed to fetch forecast: boom",
        ));

        let text = render(&r, &opts());
        assert!(text.ends_with("Forecast location: dr5r\n"), "{text}");
        assert_eq!(r.stage(), Stage::Failed);
    }
}
