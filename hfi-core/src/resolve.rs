//! Coordinate → geohash → forecast pipeline.
//!
//! Each call to [`Resolver::resolve`] starts a new attempt and bumps the
//! attempt counter. Results are only written back while their attempt is
//! still the current one, so the last submitted location always wins.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::Arc,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::Failure,
    model::{Coordinate, ForecastSet, ForecastSummary, Geohash, RequestState},
    service::{NearbyQuery, WeatherBackend},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Summary,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    ResolvingGeohash,
    ResolvingForecast,
    Done,
    Failed,
}

impl Stage {
    /// Progress copy shown while a stage is active.
    pub fn loading_message(&self) -> Option<&'static str> {
        match self {
            Stage::ResolvingGeohash => Some("Fetching weather data..."),
            Stage::ResolvingForecast => Some("Fetching Hair Forecast Index data..."),
            _ => None,
        }
    }
}

/// Snapshot of the most recent resolution attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub attempt: u64,
    pub view: View,
    pub coordinate: Option<Coordinate>,
    pub geohash: RequestState<Geohash>,
    pub summary: RequestState<ForecastSummary>,
    pub detail: RequestState<ForecastSet>,
}

impl Resolution {
    fn idle() -> Self {
        Self {
            attempt: 0,
            view: View::Summary,
            coordinate: None,
            geohash: RequestState::Idle,
            summary: RequestState::Idle,
            detail: RequestState::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        match &self.geohash {
            RequestState::Idle => return Stage::Idle,
            RequestState::Pending => return Stage::ResolvingGeohash,
            RequestState::Failed(_) => return Stage::Failed,
            RequestState::Done(_) => {}
        }

        let forecast_stage = |pending: bool, done: bool, failed: bool| {
            if failed {
                Stage::Failed
            } else if done {
                Stage::Done
            } else if pending {
                Stage::ResolvingForecast
            } else {
                Stage::Idle
            }
        };

        match self.view {
            View::Summary => forecast_stage(
                self.summary.is_pending(),
                self.summary.value().is_some(),
                self.summary.failure().is_some(),
            ),
            View::Detail => forecast_stage(
                self.detail.is_pending(),
                self.detail.value().is_some(),
                self.detail.failure().is_some(),
            ),
        }
    }

    /// The failure that ended this attempt, if any.
    pub fn failure(&self) -> Option<&Failure> {
        self.geohash.failure().or(match self.view {
            View::Summary => self.summary.failure(),
            View::Detail => self.detail.failure(),
        })
    }
}

#[derive(Debug)]
pub struct Resolver {
    backend: Arc<dyn WeatherBackend>,
    state: watch::Sender<Resolution>,
    detail_cache: Mutex<HashMap<Geohash, ForecastSet>>,
}

impl Resolver {
    pub fn new(backend: Arc<dyn WeatherBackend>) -> Self {
        let (state, _) = watch::channel(Resolution::idle());
        Self {
            backend,
            state,
            detail_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn snapshot(&self) -> Resolution {
        self.state.borrow().clone()
    }

    /// Receives every state transition, e.g. to render progress.
    pub fn subscribe(&self) -> watch::Receiver<Resolution> {
        self.state.subscribe()
    }

    /// Chooses what the forecast stage fetches for subsequent attempts.
    pub fn set_view(&self, view: View) {
        self.state.send_if_modified(|r| {
            let changed = r.view != view;
            r.view = view;
            changed
        });
    }

    /// Runs the whole pipeline for `coordinate`, superseding any earlier attempt.
    ///
    /// Returns the snapshot as of this attempt's completion; if a newer
    /// attempt has started meanwhile, that newer state is returned instead.
    pub async fn resolve(&self, coordinate: Coordinate) -> Resolution {
        // Numbered and published under one lock so attempts land in order.
        let mut attempt = 0;
        self.state.send_modify(|r| {
            attempt = r.attempt + 1;
            *r = Resolution {
                attempt,
                view: r.view,
                coordinate: Some(coordinate),
                geohash: RequestState::Pending,
                summary: RequestState::Idle,
                detail: RequestState::Idle,
            };
        });
        debug!(attempt, %coordinate, "resolving geohash");

        let Some(geohash) = self.resolve_geohash(attempt, coordinate).await else {
            return self.snapshot();
        };

        // The view may have changed while the geohash was in flight.
        let view = self.state.borrow().view;
        match view {
            View::Summary => self.fetch_summary(attempt, &geohash).await,
            View::Detail => self.fetch_detail(attempt, &geohash).await,
        }

        self.snapshot()
    }

    /// Switches to the detail view, fetching intervals on first use.
    ///
    /// Intervals are cached per geohash for the lifetime of the resolver.
    /// While the geohash is still pending this only records the view, and the
    /// running attempt fetches detail once the geohash arrives.
    pub async fn show_detail(&self) -> RequestState<ForecastSet> {
        self.set_view(View::Detail);

        let (attempt, geohash, detail) = {
            let r = self.state.borrow();
            (r.attempt, r.geohash.value().cloned(), r.detail.clone())
        };

        let Some(geohash) = geohash else {
            return detail;
        };
        if detail.value().is_some() || detail.is_pending() {
            return detail;
        }

        self.fetch_detail(attempt, &geohash).await;
        self.snapshot().detail
    }

    pub fn show_summary(&self) {
        self.set_view(View::Summary);
    }

    async fn resolve_geohash(&self, attempt: u64, coordinate: Coordinate) -> Option<Geohash> {
        let outcome = match self.backend.nearby(&NearbyQuery::Coordinates(coordinate)).await {
            Ok(results) => match results.first() {
                Some(first) => first.geohash().ok_or_else(|| {
                    warn!(attempt, "first nearby result has no geohash");
                    Failure::lookup_empty()
                }),
                None => {
                    warn!(attempt, %coordinate, "no geohash found near coordinate");
                    Err(Failure::lookup_empty())
                }
            },
            Err(err) => {
                warn!(attempt, error = %err, "nearby lookup failed");
                Err(Failure::lookup_failed(&err))
            }
        };

        let geohash = outcome.as_ref().ok().cloned();
        let applied = self.apply(attempt, |r| {
            r.geohash = match outcome {
                Ok(g) => RequestState::Done(g),
                Err(f) => RequestState::Failed(f),
            };
        });

        if applied { geohash } else { None }
    }

    async fn fetch_summary(&self, attempt: u64, geohash: &Geohash) {
        if !self.apply(attempt, |r| r.summary = RequestState::Pending) {
            return;
        }
        debug!(attempt, %geohash, "fetching forecast summary");

        let state = match self.backend.forecast_summary(geohash).await {
            Ok(summary) => {
                info!(attempt, %geohash, hfi = summary.average_hfi, "forecast summary loaded");
                RequestState::Done(summary)
            }
            Err(err) => {
                warn!(attempt, %geohash, error = %err, "forecast summary failed");
                RequestState::Failed(Failure::forecast_failed(&err))
            }
        };

        self.apply(attempt, |r| r.summary = state);
    }

    async fn fetch_detail(&self, attempt: u64, geohash: &Geohash) {
        if let Some(cached) = self.detail_cache.lock().get(geohash).cloned() {
            debug!(attempt, %geohash, "using cached forecast detail");
            self.apply(attempt, |r| r.detail = RequestState::Done(cached));
            return;
        }

        let mut claimed = false;
        self.apply(attempt, |r| {
            if !r.detail.is_pending() && r.detail.value().is_none() {
                r.detail = RequestState::Pending;
                claimed = true;
            }
        });
        if !claimed {
            return;
        }
        debug!(attempt, %geohash, "fetching forecast detail");

        let state = match self.backend.forecast_detail(geohash).await {
            Ok(intervals) => {
                let set = ForecastSet { geohash: geohash.clone(), fetched_at: Utc::now(), intervals };
                self.detail_cache.lock().insert(geohash.clone(), set.clone());
                info!(attempt, %geohash, intervals = set.intervals.len(), "forecast detail loaded");
                RequestState::Done(set)
            }
            Err(err) => {
                warn!(attempt, %geohash, error = %err, "forecast detail failed");
                RequestState::Failed(Failure::forecast_failed(&err))
            }
        };

        self.apply(attempt, |r| r.detail = state);
    }

    /// Mutates the state only if `attempt` is still current.
    fn apply(&self, attempt: u64, f: impl FnOnce(&mut Resolution)) -> bool {
        self.state.send_if_modified(|r| {
            if r.attempt != attempt {
                debug!(attempt, current = r.attempt, "discarding result of superseded attempt");
                return false;
            }
            f(r);
            true
        })
    }
}
