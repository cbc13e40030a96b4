//! Debounced country/city suggestions.
//!
//! Each keystroke cancels the pending fetch and schedules a new one after the
//! debounce window. Results are tagged with the input generation they were
//! issued for; anything older than the current generation is dropped.

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{sync::Notify, task::JoinHandle, time::Instant};
use tracing::{debug, warn};

use crate::{
    config::Config,
    model::{RequestState, Suggestion},
    service::GeoDirectory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Country,
    City,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutocompleteSettings {
    pub debounce: Duration,
    pub min_query_len: usize,
}

impl Default for AutocompleteSettings {
    fn default() -> Self {
        Self { debounce: Duration::from_millis(300), min_query_len: 2 }
    }
}

impl From<&Config> for AutocompleteSettings {
    fn from(cfg: &Config) -> Self {
        Self { debounce: cfg.timing.debounce(), min_query_len: cfg.timing.min_query_len }
    }
}

#[derive(Debug, Default)]
struct FieldState {
    text: String,
    /// Country id the city field is scoped to. Unused for countries.
    scope: Option<String>,
    generation: u64,
    suggestions: RequestState<Vec<Suggestion>>,
    open: bool,
    task: Option<JoinHandle<()>>,
}

impl FieldState {
    fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug)]
struct Inner {
    field: Field,
    directory: Arc<dyn GeoDirectory>,
    settings: AutocompleteSettings,
    state: Mutex<FieldState>,
    settled: Notify,
}

impl Inner {
    async fn fetch(&self, query: &str, scope: Option<&str>) -> Vec<Suggestion> {
        let result = match (self.field, scope) {
            (Field::Country, _) => self.directory.countries(query).await,
            (Field::City, Some(country_id)) => self.directory.cities(country_id, query).await,
            (Field::City, None) => Ok(Vec::new()),
        };

        result.unwrap_or_else(|err| {
            warn!(field = ?self.field, error = %err, "suggestion fetch failed; showing none");
            Vec::new()
        })
    }

    /// Applies a finished fetch unless newer input has superseded it.
    fn finish(&self, generation: u64, suggestions: Vec<Suggestion>) {
        let mut state = self.state.lock();
        if state.generation != generation {
            debug!(field = ?self.field, generation, current = state.generation, "discarding stale suggestions");
            return;
        }

        state.open = !suggestions.is_empty();
        state.suggestions = RequestState::Done(suggestions);
        state.task = None;
        drop(state);
        self.settled.notify_waiters();
    }
}

/// Suggestion state for one input field.
///
/// Dropping the controller cancels any pending fetch.
#[derive(Debug)]
pub struct AutocompleteController {
    inner: Arc<Inner>,
}

impl AutocompleteController {
    pub fn new(field: Field, directory: Arc<dyn GeoDirectory>, settings: AutocompleteSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                field,
                directory,
                settings,
                state: Mutex::new(FieldState::default()),
                settled: Notify::new(),
            }),
        }
    }

    pub fn countries(directory: Arc<dyn GeoDirectory>, settings: AutocompleteSettings) -> Self {
        Self::new(Field::Country, directory, settings)
    }

    pub fn cities(directory: Arc<dyn GeoDirectory>, settings: AutocompleteSettings) -> Self {
        Self::new(Field::City, directory, settings)
    }

    pub fn field(&self) -> Field {
        self.inner.field
    }

    pub fn text(&self) -> String {
        self.inner.state.lock().text.clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.state.lock().open
    }

    pub fn suggestions(&self) -> RequestState<Vec<Suggestion>> {
        self.inner.state.lock().suggestions.clone()
    }

    /// Records new input and (re)schedules a suggestion fetch.
    ///
    /// Input shorter than the minimum length, or a city query without a
    /// country, clears the list immediately without touching the network.
    pub fn on_input_change(&self, text: &str) {
        let mut state = self.inner.state.lock();
        state.text = text.to_string();
        state.generation += 1;
        state.cancel_task();

        let query = text.trim().to_string();
        let unscoped = self.inner.field == Field::City && state.scope.is_none();
        if query.chars().count() < self.inner.settings.min_query_len || unscoped {
            state.suggestions = RequestState::Done(Vec::new());
            state.open = false;
            drop(state);
            self.inner.settled.notify_waiters();
            return;
        }

        let generation = state.generation;
        let scope = state.scope.clone();
        let deadline = Instant::now() + self.inner.settings.debounce;
        let inner = Arc::clone(&self.inner);

        state.task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            {
                let mut state = inner.state.lock();
                if state.generation != generation {
                    return;
                }
                state.suggestions = RequestState::Pending;
            }

            debug!(field = ?inner.field, %query, "fetching suggestions");
            let suggestions = inner.fetch(&query, scope.as_deref()).await;
            inner.finish(generation, suggestions);
        }));
    }

    /// Replaces the text with the chosen suggestion and closes the list.
    pub fn select(&self, suggestion: &Suggestion) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        state.cancel_task();
        state.text = suggestion.name.clone();
        state.suggestions = RequestState::Idle;
        state.open = false;
        drop(state);
        self.inner.settled.notify_waiters();
    }

    /// Closes the list without selecting anything.
    pub fn dismiss(&self) {
        self.inner.state.lock().open = false;
    }

    /// Scopes a city field to a country. Always clears the text and list,
    /// even when the country is unchanged.
    pub fn set_scope(&self, country_id: Option<String>) {
        self.inner.state.lock().scope = country_id;
        self.reset();
    }

    /// Cancels any pending fetch and clears text and suggestions.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        state.cancel_task();
        state.text.clear();
        state.suggestions = RequestState::Idle;
        state.open = false;
        drop(state);
        self.inner.settled.notify_waiters();
    }

    /// Cancels any pending fetch. Safe to call repeatedly.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if state.task.is_some() {
            state.generation += 1;
            state.cancel_task();
            drop(state);
            self.inner.settled.notify_waiters();
        }
    }

    /// Waits until no fetch is scheduled or running, then returns the current list.
    pub async fn settled(&self) -> Vec<Suggestion> {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.inner.state.lock();
                if state.task.is_none() {
                    return state.suggestions.value().cloned().unwrap_or_default();
                }
            }

            notified.await;
        }
    }
}

impl Drop for AutocompleteController {
    fn drop(&mut self) {
        self.inner.state.lock().cancel_task();
    }
}
