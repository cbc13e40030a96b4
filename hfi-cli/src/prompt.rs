//! Interactive prompts: manual location entry and `hfi configure`.

use anyhow::{Result, anyhow};
use inquire::{Confirm, CustomType, Select, Text, validator::Validation};
use tracing::{debug, warn};

use hfi_core::{Config, ManualEntry};

/// Walks the user through country then city selection.
///
/// Suggestions are fetched through the entry's debounced autocomplete, so a
/// query is only sent once the typed text has settled.
pub async fn manual_entry(entry: &mut ManualEntry) -> Result<()> {
    loop {
        let query = Text::new("Country:")
            .with_help_message("Type at least the first two letters")
            .prompt()?;
        entry.type_country(&query);

        let matches = entry.country_suggestions().await;
        if matches.is_empty() {
            eprintln!("No countries match '{query}'.");
            continue;
        }

        match Select::new("Pick a country:", matches).prompt_skippable()? {
            Some(country) => {
                entry.select_country(&country);
                break;
            }
            None => entry.country_field().dismiss(),
        }
    }

    loop {
        let query = Text::new("City:").prompt()?;
        if query.trim().is_empty() {
            eprintln!("Enter a city to look up.");
            continue;
        }
        entry.type_city(&query);

        let matches = entry.city_suggestions().await;
        let choice = if matches.is_empty() {
            None
        } else {
            Select::new("Pick a city:", matches).prompt_skippable()?
        };

        match choice {
            Some(city) => {
                entry.select_city(&city);
                return Ok(());
            }
            None => {
                entry.city_field().dismiss();
                let as_typed = Confirm::new(&format!("Look up '{}' as typed?", query.trim()))
                    .with_default(true)
                    .prompt()?;
                if as_typed {
                    return Ok(());
                }
            }
        }
    }
}

/// Non-interactive form: takes the first suggestion for each query.
///
/// A city with no suggestions is kept as typed and geocoded later.
pub async fn pick_first(entry: &mut ManualEntry, country: &str, city: &str) -> Result<()> {
    entry.type_country(country);
    let chosen = entry
        .country_suggestions()
        .await
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No country matches '{country}'"))?;
    entry.select_country(&chosen);

    entry.type_city(city);
    match entry.city_suggestions().await.into_iter().next() {
        Some(suggestion) => entry.select_city(&suggestion),
        None => debug!(city, "no city suggestion; keeping typed text"),
    }
    Ok(())
}

pub fn configure() -> Result<()> {
    let path = Config::config_file_path()?;
    // A broken file is exactly what this command is for.
    let mut config = Config::load_from(&path).unwrap_or_else(|err| {
        warn!(error = %err, "existing config is unusable, starting from defaults");
        Config::default()
    });

    let endpoints = &mut config.endpoints;
    endpoints.wxapi_base_url = ask_url("Forecast service base URL:", &endpoints.wxapi_base_url, false)?;
    endpoints.geoapi_base_url = ask_url("Country/city directory base URL:", &endpoints.geoapi_base_url, false)?;
    endpoints.geolocation_url = ask_url("IP geolocation URL (empty disables):", &endpoints.geolocation_url, true)?;
    endpoints.geocoder_url = ask_url("Geocoder search URL:", &endpoints.geocoder_url, false)?;

    config.display.metric = Confirm::new("Use metric units?")
        .with_default(config.display.metric)
        .prompt()?;

    config.display.max_intervals = CustomType::<usize>::new("Forecast rows to show:")
        .with_default(config.display.max_intervals)
        .with_error_message("Please type a whole number")
        .with_validator(|n: &usize| {
            Ok(if *n >= 1 {
                Validation::Valid
            } else {
                Validation::Invalid("Show at least one row".into())
            })
        })
        .prompt()?;

    config.save_to(&path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn ask_url(message: &str, current: &str, allow_empty: bool) -> Result<String> {
    let answer = Text::new(message)
        .with_default(current)
        .with_validator(move |input: &str| Ok(check_url(input, allow_empty)))
        .prompt()?;
    Ok(answer.trim().to_string())
}

fn check_url(input: &str, allow_empty: bool) -> Validation {
    let input = input.trim();
    if input.is_empty() && allow_empty {
        return Validation::Valid;
    }
    if input.starts_with("http://") || input.starts_with("https://") {
        Validation::Valid
    } else {
        Validation::Invalid("Expected an http:// or https:// URL".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hfi_core::{
        ApiError, AutocompleteSettings, Coordinate, GeoDirectory, Suggestion,
    };
    use std::{sync::Arc, time::Duration};

    #[derive(Debug)]
    struct Directory;

    #[async_trait]
    impl GeoDirectory for Directory {
        async fn countries(&self, query: &str) -> Result<Vec<Suggestion>, ApiError> {
            Ok(["Canada", "Cameroon"]
                .iter()
                .enumerate()
                .filter(|(_, n)| n.to_lowercase().starts_with(&query.to_lowercase()))
                .map(|(i, n)| Suggestion::new(i.to_string(), *n))
                .collect())
        }

        async fn cities(&self, country_id: &str, query: &str) -> Result<Vec<Suggestion>, ApiError> {
            if country_id != "0" || !"toronto".starts_with(&query.to_lowercase()) {
                return Ok(Vec::new());
            }
            let mut toronto = Suggestion::new("t", "Toronto");
            toronto.state_code = Some("ON".into());
            toronto.coordinate = Some(Coordinate::new(43.65, -79.38));
            Ok(vec![toronto])
        }
    }

    fn entry() -> ManualEntry {
        let settings = AutocompleteSettings { debounce: Duration::from_millis(300), min_query_len: 2 };
        ManualEntry::new(Arc::new(Directory), settings)
    }

    #[tokio::test(start_paused = true)]
    async fn pick_first_selects_both() {
        let mut entry = entry();
        pick_first(&mut entry, "Can", "Tor").await.unwrap();

        let input = entry.input();
        assert_eq!(input.country_id(), Some("0"));
        assert_eq!(input.city(), "Toronto");
        assert_eq!(input.label(), "Toronto, Canada");
        assert_eq!(input.selected_city().and_then(|c| c.coordinate), Some(Coordinate::new(43.65, -79.38)));
    }

    #[tokio::test(start_paused = true)]
    async fn pick_first_keeps_unmatched_city_text() {
        let mut entry = entry();
        pick_first(&mut entry, "Canada", "Ottawa").await.unwrap();

        assert_eq!(entry.input().city(), "Ottawa");
        assert!(entry.input().selected_city().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pick_first_fails_without_country() {
        let mut entry = entry();
        let err = pick_first(&mut entry, "Narnia", "Cair").await.unwrap_err();
        assert!(err.to_string().contains("Narnia"));
    }

    #[test]
    fn url_validation() {
        assert_eq!(check_url("https://x.test", false), Validation::Valid);
        assert_eq!(check_url("", true), Validation::Valid);
        assert!(matches!(check_url("", false), Validation::Invalid(_)));
        assert!(matches!(check_url("x.test", true), Validation::Invalid(_)));
    }
}
