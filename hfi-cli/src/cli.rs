use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::sync::Arc;

use hfi_core::{
    AutocompleteSettings, Config, Coordinate, Geolocator, ManualEntry, NearbyQuery, PositionSource,
    SortKey, Units, WeatherBackend,
    geolocation::{IpPositionSource, NoPositionSource},
    manual,
    service::{GeoApiClient, NominatimGeocoder, WxApiClient},
};

use crate::{
    output::{self, OutputOptions},
    prompt,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "hfi", version, about = "Hair Forecast Index: will today be a good hair day?")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub display: DisplayArgs,

    /// Debug logging on stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct DisplayArgs {
    /// Show Celsius and km/h.
    #[arg(long, global = true)]
    pub metric: bool,

    /// Show the per-interval forecast table instead of the summary.
    #[arg(long, global = true)]
    pub detail: bool,

    /// Column to sort the detail table by.
    #[arg(long, value_enum, default_value_t = SortArg::Offset, global = true)]
    pub sort: SortArg,

    /// Sort descending.
    #[arg(long, global = true)]
    pub desc: bool,

    /// Print the resolved state as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Offset,
    Temp,
    Dewpoint,
    Wind,
    Hfi,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Offset => SortKey::Offset,
            SortArg::Temp => SortKey::Temperature,
            SortArg::Dewpoint => SortKey::Dewpoint,
            SortArg::Wind => SortKey::Wind,
            SortArg::Hfi => SortKey::Hfi,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect your location and show the forecast for it.
    Locate,

    /// Pick a country and city, then show the forecast there.
    Manual {
        /// Country query; picks the first match instead of prompting.
        #[arg(long, requires = "city")]
        country: Option<String>,

        /// City query; picks the first match instead of prompting.
        #[arg(long, requires = "country")]
        city: Option<String>,
    },

    /// Show the forecast for known coordinates.
    Coords {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// List forecast geohashes near coordinates or a place name.
    Nearby {
        #[arg(long, allow_negative_numbers = true, requires = "lon", conflicts_with = "place")]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,
        /// Free-text place, e.g. "Portland, OR".
        #[arg(long)]
        place: Option<String>,
    },

    /// Interactively edit service endpoints and display preferences.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => prompt::configure(),
            Command::Locate => {
                let (config, opts) = self.display.load()?;
                let coordinate = locate(&config).await?;
                output::resolve_and_render(&config, coordinate, &opts).await
            }
            Command::Manual { country, city } => {
                let (config, opts) = self.display.load()?;
                let directory = Arc::new(GeoApiClient::new(
                    &config.endpoints.geoapi_base_url,
                    config.timing.request_timeout(),
                )?);
                let mut entry = ManualEntry::new(directory, AutocompleteSettings::from(&config));

                match (country, city) {
                    (Some(country), Some(city)) => {
                        prompt::pick_first(&mut entry, &country, &city).await?
                    }
                    _ => prompt::manual_entry(&mut entry).await?,
                }

                let input = entry.input();
                eprintln!("Weather for: {}", input.label());

                let geocoder =
                    NominatimGeocoder::new(&config.endpoints.geocoder_url, config.timing.request_timeout())?;
                let coordinate = manual::locate(input, &geocoder).await?;
                output::resolve_and_render(&config, coordinate, &opts).await
            }
            Command::Coords { lat, lon } => {
                let (config, opts) = self.display.load()?;
                let coordinate = parse_coordinate(lat, lon)?;
                output::resolve_and_render(&config, coordinate, &opts).await
            }
            Command::Nearby { lat, lon, place } => {
                let (config, opts) = self.display.load()?;
                let query = match (lat, lon, place) {
                    (Some(lat), Some(lon), None) => NearbyQuery::Coordinates(parse_coordinate(lat, lon)?),
                    (None, None, Some(place)) if !place.trim().is_empty() => NearbyQuery::Place(place),
                    _ => bail!("Pass either --lat and --lon, or a non-empty --place"),
                };
                nearby(&config, &query, opts.json).await
            }
        }
    }
}

impl DisplayArgs {
    fn load(&self) -> Result<(Config, OutputOptions)> {
        let config = Config::load()?;
        let opts = self.output_options(&config);
        Ok((config, opts))
    }

    fn output_options(&self, config: &Config) -> OutputOptions {
        OutputOptions {
            units: Units::from_metric_flag(self.metric || config.display.metric),
            detail: self.detail,
            sort: self.sort.into(),
            descending: self.desc,
            max_rows: config.display.max_intervals,
            json: self.json,
        }
    }
}

async fn locate(config: &Config) -> Result<Coordinate> {
    let source: Arc<dyn PositionSource> = if config.endpoints.geolocation_url.is_empty() {
        Arc::new(NoPositionSource)
    } else {
        Arc::new(IpPositionSource::new(
            &config.endpoints.geolocation_url,
            config.timing.request_timeout(),
        )?)
    };
    let geolocator = Geolocator::new(source, config.timing.geolocation_timeout());

    eprintln!("Getting location...");
    match geolocator.acquire().await {
        Some(Ok(coordinate)) => Ok(coordinate),
        Some(Err(err)) => Err(err.to_failure(geolocator.is_secure()).into()),
        None => Err(anyhow!("A location request is already in progress")),
    }
}

async fn nearby(config: &Config, query: &NearbyQuery, json: bool) -> Result<()> {
    let client = WxApiClient::new(&config.endpoints.wxapi_base_url, config.timing.request_timeout())?;
    let results = client.nearby(query).await.context("Nearby lookup failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No forecast locations found nearby.");
    }
    for result in &results {
        match &result.name {
            Some(name) => println!("{}  {name}", result.geohash),
            None => println!("{}", result.geohash),
        }
    }
    Ok(())
}

fn parse_coordinate(lat: f64, lon: f64) -> Result<Coordinate> {
    if !(-90.0..=90.0).contains(&lat) {
        bail!("Latitude {lat} is out of range (-90..=90)");
    }
    if !(-180.0..=180.0).contains(&lon) {
        bail!("Longitude {lon} is out of range (-180..=180)");
    }
    Ok(Coordinate::new(lat, lon))
}
