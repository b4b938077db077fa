//! Command line options and the runtime configuration built from them.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use crate::api::{ClientConfig, Coordinate, DEFAULT_LIMIT};
use crate::brands::BrandTable;
use crate::geolocation::{
    AnyGeolocator, FixedGeolocator, IpGeolocator, PositionOptions, DEFAULT_IP_LOOKUP_URL,
};
use crate::utils::parsing::ParsingUtils;

/// Radius choices offered by the selector, in km.
pub const RADIUS_OPTIONS: [u32; 4] = [5, 10, 25, 50];
pub const DEFAULT_RADIUS_KM: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GeoProvider {
    /// Look the position up from the public IP address
    Ip,
    /// Use the coordinate given with --location
    Fixed,
    /// No location access
    None,
}

#[derive(Debug, Parser)]
#[command(name = "fuelmap", version, about = "Find fuel stations near a point on the map")]
pub struct Args {
    /// Base URL of the stations API (empty means http://localhost:8000)
    #[arg(long, default_value = "")]
    pub api_base: String,

    /// Initial search radius in km
    #[arg(long, default_value_t = DEFAULT_RADIUS_KM, value_parser = parse_radius)]
    pub radius: u32,

    /// Maximum number of stations per search
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    pub limit: u32,

    /// Station API request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// JSON file mapping brand names to logo files
    #[arg(long)]
    pub brand_table: Option<PathBuf>,

    /// How "locate me" finds the position
    #[arg(long, value_enum, default_value_t = GeoProvider::Ip)]
    pub geo_provider: GeoProvider,

    /// Position used by the fixed provider, as LAT,LON
    #[arg(long, value_parser = parse_coordinate)]
    pub location: Option<Coordinate>,

    /// IP geolocation service URL
    #[arg(long, default_value = DEFAULT_IP_LOOKUP_URL)]
    pub geo_url: String,

    /// File the log is written to (the terminal is taken by the UI)
    #[arg(long, default_value = "fuelmap.log")]
    pub log_file: PathBuf,
}

fn parse_radius(value: &str) -> Result<u32, String> {
    ParsingUtils::parse_radius(value).map_err(|e| e.to_string())
}

fn parse_coordinate(value: &str) -> Result<Coordinate, String> {
    ParsingUtils::parse_coordinate(value).map_err(|e| e.to_string())
}

/// Raster tile provider settings; only the attribution is drawn in the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileConfig {
    pub url_template: String,
    pub attribution: String,
    pub subdomains: String,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            url_template: "https://{s}.basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}{r}.png"
                .to_string(),
            attribution: "© OpenStreetMap contributors © CARTO".to_string(),
            subdomains: "abcd".to_string(),
            min_zoom: crate::markers::MIN_ZOOM,
            max_zoom: crate::markers::MAX_ZOOM,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub radius_km: u32,
    pub radius_options: Vec<u32>,
    pub limit: u32,
    pub timeout: Duration,
    pub brand_table: Option<PathBuf>,
    pub geo_provider: GeoProvider,
    pub location: Option<Coordinate>,
    pub geo_url: String,
    pub position_options: PositionOptions,
    pub tiles: TileConfig,
    pub log_file: PathBuf,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        if args.geo_provider == GeoProvider::Fixed && args.location.is_none() {
            anyhow::bail!("--geo-provider fixed requires --location LAT,LON");
        }
        if args.limit == 0 {
            anyhow::bail!("--limit must be at least 1");
        }

        let mut radius_options = RADIUS_OPTIONS.to_vec();
        if !radius_options.contains(&args.radius) {
            radius_options.push(args.radius);
            radius_options.sort_unstable();
        }

        Ok(Self {
            api_base: ParsingUtils::normalize_base_url(&args.api_base),
            radius_km: args.radius,
            radius_options,
            limit: args.limit,
            timeout: Duration::from_secs(args.timeout_secs),
            brand_table: args.brand_table,
            geo_provider: args.geo_provider,
            location: args.location,
            geo_url: args.geo_url,
            position_options: PositionOptions::default(),
            tiles: TileConfig::default(),
            log_file: args.log_file,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_base.clone()).with_timeout_secs(self.timeout.as_secs())
    }

    pub fn load_brand_table(&self) -> Result<BrandTable> {
        match &self.brand_table {
            Some(path) => BrandTable::load(path),
            None => Ok(BrandTable::builtin()),
        }
    }

    pub fn geolocator(&self) -> Result<AnyGeolocator> {
        Ok(match self.geo_provider {
            GeoProvider::Ip => AnyGeolocator::Ip(
                IpGeolocator::new(self.geo_url.clone())
                    .context("failed to create IP geolocation client")?,
            ),
            GeoProvider::Fixed => match self.location {
                Some(position) => AnyGeolocator::Fixed(FixedGeolocator::new(position)),
                None => anyhow::bail!("fixed geolocation needs a location"),
            },
            GeoProvider::None => AnyGeolocator::Disabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let args = Args::try_parse_from(std::iter::once("fuelmap").chain(args.iter().copied()))?;
        Config::from_args(args)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.radius_km, 10);
        assert_eq!(config.radius_options, vec![5, 10, 25, 50]);
        assert_eq!(config.limit, 50);
        assert_eq!(config.geo_provider, GeoProvider::Ip);
        assert_eq!(config.position_options, PositionOptions::default());
        assert_eq!(config.tiles.min_zoom, 3);
        assert_eq!(config.tiles.max_zoom, 19);
    }

    #[test]
    fn custom_radius_joins_the_options() {
        let config = parse(&["--radius", "15"]).unwrap();
        assert_eq!(config.radius_km, 15);
        assert_eq!(config.radius_options, vec![5, 10, 15, 25, 50]);
    }

    #[test]
    fn fixed_provider_needs_location() {
        assert!(parse(&["--geo-provider", "fixed"]).is_err());

        let config = parse(&["--geo-provider", "fixed", "--location", "52.0,21.0"]).unwrap();
        assert_eq!(config.location, Some(Coordinate::new(52.0, 21.0)));
        assert!(matches!(config.geolocator().unwrap(), AnyGeolocator::Fixed(_)));
    }

    #[test]
    fn disabled_provider() {
        let config = parse(&["--geo-provider", "none"]).unwrap();
        assert!(matches!(config.geolocator().unwrap(), AnyGeolocator::Disabled));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse(&["--radius", "0"]).is_err());
        assert!(parse(&["--limit", "0"]).is_err());
        assert!(parse(&["--location", "nowhere"]).is_err());
    }

    #[test]
    fn builtin_brand_table_by_default() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.load_brand_table().unwrap(), BrandTable::builtin());
    }
}
