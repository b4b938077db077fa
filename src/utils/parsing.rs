use anyhow::Result;

use crate::api::Coordinate;

/// Common parsing utilities used across the application
pub struct ParsingUtils;

impl ParsingUtils {
    /// Parse a `LAT,LON` pair such as `52.2297,21.0122`
    pub fn parse_coordinate(value: &str) -> Result<Coordinate> {
        let (lat, lon) = value
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("expected LAT,LON but got '{}'", value))?;

        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid latitude '{}': {}", lat.trim(), e))?;
        let longitude: f64 = lon
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid longitude '{}': {}", lon.trim(), e))?;

        if !(-90.0..=90.0).contains(&latitude) {
            anyhow::bail!("latitude {} out of range", latitude);
        }
        if !(-180.0..=180.0).contains(&longitude) {
            anyhow::bail!("longitude {} out of range", longitude);
        }
        Ok(Coordinate::new(latitude, longitude))
    }

    /// Parse a search radius in whole kilometers
    pub fn parse_radius(value: &str) -> Result<u32> {
        let radius: u32 = value
            .trim()
            .trim_end_matches("km")
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid radius '{}': {}", value, e))?;
        if radius == 0 {
            anyhow::bail!("radius must be at least 1 km");
        }
        Ok(radius)
    }

    /// Normalize the API base URL; an empty value means the local server
    pub fn normalize_base_url(value: &str) -> String {
        let trimmed = value.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            "http://localhost:8000".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        let coord = ParsingUtils::parse_coordinate("52.2297, 21.0122").unwrap();
        assert_eq!(coord, Coordinate::new(52.2297, 21.0122));
    }

    #[test]
    fn test_parse_coordinate_rejects_bad_input() {
        assert!(ParsingUtils::parse_coordinate("52.2297").is_err());
        assert!(ParsingUtils::parse_coordinate("north,21").is_err());
        assert!(ParsingUtils::parse_coordinate("95,21").is_err());
        assert!(ParsingUtils::parse_coordinate("52,200").is_err());
    }

    #[test]
    fn test_parse_radius() {
        assert_eq!(ParsingUtils::parse_radius("25").unwrap(), 25);
        assert_eq!(ParsingUtils::parse_radius("10km").unwrap(), 10);
        assert!(ParsingUtils::parse_radius("0").is_err());
        assert!(ParsingUtils::parse_radius("-5").is_err());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(ParsingUtils::normalize_base_url(""), "http://localhost:8000");
        assert_eq!(
            ParsingUtils::normalize_base_url("https://fuel.example.com/"),
            "https://fuel.example.com"
        );
    }
}
