//! Map viewport and the markers drawn on it.

use log::{debug, warn};

use crate::api::{Coordinate, Station};
use crate::brands::{BrandIconResolver, IconRef};

pub const MIN_ZOOM: u8 = 3;
pub const MAX_ZOOM: u8 = 19;

/// Warsaw, where the map opens before any search.
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(52.22936, 21.01293);
pub const DEFAULT_ZOOM: u8 = 12;

/// Zoom used when centering on a detected location.
pub const LOCATE_ZOOM: u8 = 13;
/// Zoom used when focusing a single station from the results list.
pub const STATION_ZOOM: u8 = 15;

/// Margin kept free around fitted markers, in cells.
pub const FIT_PADDING: u16 = 3;

// World width at zoom 0 is one 256px tile; a terminal cell covers 8x16 px.
const TILE_SIZE: f64 = 256.0;
const CELL_WIDTH_PX: f64 = 8.0;
const CELL_HEIGHT_PX: f64 = 16.0;

const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Axis-aligned lat/lon rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn from_point(point: Coordinate) -> Self {
        Self {
            south: point.latitude,
            west: point.longitude,
            north: point.latitude,
            east: point.longitude,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Coordinate>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::from_point(first), |mut bounds, p| {
            bounds.extend(p);
            bounds
        }))
    }

    pub fn extend(&mut self, point: Coordinate) {
        self.south = self.south.min(point.latitude);
        self.north = self.north.max(point.latitude);
        self.west = self.west.min(point.longitude);
        self.east = self.east.max(point.longitude);
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    #[cfg(test)]
    pub fn contains(&self, point: Coordinate) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }
}

/// Visible map region, measured in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    center: Coordinate,
    zoom: u8,
    width: u16,
    height: u16,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            width: FALLBACK_SIZE.0,
            height: FALLBACK_SIZE.1,
        }
    }
}

impl Viewport {
    #[cfg(test)]
    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    pub fn set_view(&mut self, center: Coordinate, zoom: u8) {
        self.center = center;
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn zoom_in(&mut self) {
        self.set_view(self.center, self.zoom.saturating_add(1));
    }

    pub fn zoom_out(&mut self) {
        self.set_view(self.center, self.zoom.saturating_sub(1));
    }

    /// Shifts the view by whole cells; positive `dy` moves north.
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let (lon_per_cell, lat_per_cell) = self.degrees_per_cell();
        let latitude = (self.center.latitude + dy as f64 * lat_per_cell).clamp(-85.0, 85.0);
        let longitude = wrap_longitude(self.center.longitude + dx as f64 * lon_per_cell);
        self.center = Coordinate::new(latitude, longitude);
    }

    pub fn bounds(&self) -> GeoBounds {
        let (lon_per_cell, lat_per_cell) = self.degrees_per_cell();
        let half_w = self.width as f64 * lon_per_cell / 2.0;
        let half_h = self.height as f64 * lat_per_cell / 2.0;
        GeoBounds {
            south: self.center.latitude - half_h,
            west: self.center.longitude - half_w,
            north: self.center.latitude + half_h,
            east: self.center.longitude + half_w,
        }
    }

    /// Coordinate under a cell, with (0, 0) at the top-left of the map.
    ///
    /// Cells past the poles or the antimeridian give a valid coordinate.
    pub fn cell_to_coordinate(&self, col: u16, row: u16) -> Coordinate {
        let (lon_per_cell, lat_per_cell) = self.degrees_per_cell();
        let bounds = self.bounds();
        Coordinate::new(
            (bounds.north - (row as f64 + 0.5) * lat_per_cell).clamp(-90.0, 90.0),
            wrap_longitude(bounds.west + (col as f64 + 0.5) * lon_per_cell),
        )
    }

    /// Picks the deepest zoom at which `bounds` fits inside the padded view.
    pub fn fit_bounds(&mut self, bounds: GeoBounds, padding: u16) {
        let usable_w = self.width.saturating_sub(padding * 2).max(1) as f64;
        let usable_h = self.height.saturating_sub(padding * 2).max(1) as f64;
        let lon_span = bounds.east - bounds.west;
        let lat_span = bounds.north - bounds.south;

        let zoom = (MIN_ZOOM..=MAX_ZOOM)
            .rev()
            .find(|&zoom| {
                let (lon_per_cell, lat_per_cell) = Self::degrees_per_cell_at(zoom);
                lon_span <= usable_w * lon_per_cell && lat_span <= usable_h * lat_per_cell
            })
            .unwrap_or(MIN_ZOOM);

        debug!("Fitting bounds {:?} at zoom {}", bounds, zoom);
        self.set_view(bounds.center(), zoom);
    }

    fn degrees_per_cell(&self) -> (f64, f64) {
        Self::degrees_per_cell_at(self.zoom)
    }

    fn degrees_per_cell_at(zoom: u8) -> (f64, f64) {
        let degrees_per_px = 360.0 / (TILE_SIZE * 2f64.powi(zoom as i32));
        (degrees_per_px * CELL_WIDTH_PX, degrees_per_px * CELL_HEIGHT_PX)
    }
}

fn wrap_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

/// What the origin marker stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginKind {
    ManualClick,
    DetectedLocation,
}

impl OriginKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::ManualClick => "Search Location",
            Self::DetectedLocation => "Your Location",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginMarker {
    pub position: Coordinate,
    pub kind: OriginKind,
}

/// A station marker with a back-reference to its station.
#[derive(Debug, Clone)]
pub struct MarkerEntry {
    pub station_id: String,
    pub brand: Option<String>,
    pub position: Coordinate,
    pub icon: IconRef,
    pub popup: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popup {
    Origin,
    Station(String),
}

/// Markers currently on the map, kept in step with the current result set.
#[derive(Debug, Default)]
pub struct MapMarkerLayer {
    pub viewport: Viewport,
    stations: Vec<MarkerEntry>,
    origin: Option<OriginMarker>,
    open_popup: Option<Popup>,
}

impl MapMarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every station marker and the origin marker.
    pub fn clear(&mut self) {
        self.clear_stations();
        self.origin = None;
        self.open_popup = None;
    }

    /// Removes the station markers but keeps the origin marker.
    pub fn clear_stations(&mut self) {
        self.stations.clear();
        if matches!(self.open_popup, Some(Popup::Station(_))) {
            self.open_popup = None;
        }
    }

    pub fn set_origin(&mut self, position: Coordinate, kind: OriginKind) {
        self.origin = Some(OriginMarker { position, kind });
        self.open_popup = Some(Popup::Origin);
    }

    /// Places one marker per station and fits the view around them and the origin.
    pub fn show_stations(&mut self, stations: &[Station], icons: &mut BrandIconResolver) {
        if !self.stations.is_empty() {
            warn!(
                "Dropping {} markers left over from a previous search",
                self.stations.len()
            );
            self.clear_stations();
        }

        self.stations = stations
            .iter()
            .map(|station| MarkerEntry {
                station_id: station.id.clone(),
                brand: station.brand.clone(),
                position: station.location,
                icon: icons.resolve(station.brand.as_deref()),
                popup: vec![
                    station.display_name().to_string(),
                    station.display_brand().to_string(),
                    station.display_address().to_string(),
                    station.distance_label(),
                ],
            })
            .collect();

        let points = self
            .stations
            .iter()
            .map(|m| m.position)
            .chain(self.origin.map(|o| o.position));
        if !stations.is_empty() {
            if let Some(bounds) = GeoBounds::from_points(points) {
                self.viewport.fit_bounds(bounds, FIT_PADDING);
            }
        }
    }

    /// Re-resolves every marker icon, e.g. after the resolver was invalidated.
    pub fn refresh_icons(&mut self, icons: &mut BrandIconResolver) {
        for marker in &mut self.stations {
            marker.icon = icons.resolve(marker.brand.as_deref());
        }
    }

    pub fn station_markers(&self) -> &[MarkerEntry] {
        &self.stations
    }

    pub fn origin(&self) -> Option<&OriginMarker> {
        self.origin.as_ref()
    }

    #[cfg(test)]
    pub fn marker_count(&self) -> usize {
        self.stations.len() + usize::from(self.origin.is_some())
    }

    pub fn find_marker(&self, station_id: &str) -> Option<&MarkerEntry> {
        self.stations.iter().find(|m| m.station_id == station_id)
    }

    /// Opens the popup of the marker for `station_id`; false if there is none.
    pub fn open_popup(&mut self, station_id: &str) -> bool {
        if self.find_marker(station_id).is_some() {
            self.open_popup = Some(Popup::Station(station_id.to_string()));
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub fn open_popup_target(&self) -> Option<&Popup> {
        self.open_popup.as_ref()
    }

    /// Lines of the open popup, if any.
    pub fn popup_lines(&self) -> Option<Vec<String>> {
        match self.open_popup.as_ref()? {
            Popup::Origin => self.origin.map(|o| vec![o.kind.label().to_string()]),
            Popup::Station(id) => self.find_marker(id).map(|m| m.popup.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brands::BrandTable;
    use std::rc::Rc;

    fn station(id: &str, brand: Option<&str>, lat: f64, lon: f64) -> Station {
        Station {
            id: id.to_string(),
            name: Some(format!("Station {}", id)),
            brand: brand.map(str::to_string),
            address: None,
            location: Coordinate::new(lat, lon),
            distance_km: 1.0,
        }
    }

    #[test]
    fn clear_is_idempotent() {
        let mut layer = MapMarkerLayer::new();
        layer.clear();
        layer.clear();
        assert_eq!(layer.marker_count(), 0);
    }

    #[test]
    fn set_origin_replaces_previous_origin() {
        let mut layer = MapMarkerLayer::new();
        layer.set_origin(Coordinate::new(1.0, 1.0), OriginKind::ManualClick);
        layer.set_origin(Coordinate::new(2.0, 2.0), OriginKind::DetectedLocation);

        assert_eq!(layer.marker_count(), 1);
        let origin = layer.origin().unwrap();
        assert_eq!(origin.position, Coordinate::new(2.0, 2.0));
        assert_eq!(origin.kind.label(), "Your Location");
        assert_eq!(layer.popup_lines(), Some(vec!["Your Location".to_string()]));
    }

    #[test]
    fn show_stations_places_markers_and_fits_view() {
        let mut icons = BrandIconResolver::new(BrandTable::builtin());
        let mut layer = MapMarkerLayer::new();
        let origin = Coordinate::new(52.0, 21.0);
        layer.set_origin(origin, OriginKind::ManualClick);

        let stations = vec![
            station("1", Some("Orlen"), 52.05, 21.02),
            station("2", Some("Shell"), 51.97, 20.95),
            station("3", None, 52.01, 21.08),
        ];
        layer.show_stations(&stations, &mut icons);

        assert_eq!(layer.station_markers().len(), 3);
        assert_eq!(layer.marker_count(), 4);
        assert_eq!(layer.find_marker("2").unwrap().icon.url, "brands_logos/shell.png");

        let view = layer.viewport.bounds();
        assert!(view.contains(origin));
        for s in &stations {
            assert!(view.contains(s.location));
        }
    }

    #[test]
    fn show_stations_empty_leaves_view_alone() {
        let mut icons = BrandIconResolver::new(BrandTable::builtin());
        let mut layer = MapMarkerLayer::new();
        layer.set_origin(Coordinate::new(10.0, 10.0), OriginKind::ManualClick);
        let before = layer.viewport;

        layer.show_stations(&[], &mut icons);
        assert_eq!(layer.viewport, before);
        assert_eq!(layer.marker_count(), 1);
    }

    #[test]
    fn markers_from_previous_search_never_survive() {
        let mut icons = BrandIconResolver::new(BrandTable::builtin());
        let mut layer = MapMarkerLayer::new();
        layer.show_stations(&[station("a", None, 1.0, 1.0), station("b", None, 1.1, 1.1)], &mut icons);
        layer.show_stations(&[station("c", None, 1.2, 1.2)], &mut icons);

        assert_eq!(layer.station_markers().len(), 1);
        assert!(layer.find_marker("a").is_none());
    }

    #[test]
    fn markers_share_brand_icons() {
        let mut icons = BrandIconResolver::new(BrandTable::builtin());
        let mut layer = MapMarkerLayer::new();
        layer.show_stations(
            &[station("1", Some("BP"), 1.0, 1.0), station("2", Some("bp"), 1.1, 1.1)],
            &mut icons,
        );
        let markers = layer.station_markers();
        assert!(Rc::ptr_eq(&markers[0].icon, &markers[1].icon));
    }

    #[test]
    fn clear_stations_keeps_origin() {
        let mut icons = BrandIconResolver::new(BrandTable::builtin());
        let mut layer = MapMarkerLayer::new();
        layer.set_origin(Coordinate::new(1.0, 1.0), OriginKind::ManualClick);
        layer.show_stations(&[station("1", None, 1.0, 1.1)], &mut icons);
        assert!(layer.open_popup("1"));

        layer.clear_stations();
        assert_eq!(layer.marker_count(), 1);
        assert!(layer.origin().is_some());
        assert_eq!(layer.open_popup_target(), None);
    }

    #[test]
    fn station_popup_lines() {
        let mut icons = BrandIconResolver::new(BrandTable::builtin());
        let mut layer = MapMarkerLayer::new();
        layer.show_stations(&[station("7", Some("Aral"), 1.0, 1.0)], &mut icons);

        assert!(!layer.open_popup("missing"));
        assert!(layer.open_popup("7"));
        let lines = layer.popup_lines().unwrap();
        assert_eq!(lines[0], "Station 7");
        assert_eq!(lines[1], "Aral");
        assert_eq!(lines[2], "Address not available");
        assert_eq!(lines[3], "1.00 km away");
    }

    #[test]
    fn viewport_zoom_is_clamped() {
        let mut viewport = Viewport::default();
        viewport.set_view(DEFAULT_CENTER, 25);
        assert_eq!(viewport.zoom(), MAX_ZOOM);
        viewport.set_view(DEFAULT_CENTER, 0);
        assert_eq!(viewport.zoom(), MIN_ZOOM);
        viewport.zoom_out();
        assert_eq!(viewport.zoom(), MIN_ZOOM);
    }

    #[test]
    fn cell_projection_round_trips_through_bounds() {
        let mut viewport = Viewport::default();
        viewport.resize(100, 40);
        let center = viewport.cell_to_coordinate(50, 20);
        assert!((center.latitude - DEFAULT_CENTER.latitude).abs() < 0.01);
        assert!((center.longitude - DEFAULT_CENTER.longitude).abs() < 0.01);

        let top_left = viewport.cell_to_coordinate(0, 0);
        assert!(top_left.latitude > DEFAULT_CENTER.latitude);
        assert!(top_left.longitude < DEFAULT_CENTER.longitude);
        assert!(viewport.bounds().contains(top_left));
    }

    #[test]
    fn cells_beyond_the_poles_stay_on_the_globe() {
        let mut viewport = Viewport::default();
        viewport.resize(80, 24);
        viewport.set_view(Coordinate::new(85.0, 179.0), MIN_ZOOM);

        let top = viewport.cell_to_coordinate(79, 0);
        assert_eq!(top.latitude, 90.0);
        assert!((-180.0..180.0).contains(&top.longitude));
        assert!(top.longitude < 0.0);

        viewport.set_view(Coordinate::new(-85.0, -179.0), MIN_ZOOM);
        let bottom = viewport.cell_to_coordinate(0, 23);
        assert_eq!(bottom.latitude, -90.0);
        assert!(bottom.longitude > 0.0);
    }

    #[test]
    fn refresh_icons_follows_the_resolver() {
        let mut icons = BrandIconResolver::new(BrandTable::builtin());
        let mut layer = MapMarkerLayer::new();
        layer.show_stations(&[station("1", Some("Shell"), 1.0, 1.0)], &mut icons);
        let before = Rc::clone(&layer.station_markers()[0].icon);

        icons.set_monochrome(true);
        layer.refresh_icons(&mut icons);

        let after = &layer.station_markers()[0].icon;
        assert!(!Rc::ptr_eq(&before, after));
        assert_eq!(after.url, "brands_logos/shell.png");
        assert_eq!(after.color, ratatui::style::Color::White);
    }

    #[test]
    fn single_point_fits_at_max_zoom() {
        let mut viewport = Viewport::default();
        viewport.fit_bounds(GeoBounds::from_point(Coordinate::new(1.0, 2.0)), FIT_PADDING);
        assert_eq!(viewport.zoom(), MAX_ZOOM);
        assert_eq!(viewport.center(), Coordinate::new(1.0, 2.0));
    }
}
