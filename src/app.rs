use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::actions::{Request, Response};
use crate::api::{Coordinate, QueryError, SearchRequest, Station};
use crate::brands::BrandIconResolver;
use crate::config::Config;
use crate::geolocation::{GeolocationError, PositionOptions};
use crate::markers::{OriginKind, LOCATE_ZOOM, STATION_ZOOM};
use crate::panel::PanelView;
use crate::ui::{Focus, UIState as UIApp};

pub const FETCH_FAILED_MESSAGE: &str =
    "Unable to fetch stations. Please check your connection and try again.";
pub const PERMISSION_DENIED_MESSAGE: &str =
    "Location access denied. Please click on the map to search manually.";
pub const POSITION_UNAVAILABLE_MESSAGE: &str =
    "Unable to determine your location. Please click on the map to search manually.";
pub const LOCATE_TIMEOUT_MESSAGE: &str =
    "Location request timed out. Please click on the map to search manually.";

/// User-facing text for a failed position request.
pub fn geolocation_message(err: GeolocationError) -> &'static str {
    match err {
        GeolocationError::PermissionDenied => PERMISSION_DENIED_MESSAGE,
        GeolocationError::PositionUnavailable => POSITION_UNAVAILABLE_MESSAGE,
        GeolocationError::Timeout => LOCATE_TIMEOUT_MESSAGE,
        GeolocationError::Unknown => FETCH_FAILED_MESSAGE,
    }
}

/// What started the search currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchKind {
    MapClick,
    Geolocate,
    RadiusReplay { radius_km: u32 },
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    id: u64,
    kind: SearchKind,
}

/// Drives the search lifecycle: one search at a time, results into the panel and the map.
pub struct AppController {
    pub ui_app: UIApp,
    icons: BrandIconResolver,
    req_tx: mpsc::Sender<Request>,
    in_flight: Option<InFlight>,
    next_search_id: u64,
    last_search: Option<SearchRequest>,
    limit: u32,
    position_options: PositionOptions,
}

impl AppController {
    pub fn new(config: &Config, icons: BrandIconResolver, req_tx: mpsc::Sender<Request>) -> Self {
        Self {
            ui_app: UIApp::new(
                config.tiles.clone(),
                config.radius_km,
                config.radius_options.clone(),
            ),
            icons,
            req_tx,
            in_flight: None,
            next_search_id: 0,
            last_search: None,
            limit: config.limit,
            position_options: config.position_options,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    #[cfg(test)]
    pub fn last_search(&self) -> Option<SearchRequest> {
        self.last_search
    }

    #[cfg(test)]
    pub fn radius_km(&self) -> u32 {
        self.ui_app.radius_km
    }

    pub fn should_quit(&self) -> bool {
        self.ui_app.should_quit
    }

    /// Returns true when quit was requested.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Char('Q') => {
                self.ui_app.quit();
                return true;
            }
            KeyCode::Tab => self.ui_app.toggle_focus(),
            KeyCode::Char('g') | KeyCode::Char('G') => {
                self.handle_geolocate();
            }
            KeyCode::Char('[') => self.step_radius(-1),
            KeyCode::Char(']') => self.step_radius(1),
            KeyCode::Char('+') | KeyCode::Char('=') => self.ui_app.map.viewport.zoom_in(),
            KeyCode::Char('-') => self.ui_app.map.viewport.zoom_out(),
            KeyCode::Char('c') | KeyCode::Char('C') => self.ui_app.center_crosshair(),
            KeyCode::Char('m') | KeyCode::Char('M') => self.toggle_monochrome(),
            KeyCode::Char('p') | KeyCode::Char('P') => {
                self.ui_app.panel.toggle_visibility();
                if !self.ui_app.panel.is_visible() {
                    self.ui_app.focus = Focus::Map;
                }
            }
            code => match self.ui_app.focus {
                Focus::Map => self.handle_map_key(code),
                Focus::Panel => self.handle_panel_key(code),
            },
        }
        false
    }

    fn handle_map_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up => self.ui_app.move_crosshair(0, -1),
            KeyCode::Down => self.ui_app.move_crosshair(0, 1),
            KeyCode::Left => self.ui_app.move_crosshair(-1, 0),
            KeyCode::Right => self.ui_app.move_crosshair(1, 0),
            KeyCode::Enter => {
                let coord = self.ui_app.crosshair_coordinate();
                self.handle_map_click(coord);
            }
            _ => {}
        }
    }

    fn handle_panel_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up => self.ui_app.panel.select_previous(),
            KeyCode::Down => self.ui_app.panel.select_next(),
            KeyCode::Enter => {
                if let Some(index) = self.ui_app.panel.selected_index() {
                    self.handle_station_selected(index);
                }
            }
            _ => {}
        }
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        if mouse.kind == MouseEventKind::Down(MouseButton::Left) {
            if let Some(index) = self.ui_app.panel_row_at(mouse.column, mouse.row) {
                self.ui_app.focus = Focus::Panel;
                self.ui_app.panel.select(index);
                self.handle_station_selected(index);
                return;
            }
        }

        let Some(cell) = self.ui_app.map_cell_at(mouse.column, mouse.row) else {
            return;
        };
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.ui_app.crosshair = cell;
                let coord = self.ui_app.map.viewport.cell_to_coordinate(cell.0, cell.1);
                self.handle_map_click(coord);
            }
            MouseEventKind::ScrollUp => self.ui_app.map.viewport.zoom_in(),
            MouseEventKind::ScrollDown => self.ui_app.map.viewport.zoom_out(),
            _ => {}
        }
    }

    /// Starts a search at a clicked point. Returns false if one is already running.
    pub fn handle_map_click(&mut self, coord: Coordinate) -> bool {
        debug!("Map clicked at: {}", coord);
        let Some(search_id) = self.begin(SearchKind::MapClick) else {
            return false;
        };

        self.ui_app.map.clear();
        self.ui_app.panel.render(PanelView::Loading);
        self.ui_app.map.set_origin(coord, OriginKind::ManualClick);
        self.dispatch_search(search_id, coord, self.ui_app.radius_km);
        true
    }

    /// Asks for the current position; the search follows once it arrives.
    pub fn handle_geolocate(&mut self) -> bool {
        let Some(search_id) = self.begin(SearchKind::Geolocate) else {
            return false;
        };

        self.ui_app.is_locating = true;
        let request = Request::Locate {
            search_id,
            options: self.position_options,
        };
        if let Err(e) = self.req_tx.try_send(request) {
            error!("Could not request location: {}", e);
            self.fail(FETCH_FAILED_MESSAGE);
        }
        true
    }

    /// Stores the new radius and re-runs the last search with it when possible.
    pub fn handle_radius_change(&mut self, radius_km: u32) -> bool {
        info!("Search radius changed to: {} km", radius_km);
        self.ui_app.radius_km = radius_km;

        let Some(last) = self.last_search else {
            debug!("No previous search - radius will be used for next search");
            return false;
        };
        let Some(search_id) = self.begin(SearchKind::RadiusReplay { radius_km }) else {
            return false;
        };

        debug!(
            "Re-searching at ({}) with new radius: {} km",
            last.origin, radius_km
        );
        self.ui_app.is_replaying = true;
        self.ui_app.panel.render(PanelView::Loading);
        // The origin marker stays put on a radius change; only station markers go.
        self.ui_app.map.clear_stations();
        self.send_search(
            search_id,
            SearchRequest {
                origin: last.origin,
                radius_km,
            },
        );
        true
    }

    /// Centers the map on a result row's station and opens its popup.
    pub fn handle_station_selected(&mut self, index: usize) {
        let Some(station) = self.ui_app.panel.station_at(index) else {
            return;
        };
        let (id, location) = (station.id.clone(), station.location);

        self.ui_app.map.viewport.set_view(location, STATION_ZOOM);
        self.ui_app.center_crosshair();
        if !self.ui_app.map.open_popup(&id) {
            warn!("No marker for station {}", id);
        }
    }

    /// Swaps marker colours; cached icons are rebuilt for the markers on screen.
    fn toggle_monochrome(&mut self) {
        let monochrome = !self.icons.is_monochrome();
        debug!("Monochrome markers: {}", monochrome);
        self.icons.set_monochrome(monochrome);
        self.ui_app.map.refresh_icons(&mut self.icons);
    }

    fn step_radius(&mut self, step: i32) {
        let options = &self.ui_app.radius_options;
        if options.is_empty() {
            return;
        }
        let current = options
            .iter()
            .position(|&r| r == self.ui_app.radius_km)
            .unwrap_or(0) as i32;
        let next = (current + step).clamp(0, options.len() as i32 - 1) as usize;
        let radius_km = options[next];
        if radius_km != self.ui_app.radius_km {
            self.handle_radius_change(radius_km);
        }
    }

    pub fn process_response(&mut self, resp: Response) {
        match resp {
            Response::Located { search_id, result } => {
                if !self.is_current(search_id) {
                    debug!("Ignoring stale location response {}", search_id);
                    return;
                }
                self.ui_app.is_locating = false;
                match result {
                    Ok(position) => {
                        info!("User location: {}", position);
                        self.ui_app.map.clear();
                        self.ui_app.panel.render(PanelView::Loading);
                        self.ui_app.map.viewport.set_view(position, LOCATE_ZOOM);
                        self.ui_app.center_crosshair();
                        self.ui_app
                            .map
                            .set_origin(position, OriginKind::DetectedLocation);
                        self.dispatch_search(search_id, position, self.ui_app.radius_km);
                    }
                    Err(e) => {
                        warn!("Geolocation error: {}", e);
                        self.fail(geolocation_message(e));
                    }
                }
            }
            Response::SearchCompleted {
                search_id,
                request,
                result,
            } => {
                if !self.is_current(search_id) {
                    debug!("Ignoring stale search response {}", search_id);
                    return;
                }
                match result {
                    Ok(stations) => self.complete(request, stations),
                    Err(e) => self.search_failed(e),
                }
            }
        }
    }

    /// Check-and-set of the busy flag; `None` means the trigger is dropped.
    fn begin(&mut self, kind: SearchKind) -> Option<u64> {
        if let Some(current) = self.in_flight {
            debug!(
                "Search already in progress ({:?}), dropping {:?}",
                current.kind, kind
            );
            return None;
        }
        self.next_search_id += 1;
        let id = self.next_search_id;
        self.in_flight = Some(InFlight { id, kind });
        self.ui_app.is_searching = true;
        self.ui_app.status_message.clear();
        Some(id)
    }

    fn is_current(&self, search_id: u64) -> bool {
        self.in_flight.is_some_and(|f| f.id == search_id)
    }

    fn dispatch_search(&mut self, search_id: u64, origin: Coordinate, radius_km: u32) {
        let request = SearchRequest { origin, radius_km };
        self.last_search = Some(request);
        self.send_search(search_id, request);
    }

    fn send_search(&mut self, search_id: u64, request: SearchRequest) {
        let message = Request::Search {
            search_id,
            request,
            limit: self.limit,
        };
        if let Err(e) = self.req_tx.try_send(message) {
            error!("Could not send search request: {}", e);
            self.fail(FETCH_FAILED_MESSAGE);
        }
    }

    fn complete(&mut self, request: SearchRequest, stations: Vec<Station>) {
        info!(
            "Found {} stations within {} km",
            stations.len(),
            request.radius_km
        );
        self.ui_app
            .map
            .show_stations(&stations, &mut self.icons);
        self.ui_app
            .panel
            .render(PanelView::from_outcome(stations, request.radius_km));

        if let Some(InFlight {
            kind: SearchKind::RadiusReplay { radius_km },
            ..
        }) = self.in_flight
        {
            if let Some(last) = self.last_search.as_mut() {
                last.radius_km = radius_km;
            }
        }
        self.finish();
    }

    fn search_failed(&mut self, err: QueryError) {
        error!("Search failed: {}", err);
        self.fail(FETCH_FAILED_MESSAGE);
    }

    fn fail(&mut self, message: &str) {
        self.ui_app.panel.render(PanelView::Error {
            message: message.to_string(),
        });
        self.ui_app.status_message = message.to_string();
        self.finish();
    }

    /// Releases the busy flag; every completion path ends here.
    fn finish(&mut self) {
        self.in_flight = None;
        self.ui_app.is_searching = false;
        self.ui_app.is_locating = false;
        self.ui_app.is_replaying = false;
    }
}
