//! Results panel: one of loading, error, empty or a station list.

use ratatui::widgets::ListState;

use crate::api::Station;

pub const LOADING_TEXT: &str = "Searching for stations...";

/// Terminal lines taken by one result row, blank separator included.
pub const ROW_HEIGHT: u16 = 5;

/// What the panel shows. Every render replaces the previous view wholesale.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelView {
    Idle,
    Loading,
    Error { message: String },
    Empty { radius_km: u32 },
    Results { stations: Vec<Station>, radius_km: u32 },
}

impl PanelView {
    /// Results for a completed query, or the empty view when nothing came back.
    pub fn from_outcome(stations: Vec<Station>, radius_km: u32) -> Self {
        if stations.is_empty() {
            Self::Empty { radius_km }
        } else {
            Self::Results {
                stations,
                radius_km,
            }
        }
    }
}

pub fn results_header(count: usize, radius_km: u32) -> String {
    format!(
        "Found {} station{} within {} km",
        count,
        if count == 1 { "" } else { "s" },
        radius_km
    )
}

/// Name, brand, address and distance lines of one result row.
pub fn row_lines(station: &Station) -> [String; 4] {
    [
        station.display_name().to_string(),
        station.display_brand().to_string(),
        station.display_address().to_string(),
        station.distance_label(),
    ]
}

#[derive(Debug)]
pub struct ResultsPanel {
    view: PanelView,
    pub list_state: ListState,
    visible: bool,
}

impl Default for ResultsPanel {
    fn default() -> Self {
        Self {
            view: PanelView::Idle,
            list_state: ListState::default(),
            visible: true,
        }
    }
}

impl ResultsPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, view: PanelView) {
        let first_row = match &view {
            PanelView::Results { .. } => Some(0),
            _ => None,
        };
        self.view = view;
        self.list_state.select(first_row);
    }

    pub fn view(&self) -> &PanelView {
        &self.view
    }

    pub fn stations(&self) -> &[Station] {
        match &self.view {
            PanelView::Results { stations, .. } => stations,
            _ => &[],
        }
    }

    pub fn station_at(&self, index: usize) -> Option<&Station> {
        self.stations().get(index)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.list_state
            .selected()
            .filter(|&i| i < self.stations().len())
    }

    #[cfg(test)]
    pub fn selected_station(&self) -> Option<&Station> {
        self.selected_index().and_then(|i| self.station_at(i))
    }

    pub fn select(&mut self, index: usize) {
        if index < self.stations().len() {
            self.list_state.select(Some(index));
        }
    }

    /// Row drawn `line` lines below the top of the list, given the current scroll.
    pub fn row_at(&self, line: u16) -> Option<usize> {
        let index = self.list_state.offset() + usize::from(line / ROW_HEIGHT);
        (index < self.stations().len()).then_some(index)
    }

    pub fn select_next(&mut self) {
        let len = self.stations().len();
        if len > 0 {
            let next = self.selected_index().map_or(0, |i| (i + 1) % len);
            self.list_state.select(Some(next));
        }
    }

    pub fn select_previous(&mut self) {
        let len = self.stations().len();
        if len > 0 {
            let prev = match self.selected_index() {
                Some(0) | None => len - 1,
                Some(i) => i - 1,
            };
            self.list_state.select(Some(prev));
        }
    }

    /// Header line for the results view.
    pub fn header(&self) -> Option<String> {
        match &self.view {
            PanelView::Results {
                stations,
                radius_km,
            } => Some(results_header(stations.len(), *radius_km)),
            _ => None,
        }
    }

    /// Text of the non-list views.
    pub fn message_lines(&self) -> Vec<String> {
        match &self.view {
            PanelView::Idle => vec![
                "Click on the map to search for nearby stations.".to_string(),
                "Press g to search around your location.".to_string(),
            ],
            PanelView::Loading => vec![LOADING_TEXT.to_string()],
            PanelView::Error { message } => vec![format!("⚠ {}", message)],
            PanelView::Empty { radius_km } => vec![
                format!("No stations found within {} km.", radius_km),
                "Try increasing the search radius.".to_string(),
            ],
            PanelView::Results { .. } => Vec::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn toggle_visibility(&mut self) {
        self.visible = !self.visible;
    }
}
