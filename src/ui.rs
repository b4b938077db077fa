use crate::{
    api::Coordinate,
    config::TileConfig,
    markers::MapMarkerLayer,
    panel::{row_lines, PanelView, ResultsPanel, ROW_HEIGHT},
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span, Text},
    widgets::{
        canvas::{Canvas, Map, MapResolution},
        Block, Borders, Clear, List, ListItem, Paragraph, Wrap,
    },
    Frame,
};

// Layout constants for better maintainability
const HEADER_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 4;
const STATUS_HEIGHT: u16 = 3;
const PANEL_WIDTH: u16 = 44;
const MARGIN: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Map,
    Panel,
}

pub struct UIState {
    pub map: MapMarkerLayer,
    pub panel: ResultsPanel,
    pub tiles: TileConfig,
    pub radius_km: u32,
    pub radius_options: Vec<u32>,
    pub focus: Focus,
    /// Crosshair cell inside the map area
    pub crosshair: (u16, u16),
    /// Inner map area from the last draw, used to map mouse clicks
    pub map_area: Rect,
    /// Result list area from the last draw; empty unless results are shown
    pub panel_list_area: Rect,
    // Status and loading flags
    pub status_message: String,
    pub is_searching: bool,
    pub is_locating: bool,
    pub is_replaying: bool,
    pub should_quit: bool,
}

impl UIState {
    pub fn new(tiles: TileConfig, radius_km: u32, radius_options: Vec<u32>) -> Self {
        let map = MapMarkerLayer::new();
        let (width, height) = map.viewport.size();

        Self {
            map,
            panel: ResultsPanel::new(),
            tiles,
            radius_km,
            radius_options,
            focus: Focus::Map,
            crosshair: (width / 2, height / 2),
            map_area: Rect::default(),
            panel_list_area: Rect::default(),
            status_message: String::new(),
            is_searching: false,
            is_locating: false,
            is_replaying: false,
            should_quit: false,
        }
    }

    pub fn crosshair_coordinate(&self) -> Coordinate {
        self.map
            .viewport
            .cell_to_coordinate(self.crosshair.0, self.crosshair.1)
    }

    /// Moves the crosshair, panning the map when it would leave the view.
    pub fn move_crosshair(&mut self, dx: i32, dy: i32) {
        let (width, height) = self.map.viewport.size();
        let col = self.crosshair.0 as i32 + dx;
        let row = self.crosshair.1 as i32 + dy;

        let pan_x = if col < 0 {
            col
        } else if col >= width as i32 {
            col - (width as i32 - 1)
        } else {
            0
        };
        let pan_y = if row < 0 {
            -row
        } else if row >= height as i32 {
            (height as i32 - 1) - row
        } else {
            0
        };
        if pan_x != 0 || pan_y != 0 {
            self.map.viewport.pan(pan_x, pan_y);
        }

        self.crosshair = (
            col.clamp(0, width as i32 - 1) as u16,
            row.clamp(0, height as i32 - 1) as u16,
        );
    }

    pub fn center_crosshair(&mut self) {
        let (width, height) = self.map.viewport.size();
        self.crosshair = (width / 2, height / 2);
    }

    /// Map cell under a terminal position, if it lies on the map.
    pub fn map_cell_at(&self, column: u16, row: u16) -> Option<(u16, u16)> {
        let area = self.map_area;
        is_inside(area, column, row).then(|| (column - area.x, row - area.y))
    }

    /// Result row under a terminal position, if one is drawn there.
    pub fn panel_row_at(&self, column: u16, row: u16) -> Option<usize> {
        let area = self.panel_list_area;
        if !is_inside(area, column, row) {
            return None;
        }
        self.panel.row_at(row - area.y)
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Map if self.panel.is_visible() => Focus::Panel,
            _ => Focus::Map,
        };
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn is_inside(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.x + area.width && row >= area.y && row < area.y + area.height
}

pub fn render_ui(f: &mut Frame, app: &mut UIState) {
    app.panel_list_area = Rect::default();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(MARGIN)
        .constraints([
            Constraint::Length(HEADER_HEIGHT), // Title and current search
            Constraint::Min(10),               // Map and results
            Constraint::Length(STATUS_HEIGHT), // Status bar
            Constraint::Length(FOOTER_HEIGHT), // Controls and radius selector
        ])
        .split(f.area());

    render_header(f, chunks[0], app);

    if app.panel.is_visible() {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(30), Constraint::Length(PANEL_WIDTH)])
            .split(chunks[1]);
        render_map(f, body[0], app);
        render_panel(f, body[1], app);
    } else {
        render_map(f, chunks[1], app);
    }

    render_status(f, chunks[2], app);
    render_footer(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &UIState) {
    let search = match app.map.origin() {
        Some(origin) => Span::styled(
            format!(
                "{} ({}) • {} km",
                origin.kind.label(),
                origin.position,
                app.radius_km
            ),
            Style::default().fg(Color::Cyan),
        ),
        None => Span::styled(
            "Click the map to search for nearby stations",
            Style::default().fg(Color::Gray),
        ),
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Gas Station Finder ",
            Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("• ", Style::default().fg(Color::Gray)),
        search,
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)),
    );

    f.render_widget(header, area);
}

fn render_map(f: &mut Frame, area: Rect, app: &mut UIState) {
    let border_color = if app.focus == Focus::Map {
        Color::Yellow
    } else {
        Color::Gray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(
            "Map • zoom {} ({}-{})",
            app.map.viewport.zoom(),
            app.tiles.min_zoom,
            app.tiles.max_zoom
        ))
        .title_bottom(Line::from(app.tiles.attribution.clone()).right_aligned());

    let inner = block.inner(area);
    app.map_area = inner;
    app.map.viewport.resize(inner.width, inner.height);
    let (width, height) = app.map.viewport.size();
    app.crosshair = (
        app.crosshair.0.min(width.saturating_sub(1)),
        app.crosshair.1.min(height.saturating_sub(1)),
    );

    let bounds = app.map.viewport.bounds();
    let crosshair = app.crosshair_coordinate();
    let show_crosshair = app.focus == Focus::Map;
    let map = &app.map;

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([bounds.west, bounds.east])
        .y_bounds([bounds.south, bounds.north])
        .paint(|ctx| {
            ctx.draw(&Map {
                color: Color::DarkGray,
                resolution: MapResolution::High,
            });
            ctx.layer();

            for marker in map.station_markers() {
                ctx.print(
                    marker.position.longitude,
                    marker.position.latitude,
                    Span::styled(
                        marker.icon.glyph.to_string(),
                        Style::default()
                            .fg(marker.icon.color)
                            .add_modifier(Modifier::BOLD),
                    ),
                );
            }
            if let Some(origin) = map.origin() {
                ctx.print(
                    origin.position.longitude,
                    origin.position.latitude,
                    Span::styled(
                        "@",
                        Style::default()
                            .fg(Color::LightBlue)
                            .add_modifier(Modifier::BOLD),
                    ),
                );
            }
            if show_crosshair {
                ctx.print(
                    crosshair.longitude,
                    crosshair.latitude,
                    Span::styled("+", Style::default().fg(Color::White)),
                );
            }
        });
    f.render_widget(canvas, area);

    if let Some(lines) = map.popup_lines() {
        render_popup(f, inner, lines);
    }
}

fn render_popup(f: &mut Frame, map_area: Rect, lines: Vec<String>) {
    let content_width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u16;
    let width = (content_width + 2).min(map_area.width);
    let height = (lines.len() as u16 + 2).min(map_area.height);
    if width < 3 || height < 3 {
        return;
    }
    let area = Rect {
        x: map_area.x,
        y: map_area.y + map_area.height - height,
        width,
        height,
    };

    let text: Vec<Line> = lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                Line::from(Span::styled(line, Style::default().add_modifier(Modifier::BOLD)))
            } else {
                Line::from(line)
            }
        })
        .collect();

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(Text::from(text)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightBlue)),
        ),
        area,
    );
}

fn render_panel(f: &mut Frame, area: Rect, app: &mut UIState) {
    let border_color = if app.focus == Focus::Panel {
        Color::Yellow
    } else {
        Color::Gray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title("Results");

    if !matches!(app.panel.view(), PanelView::Results { .. }) {
        let lines: Vec<Line> = app
            .panel
            .message_lines()
            .into_iter()
            .map(Line::from)
            .collect();
        let style = match app.panel.view() {
            PanelView::Error { .. } => Style::default().fg(Color::Red),
            _ => Style::default().fg(Color::White),
        };
        let paragraph = Paragraph::new(Text::from(lines))
            .style(style)
            .wrap(Wrap { trim: true })
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let inner = block.inner(area);
    f.render_widget(block, area);
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    let row_width = parts[1].width.saturating_sub(3) as usize;
    let items: Vec<ListItem> = app
        .panel
        .stations()
        .iter()
        .map(|station| {
            let [name, brand, address, distance] = row_lines(station);
            ListItem::new(vec![
                Line::from(Span::styled(
                    truncate_string(&name, row_width),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    truncate_string(&brand, row_width),
                    Style::default().fg(Color::Cyan),
                )),
                Line::from(Span::styled(
                    truncate_string(&address, row_width),
                    Style::default().fg(Color::Gray),
                )),
                Line::from(Span::styled(distance, Style::default().fg(Color::Green))),
                Line::from(""),
            ])
        })
        .collect();

    let header = Paragraph::new(app.panel.header().unwrap_or_default())
        .style(Style::default().fg(Color::White));
    f.render_widget(header, parts[0]);

    let list = List::new(items)
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    app.panel_list_area = parts[1];
    f.render_stateful_widget(list, parts[1], &mut app.panel.list_state);
}

fn render_footer(f: &mut Frame, area: Rect, app: &UIState) {
    let locate = if app.is_locating {
        Span::styled("Locating... • ", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled("Locate me • ", Style::default().fg(Color::White))
    };

    let controls = Line::from(vec![
        Span::styled("ENTER/CLICK ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::styled("Search • ", Style::default().fg(Color::White)),
        Span::styled("G ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        locate,
        Span::styled("+/- ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::styled("Zoom • ", Style::default().fg(Color::White)),
        Span::styled("TAB ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::styled("Focus • ", Style::default().fg(Color::White)),
        Span::styled("P ", Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)),
        Span::styled("Panel • ", Style::default().fg(Color::White)),
        Span::styled("M ", Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)),
        Span::styled("Colors • ", Style::default().fg(Color::White)),
        Span::styled("Q ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::styled("Quit", Style::default().fg(Color::White)),
    ]);

    let mut radius = vec![
        Span::styled("[ ] ", Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        Span::styled("Radius: ", Style::default().fg(Color::White)),
    ];
    for option in &app.radius_options {
        let style = if *option == app.radius_km {
            let base = Style::default().fg(Color::Black).bg(Color::Magenta);
            if app.is_replaying {
                base.add_modifier(Modifier::DIM)
            } else {
                base.add_modifier(Modifier::BOLD)
            }
        } else {
            Style::default().fg(Color::Gray)
        };
        radius.push(Span::styled(format!(" {} km ", option), style));
        radius.push(Span::raw(" "));
    }

    let footer = Paragraph::new(Text::from(vec![controls, Line::from(radius)]))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Gray))
                .title("Controls"),
        );

    f.render_widget(footer, area);
}

fn render_status(f: &mut Frame, area: Rect, app: &UIState) {
    // Determine status text priority (owned String)
    let text = if app.is_locating {
        "Locating...".to_string()
    } else if app.is_replaying {
        format!("Updating results for {} km...", app.radius_km)
    } else if app.is_searching {
        "Searching for stations...".to_string()
    } else if !app.status_message.is_empty() {
        app.status_message.clone()
    } else {
        format!("Crosshair at {}", app.crosshair_coordinate())
    };

    let status = Paragraph::new(Text::from(Line::from(vec![Span::styled(
        text,
        Style::default().fg(Color::White),
    )])))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue))
            .title("Status"),
    );

    f.render_widget(status, area);
}

fn truncate_string(s: &str, max_len: usize) -> String {
    // Char-aware truncation to avoid breaking UTF-8 boundaries
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut truncated: String = s.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}
