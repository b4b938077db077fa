mod actions;
mod api;
mod app;
mod brands;
mod config;
mod geolocation;
mod markers;
mod panel;
mod ui;
mod utils;
mod worker;

use anyhow::{Context, Result};
use api::NearbyClient;
use app::AppController;
use brands::BrandIconResolver;
use clap::Parser;
use config::{Args, Config};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use log::{info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::File;
use std::io;
use tokio::sync::mpsc;

use crate::actions::Response;

const CHANNEL_CAPACITY: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args(Args::parse())?;
    init_logging(&config)?;
    info!("Gas Station Finder - Initializing...");

    let brand_table = config.load_brand_table()?;
    info!("Loaded {} brands", brand_table.len());
    let client = NearbyClient::new(config.client_config())
        .context("failed to create stations API client")?;
    info!("Using stations endpoint {}", client.endpoint());
    info!(
        "Tile source {} (subdomains {})",
        config.tiles.url_template, config.tiles.subdomains
    );
    let geolocator = config.geolocator()?;

    let (req_tx, req_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (resp_tx, resp_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let worker = worker::spawn(client, geolocator, req_rx, resp_tx);

    // Set up panic handler to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app_controller =
        AppController::new(&config, BrandIconResolver::new(brand_table), req_tx);
    info!("Application initialized successfully");

    // Run the main loop
    let res = run_app(&mut terminal, &mut app_controller, resp_rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if app_controller.is_busy() {
        info!("Quitting with a search in progress");
    }
    drop(app_controller);
    worker.shutdown().await;

    res
}

fn init_logging(config: &Config) -> Result<()> {
    let file = File::create(&config.log_file)
        .with_context(|| format!("failed to create log file {}", config.log_file.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app_controller: &mut AppController,
    mut resp_rx: mpsc::Receiver<Response>,
) -> Result<()> {
    let mut events = EventStream::new();

    loop {
        terminal.draw(|f| ui::render_ui(f, &mut app_controller.ui_app))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if app_controller.handle_key_event(key) {
                        break; // Quit was requested
                    }
                }
                Some(Ok(Event::Mouse(mouse))) => app_controller.handle_mouse_event(mouse),
                // Resizes are picked up by the next draw
                Some(Ok(_)) => {}
                Some(Err(e)) => warn!("Terminal event error: {}", e),
                None => break,
            },
            Some(response) = resp_rx.recv() => app_controller.process_response(response),
        }

        if app_controller.should_quit() {
            break;
        }
    }

    Ok(())
}
