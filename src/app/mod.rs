//! Application layer: shared analysis state, the dashboard controller and
//! its terminal rendering.

pub mod controller;
pub mod state;
pub mod ui;

#[cfg(test)]
pub(crate) mod test_support;
#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use crossterm::{
    event::EventStream,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use tracing::info;

pub use controller::{AppEvent, Controller, Focus, Modal, Panel, ViewState};
pub use state::{read_state, Aggregator, AppState, RefreshObserver, SharedState};

use crate::config::{DashboardConfig, ExtractOptions};

/// Run the interactive dashboard until the user quits.
pub async fn run_dashboard(config: DashboardConfig, options: ExtractOptions) -> Result<()> {
    let aggregator = Arc::new(Aggregator::new(config.root.clone(), options));
    let mut controller = Controller::new(aggregator, config);

    enable_raw_mode().context("failed enabling raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed entering alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed creating terminal")?;
    terminal.clear().ok();

    info!("Dashboard started");
    let result = controller
        .run(EventStream::new(), |c| {
            terminal.draw(|f| ui::draw(f, c)).map(|_| ())
        })
        .await;

    // Restore terminal
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    result.context("dashboard event loop failed")
}
