//! Dashboard controller.
//!
//! The controller owns all view state and is driven by a single event loop
//! task. Refreshes run on a spawned task; their progress and completion come
//! back as [`AppEvent`]s through an unbounded queue that only the loop
//! drains, so view state is never touched from another thread.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind};
use futures::{Stream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::state::{read_state, Aggregator};
use super::ui;
use crate::analysis::git::{CommitReader, GitReader};
use crate::config::DashboardConfig;
use crate::types::{display_path, RefreshProgress, RefreshSummary};
use crate::utils::progress_bar;

/// Width of the progress bar in the status line.
const STATUS_BAR_WIDTH: usize = 20;

/// Panels shown on the right-hand side of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Overview,
    Commits,
    Authors,
    Timeline,
}

impl Panel {
    pub const ALL: [Panel; 4] = [
        Panel::Overview,
        Panel::Commits,
        Panel::Authors,
        Panel::Timeline,
    ];

    pub fn index(self) -> usize {
        match self {
            Panel::Overview => 0,
            Panel::Commits => 1,
            Panel::Authors => 2,
            Panel::Timeline => 3,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Panel::Overview => "Overview",
            Panel::Commits => "Commits",
            Panel::Authors => "Authors",
            Panel::Timeline => "Timeline",
        }
    }

    fn from_key(c: char) -> Option<Panel> {
        match c {
            '1' => Some(Panel::Overview),
            '2' => Some(Panel::Commits),
            '3' => Some(Panel::Authors),
            '4' => Some(Panel::Timeline),
            _ => None,
        }
    }
}

/// Which part of the dashboard receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    RepoList,
    Panel,
}

/// Scroll position and sort order of one panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelView {
    pub scroll: u16,
    pub sort_ascending: bool,
}

/// A dialog that captures all input until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    /// Editable target path of an export
    ExportPrompt { path: String },
    /// Result of an export
    Notice { message: String, is_error: bool },
}

/// Messages delivered from background work to the event loop.
#[derive(Debug)]
pub enum AppEvent {
    Progress(RefreshProgress),
    RefreshFinished(Result<RefreshSummary, String>),
}

/// View state owned by the event loop.
#[derive(Debug, Clone)]
pub struct ViewState {
    /// Repository list as of the last completed refresh
    pub repos: Vec<PathBuf>,
    pub selected: Option<usize>,
    pub focus: Focus,
    pub active: Panel,
    pub panels: [PanelView; 4],
    pub auto_refresh: bool,
    pub modal: Option<Modal>,
    pub status: String,
    pub refreshing: bool,
    /// A refresh was requested while one was running
    pub refresh_pending: bool,
    pub should_quit: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        let mut panels = [PanelView::default(); 4];
        panels[Panel::Timeline.index()].sort_ascending = true;
        Self {
            repos: Vec::new(),
            selected: None,
            focus: Focus::Panel,
            active: Panel::Overview,
            panels,
            auto_refresh: false,
            modal: None,
            status: "Idle".to_string(),
            refreshing: false,
            refresh_pending: false,
            should_quit: false,
        }
    }
}

impl ViewState {
    pub fn panel(&self, panel: Panel) -> &PanelView {
        &self.panels[panel.index()]
    }

    fn panel_mut(&mut self, panel: Panel) -> &mut PanelView {
        &mut self.panels[panel.index()]
    }

    pub fn selected_repo(&self) -> Option<&Path> {
        self.selected
            .and_then(|i| self.repos.get(i))
            .map(PathBuf::as_path)
    }
}

/// Format the status line for a progress update.
pub fn format_progress(progress: &RefreshProgress) -> String {
    format!(
        "Analyzing {} {} {}% ({}/{})",
        display_path(&progress.repo),
        progress_bar(progress.processed, progress.total, STATUS_BAR_WIDTH),
        progress.percent_complete(),
        progress.processed,
        progress.total
    )
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Drives the aggregator and owns everything the dashboard renders.
pub struct Controller<R: CommitReader = GitReader> {
    aggregator: Arc<Aggregator<R>>,
    config: DashboardConfig,
    pub view: ViewState,
    /// Rendered panel text, rebuilt only when the panels need re-rendering
    panel_text: [Vec<String>; 4],
    panel_renders: u64,
    refreshes_started: u64,
    timer: Option<Interval>,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
}

impl<R: CommitReader + 'static> Controller<R> {
    pub fn new(aggregator: Arc<Aggregator<R>>, config: DashboardConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut controller = Self {
            aggregator,
            config,
            view: ViewState::default(),
            panel_text: Default::default(),
            panel_renders: 0,
            refreshes_started: 0,
            timer: None,
            events_tx,
            events_rx,
        };
        controller.render_panels();
        controller
    }

    pub fn aggregator(&self) -> &Arc<Aggregator<R>> {
        &self.aggregator
    }

    pub fn panel_text(&self, panel: Panel) -> &[String] {
        &self.panel_text[panel.index()]
    }

    /// Number of full panel re-renders so far.
    pub fn panel_renders(&self) -> u64 {
        self.panel_renders
    }

    /// Number of refresh cycles launched so far.
    pub fn refreshes_started(&self) -> u64 {
        self.refreshes_started
    }

    /// Run the event loop until quit or until `input` ends.
    ///
    /// `draw` is called before waiting for each event. An initial refresh is
    /// started immediately.
    pub async fn run<S, D>(&mut self, mut input: S, mut draw: D) -> io::Result<()>
    where
        S: Stream<Item = io::Result<Event>> + Unpin,
        D: FnMut(&Self) -> io::Result<()>,
    {
        self.request_refresh();

        loop {
            draw(self)?;
            if self.view.should_quit {
                break;
            }

            tokio::select! {
                maybe_event = input.next() => match maybe_event {
                    Some(Ok(Event::Key(key))) => self.handle_key(key),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
                Some(event) = self.events_rx.recv() => {
                    self.handle_app_event(event);
                    // One frame per backlog, not per commit
                    self.drain_events();
                }
                _ = next_tick(&mut self.timer) => {
                    debug!("Auto-refresh timer fired");
                    self.request_refresh();
                }
            }
        }

        Ok(())
    }

    /// Start a refresh on a background task, or queue one if already running.
    pub fn request_refresh(&mut self) {
        if self.view.refreshing {
            self.view.refresh_pending = true;
            return;
        }

        self.view.refreshing = true;
        self.view.status = "Analyzing...".to_string();
        self.refreshes_started += 1;

        let aggregator = Arc::clone(&self.aggregator);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let progress_tx = tx.clone();
            let result = aggregator
                .refresh(move |progress| {
                    let _ = progress_tx.send(AppEvent::Progress(progress));
                })
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(AppEvent::RefreshFinished(result));
        });
    }

    /// Handle every event already queued, without waiting. Returns how many
    /// were handled.
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_app_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_app_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Progress(progress) => {
                // Status line only; panels keep their rendered text
                if self.view.refreshing {
                    self.view.status = format_progress(&progress);
                }
            }
            AppEvent::RefreshFinished(result) => {
                self.view.refreshing = false;
                match result {
                    Ok(summary) => self.finish_refresh(&summary),
                    Err(e) => {
                        warn!("Refresh failed: {}", e);
                        self.view.status = format!("Refresh failed: {}", e);
                    }
                }
                if self.view.refresh_pending {
                    self.view.refresh_pending = false;
                    self.request_refresh();
                }
            }
        }
    }

    fn finish_refresh(&mut self, summary: &RefreshSummary) {
        let previous = self.view.selected_repo().map(Path::to_path_buf);
        let state = self.aggregator.state();
        self.view.repos = read_state(&state).repos.clone();

        self.view.selected = previous
            .and_then(|p| self.view.repos.iter().position(|r| *r == p))
            .or(if self.view.repos.is_empty() { None } else { Some(0) });
        self.view.focus = Focus::Panel;
        self.view.status = if summary.failures.is_empty() {
            "Idle".to_string()
        } else {
            format!("Idle ({} repositories failed)", summary.failures.len())
        };
        self.render_panels();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if self.view.modal.is_some() {
            self.handle_modal_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.view.should_quit = true,
            KeyCode::Tab | KeyCode::Esc => {
                if self.view.focus == Focus::RepoList {
                    self.view.focus = Focus::Panel;
                }
            }
            KeyCode::Char('r') => {
                self.view.focus = match self.view.focus {
                    Focus::RepoList => Focus::Panel,
                    Focus::Panel => Focus::RepoList,
                };
            }
            KeyCode::Char('R') => self.request_refresh(),
            KeyCode::Char(c @ '1'..='4') => {
                if let Some(panel) = Panel::from_key(c) {
                    self.view.active = panel;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.move_down(),
            KeyCode::Enter => {
                if self.view.focus == Focus::RepoList {
                    if let Some(index) = self.view.selected {
                        self.select_repo(index);
                    }
                    self.view.focus = Focus::Panel;
                }
            }
            KeyCode::Char('s') => self.toggle_sort(),
            KeyCode::Char('a') => self.toggle_auto_refresh(),
            KeyCode::Char('e') => {
                let path = self.config.default_export_path();
                self.view.modal = Some(Modal::ExportPrompt {
                    path: display_path(&path),
                });
            }
            _ => {}
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) {
        let Some(modal) = self.view.modal.as_mut() else {
            return;
        };

        match modal {
            Modal::ExportPrompt { path } => match key.code {
                KeyCode::Enter => {
                    let target = path.trim().to_string();
                    self.export(target);
                }
                KeyCode::Esc => self.view.modal = None,
                KeyCode::Backspace => {
                    path.pop();
                }
                KeyCode::Char(c) => path.push(c),
                _ => {}
            },
            Modal::Notice { .. } => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                    self.view.modal = None;
                }
            }
        }
    }

    fn export(&mut self, target: String) {
        let path = if target.is_empty() {
            self.config.default_export_path()
        } else {
            PathBuf::from(target)
        };

        self.view.modal = Some(match self.aggregator.export_to(&path) {
            Ok(()) => {
                self.view.status = format!("Exported: {}", path.display());
                Modal::Notice {
                    message: format!("Saved to {}", path.display()),
                    is_error: false,
                }
            }
            Err(e) => {
                warn!("Export to {} failed: {}", path.display(), e);
                Modal::Notice {
                    message: format!("Export failed: {}", e),
                    is_error: true,
                }
            }
        });
    }

    /// Start or stop the auto-refresh timer. The first tick comes one full
    /// interval after enabling; disabling drops the timer.
    pub fn toggle_auto_refresh(&mut self) {
        self.set_auto_refresh(!self.view.auto_refresh);
    }

    pub fn set_auto_refresh(&mut self, enabled: bool) {
        if enabled == self.view.auto_refresh {
            return;
        }
        self.view.auto_refresh = enabled;
        self.timer = if enabled {
            let period = self.config.refresh_interval;
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(timer)
        } else {
            None
        };
        info!("Auto-refresh {}", if enabled { "enabled" } else { "disabled" });
    }

    fn move_up(&mut self) {
        match self.view.focus {
            Focus::RepoList => {
                if let Some(index) = self.view.selected {
                    if index > 0 {
                        self.select_repo(index - 1);
                    }
                }
            }
            Focus::Panel => {
                let view = self.view.panel_mut(self.view.active);
                view.scroll = view.scroll.saturating_sub(1);
            }
        }
    }

    fn move_down(&mut self) {
        match self.view.focus {
            Focus::RepoList => {
                let next = self.view.selected.map_or(0, |i| i + 1);
                if next < self.view.repos.len() {
                    self.select_repo(next);
                }
            }
            Focus::Panel => {
                let active = self.view.active;
                let max = self.panel_text[active.index()].len().saturating_sub(1);
                let max = u16::try_from(max).unwrap_or(u16::MAX);
                let view = self.view.panel_mut(active);
                view.scroll = view.scroll.saturating_add(1).min(max);
            }
        }
    }

    /// Select a repository, resetting every panel's scroll offset.
    pub fn select_repo(&mut self, index: usize) {
        if index >= self.view.repos.len() {
            return;
        }
        self.view.selected = Some(index);
        for view in &mut self.view.panels {
            view.scroll = 0;
        }
        self.render_panels();
    }

    fn toggle_sort(&mut self) {
        let active = self.view.active;
        if active == Panel::Overview {
            return;
        }
        let view = self.view.panel_mut(active);
        view.sort_ascending = !view.sort_ascending;
        self.render_panel(active);
    }

    fn render_panels(&mut self) {
        for panel in Panel::ALL {
            self.render_panel(panel);
        }
        self.panel_renders += 1;
    }

    fn render_panel(&mut self, panel: Panel) {
        let state = self.aggregator.state();
        let state = read_state(&state);
        let repo = self.view.selected_repo();
        let ascending = self.view.panel(panel).sort_ascending;

        let text = match (panel, repo) {
            (_, None) => vec!["No repository selected".to_string()],
            (Panel::Overview, Some(repo)) => ui::overview_lines(&state, repo),
            (Panel::Commits, Some(repo)) => ui::commit_lines(state.commits(repo), ascending),
            (Panel::Authors, Some(repo)) => ui::author_lines(state.statistics(repo), ascending),
            (Panel::Timeline, Some(repo)) => {
                ui::timeline_lines(state.statistics(repo), ascending)
            }
        };
        self.panel_text[panel.index()] = text;
    }

    /// Handle queued background events until no refresh is running.
    #[cfg(test)]
    pub(crate) async fn settle(&mut self) {
        while self.view.refreshing {
            match self.events_rx.recv().await {
                Some(event) => self.handle_app_event(event),
                None => break,
            }
        }
    }
}
