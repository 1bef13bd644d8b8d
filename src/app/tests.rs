use super::controller::{format_progress, AppEvent, Controller, Focus, Modal, Panel};
use super::state::{read_state, Aggregator};
use super::test_support::{repo_tree, FakeReader};
use crate::config::{DashboardConfig, ExtractOptions};
use crate::types::RefreshProgress;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use futures::channel::mpsc as futures_mpsc;
use pretty_assertions::assert_eq;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn press(controller: &mut Controller<FakeReader>, keys: &str) {
    for c in keys.chars() {
        controller.handle_key(key(KeyCode::Char(c)));
    }
}

fn controller_for(
    names: &[&str],
    counts: &[(&str, usize)],
    config: impl FnOnce(&mut DashboardConfig),
) -> (TempDir, Vec<PathBuf>, Controller<FakeReader>) {
    let (temp_dir, repos) = repo_tree(names);
    let aggregator = Aggregator::with_reader(
        temp_dir.path(),
        FakeReader::new(counts),
        ExtractOptions::with_workers(2),
    );
    let mut dashboard = DashboardConfig::new(temp_dir.path());
    config(&mut dashboard);
    let controller = Controller::new(Arc::new(aggregator), dashboard);
    (temp_dir, repos, controller)
}

/// A controller whose first refresh has completed.
async fn loaded(names: &[&str]) -> (TempDir, Vec<PathBuf>, Controller<FakeReader>) {
    let counts: Vec<(&str, usize)> = names.iter().map(|n| (*n, 3)).collect();
    let (temp_dir, repos, mut controller) = controller_for(names, &counts, |_| {});
    controller.request_refresh();
    controller.settle().await;
    (temp_dir, repos, controller)
}

#[tokio::test]
async fn test_refresh_selects_first_repository() {
    let (_temp_dir, repos, controller) = loaded(&["alpha", "beta"]).await;

    assert_eq!(controller.view.repos, repos);
    assert_eq!(controller.view.selected, Some(0));
    assert_eq!(controller.view.status, "Idle");
    assert!(!controller.view.refreshing);
    assert_eq!(controller.panel_text(Panel::Commits).len(), 3);
}

#[tokio::test]
async fn test_refresh_reports_failed_repositories() {
    let (_temp_dir, _repos, mut controller) =
        controller_for(&["alpha", "broken"], &[("alpha", 2)], |_| {});
    controller.request_refresh();
    controller.settle().await;

    assert_eq!(controller.view.repos.len(), 2);
    assert_eq!(controller.view.status, "Idle (1 repositories failed)");
}

#[tokio::test]
async fn test_refresh_failure_sets_status() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("gone");
    let aggregator = Aggregator::with_reader(&root, FakeReader::new(&[]), ExtractOptions::default());
    let mut controller = Controller::new(Arc::new(aggregator), DashboardConfig::new(&root));

    controller.request_refresh();
    controller.settle().await;

    assert!(controller.view.status.starts_with("Refresh failed"));
    assert!(!controller.view.refreshing);
    assert_eq!(controller.view.selected, None);
}

#[tokio::test]
async fn test_selecting_repository_resets_every_scroll_offset() {
    let (_temp_dir, _repos, mut controller) = loaded(&["alpha", "beta"]).await;

    press(&mut controller, "2jj4jjj");
    assert_eq!(controller.view.panel(Panel::Commits).scroll, 2);
    assert_eq!(controller.view.panel(Panel::Timeline).scroll, 3);

    press(&mut controller, "rj");
    assert_eq!(controller.view.selected, Some(1));
    for panel in Panel::ALL {
        assert_eq!(controller.view.panel(panel).scroll, 0);
    }
}

#[tokio::test]
async fn test_scroll_stops_at_last_line() {
    let (_temp_dir, _repos, mut controller) = loaded(&["alpha"]).await;

    press(&mut controller, "2jjjjjj");
    assert_eq!(controller.view.panel(Panel::Commits).scroll, 2);
    press(&mut controller, "kkkk");
    assert_eq!(controller.view.panel(Panel::Commits).scroll, 0);
}

#[tokio::test]
async fn test_switching_panels_keeps_scroll_and_sort() {
    let (_temp_dir, _repos, mut controller) = loaded(&["alpha"]).await;

    press(&mut controller, "4jjs2j3s");
    assert_eq!(controller.view.active, Panel::Authors);

    let timeline = controller.view.panel(Panel::Timeline);
    assert_eq!(timeline.scroll, 2);
    assert!(!timeline.sort_ascending);

    let commits = controller.view.panel(Panel::Commits);
    assert_eq!(commits.scroll, 1);
    assert!(!commits.sort_ascending);

    assert!(controller.view.panel(Panel::Authors).sort_ascending);
    assert!(!controller.view.panel(Panel::Overview).sort_ascending);
}

#[tokio::test]
async fn test_sort_changes_rendering_only() {
    let (_temp_dir, _repos, mut controller) = loaded(&["alpha"]).await;
    let exported = controller.aggregator().export_json().unwrap();
    let before = controller.panel_text(Panel::Commits).to_vec();

    press(&mut controller, "2s");
    let mut after = controller.panel_text(Panel::Commits).to_vec();
    after.reverse();

    assert_eq!(after, before);
    assert_eq!(controller.aggregator().export_json().unwrap(), exported);
}

#[tokio::test]
async fn test_focus_routing() {
    let (_temp_dir, _repos, mut controller) = loaded(&["alpha", "beta"]).await;
    assert_eq!(controller.view.focus, Focus::Panel);

    press(&mut controller, "r");
    assert_eq!(controller.view.focus, Focus::RepoList);
    press(&mut controller, "j");
    assert_eq!(controller.view.selected, Some(1));
    assert_eq!(controller.view.panel(Panel::Overview).scroll, 0);

    controller.handle_key(key(KeyCode::Tab));
    assert_eq!(controller.view.focus, Focus::Panel);
    controller.handle_key(key(KeyCode::Esc));
    assert_eq!(controller.view.focus, Focus::Panel);

    press(&mut controller, "rk");
    assert_eq!(controller.view.selected, Some(0));
    controller.handle_key(key(KeyCode::Enter));
    assert_eq!(controller.view.focus, Focus::Panel);
    assert_eq!(controller.view.selected, Some(0));
}

#[tokio::test]
async fn test_modal_captures_every_key() {
    let (temp_dir, _repos, mut controller) = loaded(&["alpha"]).await;

    press(&mut controller, "e");
    let default_path = temp_dir.path().join("gitwatcher.json");
    assert_eq!(
        controller.view.modal,
        Some(Modal::ExportPrompt {
            path: default_path.to_string_lossy().into_owned()
        })
    );

    press(&mut controller, "q2R");
    assert!(!controller.view.should_quit);
    assert_eq!(controller.view.active, Panel::Overview);
    assert_eq!(controller.refreshes_started(), 1);
    match &controller.view.modal {
        Some(Modal::ExportPrompt { path }) => assert!(path.ends_with("gitwatcher.jsonq2R")),
        other => panic!("unexpected modal {:?}", other),
    }

    controller.handle_key(key(KeyCode::Esc));
    assert_eq!(controller.view.modal, None);
    assert!(!default_path.exists());

    press(&mut controller, "q");
    assert!(controller.view.should_quit);
}

#[tokio::test]
async fn test_export_writes_snapshot() {
    let (temp_dir, _repos, mut controller) = loaded(&["alpha", "beta"]).await;

    press(&mut controller, "e");
    controller.handle_key(key(KeyCode::Enter));

    let path = temp_dir.path().join("gitwatcher.json");
    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written.as_object().unwrap().len(), 2);
    assert!(matches!(
        controller.view.modal,
        Some(Modal::Notice { is_error: false, .. })
    ));

    press(&mut controller, "q");
    assert!(!controller.view.should_quit);
    controller.handle_key(key(KeyCode::Enter));
    assert_eq!(controller.view.modal, None);
}

#[tokio::test]
async fn test_export_empty_path_uses_default() {
    let (temp_dir, _repos, mut controller) = loaded(&["alpha"]).await;

    press(&mut controller, "e");
    let len = match &controller.view.modal {
        Some(Modal::ExportPrompt { path }) => path.chars().count(),
        _ => 0,
    };
    for _ in 0..len {
        controller.handle_key(key(KeyCode::Backspace));
    }
    controller.handle_key(key(KeyCode::Enter));

    assert!(temp_dir.path().join("gitwatcher.json").exists());
}

#[tokio::test]
async fn test_export_failure_shows_error() {
    let (temp_dir, _repos, mut controller) = loaded(&["alpha"]).await;

    press(&mut controller, "e");
    let len = match &controller.view.modal {
        Some(Modal::ExportPrompt { path }) => path.chars().count(),
        _ => 0,
    };
    for _ in 0..len {
        controller.handle_key(key(KeyCode::Backspace));
    }
    let target = temp_dir.path().join("missing").join("out.json");
    for c in target.to_string_lossy().chars() {
        controller.handle_key(key(KeyCode::Char(c)));
    }
    controller.handle_key(key(KeyCode::Enter));

    match &controller.view.modal {
        Some(Modal::Notice { message, is_error }) => {
            assert!(is_error);
            assert!(message.starts_with("Export failed"));
        }
        other => panic!("unexpected modal {:?}", other),
    }
    assert!(!target.exists());
}

#[tokio::test]
async fn test_selection_survives_refresh() {
    let (temp_dir, repos, mut controller) = loaded(&["alpha", "beta", "gamma"]).await;
    press(&mut controller, "rj");
    assert_eq!(controller.view.selected_repo(), Some(repos[1].as_path()));

    fs::remove_dir_all(temp_dir.path().join("alpha")).unwrap();
    press(&mut controller, "R");
    controller.settle().await;
    assert_eq!(controller.view.selected, Some(0));
    assert_eq!(controller.view.selected_repo(), Some(repos[1].as_path()));
    assert_eq!(controller.view.focus, Focus::Panel);

    fs::remove_dir_all(temp_dir.path().join("beta")).unwrap();
    press(&mut controller, "R");
    controller.settle().await;
    assert_eq!(controller.view.selected_repo(), Some(repos[2].as_path()));
}

#[tokio::test]
async fn test_progress_updates_only_status_line() {
    let (_temp_dir, _repos, mut controller) = loaded(&["alpha", "beta"]).await;
    let renders = controller.panel_renders();
    let overview = controller.panel_text(Panel::Overview).to_vec();

    press(&mut controller, "R");
    assert!(controller.view.refreshing);
    controller.handle_app_event(AppEvent::Progress(RefreshProgress {
        repo: PathBuf::from("/work/alpha"),
        processed: 5,
        total: 10,
    }));
    assert_eq!(
        controller.view.status,
        "Analyzing /work/alpha [##########..........] 50% (5/10)"
    );
    assert_eq!(controller.panel_renders(), renders);
    assert_eq!(controller.panel_text(Panel::Overview), overview.as_slice());

    controller.settle().await;
    assert_eq!(controller.panel_renders(), renders + 1);
}

#[test]
fn test_format_progress() {
    let progress = RefreshProgress {
        repo: PathBuf::from("repo"),
        processed: 1,
        total: 4,
    };
    assert_eq!(format_progress(&progress), "Analyzing repo [#####...............] 25% (1/4)");
}

/// Wait until refresh cycle `generation` has finished in the aggregator,
/// leaving its events queued for the controller.
async fn wait_for_refresh(controller: &Controller<FakeReader>, generation: u64) {
    let state = controller.aggregator().state();
    for _ in 0..1000 {
        {
            let state = read_state(&state);
            if state.generation == generation && !state.loading {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("refresh {} did not finish", generation);
}

#[tokio::test]
async fn test_queued_events_are_handled_in_one_pass() {
    let (_temp_dir, _repos, mut controller) =
        controller_for(&["alpha"], &[("alpha", 200)], |_| {});
    let renders = controller.panel_renders();

    controller.request_refresh();
    wait_for_refresh(&controller, 1).await;

    // 200 progress updates and the completion
    assert_eq!(controller.drain_events(), 201);
    assert!(!controller.view.refreshing);
    assert_eq!(controller.view.status, "Idle");
    assert_eq!(controller.panel_renders(), renders + 1);
    assert_eq!(controller.drain_events(), 0);
}

#[tokio::test]
async fn test_run_loop_draws_once_per_backlog() {
    let (_temp_dir, _repos, mut controller) =
        controller_for(&["alpha"], &[("alpha", 200)], |_| {});
    controller.request_refresh();
    wait_for_refresh(&controller, 1).await;

    // The loop's own refresh request is queued behind the finished one
    let mut draws = 0;
    let mut started_at_second_draw = 0;
    let result = controller
        .run(futures::stream::pending(), |c| {
            draws += 1;
            if draws == 2 {
                started_at_second_draw = c.refreshes_started();
                return Err(io::Error::new(io::ErrorKind::Other, "stop"));
            }
            Ok(())
        })
        .await;

    assert!(result.is_err());
    assert_eq!(started_at_second_draw, 2);
}

#[tokio::test]
async fn test_refresh_requests_are_coalesced() {
    let (_temp_dir, _repos, mut controller) =
        controller_for(&["alpha"], &[("alpha", 3)], |_| {});

    controller.request_refresh();
    controller.request_refresh();
    press(&mut controller, "RR");
    assert_eq!(controller.refreshes_started(), 1);
    assert!(controller.view.refresh_pending);

    controller.settle().await;
    assert_eq!(controller.refreshes_started(), 2);
    assert!(!controller.view.refresh_pending);
}

/// Run the event loop, feeding `script` as timed key presses.
async fn run_script(
    controller: &mut Controller<FakeReader>,
    script: Vec<(Duration, char)>,
) -> io::Result<()> {
    let (tx, rx) = futures_mpsc::unbounded::<io::Result<Event>>();
    tokio::spawn(async move {
        for (delay, c) in script {
            tokio::time::sleep(delay).await;
            let _ = tx.unbounded_send(Ok(Event::Key(key(KeyCode::Char(c)))));
        }
    });
    controller.run(rx, |_| Ok(())).await
}

#[tokio::test]
async fn test_auto_refresh_disabled_fires_nothing() {
    let (_temp_dir, _repos, mut controller) =
        controller_for(&["alpha"], &[("alpha", 2)], |c| {
            c.refresh_interval = Duration::from_millis(30)
        });

    let script = vec![
        (Duration::ZERO, 'a'),
        (Duration::ZERO, 'a'),
        (Duration::from_millis(200), 'q'),
    ];
    run_script(&mut controller, script).await.unwrap();

    assert!(!controller.view.auto_refresh);
    assert_eq!(controller.refreshes_started(), 1);
}

#[tokio::test]
async fn test_auto_refresh_first_tick_after_one_interval() {
    let (_temp_dir, _repos, mut controller) =
        controller_for(&["alpha"], &[("alpha", 2)], |c| {
            c.refresh_interval = Duration::from_secs(60)
        });

    let script = vec![(Duration::ZERO, 'a'), (Duration::from_millis(100), 'q')];
    run_script(&mut controller, script).await.unwrap();

    assert!(controller.view.auto_refresh);
    assert_eq!(controller.refreshes_started(), 1);
}

#[tokio::test]
async fn test_auto_refresh_triggers_refreshes() {
    let (_temp_dir, _repos, mut controller) =
        controller_for(&["alpha"], &[("alpha", 2)], |c| {
            c.refresh_interval = Duration::from_millis(40)
        });

    let script = vec![(Duration::ZERO, 'a'), (Duration::from_millis(300), 'q')];
    run_script(&mut controller, script).await.unwrap();

    assert!(controller.refreshes_started() >= 2);
}

#[tokio::test]
async fn test_run_loop_ends_with_input() {
    let (_temp_dir, _repos, mut controller) =
        controller_for(&["alpha"], &[("alpha", 2)], |_| {});
    let mut draws = 0;
    controller
        .run(futures::stream::empty(), |_| {
            draws += 1;
            Ok(())
        })
        .await
        .unwrap();
    assert!(draws >= 1);
}
