//! Manifest-driven rebuilds of the nested route table

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use brrtmux::hot_reload::{load_manifest, watch_manifest};
use brrtmux::nested::NestedRouter;
use brrtmux::router::TaskHandler;

fn write_manifest(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("routes.json");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_load_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, r#"["", "/blog", "/blog/:slug"]"#);
    assert_eq!(load_manifest(&path).unwrap(), vec!["", "/blog", "/blog/:slug"]);
}

#[test]
fn test_load_manifest_rejects_non_string_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, r#"["/ok", 7]"#);
    assert!(load_manifest(&path).is_err());
    assert!(load_manifest(&dir.path().join("missing.json")).is_err());
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..40 {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    done()
}

#[test]
fn test_watch_manifest_rebuilds_pattern_layers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, r#"["", "/old"]"#);

    let nested = Arc::new(NestedRouter::default());
    nested.register_task_handler("/app", TaskHandler::new(|_ctx, _data| Ok("app")));
    nested
        .rebuild_preserving_handlers(&load_manifest(&path).unwrap())
        .unwrap();
    assert!(nested.is_registered("/old"));

    let reloads: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&reloads);
    let watcher = watch_manifest(&path, Arc::clone(&nested), move |patterns| {
        seen.lock().unwrap().push(patterns.to_vec());
    })
    .expect("watch_manifest");

    // allow the watcher thread to start
    std::thread::sleep(Duration::from_millis(100));
    std::fs::write(&path, r#"["", "/new", "/new/:id", "/app"]"#).unwrap();

    assert!(
        wait_for(|| nested.is_registered("/new/:id")),
        "manifest change was not picked up"
    );
    assert!(!nested.is_registered("/old"));
    assert!(nested.has_task_handler("/app"));
    assert!(reloads
        .lock()
        .unwrap()
        .iter()
        .any(|p| p.contains(&"/new/:id".to_string())));

    drop(watcher);
}

#[test]
fn test_watch_manifest_ignores_broken_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_manifest(&dir, r#"["/keep"]"#);

    let nested = Arc::new(NestedRouter::default());
    nested
        .rebuild_preserving_handlers(&load_manifest(&path).unwrap())
        .unwrap();

    let reloads = Arc::new(Mutex::new(0usize));
    let seen = Arc::clone(&reloads);
    let watcher = watch_manifest(&path, Arc::clone(&nested), move |_patterns| {
        *seen.lock().unwrap() += 1;
    })
    .expect("watch_manifest");

    std::thread::sleep(Duration::from_millis(100));
    std::fs::write(&path, r#"["/files/*/broken"]"#).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    std::fs::write(&path, "not json").unwrap();
    std::thread::sleep(Duration::from_millis(300));

    assert!(nested.is_registered("/keep"));
    assert_eq!(*reloads.lock().unwrap(), 0);

    drop(watcher);
}
