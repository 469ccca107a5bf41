use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::StatusCode;
use serde_json::json;

use super::*;
use crate::matcher::{MatcherOptions, PatternError};
use crate::router::{SharedRequest, TaskHandler};
use crate::runtime_config::RuntimeConfig;
use crate::tasks::{Ctx, TaskError};

fn router() -> NestedRouter {
    NestedRouter::new(NestedOptions {
        matcher: MatcherOptions::default(),
        runtime: RuntimeConfig::default(),
    })
}

fn request(path: &str) -> SharedRequest {
    Arc::new(http::Request::builder().uri(path).body(Vec::new()).unwrap())
}

fn blog_router() -> NestedRouter {
    let r = router();
    r.register_task_handler("", TaskHandler::new(|_ctx, _data| Ok("root")));
    r.register_pattern("/blog");
    r.register_task_handler(
        "/blog/:slug",
        TaskHandler::new(|_ctx, data| Ok(json!({ "slug": data.param("slug") }))),
    );
    r
}

#[test]
fn test_registration_queries() {
    let r = blog_router();
    assert!(r.is_registered("/blog"));
    assert!(r.is_registered("/blog/:slug"));
    assert!(!r.is_registered("/about"));
    assert!(r.has_task_handler("/blog/:slug"));
    assert!(!r.has_task_handler("/blog"));
    assert_eq!(r.all_patterns(), vec!["", "/blog", "/blog/:slug"]);
}

#[test]
#[should_panic(expected = "already registered")]
fn test_duplicate_registration_panics() {
    let r = router();
    r.register_pattern("/blog");
    r.register_task_handler("/blog", TaskHandler::new(|_ctx, _data| Ok(1)));
}

#[test]
fn test_try_register_reports_duplicate() {
    let r = router();
    r.try_register_pattern("/docs").unwrap();
    assert_eq!(
        r.try_register_pattern("/docs"),
        Err(PatternError::Duplicate("/docs".to_string()))
    );
}

#[test]
fn test_param_names_do_not_make_a_new_layer() {
    let r = router();
    r.register_task_handler("/blog/:slug", TaskHandler::new(|_ctx, _data| Ok(1)));
    assert_eq!(
        r.try_register_pattern("/blog/:post"),
        Err(PatternError::Duplicate("/blog/:post".to_string()))
    );
    assert!(r.is_registered("/blog/:slug"));
    assert!(!r.is_registered("/blog/:post"));

    r.rebuild_preserving_handlers(&["", "/blog/:id", "/blog/:id/comments"])
        .unwrap();
    assert!(r.has_task_handler("/blog/:slug"));
    assert!(!r.is_registered("/blog/:id"));
    assert!(r.is_registered("/blog/:id/comments"));
}

#[test]
fn test_find_and_run_collects_layers_in_order() {
    may::config().set_stack_size(0x8000);
    let r = blog_router();
    let results = r.find_and_run(&request("/blog/my-post")).unwrap();

    let patterns: Vec<&str> = results.iter().map(|r| r.pattern.as_str()).collect();
    assert_eq!(patterns, vec!["", "/blog", "/blog/:slug"]);
    assert_eq!(results.params.get("slug").map(String::as_str), Some("my-post"));

    assert!(results.has_task_handler(0));
    assert!(!results.has_task_handler(1));
    assert!(results.has_task_handler(2));

    assert_eq!(results.get("").unwrap().data, Some(json!("root")));
    assert!(results.get("/blog").unwrap().data.is_none());
    assert_eq!(
        results.get("/blog/:slug").unwrap().data,
        Some(json!({ "slug": "my-post" }))
    );
    assert_eq!(results.response_proxies.len(), 3);
}

#[test]
fn test_find_and_run_without_match() {
    let r = router();
    r.register_pattern("/docs");
    assert!(r.find_and_run(&request("/blog")).is_none());
}

#[test]
fn test_layer_failure_is_isolated() {
    may::config().set_stack_size(0x8000);
    let r = router();
    r.register_task_handler("", TaskHandler::new(|_ctx, _data| Ok("layout")));
    r.register_task_handler(
        "/broken",
        TaskHandler::new(|_ctx, _data| -> anyhow::Result<u32> { anyhow::bail!("no data") }),
    );
    r.register_task_handler(
        "/broken/:id",
        TaskHandler::new(|_ctx, _data| -> anyhow::Result<u32> { panic!("layer panic") }),
    );

    let results = r.find_and_run(&request("/broken/1")).unwrap();
    assert_eq!(results.len(), 3);

    let root = results.get("").unwrap();
    assert!(root.ok());
    assert_eq!(root.data, Some(json!("layout")));

    let broken = results.get("/broken").unwrap();
    assert!(!broken.ok());
    assert!(broken.error.as_ref().unwrap().to_string().contains("no data"));

    let leaf = results.get("/broken/:id").unwrap();
    assert!(matches!(leaf.error, Some(TaskError::Panicked(_))));
}

#[test]
fn test_layer_proxies_merge() {
    may::config().set_stack_size(0x8000);
    let r = router();
    r.register_task_handler(
        "",
        TaskHandler::new(|_ctx, data| {
            data.add_response_header("x-layer", "root");
            Ok(())
        }),
    );
    r.register_task_handler(
        "/missing",
        TaskHandler::new(|_ctx, data| {
            data.set_response_status(StatusCode::NOT_FOUND);
            data.add_response_header("x-layer", "page");
            Ok(())
        }),
    );

    let results = r.find_and_run(&request("/missing")).unwrap();
    let merged = results.merged_proxy();
    assert_eq!(merged.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(merged.headers("x-layer"), vec!["root", "page"]);
}

#[test]
fn test_run_nested_tasks_uses_given_ctx() {
    may::config().set_stack_size(0x8000);
    let calls = Arc::new(AtomicUsize::new(0));
    let shared = crate::tasks::Task::new({
        let calls = Arc::clone(&calls);
        move |_ctx: &Ctx, _: &()| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7u32)
        }
    });

    let r = router();
    for pattern in ["", "/a", "/a/b"] {
        let task = shared.clone();
        r.register_task_handler(pattern, TaskHandler::new(move |ctx, _data| Ok(task.run(ctx, &())?)));
    }

    let matches = r.find_nested_matches("/a/b").unwrap();
    let ctx = Ctx::new();
    let results = r.run_nested_tasks(&ctx, &request("/a/b"), &matches);
    assert!(results.iter().all(|r| r.data == Some(json!(7))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_snapshot_isolation_across_rebuild() {
    may::config().set_stack_size(0x8000);
    let r = router();
    r.register_task_handler("/app", TaskHandler::new(|_ctx, _data| Ok("app")));
    r.register_pattern("/app/old");

    let captured = r.find_nested_matches("/app/old").unwrap();
    r.rebuild_preserving_handlers(&["/app/new"]).unwrap();

    // the captured match is untouched by the rebuild
    assert_eq!(captured.patterns(), vec!["/app", "/app/old"]);
    assert!(r.find_nested_matches("/app/old").map_or(true, |m| m.patterns() == vec!["/app"]));

    assert!(r.is_registered("/app/new"));
    assert!(!r.is_registered("/app/old"));
    assert!(r.has_task_handler("/app"));

    let results = r.run_nested_tasks(&Ctx::new(), &request("/app/old"), &captured);
    assert_eq!(results.get("/app").unwrap().data, Some(json!("app")));
    assert!(!results.get("/app/old").unwrap().ran_task);
}

#[test]
fn test_rebuild_rejects_malformed_pattern() {
    let r = router();
    r.register_pattern("/keep");
    assert!(r.rebuild_preserving_handlers(&["/files/*/x"]).is_err());
    assert!(r.is_registered("/keep"));
}
