//! Task engine behaviour under concurrent fan-out

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use brrtmux::tasks::{AnyTask, BoundTask, Ctx, OutputSlot, Task, TaskError};

#[test]
fn test_diamond_dependencies_run_each_task_once() {
    let base_runs = Arc::new(AtomicUsize::new(0));
    let base = Task::new({
        let runs = Arc::clone(&base_runs);
        move |_ctx: &Ctx, id: &u32| {
            runs.fetch_add(1, Ordering::SeqCst);
            may::coroutine::sleep(Duration::from_millis(10));
            Ok(*id * 10)
        }
    });
    let left = Task::new({
        let base = base.clone();
        move |ctx: &Ctx, id: &u32| Ok(base.run(ctx, id)? + 1)
    });
    let right = Task::new({
        let base = base.clone();
        move |ctx: &Ctx, id: &u32| Ok(base.run(ctx, id)? + 2)
    });

    let ctx = Ctx::new();
    let (l, r) = (OutputSlot::new(), OutputSlot::new());
    ctx.run_parallel(vec![left.bind(4, &l), right.bind(4, &r)])
        .unwrap();

    assert_eq!(l.take(), Some(41));
    assert_eq!(r.take(), Some(42));
    assert_eq!(base_runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_first_failure_cancels_unstarted_work() {
    let started = Arc::new(AtomicUsize::new(0));
    let ctx = Ctx::new();

    let mut batch: Vec<Box<dyn BoundTask>> = vec![Box::new(|_ctx: &Ctx| -> Result<(), TaskError> {
        Err(anyhow::anyhow!("upstream unavailable").into())
    })];
    for _ in 0..16 {
        let started = Arc::clone(&started);
        let sleepy = Task::new(move |_ctx: &Ctx, _: &()| {
            started.fetch_add(1, Ordering::SeqCst);
            may::coroutine::sleep(Duration::from_millis(5));
            Ok(())
        });
        batch.push(sleepy.bind((), &OutputSlot::new()));
    }

    let err = ctx.run_parallel(batch).unwrap_err();
    assert!(err.to_string().contains("upstream unavailable"));
    // the request context itself stays usable
    assert!(!ctx.is_cancelled());
}

#[test]
fn test_contexts_are_isolated() {
    let runs = Arc::new(AtomicUsize::new(0));
    let task = Task::new({
        let runs = Arc::clone(&runs);
        move |_ctx: &Ctx, _: &()| Ok(runs.fetch_add(1, Ordering::SeqCst))
    });

    let a = Ctx::new();
    let b = Ctx::new();
    assert_eq!(task.run(&a, &()).unwrap(), 0);
    assert_eq!(task.run(&a, &()).unwrap(), 0);
    assert_eq!(task.run(&b, &()).unwrap(), 1);
}

#[test]
fn test_type_erased_registry() {
    let double = Task::new(|_ctx: &Ctx, n: &i64| Ok(n * 2));
    let greet = Task::new(|_ctx: &Ctx, name: &String| Ok(format!("hi {name}")));
    let registry: Vec<(&str, Arc<dyn AnyTask>)> =
        vec![("double", Arc::new(double)), ("greet", Arc::new(greet))];

    let ctx = Ctx::new();
    let out = registry[0].1.run_any(&ctx, &21i64).unwrap();
    assert_eq!(out.downcast_ref::<i64>(), Some(&42));

    let out = registry[1].1.run_any(&ctx, &"may".to_string()).unwrap();
    assert_eq!(out.downcast_ref::<String>().map(String::as_str), Some("hi may"));

    assert!(matches!(
        registry[1].1.run_any(&ctx, &7u8),
        Err(TaskError::InputMismatch { .. })
    ));
}
