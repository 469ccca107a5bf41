use brrtmux::matcher::{Matcher, MatcherOptions};
use brrtmux::response::{BufferedResponse, ResponseSink};
use brrtmux::router::{Request, Router, RouterOptions, TaskHandler, TaskMiddleware};
use brrtmux::middleware::MiddlewareOptions;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use http::Method;

const PATTERNS: &[&str] = &[
    "",
    "/",
    "/zoo/animals",
    "/zoo/animals/:id",
    "/zoo/animals/:id/toys/:toy_id",
    "/zoo/:category/animals/:id/habitats/:habitat_id/sections/:section_id",
    "/inventory/:warehouse_id/feeds/:feed_id/items/:item_id/batches/:batch_id",
    "/complex/:a/:b/:c/:d/:e/:f/:g/:h/:i",
    "/files/*",
    "/zoo/health",
];

const PATHS: &[&str] = &[
    "/zoo/animals/123",
    "/zoo/animals/123/toys/456",
    "/zoo/cats/animals/123/habitats/88/sections/5",
    "/inventory/1/feeds/2/items/3/batches/4",
    "/complex/1/2/3/4/5/6/7/8/9",
    "/files/a/b/c.txt",
];

fn matcher() -> Matcher {
    let mut m = Matcher::new(MatcherOptions::default());
    for p in PATTERNS {
        m.register_pattern(p);
    }
    m
}

fn bench_best_match(c: &mut Criterion) {
    let m = matcher();
    c.bench_function("best_match", |b| {
        b.iter(|| {
            for path in PATHS {
                black_box(m.find_best_match(path));
            }
        })
    });
}

fn bench_nested_match(c: &mut Criterion) {
    let m = matcher();
    c.bench_function("nested_match", |b| {
        b.iter(|| {
            for path in PATHS {
                black_box(m.find_nested_matches(path));
            }
        })
    });
}

fn request(method: Method, path: &str) -> Request {
    http::Request::builder()
        .method(method)
        .uri(path)
        .body(Vec::new())
        .unwrap_or_default()
}

fn bench_serve_fast_path(c: &mut Criterion) {
    let mut router = Router::new(RouterOptions::default());
    for p in PATTERNS.iter().filter(|p| !p.is_empty()) {
        router.register_handler(Method::GET, p, |w: &mut dyn ResponseSink, _req: &Request| {
            w.write_body(b"ok");
        });
    }
    c.bench_function("serve_fast_path", |b| {
        b.iter(|| {
            for path in PATHS {
                let mut res = BufferedResponse::new();
                router.serve(&mut res, request(Method::GET, path));
                black_box(res);
            }
        })
    });
}

fn bench_serve_task_path(c: &mut Criterion) {
    let mut router = Router::new(RouterOptions::default());
    router.register_task_handler(
        Method::GET,
        "/zoo/animals/:id",
        TaskHandler::<(), String>::new(|_ctx, data| {
            Ok(data.param("id").unwrap_or_default().to_string())
        }),
    );
    for header in ["x-a", "x-b"] {
        router.add_global_task_middleware(
            TaskMiddleware::new(move |_ctx, data| {
                data.set_response_header(header, "1");
                Ok(())
            }),
            MiddlewareOptions::default(),
        );
    }
    c.bench_function("serve_task_path", |b| {
        b.iter(|| {
            let mut res = BufferedResponse::new();
            router.serve(&mut res, request(Method::GET, "/zoo/animals/7"));
            black_box(res);
        })
    });
}

criterion_group!(
    benches,
    bench_best_match,
    bench_nested_match,
    bench_serve_fast_path,
    bench_serve_task_path
);
criterion_main!(benches);
