use super::{Matcher, MatcherOptions, Params, PatternError, SegmentKind};

const EXPLICIT_INDEX_PATTERNS: &[&str] = &[
    "/_index",
    "/articles/_index",
    "/articles/test/articles/_index",
    "/bear/_index",
    "/dashboard/_index",
    "/dashboard/customers/_index",
    "/dashboard/customers/:customer_id/_index",
    "/dashboard/customers/:customer_id/orders/_index",
    "/dynamic-index/:pagename/_index",
    "/lion/_index",
    "/tiger/_index",
    "/tiger/:tiger_id/_index",
    // the layout root when an explicit index marker is in use
    "/",
    "/*",
    "/bear",
    "/bear/:bear_id",
    "/bear/:bear_id/*",
    "/dashboard",
    "/dashboard/*",
    "/dashboard/customers",
    "/dashboard/customers/:customer_id",
    "/dashboard/customers/:customer_id/orders",
    "/dashboard/customers/:customer_id/orders/:order_id",
    "/dynamic-index/index",
    "/lion",
    "/lion/*",
    "/tiger",
    "/tiger/:tiger_id",
    "/tiger/:tiger_id/:tiger_cub_id",
    "/tiger/:tiger_id/*",
    "/a/b/:",
    "/c/d/e/:_",
    "/f/g/h/i/:/:",
    "/j/k/l/m/n/:_/:_",
];

fn implicit_index_patterns() -> Vec<String> {
    EXPLICIT_INDEX_PATTERNS
        .iter()
        .map(|p| {
            if *p == "/" {
                String::new()
            } else if let Some(base) = p.strip_suffix("_index") {
                base.to_string()
            } else {
                (*p).to_string()
            }
        })
        .collect()
}

struct Scenario {
    path: &'static str,
    matches: &'static [&'static str],
    params: &'static [(&'static str, &'static str)],
    splat: &'static [&'static str],
}

const SCENARIOS: &[Scenario] = &[
    Scenario { path: "/does-not-exist", matches: &["", "/*"], params: &[], splat: &["does-not-exist"] },
    Scenario { path: "/", matches: &["", "/"], params: &[], splat: &[] },
    Scenario { path: "/lion", matches: &["", "/lion", "/lion/"], params: &[], splat: &[] },
    Scenario { path: "/lion/123", matches: &["", "/lion", "/lion/*"], params: &[], splat: &["123"] },
    Scenario {
        path: "/lion/123/456/789",
        matches: &["", "/lion", "/lion/*"],
        params: &[],
        splat: &["123", "456", "789"],
    },
    Scenario {
        path: "/tiger/123",
        matches: &["", "/tiger", "/tiger/:tiger_id", "/tiger/:tiger_id/"],
        params: &[("tiger_id", "123")],
        splat: &[],
    },
    Scenario {
        path: "/tiger/123/456",
        matches: &["", "/tiger", "/tiger/:tiger_id", "/tiger/:tiger_id/:tiger_cub_id"],
        params: &[("tiger_id", "123"), ("tiger_cub_id", "456")],
        splat: &[],
    },
    Scenario {
        path: "/tiger/123/456/789",
        matches: &["", "/tiger", "/tiger/:tiger_id", "/tiger/:tiger_id/*"],
        params: &[("tiger_id", "123")],
        splat: &["456", "789"],
    },
    Scenario {
        path: "/bear/123",
        matches: &["", "/bear", "/bear/:bear_id"],
        params: &[("bear_id", "123")],
        splat: &[],
    },
    Scenario {
        path: "/bear/123/456",
        matches: &["", "/bear", "/bear/:bear_id", "/bear/:bear_id/*"],
        params: &[("bear_id", "123")],
        splat: &["456"],
    },
    Scenario {
        path: "/dashboard/asdf",
        matches: &["", "/dashboard", "/dashboard/*"],
        params: &[],
        splat: &["asdf"],
    },
    Scenario {
        path: "/dashboard/customers/123/orders",
        matches: &[
            "",
            "/dashboard",
            "/dashboard/customers",
            "/dashboard/customers/:customer_id",
            "/dashboard/customers/:customer_id/orders",
            "/dashboard/customers/:customer_id/orders/",
        ],
        params: &[("customer_id", "123")],
        splat: &[],
    },
    Scenario {
        path: "/dashboard/customers/123/orders/456",
        matches: &[
            "",
            "/dashboard",
            "/dashboard/customers",
            "/dashboard/customers/:customer_id",
            "/dashboard/customers/:customer_id/orders",
            "/dashboard/customers/:customer_id/orders/:order_id",
        ],
        params: &[("customer_id", "123"), ("order_id", "456")],
        splat: &[],
    },
    Scenario { path: "/articles", matches: &["", "/articles/"], params: &[], splat: &[] },
    Scenario { path: "/articles/bob", matches: &["", "/*"], params: &[], splat: &["articles", "bob"] },
    Scenario {
        path: "/articles/test/articles",
        matches: &["", "/articles/test/articles/"],
        params: &[],
        splat: &[],
    },
    Scenario {
        path: "/dynamic-index/index",
        matches: &["", "/dynamic-index/index"],
        params: &[],
        splat: &[],
    },
    Scenario { path: "/a/b/hi", matches: &["", "/a/b/:"], params: &[("", "hi")], splat: &[] },
    Scenario {
        path: "/f/g/h/i/hi/hi2",
        matches: &["", "/f/g/h/i/:/:"],
        params: &[("", "hi2")],
        splat: &[],
    },
    Scenario {
        path: "/j/k/l/m/n/hi/hi2",
        matches: &["", "/j/k/l/m/n/:_/:_"],
        params: &[("_", "hi2")],
        splat: &[],
    },
];

fn params_of(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn check_scenarios(m: &Matcher) {
    for sc in SCENARIOS {
        let results = m
            .find_nested_matches(sc.path)
            .unwrap_or_else(|| panic!("expected matches for {}", sc.path));
        let normalized: Vec<&str> = results
            .matches
            .iter()
            .map(|rp| rp.normalized_pattern())
            .collect();
        assert_eq!(normalized, sc.matches, "matches for {}", sc.path);
        assert_eq!(results.params, params_of(sc.params), "params for {}", sc.path);
        assert_eq!(results.splat_values, sc.splat, "splat for {}", sc.path);
    }
}

#[test]
fn test_nested_matches_with_explicit_index() {
    let mut m = Matcher::new(MatcherOptions {
        explicit_index_segment: "_index".to_string(),
        quiet: true,
        ..MatcherOptions::default()
    });
    for p in EXPLICIT_INDEX_PATTERNS {
        m.try_register_pattern(p).unwrap();
    }
    check_scenarios(&m);
}

#[test]
fn test_nested_matches_with_trailing_slash_index() {
    let mut m = Matcher::new(MatcherOptions::default());
    for p in implicit_index_patterns() {
        m.try_register_pattern(&p).unwrap();
    }
    check_scenarios(&m);
}

#[test]
fn test_nested_matches_with_custom_runes() {
    let mut m = Matcher::new(MatcherOptions {
        dynamic_param_prefix: '@',
        splat_segment: '#',
        ..MatcherOptions::default()
    });
    m.try_register_pattern("").unwrap();
    m.try_register_pattern("/blog").unwrap();
    m.try_register_pattern("/blog/@slug").unwrap();
    m.try_register_pattern("/files/#").unwrap();

    let results = m.find_nested_matches("/blog/my-post").unwrap();
    assert_eq!(results.patterns(), vec!["", "/blog", "/blog/@slug"]);
    assert_eq!(results.matches[2].normalized_pattern(), "/blog/:slug");
    assert_eq!(results.params.get("slug").map(String::as_str), Some("my-post"));

    let results = m.find_nested_matches("/files/a/b").unwrap();
    assert_eq!(results.splat_values, vec!["a", "b"]);
}

#[test]
fn test_nested_match_shares_params_across_chain() {
    let mut m = Matcher::new(MatcherOptions::default());
    for p in ["", "/blog", "/blog/:slug"] {
        m.try_register_pattern(p).unwrap();
    }
    let results = m.find_nested_matches("/blog/my-post").unwrap();
    assert_eq!(results.patterns(), vec!["", "/blog", "/blog/:slug"]);
    assert_eq!(results.params, params_of(&[("slug", "my-post")]));
}

#[test]
fn test_nested_trailing_slash_is_ignored() {
    let mut m = Matcher::new(MatcherOptions::default());
    for p in ["", "/about", "/about/:id"] {
        m.try_register_pattern(p).unwrap();
    }
    let with_slash = m.find_nested_matches("/about/").unwrap();
    let without = m.find_nested_matches("/about").unwrap();
    assert_eq!(with_slash.patterns(), without.patterns());
    assert_eq!(with_slash.patterns(), vec!["", "/about"]);
}

#[test]
fn test_nested_no_match_without_root() {
    let mut m = Matcher::new(MatcherOptions::default());
    m.try_register_pattern("/users").unwrap();
    assert!(m.find_nested_matches("/posts").is_none());
    // a partial chain that cannot consume every segment is not a match
    assert!(m.find_nested_matches("/users/42").is_none());
}

#[test]
fn test_nested_only_empty_root_for_non_root_path() {
    let mut m = Matcher::new(MatcherOptions::default());
    m.try_register_pattern("").unwrap();
    m.try_register_pattern("/users").unwrap();
    assert!(m.find_nested_matches("/other").is_none());
    let root = m.find_nested_matches("/").unwrap();
    assert_eq!(root.patterns(), vec![""]);
}

#[test]
fn test_nested_match_order_is_deterministic() {
    let mut m = Matcher::new(MatcherOptions::default());
    for p in ["", "/x", "/x/:a", "/x/:a/"] {
        m.try_register_pattern(p).unwrap();
    }
    let first = m.find_nested_matches("/x/1").unwrap().patterns().join(",");
    for _ in 0..50 {
        let again = m.find_nested_matches("/x/1").unwrap().patterns().join(",");
        assert_eq!(first, again);
    }
    assert_eq!(first, ",/x,/x/:a,/x/:a/");
}

fn best_fixture() -> Matcher {
    let mut m = Matcher::new(MatcherOptions::default());
    for p in ["/", "/users", "/users/:id", "/users/active", "/files/*"] {
        m.try_register_pattern(p).unwrap();
    }
    m
}

#[test]
fn test_best_match_dynamic_param() {
    let m = best_fixture();
    let best = m.find_best_match("/users/42").unwrap();
    assert_eq!(best.pattern().original_pattern(), "/users/:id");
    assert_eq!(best.params(), &params_of(&[("id", "42")]));
}

#[test]
fn test_best_match_splat_values() {
    let m = best_fixture();
    let best = m.find_best_match("/files/a/b").unwrap();
    assert_eq!(best.pattern().original_pattern(), "/files/*");
    assert_eq!(best.splat_values(), ["a", "b"]);
}

#[test]
fn test_best_match_static_beats_dynamic() {
    let m = best_fixture();
    let best = m.find_best_match("/users/active").unwrap();
    assert_eq!(best.pattern().original_pattern(), "/users/active");
    assert!(best.params().is_empty());
}

#[test]
fn test_best_match_backtracks_from_static_branch() {
    let mut m = Matcher::new(MatcherOptions::default());
    m.try_register_pattern("/users/active/settings").unwrap();
    m.try_register_pattern("/users/:id").unwrap();
    let best = m.find_best_match("/users/active").unwrap();
    assert_eq!(best.pattern().original_pattern(), "/users/:id");
    assert_eq!(best.params().get("id").map(String::as_str), Some("active"));
}

#[test]
fn test_best_match_deeper_splat_wins() {
    let mut m = Matcher::new(MatcherOptions::default());
    m.try_register_pattern("/*").unwrap();
    m.try_register_pattern("/docs/*").unwrap();
    m.try_register_pattern("/docs/:section").unwrap();

    let best = m.find_best_match("/docs/intro").unwrap();
    assert_eq!(best.pattern().original_pattern(), "/docs/:section");

    // more segments than the deepest dynamic pattern: the splat ancestor takes it
    let best = m.find_best_match("/docs/intro/setup").unwrap();
    assert_eq!(best.pattern().original_pattern(), "/docs/*");
    assert_eq!(best.splat_values(), ["intro", "setup"]);

    let best = m.find_best_match("/elsewhere/deep").unwrap();
    assert_eq!(best.pattern().original_pattern(), "/*");
}

#[test]
fn test_best_match_root_precedence() {
    let mut m = Matcher::new(MatcherOptions::default());
    m.try_register_pattern("/*").unwrap();
    assert_eq!(m.find_best_match("/").unwrap().pattern().original_pattern(), "/*");

    m.try_register_pattern("").unwrap();
    assert_eq!(m.find_best_match("/").unwrap().pattern().original_pattern(), "");

    m.try_register_pattern("/").unwrap();
    assert_eq!(m.find_best_match("/").unwrap().pattern().original_pattern(), "/");
    assert_eq!(m.find_best_match("").unwrap().pattern().original_pattern(), "/");
}

#[test]
fn test_best_match_trailing_slash() {
    let mut m = Matcher::new(MatcherOptions::default());
    m.try_register_pattern("/posts/:id").unwrap();
    m.try_register_pattern("/posts/:id/").unwrap();
    m.try_register_pattern("/tags/:tag").unwrap();
    m.try_register_pattern("/about/").unwrap();

    let best = m.find_best_match("/posts/7/").unwrap();
    assert_eq!(best.pattern().normalized_pattern(), "/posts/:id/");
    assert_eq!(best.params().get("id").map(String::as_str), Some("7"));

    let best = m.find_best_match("/posts/7").unwrap();
    assert_eq!(best.pattern().normalized_pattern(), "/posts/:id");

    assert!(m.find_best_match("/tags/rust/").is_none());
    assert_eq!(
        m.find_best_match("/about/").unwrap().pattern().original_pattern(),
        "/about/"
    );
}

#[test]
fn test_best_match_none() {
    let m = best_fixture();
    assert!(m.find_best_match("/nope").is_none());
    assert!(m.find_best_match("/users/1/2").is_none());
}

#[test]
fn test_pattern_normalization() {
    let m = Matcher::new(MatcherOptions {
        explicit_index_segment: "_index".to_string(),
        ..MatcherOptions::default()
    });
    let rp = m.compile("/blog/_index").unwrap();
    assert_eq!(rp.normalized_pattern(), "/blog/");
    assert!(rp.is_index());
    assert_eq!(rp.segment_count(), 2);

    let rp = m.compile("/").unwrap();
    assert!(rp.is_empty_root());

    let rp = m.compile("files/*").unwrap();
    assert_eq!(rp.normalized_pattern(), "/files/*");
    assert!(rp.is_non_root_splat());
    assert_eq!(rp.last_segment_kind(), Some(SegmentKind::Splat));

    let rp = m.compile("/*").unwrap();
    assert!(rp.is_splat());
    assert!(!rp.is_non_root_splat());
}

#[test]
fn test_pattern_shape_ignores_param_names() {
    let m = Matcher::new(MatcherOptions::default());
    let a = m.compile("/users/:id/posts").unwrap();
    let b = m.compile("/users/:user_id/posts").unwrap();
    assert_ne!(a.normalized_pattern(), b.normalized_pattern());
    assert_eq!(a.shape(), "/users/:/posts");
    assert_eq!(a.shape(), b.shape());

    let c = m.compile("/users/:id/comments").unwrap();
    assert_ne!(a.shape(), c.shape());
    assert_eq!(m.compile("/files/*").unwrap().shape(), "/files/*");
    assert_eq!(m.compile("/docs/").unwrap().shape(), "/docs/");
}

#[test]
fn test_pattern_errors() {
    let mut m = Matcher::new(MatcherOptions::default());
    assert_eq!(
        m.try_register_pattern("/files/*/meta").unwrap_err(),
        PatternError::SplatNotTrailing("/files/*/meta".to_string())
    );
    assert!(matches!(
        m.try_register_pattern("/a//b"),
        Err(PatternError::EmptySegment(_))
    ));
    assert!(matches!(
        Matcher::try_new(MatcherOptions {
            explicit_index_segment: "a/b".to_string(),
            ..MatcherOptions::default()
        }),
        Err(PatternError::InvalidIndexSegment(_))
    ));
}

#[test]
fn test_duplicate_pattern_returns_existing() {
    let mut m = Matcher::new(MatcherOptions {
        quiet: true,
        ..MatcherOptions::default()
    });
    let first = m.try_register_pattern("/users/:id").unwrap();
    let second = m.try_register_pattern("users/:id").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(m.len(), 1);
}
