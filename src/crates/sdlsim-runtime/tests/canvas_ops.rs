//! Canvas lifecycle and evaluation semantics, end to end

use sdlsim_core::ast::{ComponentDecl, Expr, FileDecl, InstanceDecl, SystemDecl};
use sdlsim_core::params::ParamValue;
use sdlsim_runtime::canvas::Canvas;
use sdlsim_runtime::error::CanvasError;
use sdlsim_runtime::registry::CanvasRegistry;

fn bitly_file() -> FileDecl {
    FileDecl::new("bitly.sdl")
        .component(
            ComponentDecl::new("App")
                .uses("cache", "Cache")
                .uses("db", "HashIndex")
                .method(
                    "Redirect",
                    vec![],
                    vec![
                        Expr::let_("hit", Expr::call("cache", "Read", vec![])),
                        Expr::if_else(
                            Expr::ident("hit"),
                            vec![Expr::ret(Expr::bool(true))],
                            vec![Expr::ret(Expr::call("db", "Find", vec![]))],
                        ),
                    ],
                ),
        )
        .system(
            SystemDecl::new("Bitly")
                .instance(
                    InstanceDecl::new("app", "App")
                        .bind("cache", "cache")
                        .bind("db", "db"),
                )
                .instance(InstanceDecl::new("cache", "Cache"))
                .instance(InstanceDecl::new("db", "HashIndex")),
        )
}

fn bitly_canvas(seed: u64) -> Canvas {
    let canvas = Canvas::with_seed("test", seed);
    canvas.load_parsed(bitly_file());
    canvas.use_system("Bitly").unwrap();
    canvas
}

#[tokio::test]
async fn redirect_hit_path_mean_tracks_hit_latency() {
    let canvas = bitly_canvas(21);
    canvas.set("cache.HitRate", ParamValue::Float(1.0)).unwrap();

    let results = canvas.run("r", "app.Redirect", 1000).unwrap();
    assert!(results.iter().all(|v| v.is_success()));
    let mean = results.iter().map(|v| v.time).sum::<f64>() / results.len() as f64;
    assert!((mean - 1e-3).abs() < 0.05e-3, "mean {mean}");
}

#[tokio::test]
async fn redirect_miss_path_includes_db() {
    let canvas = bitly_canvas(22);
    canvas.set("cache.HitRate", ParamValue::Float(0.0)).unwrap();

    let results = canvas.run("r", "app.Redirect", 1000).unwrap();
    assert!(results.iter().all(|v| v.is_success()));
    let mean = results.iter().map(|v| v.time).sum::<f64>() / results.len() as f64;
    let expected = 10e-3 + 1.2 * 200e-6;
    assert!((mean - expected).abs() < 0.1 * expected, "mean {mean}");
}

#[tokio::test]
async fn run_stores_result_series() -> anyhow::Result<()> {
    let canvas = bitly_canvas(23);
    canvas.run("series", "app.Redirect", 25)?;
    let series = canvas
        .results("series")
        .ok_or_else(|| anyhow::anyhow!("series not stored"))?;
    assert_eq!(series.len(), 25);
    assert!(canvas.results("other").is_none());
    Ok(())
}

#[tokio::test]
async fn set_requires_active_system_and_valid_path() {
    let canvas = Canvas::with_seed("bare", 1);
    assert!(matches!(
        canvas.set("cache.HitRate", ParamValue::Float(0.5)),
        Err(CanvasError::NoActiveSystem)
    ));

    let canvas = bitly_canvas(24);
    assert!(canvas.set("ghost.HitRate", ParamValue::Float(0.5)).is_err());
    canvas.set("app.cache.HitRate", ParamValue::Float(0.5)).unwrap();
    // Dotted traversal lands on the same canonical path.
    let got = canvas.get(Some("cache.HitRate")).unwrap();
    assert_eq!(got[0].1, ParamValue::Float(0.5));
}

#[tokio::test]
async fn set_coerces_to_declared_type() {
    let file = FileDecl::new("typed.sdl")
        .component(
            ComponentDecl::new("App")
                .param(
                    "Retries",
                    sdlsim_core::params::ParamType::Int,
                    ParamValue::Int(3),
                )
                .method("M", vec![], vec![Expr::ret(Expr::bool(true))]),
        )
        .system(SystemDecl::new("Main").instance(InstanceDecl::new("app", "App")));
    let canvas = Canvas::with_seed("typed", 1);
    canvas.load_parsed(file);
    canvas.use_system("Main").unwrap();

    assert!(matches!(
        canvas.set("app.Retries", ParamValue::Str("five".into())),
        Err(CanvasError::Sim(sdlsim_core::SimError::TypeMismatch { .. }))
    ));
    // The failed write preserved the declared value.
    assert_eq!(
        canvas.get(Some("app.Retries")).unwrap()[0].1,
        ParamValue::Int(3)
    );
}

#[tokio::test]
async fn use_system_failure_keeps_previous_system() {
    let canvas = bitly_canvas(25);
    assert!(canvas.use_system("Missing").is_err());
    assert_eq!(canvas.active_system().as_deref(), Some("Bitly"));
}

#[tokio::test]
async fn trace_collects_one_tree_per_trial() {
    let canvas = bitly_canvas(26);
    canvas.set("cache.HitRate", ParamValue::Float(0.0)).unwrap();
    let (value, events) = canvas.execute_trace("app.Redirect").unwrap();
    assert!(value.is_success());

    // Root enter, cache enter/exit, db enter/exit, root exit.
    assert_eq!(events.len(), 6);
    let root = &events[0];
    assert_eq!(root.parent_id, 0);
    assert_eq!(root.target, "app.Redirect");
}

#[tokio::test]
async fn paths_enumerates_both_branches() {
    let file = FileDecl::new("paths.sdl")
        .component(
            ComponentDecl::new("App")
                .uses("a", "HashIndex")
                .uses("b", "SortedFile")
                .method(
                    "M",
                    vec![],
                    vec![Expr::if_else(
                        Expr::sample_dist(vec![
                            (0.3, Expr::bool(true)),
                            (0.7, Expr::bool(false)),
                        ]),
                        vec![Expr::call("a", "Find", vec![])],
                        vec![Expr::call("b", "Find", vec![])],
                    )],
                ),
        )
        .system(
            SystemDecl::new("Main")
                .instance(InstanceDecl::new("app", "App").bind("a", "x").bind("b", "y"))
                .instance(InstanceDecl::new("x", "HashIndex"))
                .instance(InstanceDecl::new("y", "SortedFile")),
        );
    let canvas = Canvas::with_seed("paths", 1);
    canvas.load_parsed(file);
    canvas.use_system("Main").unwrap();

    let tree = canvas.trace_all_paths("app.M", Some(10)).unwrap();
    assert_eq!(tree.leaf_count(), 2);
}

#[tokio::test]
async fn canvases_are_isolated() {
    let registry = CanvasRegistry::new();
    let a = registry.create("a").unwrap();
    let b = registry.create("b").unwrap();

    a.load_parsed(bitly_file());
    a.use_system("Bitly").unwrap();
    a.set("cache.HitRate", ParamValue::Float(0.25)).unwrap();

    b.load_parsed(bitly_file());
    b.use_system("Bitly").unwrap();

    // Canvas b never sees a's override.
    assert!(b.get(None).unwrap().is_empty());
    assert_eq!(
        a.get(Some("cache.HitRate")).unwrap()[0].1,
        ParamValue::Float(0.25)
    );
}

#[tokio::test]
async fn reset_clears_state_but_keeps_id() {
    let canvas = bitly_canvas(27);
    canvas.set("cache.HitRate", ParamValue::Float(0.9)).unwrap();
    canvas
        .add_generator(sdlsim_runtime::generator::GeneratorConfig::new(
            "g1",
            "app.Redirect",
            5.0,
        ))
        .unwrap();

    canvas.reset().await;
    assert_eq!(canvas.id(), "test");
    assert!(canvas.active_system().is_none());
    assert!(canvas.generators().is_empty());
    assert!(canvas.get(None).unwrap().is_empty());
}

#[tokio::test]
async fn seeded_canvases_reproduce_runs() {
    let first = bitly_canvas(99).run("r", "app.Redirect", 50).unwrap();
    let second = bitly_canvas(99).run("r", "app.Redirect", 50).unwrap();
    assert_eq!(first, second);
}
