//! Generator fleets feeding the metric pipeline, in real time

use sdlsim_core::ast::{FileDecl, InstanceDecl, SystemDecl};
use sdlsim_core::params::ParamValue;
use sdlsim_runtime::canvas::Canvas;
use sdlsim_runtime::generator::GeneratorConfig;
use sdlsim_runtime::metrics::{Aggregation, MetricKind, MetricSpec};
use std::time::Duration;

fn cache_canvas(seed: u64) -> Canvas {
    let canvas = Canvas::with_seed("gen-test", seed);
    let file = FileDecl::new("cache.sdl")
        .system(SystemDecl::new("Main").instance(InstanceDecl::new("cache", "Cache")));
    canvas.load_parsed(file);
    canvas.use_system("Main").unwrap();
    canvas
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn generator_rate_fidelity() {
    let canvas = cache_canvas(31);
    canvas
        .add_metric(MetricSpec::new("hits", "cache", MetricKind::Count).with_window(0.5))
        .unwrap();
    canvas
        .add_generator(GeneratorConfig::new("g1", "cache.Read", 50.0))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2200)).await;
    canvas.stop_all_generators().await;
    // Give the pump a beat to drain the bus.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let points = canvas.query_metrics("hits", None, None, None).unwrap();
    let total: f64 = points.iter().map(|p| p.value).sum();
    // ~50 rps for ~2.2 s: Poisson mean 110, generous tolerance for
    // scheduling overhead.
    assert!(
        (70.0..=150.0).contains(&total),
        "observed {total} trials across {} windows",
        points.len()
    );
    assert_eq!(canvas.generator_dropped("g1").unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn latency_metric_tracks_model() {
    let canvas = cache_canvas(32);
    canvas.set("cache.HitRate", ParamValue::Float(1.0)).unwrap();
    canvas
        .add_metric(
            MetricSpec::new("lat", "cache", MetricKind::Latency)
                .with_methods(vec!["Read"])
                .with_aggregation(Aggregation::Avg)
                .with_window(1.0),
        )
        .unwrap();

    // On-demand runs publish to the same bus the metric engine consumes.
    canvas.run("r", "cache.Read", 200).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let points = canvas.query_metrics("lat", None, None, None).unwrap();
    assert!(!points.is_empty());
    // Pure hits: every sample is the 1 ms hit latency.
    for point in &points {
        assert!((point.value - 1e-3).abs() < 1e-5, "avg {}", point.value);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pause_and_resume_control_the_task() {
    let canvas = cache_canvas(33);
    canvas
        .add_generator(GeneratorConfig::new("g1", "cache.Read", 100.0))
        .unwrap();
    canvas
        .add_metric(MetricSpec::new("m", "cache", MetricKind::Count).with_window(0.5))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    canvas.pause_generator("g1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_pause: f64 = canvas
        .query_metrics("m", None, None, None)
        .unwrap()
        .iter()
        .map(|p| p.value)
        .sum();
    assert!(after_pause > 0.0, "generator produced trials before pause");

    // Paused: no new trials arrive.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let while_paused: f64 = canvas
        .query_metrics("m", None, None, None)
        .unwrap()
        .iter()
        .map(|p| p.value)
        .sum();
    assert_eq!(after_pause, while_paused);

    canvas.resume_generator("g1").unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    canvas.stop_all_generators().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_resume: f64 = canvas
        .query_metrics("m", None, None, None)
        .unwrap()
        .iter()
        .map(|p| p.value)
        .sum();
    assert!(after_resume > while_paused, "resume restarted the fleet");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn double_start_is_a_noop() {
    let canvas = cache_canvas(34);
    canvas
        .add_generator(GeneratorConfig::new("g1", "cache.Read", 10.0))
        .unwrap();
    // Resuming a running generator must not spawn a second task.
    canvas.resume_generator("g1").unwrap();
    canvas.resume_generator("g1").unwrap();
    assert_eq!(canvas.generators().len(), 1);
    canvas.stop_all_generators().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_generator_id_is_rejected() {
    let canvas = cache_canvas(35);
    canvas
        .add_generator(GeneratorConfig::new("g1", "cache.Read", 10.0))
        .unwrap();
    assert!(canvas
        .add_generator(GeneratorConfig::new("g1", "cache.Read", 10.0))
        .is_err());
    canvas.stop_all_generators().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn update_rate_restarts_with_new_pace() {
    let canvas = cache_canvas(36);
    canvas
        .add_generator(GeneratorConfig::new("g1", "cache.Read", 10.0))
        .unwrap();
    canvas.update_generator_rate("g1", 99.0).await.unwrap();
    let configs = canvas.generators();
    assert_eq!(configs[0].rate_rps, 99.0);
    assert!(configs[0].enabled);
    canvas.stop_all_generators().await;
}
