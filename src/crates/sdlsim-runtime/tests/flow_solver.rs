//! Flow evaluation against a live canvas: propagation, strategies, and the
//! override-wins contract

use sdlsim_core::ast::{ComponentDecl, Expr, FileDecl, InstanceDecl, SystemDecl};
use sdlsim_core::flow::{FlowStatus, FlowStrategy};
use sdlsim_core::params::ParamValue;
use sdlsim_runtime::canvas::Canvas;
use sdlsim_runtime::generator::GeneratorConfig;

/// client → server.Handle → db.Query, every hop unconditional
fn chain_canvas(seed: u64) -> Canvas {
    let file = FileDecl::new("chain.sdl")
        .component(ComponentDecl::new("Client").uses("server", "Server").method(
            "Start",
            vec![],
            vec![Expr::ret(Expr::call("server", "Handle", vec![]))],
        ))
        .component(ComponentDecl::new("Server").uses("db", "Db").method(
            "Handle",
            vec![],
            vec![Expr::ret(Expr::call("db", "Query", vec![]))],
        ))
        .component(ComponentDecl::new("Db").method(
            "Query",
            vec![],
            vec![Expr::delay(Expr::float(0.002)), Expr::ret(Expr::bool(true))],
        ))
        .system(
            SystemDecl::new("Main")
                .instance(InstanceDecl::new("client", "Client").bind("server", "server"))
                .instance(InstanceDecl::new("server", "Server").bind("db", "db"))
                .instance(InstanceDecl::new("db", "Db")),
        );
    let canvas = Canvas::with_seed("flow-test", seed);
    canvas.load_parsed(file);
    canvas.use_system("Main").unwrap();
    canvas
}

#[tokio::test]
async fn runtime_strategy_propagates_generator_rate() {
    let canvas = chain_canvas(41);
    canvas
        .add_generator(GeneratorConfig::new("g1", "client.Start", 50.0))
        .unwrap();

    let outcome = canvas.evaluate_flows(FlowStrategy::Runtime).unwrap();
    assert_eq!(outcome.status, FlowStatus::Converged);
    assert!((outcome.rates["db.Query"] - 50.0).abs() < 2.0, "rate {}", outcome.rates["db.Query"]);
    assert!((outcome.rates["server.Handle"] - 50.0).abs() < 2.0);
    canvas.stop_all_generators().await;
}

#[tokio::test]
async fn static_strategy_matches_on_unconditional_chain() {
    let canvas = chain_canvas(42);
    canvas
        .add_generator(GeneratorConfig::new("g1", "client.Start", 50.0))
        .unwrap();

    let outcome = canvas.evaluate_flows(FlowStrategy::Static).unwrap();
    assert_eq!(outcome.status, FlowStatus::Converged);
    assert!((outcome.rates["db.Query"] - 50.0).abs() < 1e-6);
    canvas.stop_all_generators().await;
}

#[tokio::test]
async fn applying_writes_arrival_rates_back() {
    let canvas = chain_canvas(43);
    canvas
        .add_generator(GeneratorConfig::new("g1", "client.Start", 40.0))
        .unwrap();

    canvas.evaluate_flows(FlowStrategy::Static).unwrap();
    let arrival = canvas.get(Some("db.ArrivalRate")).unwrap();
    assert_eq!(arrival[0].1, ParamValue::Float(40.0));
    canvas.stop_all_generators().await;
}

#[tokio::test]
async fn reapplying_is_a_fixed_point() {
    let canvas = chain_canvas(44);
    canvas
        .add_generator(GeneratorConfig::new("g1", "client.Start", 50.0))
        .unwrap();

    let first = canvas.evaluate_flows(FlowStrategy::Runtime).unwrap();
    let second = canvas.evaluate_flows(FlowStrategy::Runtime).unwrap();
    for (node, rate) in &first.rates {
        assert!(
            (second.rates[node] - rate).abs() < 1e-9,
            "{node} drifted between applies"
        );
    }
    canvas.stop_all_generators().await;
}

#[tokio::test]
async fn manual_override_wins_and_is_never_regenerated() {
    let canvas = chain_canvas(45);
    canvas
        .add_generator(GeneratorConfig::new("g1", "client.Start", 50.0))
        .unwrap();

    canvas.set("db.ArrivalRate", ParamValue::Float(123.0)).unwrap();
    canvas.evaluate_flows(FlowStrategy::Static).unwrap();
    assert_eq!(
        canvas.get(Some("db.ArrivalRate")).unwrap()[0].1,
        ParamValue::Float(123.0),
        "manual override survives a flow apply"
    );

    // Solver-written paths do get refreshed when rates change.
    canvas.evaluate_flows(FlowStrategy::Static).unwrap();
    let server = canvas.get(Some("server.ArrivalRate")).unwrap();
    assert_eq!(server[0].1, ParamValue::Float(50.0));
    canvas.stop_all_generators().await;
}

#[tokio::test]
async fn two_generators_on_one_target_sum() {
    let canvas = chain_canvas(46);
    canvas
        .add_generator(GeneratorConfig::new("g1", "client.Start", 30.0))
        .unwrap();
    canvas
        .add_generator(GeneratorConfig::new("g2", "client.Start", 20.0))
        .unwrap();

    let outcome = canvas.evaluate_flows(FlowStrategy::Static).unwrap();
    assert!((outcome.rates["db.Query"] - 50.0).abs() < 1e-6);
    canvas.stop_all_generators().await;
}

#[tokio::test]
async fn flow_state_returns_last_solve() {
    let canvas = chain_canvas(47);
    assert!(canvas.flow_state().is_none());
    canvas
        .add_generator(GeneratorConfig::new("g1", "client.Start", 10.0))
        .unwrap();
    canvas.evaluate_flows(FlowStrategy::Static).unwrap();

    let state = canvas.flow_state().unwrap();
    assert_eq!(state.status, FlowStatus::Converged);
    assert!((state.rates["db.Query"] - 10.0).abs() < 1e-6);
    canvas.stop_all_generators().await;
}
