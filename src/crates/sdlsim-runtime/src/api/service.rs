//! Canvas service facade
//!
//! Every operation of the canvas surface as one method: resolve the
//! canvas, validate, act, wrap the outcome in a [`ServiceResponse`]. A
//! transport shell (REST, gRPC) binds these methods directly and never
//! deals with engine errors itself.

use crate::api::models::{
    BatchSetParametersRequest, CanvasInfo, ParameterUpdate, QueryMetricsRequest, RunRequest,
    RunSummary, ServiceResponse, TraceData,
};
use crate::canvas::Canvas;
use crate::error::{CanvasError, Result};
use crate::generator::GeneratorConfig;
use crate::loader::{FileResolver, SdlParser};
use crate::metrics::{MetricPoint, MetricSpec};
use crate::registry::CanvasRegistry;
use sdlsim_core::flow::{FlowOutcome, FlowStrategy};
use sdlsim_core::interpreter::PathNode;
use sdlsim_core::params::ParamValue;
use std::collections::HashMap;
use std::sync::Arc;

pub struct CanvasService {
    registry: Arc<CanvasRegistry>,
    resolver: Arc<dyn FileResolver>,
    parser: Arc<dyn SdlParser>,
}

impl CanvasService {
    pub fn new(
        registry: Arc<CanvasRegistry>,
        resolver: Arc<dyn FileResolver>,
        parser: Arc<dyn SdlParser>,
    ) -> Self {
        CanvasService {
            registry,
            resolver,
            parser,
        }
    }

    fn info(&self, canvas: &Canvas) -> CanvasInfo {
        CanvasInfo {
            id: canvas.id().to_string(),
            active_system: canvas.active_system(),
            generator_count: canvas.generators().len(),
            metric_count: canvas.list_metrics().len(),
            created_at: canvas.created_at(),
        }
    }

    // ---- canvas lifecycle -------------------------------------------------

    pub fn create_canvas(&self, id: &str) -> ServiceResponse<CanvasInfo> {
        ServiceResponse::from_result(
            self.registry.create(id).map(|canvas| self.info(&canvas)),
        )
    }

    pub fn list_canvases(&self) -> ServiceResponse<Vec<String>> {
        ServiceResponse::ok(self.registry.list())
    }

    pub fn get_canvas(&self, id: &str) -> ServiceResponse<CanvasInfo> {
        ServiceResponse::from_result(self.registry.get(id).map(|canvas| self.info(&canvas)))
    }

    pub async fn reset_canvas(&self, id: &str) -> ServiceResponse<CanvasInfo> {
        match self.registry.get(id) {
            Ok(canvas) => {
                canvas.reset().await;
                ServiceResponse::ok(self.info(&canvas))
            }
            Err(err) => ServiceResponse::err(&err),
        }
    }

    // ---- file / system ----------------------------------------------------

    pub async fn load_file(&self, id: &str, path: &str) -> ServiceResponse<()> {
        let result: Result<()> = async {
            let canvas = self.registry.get(id)?;
            canvas
                .load_path(path, self.resolver.as_ref(), self.parser.as_ref())
                .await
        }
        .await;
        ServiceResponse::from_result(result)
    }

    pub fn use_system(&self, id: &str, system: &str) -> ServiceResponse<()> {
        ServiceResponse::from_result(
            self.registry.get(id).and_then(|c| c.use_system(system)),
        )
    }

    // ---- parameters -------------------------------------------------------

    pub fn set_parameter(&self, id: &str, path: &str, value: ParamValue) -> ServiceResponse<()> {
        ServiceResponse::from_result(self.registry.get(id).and_then(|c| c.set(path, value)))
    }

    /// Applies updates in order; stops at the first failure and reports
    /// how many were applied.
    pub fn batch_set_parameters(
        &self,
        id: &str,
        request: BatchSetParametersRequest,
    ) -> ServiceResponse<usize> {
        let canvas = match self.registry.get(id) {
            Ok(canvas) => canvas,
            Err(err) => return ServiceResponse::err(&err),
        };
        let mut applied = 0usize;
        for update in request.updates {
            if let Err(err) = canvas.set(&update.path, update.value) {
                let mut resp = ServiceResponse::err(&err);
                resp.data = Some(applied);
                return resp;
            }
            applied += 1;
        }
        ServiceResponse::ok(applied)
    }

    pub fn get_parameters(
        &self,
        id: &str,
        path: Option<&str>,
    ) -> ServiceResponse<Vec<ParameterUpdate>> {
        ServiceResponse::from_result(self.registry.get(id).and_then(|c| {
            Ok(c.get(path)?
                .into_iter()
                .map(|(path, value)| ParameterUpdate { path, value })
                .collect())
        }))
    }

    // ---- evaluation -------------------------------------------------------

    pub fn run(&self, id: &str, request: RunRequest) -> ServiceResponse<RunSummary> {
        if request.runs == 0 {
            return ServiceResponse::err(&CanvasError::InvalidRequest(
                "runs must be positive".to_string(),
            ));
        }
        ServiceResponse::from_result(self.registry.get(id).and_then(|canvas| {
            let values = canvas.run(&request.var_name, &request.target, request.runs)?;
            let successes = values.iter().filter(|v| v.is_success()).count();
            let latencies: Vec<f64> = values.iter().map(|v| v.time).collect();
            Ok(RunSummary {
                var_name: request.var_name,
                runs: values.len(),
                successes,
                mean_latency: latencies.iter().sum::<f64>() / latencies.len() as f64,
                min_latency: latencies.iter().copied().fold(f64::INFINITY, f64::min),
                max_latency: latencies.iter().copied().fold(0.0, f64::max),
            })
        }))
    }

    pub fn execute_trace(
        &self,
        id: &str,
        component: &str,
        method: &str,
    ) -> ServiceResponse<TraceData> {
        let target = format!("{component}.{method}");
        ServiceResponse::from_result(self.registry.get(id).and_then(|canvas| {
            let (value, events) = canvas.execute_trace(&target)?;
            Ok(TraceData {
                target,
                success: value.is_success(),
                latency: value.time,
                result: value.to_json(),
                events,
            })
        }))
    }

    pub fn trace_all_paths(
        &self,
        id: &str,
        component: &str,
        method: &str,
        max_depth: Option<usize>,
    ) -> ServiceResponse<PathNode> {
        let target = format!("{component}.{method}");
        ServiceResponse::from_result(
            self.registry
                .get(id)
                .and_then(|c| c.trace_all_paths(&target, max_depth)),
        )
    }

    pub fn get_utilization(
        &self,
        id: &str,
        components: &[String],
    ) -> ServiceResponse<HashMap<String, f64>> {
        ServiceResponse::from_result(
            self.registry.get(id).and_then(|c| c.utilization(components)),
        )
    }

    // ---- generators -------------------------------------------------------

    pub fn add_generator(&self, id: &str, config: GeneratorConfig) -> ServiceResponse<()> {
        if config.rate_rps < 0.0 {
            return ServiceResponse::err(&CanvasError::InvalidRequest(
                "rate must be non-negative".to_string(),
            ));
        }
        ServiceResponse::from_result(self.registry.get(id).and_then(|c| c.add_generator(config)))
    }

    pub async fn update_generator(
        &self,
        id: &str,
        generator_id: &str,
        rate_rps: f64,
    ) -> ServiceResponse<()> {
        let result: Result<()> = async {
            let canvas = self.registry.get(id)?;
            canvas.update_generator_rate(generator_id, rate_rps).await
        }
        .await;
        ServiceResponse::from_result(result)
    }

    pub async fn remove_generator(&self, id: &str, generator_id: &str) -> ServiceResponse<()> {
        let result: Result<()> = async {
            let canvas = self.registry.get(id)?;
            canvas.remove_generator(generator_id).await
        }
        .await;
        ServiceResponse::from_result(result)
    }

    pub async fn pause_generator(&self, id: &str, generator_id: &str) -> ServiceResponse<()> {
        let result: Result<()> = async {
            let canvas = self.registry.get(id)?;
            canvas.pause_generator(generator_id).await
        }
        .await;
        ServiceResponse::from_result(result)
    }

    pub fn resume_generator(&self, id: &str, generator_id: &str) -> ServiceResponse<()> {
        ServiceResponse::from_result(
            self.registry
                .get(id)
                .and_then(|c| c.resume_generator(generator_id)),
        )
    }

    pub fn start_generators(&self, id: &str) -> ServiceResponse<()> {
        ServiceResponse::from_result(self.registry.get(id).map(|c| c.start_all_generators()))
    }

    pub async fn stop_generators(&self, id: &str) -> ServiceResponse<()> {
        match self.registry.get(id) {
            Ok(canvas) => {
                canvas.stop_all_generators().await;
                ServiceResponse::ok(())
            }
            Err(err) => ServiceResponse::err(&err),
        }
    }

    pub fn list_generators(&self, id: &str) -> ServiceResponse<Vec<GeneratorConfig>> {
        ServiceResponse::from_result(self.registry.get(id).map(|c| c.generators()))
    }

    // ---- metrics ----------------------------------------------------------

    pub fn add_metric(&self, id: &str, spec: MetricSpec) -> ServiceResponse<()> {
        if spec.window_seconds <= 0.0 {
            return ServiceResponse::err(&CanvasError::InvalidRequest(
                "window_seconds must be positive".to_string(),
            ));
        }
        ServiceResponse::from_result(self.registry.get(id).and_then(|c| c.add_metric(spec)))
    }

    pub fn delete_metric(&self, id: &str, metric_id: &str) -> ServiceResponse<()> {
        ServiceResponse::from_result(
            self.registry.get(id).and_then(|c| c.remove_metric(metric_id)),
        )
    }

    pub fn list_metrics(&self, id: &str) -> ServiceResponse<Vec<MetricSpec>> {
        ServiceResponse::from_result(self.registry.get(id).map(|c| c.list_metrics()))
    }

    pub fn query_metrics(
        &self,
        id: &str,
        request: QueryMetricsRequest,
    ) -> ServiceResponse<Vec<MetricPoint>> {
        ServiceResponse::from_result(self.registry.get(id).and_then(|c| {
            c.query_metrics(&request.metric_id, request.start, request.end, request.limit)
        }))
    }

    // ---- flow -------------------------------------------------------------

    pub fn evaluate_flows(&self, id: &str, strategy: FlowStrategy) -> ServiceResponse<FlowOutcome> {
        ServiceResponse::from_result(
            self.registry.get(id).and_then(|c| c.evaluate_flows(strategy)),
        )
    }

    pub fn get_flow_state(&self, id: &str) -> ServiceResponse<Option<FlowOutcome>> {
        ServiceResponse::from_result(self.registry.get(id).map(|c| c.flow_state()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{JsonParser, MemoryResolver};
    use sdlsim_core::ast::{FileDecl, InstanceDecl, SystemDecl};

    fn service() -> CanvasService {
        let mut resolver = MemoryResolver::new();
        let file = FileDecl::new("m.sdl")
            .system(SystemDecl::new("Main").instance(InstanceDecl::new("cache", "Cache")));
        resolver.insert("m.sdl", serde_json::to_vec(&file).unwrap());
        CanvasService::new(
            CanvasRegistry::new(),
            Arc::new(resolver),
            Arc::new(JsonParser),
        )
    }

    #[tokio::test]
    async fn test_create_load_use_run() {
        let service = service();
        assert!(service.create_canvas("c1").success);
        assert!(service.load_file("c1", "m.sdl").await.success);
        assert!(service.use_system("c1", "Main").success);

        let resp = service.run(
            "c1",
            RunRequest {
                var_name: "x".to_string(),
                target: "cache.Read".to_string(),
                runs: 10,
            },
        );
        assert!(resp.success);
        let summary = resp.data.unwrap();
        assert_eq!(summary.runs, 10);
        assert!(summary.mean_latency > 0.0);
    }

    #[tokio::test]
    async fn test_errors_are_in_band() {
        let service = service();
        let resp = service.use_system("ghost", "Main");
        assert!(!resp.success);
        assert_eq!(resp.error_code.as_deref(), Some("CANVAS_NOT_FOUND"));

        service.create_canvas("c1");
        let resp = service.use_system("c1", "Main");
        assert!(!resp.success);
        assert_eq!(resp.error_code.as_deref(), Some("NO_FILE_LOADED"));
    }

    #[tokio::test]
    async fn test_batch_set_stops_at_first_failure() {
        let service = service();
        service.create_canvas("c1");
        service.load_file("c1", "m.sdl").await;
        service.use_system("c1", "Main");

        let resp = service.batch_set_parameters(
            "c1",
            BatchSetParametersRequest {
                updates: vec![
                    ParameterUpdate {
                        path: "cache.HitRate".to_string(),
                        value: ParamValue::Float(0.9),
                    },
                    ParameterUpdate {
                        path: "ghost.HitRate".to_string(),
                        value: ParamValue::Float(0.1),
                    },
                    ParameterUpdate {
                        path: "cache.MissLatency".to_string(),
                        value: ParamValue::Float(0.02),
                    },
                ],
            },
        );
        assert!(!resp.success);
        assert_eq!(resp.data, Some(1), "one update applied before the failure");

        let params = service.get_parameters("c1", None);
        let applied = params.data.unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].path, "cache.HitRate");
    }

    #[tokio::test]
    async fn test_utilization_reports_queueing_components() {
        let service = service();
        service.create_canvas("c1");
        let file = sdlsim_core::ast::FileDecl::new("q.sdl").system(
            SystemDecl::new("Main")
                .instance(
                    InstanceDecl::new("pool", "ResourcePool")
                        .param("Size", ParamValue::Int(2))
                        .param("ArrivalRate", ParamValue::Float(20.0))
                        .param("HoldTime", ParamValue::Float(0.05)),
                )
                .instance(InstanceDecl::new("cache", "Cache")),
        );
        let canvas = service.registry.get("c1").unwrap();
        canvas.load_parsed(file);
        canvas.use_system("Main").unwrap();

        let resp = service.get_utilization(
            "c1",
            &["pool".to_string(), "cache".to_string()],
        );
        assert!(resp.success);
        let map = resp.data.unwrap();
        // ρ = 20 · 0.05 / 2 = 0.5; the cache has no queueing model.
        assert!((map["pool"] - 0.5).abs() < 1e-9);
        assert!(!map.contains_key("cache"));
    }

    #[tokio::test]
    async fn test_run_rejects_zero_runs() {
        let service = service();
        service.create_canvas("c1");
        let resp = service.run(
            "c1",
            RunRequest {
                var_name: "x".to_string(),
                target: "cache.Read".to_string(),
                runs: 0,
            },
        );
        assert!(!resp.success);
        assert_eq!(resp.error_code.as_deref(), Some("INVALID_REQUEST"));
    }
}
