//! Wire-format-agnostic service surface
//!
//! [`CanvasService`] exposes every canvas operation behind typed models
//! with in-band error envelopes; transport shells bind it without touching
//! engine types.

pub mod models;
pub mod service;

pub use models::{
    BatchSetParametersRequest, CanvasInfo, ParameterUpdate, QueryMetricsRequest, RunRequest,
    RunSummary, ServiceResponse, TraceData,
};
pub use service::CanvasService;
