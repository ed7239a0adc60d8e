pub mod analyzer;
pub mod config;
pub mod models;
pub mod service;

pub use analyzer::LlmAnalyzer;
pub use config::{LogFormat, ServiceConfig};
pub use service::{AppState, build_router, create_app};
