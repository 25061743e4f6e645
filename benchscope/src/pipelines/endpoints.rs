//! Process-to-process analysis endpoints.
//!
//! ```text
//! POST /debug/accessLog     AccessLogRequest    → 200 summary | 500 error text
//! POST /debug/slowQueryLog  SlowQueryLogRequest → 200 summary | 500 error text
//! ```
//!
//! Bodies are decoded by hand so that malformed JSON surfaces as a 500 with
//! the error text, like every other failure. Analysis runs external tools
//! and blocking HTTP calls, so it is moved off the async workers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use log::{error, info};

use super::{
    AccessLogAnalyzer, AccessLogRequest, AnalyzerConfig, SlowQueryAnalyzer, SlowQueryLogRequest,
    ACCESS_LOG_ENDPOINT, SLOW_QUERY_LOG_ENDPOINT,
};
use crate::domain::PipelineError;

struct Analyzers {
    access_log: AccessLogAnalyzer,
    slow_query: SlowQueryAnalyzer,
}

/// Router hosting both analysis endpoints. Merge it into the application's
/// router or serve it on its own.
pub fn analysis_router(config: AnalyzerConfig) -> Router {
    let analyzers = Arc::new(Analyzers {
        access_log: AccessLogAnalyzer::new(config.clone()),
        slow_query: SlowQueryAnalyzer::new(config),
    });
    Router::new()
        .route(ACCESS_LOG_ENDPOINT, post(access_log))
        .route(SLOW_QUERY_LOG_ENDPOINT, post(slow_query_log))
        .with_state(analyzers)
}

async fn access_log(State(analyzers): State<Arc<Analyzers>>, body: Bytes) -> Response {
    run_analysis(ACCESS_LOG_ENDPOINT, move || {
        let request: AccessLogRequest = serde_json::from_slice(&body)?;
        analyzers.access_log.analyze(&request)
    })
    .await
}

async fn slow_query_log(State(analyzers): State<Arc<Analyzers>>, body: Bytes) -> Response {
    run_analysis(SLOW_QUERY_LOG_ENDPOINT, move || {
        let request: SlowQueryLogRequest = serde_json::from_slice(&body)?;
        analyzers.slow_query.analyze(&request)
    })
    .await
}

async fn run_analysis<F>(endpoint: &'static str, analysis: F) -> Response
where
    F: FnOnce() -> Result<String, PipelineError> + Send + 'static,
{
    match tokio::task::spawn_blocking(analysis).await {
        Ok(Ok(summary)) => {
            info!("{endpoint}: {}", summary.replace('\n', ", "));
            (StatusCode::OK, format!("{summary}\n")).into_response()
        }
        Ok(Err(e)) => {
            error!("{endpoint}: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{e}\n")).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("{e}\n")).into_response(),
    }
}
