//! axum middleware that feeds inbound traffic into the idle detector.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/initialize", post(initialize))
//!     .layer(axum::middleware::from_fn_with_state(notifier.clone(), track_requests));
//! ```

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::FinishNotifier;

/// Record the request on the notifier, then hand it to the next service.
pub async fn track_requests(
    State(notifier): State<FinishNotifier>,
    request: Request,
    next: Next,
) -> Response {
    notifier.on_request();
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::NotifierConfig;
    use axum::routing::get;
    use axum::Router;
    use std::time::Duration;

    #[tokio::test]
    async fn test_middleware_updates_last_request() {
        let notifier = FinishNotifier::spawn(NotifierConfig::default(), || {}).expect("spawn");
        let app: Router = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(notifier.clone(), track_requests));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(notifier.idle_for() >= Duration::from_millis(150));

        let url = format!("http://{addr}/ping");
        let body = tokio::task::spawn_blocking(move || {
            ureq::get(&url).call().expect("request").into_string().expect("body")
        })
        .await
        .expect("join");

        assert_eq!(body, "pong");
        assert!(notifier.idle_for() < Duration::from_millis(150));
    }
}
