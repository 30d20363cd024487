//! HTTP-triggered entry point: every request runs exactly one update cycle,
//! the way a scheduled webhook (or a manual curl) would.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::info;

use crate::updater::cycle::UpdateCycle;

type SharedCycle = Arc<Mutex<UpdateCycle>>;

/// Serves the trigger endpoint. GET and POST both run a cycle; anything else
/// is 405. Requests are serialized so cycles never overlap.
pub async fn serve(port: u16, cycle: UpdateCycle) -> Result<()> {
    let app = router(Arc::new(Mutex::new(cycle)));
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(cycle: SharedCycle) -> Router {
    Router::new()
        .route("/", get(trigger_update).post(trigger_update))
        .with_state(cycle)
}

async fn trigger_update(State(cycle): State<SharedCycle>) -> Response {
    let mut cycle = cycle.lock().await;
    match cycle.run_once().await {
        Ok(report) => (StatusCode::OK, Json(json!({ "success": report.is_fresh() }))).into_response(),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": error.to_string() })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::Value;

    use super::*;
    use crate::{
        config::RenderConfig,
        github::{MockStatusSink, PublishError},
        status::compose::StatusComposer,
        wakatime::{ActivitySnapshot, FetchError, MockActivitySource},
    };

    fn snapshot() -> ActivitySnapshot {
        ActivitySnapshot {
            current_project: Some("widget".into()),
            current_language: Some("Rust".into()),
            total_seconds_today: 3600,
            is_active: true,
            most_used_language: Some("Rust".into()),
            last_heartbeat: None,
        }
    }

    fn cycle_with(source: MockActivitySource, sink: MockStatusSink) -> UpdateCycle {
        UpdateCycle::new(
            Box::new(source),
            Box::new(sink),
            StatusComposer::new(RenderConfig::default()),
        )
    }

    async fn spawn_server(cycle: UpdateCycle) -> String {
        let app = router(Arc::new(Mutex::new(cycle)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn get_runs_a_cycle_and_reports_success() -> Result<()> {
        let mut source = MockActivitySource::new();
        source.expect_fetch().returning(|| Ok(snapshot()));
        let mut sink = MockStatusSink::new();
        sink.expect_publish().times(1).returning(|_| Ok(()));

        let url = spawn_server(cycle_with(source, sink)).await;
        let response = reqwest::get(&url).await?;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await?;
        assert_eq!(body["success"], true);
        Ok(())
    }

    #[tokio::test]
    async fn fallback_cycles_report_success_false() -> Result<()> {
        let mut source = MockActivitySource::new();
        source
            .expect_fetch()
            .returning(|| Err(FetchError::RetriesExhausted(3)));
        let mut sink = MockStatusSink::new();
        sink.expect_publish().times(1).returning(|_| Ok(()));

        let url = spawn_server(cycle_with(source, sink)).await;
        let body: Value = reqwest::Client::new()
            .post(&url)
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(body["success"], false);
        Ok(())
    }

    #[tokio::test]
    async fn failed_publish_is_a_server_error() -> Result<()> {
        let mut source = MockActivitySource::new();
        source.expect_fetch().returning(|| Ok(snapshot()));
        let mut sink = MockStatusSink::new();
        sink.expect_publish().returning(|_| {
            Err(PublishError::Rejected {
                status: reqwest::StatusCode::UNAUTHORIZED,
                body: "bad credentials".into(),
            })
        });

        let url = spawn_server(cycle_with(source, sink)).await;
        let response = reqwest::get(&url).await?;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::INTERNAL_SERVER_ERROR
        );
        let body: Value = response.json().await?;
        assert!(body["error"].as_str().unwrap().contains("bad credentials"));
        Ok(())
    }

    #[tokio::test]
    async fn other_methods_are_rejected() -> Result<()> {
        let source = MockActivitySource::new();
        let sink = MockStatusSink::new();

        let url = spawn_server(cycle_with(source, sink)).await;
        let response = reqwest::Client::new().delete(&url).send().await?;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::METHOD_NOT_ALLOWED
        );
        Ok(())
    }
}
