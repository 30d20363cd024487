//! Read side of the pipeline: fetches today's activity from WakaTime and
//! normalizes it into an [ActivitySnapshot].

pub mod activity;
pub mod api;

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use reqwest::{header::AUTHORIZATION, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::utils::clock::Clock;

use self::{
    activity::ActivityWindow,
    api::{CurrentUser, Envelope, LanguageUsage, StatusBarToday},
};

/// Normalized view of today's coding activity. Built fresh on every fetch,
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySnapshot {
    pub current_project: Option<String>,
    pub current_language: Option<String>,
    pub total_seconds_today: u64,
    pub is_active: bool,
    pub most_used_language: Option<String>,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

/// The most recent non-empty project seen across fetches. Keeps the project
/// segment populated when the live status momentarily loses it.
#[derive(Debug, Clone)]
struct LastKnownProject {
    name: String,
    language: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("activity source rate limited the request")]
    RateLimited,
    #[error("retry budget exhausted after {0} rate limited tries")]
    RetriesExhausted(u32),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("activity source returned status {0}")]
    Status(StatusCode),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivitySource: Send {
    async fn fetch(&mut self) -> Result<ActivitySnapshot, FetchError>;
}

pub struct WakaTimeClient {
    http: reqwest::Client,
    base_url: String,
    auth_header: String,
    retry_attempts: u32,
    activity_window: ActivityWindow,
    last_active_project: Option<LastKnownProject>,
    clock: Box<dyn Clock>,
}

impl WakaTimeClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        retry_attempts: u32,
        activity_window: ActivityWindow,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            // WakaTime expects the bare key in the Basic credential, not a
            // user:password pair.
            auth_header: format!("Basic {}", STANDARD.encode(api_key)),
            retry_attempts,
            activity_window,
            last_active_project: None,
            clock,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
            status if !status.is_success() => Err(FetchError::Status(status)),
            _ => Ok(response.json::<T>().await?),
        }
    }

    async fn fetch_once(&mut self) -> Result<ActivitySnapshot, FetchError> {
        let (user, status_bar) = tokio::try_join!(
            self.get_json::<Envelope<CurrentUser>>("/users/current"),
            self.get_json::<Envelope<StatusBarToday>>("/users/current/status_bar/today"),
        )?;
        let user = user.data;
        let status_bar = status_bar.data;

        let live_project = non_empty(status_bar.project).or_else(|| non_empty(user.last_project));
        let live_language =
            non_empty(status_bar.language).or_else(|| non_empty(user.last_language));

        if let Some(name) = &live_project {
            self.last_active_project = Some(LastKnownProject {
                name: name.clone(),
                language: live_language.clone(),
            });
        }

        let (current_project, current_language) = match live_project {
            Some(project) => (Some(project), live_language),
            None => self
                .last_active_project
                .as_ref()
                .map_or((None, None), |last| {
                    (Some(last.name.clone()), last.language.clone())
                }),
        };

        let languages = status_bar.languages.or(user.languages).unwrap_or_default();
        let total_seconds_today = status_bar
            .grand_total
            .map_or(0.0, |total| total.total_seconds)
            .max(0.0) as u64;

        Ok(ActivitySnapshot {
            current_project,
            current_language,
            total_seconds_today,
            is_active: self
                .activity_window
                .is_active(self.clock.time(), status_bar.heartbeat_at),
            most_used_language: most_used_language(&languages),
            last_heartbeat: status_bar.heartbeat_at,
        })
    }
}

#[async_trait]
impl ActivitySource for WakaTimeClient {
    /// Fetches and normalizes today's activity. Rate limited reads back off
    /// for `2^attempt` seconds, up to the configured try budget; every other
    /// failure is surfaced immediately.
    async fn fetch(&mut self) -> Result<ActivitySnapshot, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(FetchError::RateLimited) if attempt + 1 < self.retry_attempts => {
                    let wait = Duration::from_secs(2u64.saturating_pow(attempt));
                    debug!("Rate limited, backing off for {wait:?}");
                    self.clock.sleep(wait).await;
                    attempt += 1;
                }
                Err(FetchError::RateLimited) => {
                    return Err(FetchError::RetriesExhausted(self.retry_attempts))
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Picks the language with the most accumulated seconds, ignoring the
/// synthetic "Other" bucket. Ties keep the entry encountered first.
fn most_used_language(languages: &[LanguageUsage]) -> Option<String> {
    let mut best: Option<&LanguageUsage> = None;
    for language in languages.iter().filter(|l| l.name != "Other") {
        let better = match best {
            Some(current) => language.total_seconds > current.total_seconds,
            None => true,
        };
        if better {
            best = Some(language);
        }
    }
    best.map(|l| l.name.clone())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        net::SocketAddr,
        sync::{
            atomic::{AtomicU32, Ordering},
            Arc, Mutex,
        },
    };

    use anyhow::Result;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Value};
    use tokio::time::Instant;

    use super::*;

    fn usage(name: &str, total_seconds: f64) -> LanguageUsage {
        LanguageUsage {
            name: name.into(),
            total_seconds,
        }
    }

    #[test]
    fn other_bucket_never_wins() {
        let languages = [usage("Other", 1000.0), usage("Go", 500.0)];
        assert_eq!(most_used_language(&languages), Some("Go".into()));
    }

    #[test]
    fn ties_keep_the_first_entry() {
        let languages = [usage("Go", 900.0), usage("Rust", 900.0)];
        assert_eq!(most_used_language(&languages), Some("Go".into()));
    }

    #[test]
    fn only_other_means_no_language() {
        assert_eq!(most_used_language(&[usage("Other", 1000.0)]), None);
        assert_eq!(most_used_language(&[]), None);
    }

    /// Clock whose sleeps return immediately but get recorded, so backoff
    /// schedules can be asserted without waiting them out.
    struct NoWaitClock {
        sleeps: Arc<Mutex<Vec<Duration>>>,
    }

    #[async_trait]
    impl Clock for NoWaitClock {
        fn time(&self) -> DateTime<Utc> {
            Utc::now()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }

        async fn sleep_until(&self, _instant: Instant) {}
    }

    #[derive(Clone)]
    struct MockApi {
        status_hits: Arc<AtomicU32>,
        rate_limited_responses: u32,
        server_error: bool,
        user_body: Value,
        status_bodies: Arc<Mutex<VecDeque<Value>>>,
        seen_auth: Arc<Mutex<Option<String>>>,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                status_hits: Arc::new(AtomicU32::new(0)),
                rate_limited_responses: 0,
                server_error: false,
                user_body: json!({
                    "data": {"last_project": "owner/widget", "last_language": "Rust"}
                }),
                status_bodies: Arc::new(Mutex::new(VecDeque::new())),
                seen_auth: Arc::new(Mutex::new(None)),
            }
        }

        fn push_status_body(&self, body: Value) {
            self.status_bodies.lock().unwrap().push_back(body);
        }
    }

    async fn current_user(State(api): State<MockApi>) -> Json<Value> {
        Json(api.user_body.clone())
    }

    async fn status_bar(
        State(api): State<MockApi>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<Value>) {
        *api.seen_auth.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let hit = api.status_hits.fetch_add(1, Ordering::SeqCst);
        if api.server_error {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "boom"})),
            );
        }
        if hit < api.rate_limited_responses {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": "rate limited"})),
            );
        }
        let body = api
            .status_bodies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| json!({"data": {}}));
        (StatusCode::OK, Json(body))
    }

    async fn spawn_mock_api(api: MockApi) -> SocketAddr {
        let app = Router::new()
            .route("/users/current", get(current_user))
            .route("/users/current/status_bar/today", get(status_bar))
            .with_state(api);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    fn client_for(
        addr: SocketAddr,
        retry_attempts: u32,
        sleeps: Arc<Mutex<Vec<Duration>>>,
    ) -> WakaTimeClient {
        WakaTimeClient::new(
            &format!("http://{addr}"),
            "waka_test_key",
            retry_attempts,
            ActivityWindow::from_seconds(300),
            Box::new(NoWaitClock { sleeps }),
        )
    }

    #[tokio::test]
    async fn normalizes_a_live_status_bar() -> Result<()> {
        let api = MockApi::new();
        api.push_status_body(json!({
            "data": {
                "project": "acme/rocket",
                "language": "Go",
                "heartbeat_at": (Utc::now() - chrono::Duration::seconds(60)).to_rfc3339(),
                "grand_total": {"total_seconds": 14400.5},
                "languages": [
                    {"name": "Other", "total_seconds": 12000.0},
                    {"name": "Go", "total_seconds": 9000.0},
                    {"name": "Rust", "total_seconds": 9000.0}
                ]
            }
        }));
        let seen_auth = api.seen_auth.clone();
        let addr = spawn_mock_api(api).await;

        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let mut client = client_for(addr, 3, sleeps.clone());
        let snapshot = client.fetch().await?;

        assert_eq!(snapshot.current_project.as_deref(), Some("acme/rocket"));
        assert_eq!(snapshot.current_language.as_deref(), Some("Go"));
        assert_eq!(snapshot.total_seconds_today, 14400);
        assert!(snapshot.is_active);
        assert_eq!(snapshot.most_used_language.as_deref(), Some("Go"));
        assert!(sleeps.lock().unwrap().is_empty());

        let auth = seen_auth.lock().unwrap().clone().unwrap();
        assert_eq!(auth, format!("Basic {}", STANDARD.encode("waka_test_key")));
        Ok(())
    }

    #[tokio::test]
    async fn falls_back_to_profile_fields_when_status_bar_is_empty() -> Result<()> {
        let addr = spawn_mock_api(MockApi::new()).await;

        let mut client = client_for(addr, 3, Arc::new(Mutex::new(Vec::new())));
        let snapshot = client.fetch().await?;

        assert_eq!(snapshot.current_project.as_deref(), Some("owner/widget"));
        assert_eq!(snapshot.current_language.as_deref(), Some("Rust"));
        assert_eq!(snapshot.total_seconds_today, 0);
        assert!(!snapshot.is_active, "no heartbeat may never count as active");
        assert_eq!(snapshot.last_heartbeat, None);
        Ok(())
    }

    #[tokio::test]
    async fn remembers_the_last_project_across_fetches() -> Result<()> {
        let mut api = MockApi::new();
        api.user_body = json!({"data": {}});
        api.push_status_body(json!({"data": {"project": "acme/rocket", "language": "Go"}}));
        let addr = spawn_mock_api(api).await;

        let mut client = client_for(addr, 3, Arc::new(Mutex::new(Vec::new())));
        let first = client.fetch().await?;
        assert_eq!(first.current_project.as_deref(), Some("acme/rocket"));

        // Second response carries no project at all, the remembered one fills in.
        let second = client.fetch().await?;
        assert_eq!(second.current_project.as_deref(), Some("acme/rocket"));
        assert_eq!(second.current_language.as_deref(), Some("Go"));
        Ok(())
    }

    #[tokio::test]
    async fn persistent_rate_limiting_exhausts_the_retry_budget() -> Result<()> {
        let mut api = MockApi::new();
        // One more limited response than the budget: the fourth try would
        // succeed, but the client must give up after three.
        api.rate_limited_responses = 3;
        let hits = api.status_hits.clone();
        let addr = spawn_mock_api(api).await;

        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let mut client = client_for(addr, 3, sleeps.clone());
        let error = client.fetch().await.unwrap_err();

        assert!(matches!(error, FetchError::RetriesExhausted(3)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn recovers_when_rate_limiting_clears_within_the_budget() -> Result<()> {
        let mut api = MockApi::new();
        api.rate_limited_responses = 2;
        let addr = spawn_mock_api(api).await;

        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let mut client = client_for(addr, 3, sleeps.clone());
        let snapshot = client.fetch().await?;

        assert_eq!(snapshot.current_project.as_deref(), Some("owner/widget"));
        assert_eq!(
            *sleeps.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn non_rate_limit_failures_are_not_retried() -> Result<()> {
        let mut api = MockApi::new();
        api.server_error = true;
        let hits = api.status_hits.clone();
        let addr = spawn_mock_api(api).await;

        let sleeps = Arc::new(Mutex::new(Vec::new()));
        let mut client = client_for(addr, 3, sleeps.clone());
        let error = client.fetch().await.unwrap_err();

        assert!(
            matches!(error, FetchError::Status(status) if status == StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(sleeps.lock().unwrap().is_empty());
        Ok(())
    }
}
