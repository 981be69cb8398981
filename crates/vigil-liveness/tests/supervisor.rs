//! Supervisor tests against a scripted backend.
//!
//! The clock is paused: polls, expiry and refresh timers fire exactly
//! when scheduled and tests never wait in real time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::time::{self, Instant};
use url::Url;
use vigil_liveness::{
    LivenessConfig, LivenessSnapshot, LogoutReason, PollConfig, Supervisor, SupervisorHandle,
    TokenRefresher, Verdict,
};
use vigil_protocol::{endpoints, Api, Codec, FetchError, JsonCodec, RefreshTokenData};
use vigil_session::MemoryNavigator;
use vigil_transport::testing::ScriptedClient;
use vigil_transport::{HttpResponse, Method};

const REFRESH_URL: &str = "https://idp.example.com/refresh";

const TOKENS: &str = r#"{
    "access_token": "a",
    "refresh_token": "r",
    "session": {"exp": 1893456000},
    "userinfo": {}
}"#;

// =========================================================================
// Helpers
// =========================================================================

fn config() -> LivenessConfig {
    LivenessConfig {
        poll: PollConfig {
            initial_jitter: Duration::ZERO,
            ..PollConfig::default()
        },
        ..LivenessConfig::default()
    }
}

fn with_refresh(mut config: LivenessConfig) -> LivenessConfig {
    config.refresh.url = Some(Url::parse(REFRESH_URL).unwrap());
    config
}

/// Health ok, session without expiry data.
fn backend() -> Arc<ScriptedClient> {
    let client = Arc::new(ScriptedClient::new());
    client.respond(endpoints::HEALTH, HttpResponse::new(200, "{}"));
    client.respond(endpoints::ME, HttpResponse::new(200, r#"{"id":"u1"}"#));
    client.respond(endpoints::LOGOUT, HttpResponse::new(200, ""));
    client.respond(REFRESH_URL, HttpResponse::new(200, TOKENS));
    client.respond(endpoints::REFRESH_TOKEN, HttpResponse::new(200, "{}"));
    client
}

/// A `/api/me` body whose session expires `secs` from now. The extra
/// half second keeps the floored value at `secs`.
fn session_expiring_in(secs: i64) -> HttpResponse {
    let expiry = Utc::now() + TimeDelta::milliseconds(secs * 1000 + 500);
    HttpResponse::new(
        200,
        format!(r#"{{"id":"u1","oidc_expiry":"{}"}}"#, expiry.to_rfc3339()),
    )
}

fn spawn(
    client: &Arc<ScriptedClient>,
    navigator: &Arc<MemoryNavigator>,
    config: LivenessConfig,
) -> SupervisorHandle {
    Supervisor::new(Api::new(Arc::clone(client)), Arc::clone(navigator), config).spawn()
}

fn navigator() -> Arc<MemoryNavigator> {
    Arc::new(MemoryNavigator::at("/chat"))
}

async fn wait_until(
    handle: &SupervisorHandle,
    pred: impl FnMut(&LivenessSnapshot) -> bool,
) -> LivenessSnapshot {
    let mut rx = handle.subscribe();
    time::timeout(Duration::from_secs(24 * 3600), rx.wait_for(pred))
        .await
        .expect("condition never reached")
        .expect("supervisor stopped")
        .clone()
}

fn count(client: &ScriptedClient, method: Method, path: &str) -> usize {
    client.count(method, path)
}

/// Hands out fixed tokens without touching the network.
#[derive(Clone, Default)]
struct CountingRefresher {
    calls: Arc<AtomicUsize>,
}

impl CountingRefresher {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenRefresher for CountingRefresher {
    async fn refresh(&self) -> Result<RefreshTokenData, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(JsonCodec.decode(TOKENS.as_bytes()).unwrap())
    }
}

fn spawn_with_refresher(
    client: &Arc<ScriptedClient>,
    navigator: &Arc<MemoryNavigator>,
    config: LivenessConfig,
    refresher: &CountingRefresher,
) -> SupervisorHandle {
    Supervisor::new(Api::new(Arc::clone(client)), Arc::clone(navigator), config)
        .with_refresher(refresher.clone())
        .spawn()
}

// =========================================================================
// Verdict
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_banner_only_while_backend_unreachable() {
    let client = backend();
    client.push_failure(endpoints::HEALTH, "connection refused");
    let nav = navigator();
    let handle = spawn(&client, &nav, config());

    let degraded = wait_until(&handle, |s| s.verdict == Verdict::Degraded).await;
    assert!(degraded.show_banner());
    assert!(!degraded.backend_reachable);

    // Next poll, 30s later, succeeds.
    let healthy = wait_until(&handle, |s| s.verdict == Verdict::Healthy).await;
    assert!(!healthy.show_banner());
    assert!(nav.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_health_error_status_is_recoverable() {
    let client = backend();
    client.respond(endpoints::HEALTH, HttpResponse::new(503, "maintenance"));
    let nav = navigator();
    let handle = spawn(&client, &nav, config());

    wait_until(&handle, |s| s.verdict == Verdict::Degraded).await;
    time::sleep(Duration::from_secs(120)).await;

    assert_eq!(handle.verdict(), Verdict::Degraded);
    assert!(nav.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_403_logs_out_despite_healthy_backend() {
    let client = backend();
    client.respond(endpoints::ME, HttpResponse::new(403, "forbidden"));
    let nav = navigator();
    let handle = spawn(&client, &nav, config());

    let snapshot = wait_until(&handle, |s| s.verdict.is_logged_out()).await;

    assert_eq!(
        snapshot.verdict,
        Verdict::LoggedOut(LogoutReason::SessionForbidden)
    );
    assert!(snapshot.show_logged_out_prompt);
    assert!(!snapshot.show_banner());
    assert_eq!(nav.navigations(), vec!["/auth/login".to_string()]);
    assert_eq!(count(&client, Method::Post, endpoints::LOGOUT), 1);
}

#[tokio::test(start_paused = true)]
async fn test_health_403_logs_out_without_logout_call() {
    let client = backend();
    client.respond(endpoints::HEALTH, HttpResponse::new(403, "forbidden"));
    let nav = navigator();
    let handle = spawn(&client, &nav, config());

    let snapshot = wait_until(&handle, |s| s.verdict.is_logged_out()).await;

    assert_eq!(
        snapshot.verdict,
        Verdict::LoggedOut(LogoutReason::HealthRedirect)
    );
    assert_eq!(nav.navigations(), vec!["/auth/login".to_string()]);
    assert_eq!(count(&client, Method::Post, endpoints::LOGOUT), 0);
}

#[tokio::test(start_paused = true)]
async fn test_logout_navigates_once_and_stops_polling() {
    let client = backend();
    client.respond(endpoints::ME, HttpResponse::new(403, "forbidden"));
    let nav = navigator();
    let handle = spawn(&client, &nav, config());

    wait_until(&handle, |s| s.verdict.is_logged_out()).await;
    let polls = count(&client, Method::Get, endpoints::ME);
    time::sleep(Duration::from_secs(600)).await;

    assert_eq!(nav.navigations().len(), 1);
    assert_eq!(count(&client, Method::Get, endpoints::ME), polls);
}

#[tokio::test(start_paused = true)]
async fn test_logout_on_auth_page_stays_put() {
    let client = backend();
    client.respond(endpoints::ME, HttpResponse::new(403, "forbidden"));
    let nav = Arc::new(MemoryNavigator::at("/auth/login"));
    let handle = spawn(&client, &nav, config());

    let snapshot = wait_until(&handle, |s| s.verdict.is_logged_out()).await;

    assert!(!snapshot.show_logged_out_prompt);
    assert!(nav.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_failure_other_than_403_keeps_verdict() {
    let client = backend();
    client.respond(endpoints::ME, HttpResponse::new(500, "oops"));
    let nav = navigator();
    let handle = spawn(&client, &nav, config());

    time::sleep(Duration::from_secs(95)).await;

    assert!(count(&client, Method::Get, endpoints::ME) >= 3);
    assert_eq!(handle.verdict(), Verdict::Healthy);
    assert!(nav.navigations().is_empty());
}

// =========================================================================
// Expiry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_expiry_fires_after_lifetime_plus_grace() {
    let client = backend();
    client.respond(endpoints::ME, session_expiring_in(60));
    let nav = navigator();
    let start = Instant::now();
    let handle = spawn(&client, &nav, config());

    time::sleep(Duration::from_secs(69)).await;
    assert_eq!(handle.verdict(), Verdict::Healthy, "not before S + 10");

    let snapshot = wait_until(&handle, |s| s.verdict.is_logged_out()).await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(70) && elapsed < Duration::from_secs(71));
    assert_eq!(
        snapshot.verdict,
        Verdict::LoggedOut(LogoutReason::SessionExpired)
    );
    assert!(snapshot.session_expired);
    assert_eq!(nav.navigations(), vec!["/auth/login".to_string()]);
    // Only a forbidden session triggers the logout call.
    assert_eq!(count(&client, Method::Post, endpoints::LOGOUT), 0);
}

#[tokio::test(start_paused = true)]
async fn test_changed_session_rearms_expiry() {
    let client = backend();
    client.push(endpoints::ME, session_expiring_in(60));
    client.respond(endpoints::ME, session_expiring_in(600));
    let nav = navigator();
    let start = Instant::now();
    let handle = spawn(&client, &nav, config());

    // First arming would fire at 70s; the 30s poll replaced it.
    time::sleep(Duration::from_secs(100)).await;
    assert_eq!(handle.verdict(), Verdict::Healthy);

    wait_until(&handle, |s| s.verdict.is_logged_out()).await;
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(640) && elapsed < Duration::from_secs(641));
}

// =========================================================================
// Refresh
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_never_runs_without_url() {
    let client = backend();
    client.respond(endpoints::ME, session_expiring_in(60));
    let nav = navigator();
    let _handle = spawn(&client, &nav, config());

    time::sleep(Duration::from_secs(65)).await;

    assert_eq!(count(&client, Method::Get, REFRESH_URL), 0);
    assert_eq!(count(&client, Method::Post, endpoints::REFRESH_TOKEN), 0);
}

#[tokio::test(start_paused = true)]
async fn test_eager_refresh_below_cadence_bypasses_dedup() {
    let client = backend();
    client.push(endpoints::ME, session_expiring_in(600));
    client.respond(endpoints::ME, session_expiring_in(3600));
    let nav = navigator();
    let handle = spawn(&client, &nav, with_refresh(config()));

    time::sleep(Duration::from_secs(10)).await;

    assert_eq!(count(&client, Method::Get, REFRESH_URL), 1);
    assert_eq!(count(&client, Method::Post, endpoints::REFRESH_TOKEN), 1);
    // Poll at 0s plus the re-fetch at 4s, inside the 30s dedup window.
    assert_eq!(count(&client, Method::Get, endpoints::ME), 2);

    // The renewed session re-armed expiry past the original 610s.
    time::sleep(Duration::from_secs(700)).await;
    assert_eq!(handle.verdict(), Verdict::Healthy);
}

#[tokio::test(start_paused = true)]
async fn test_no_eager_refresh_at_or_above_cadence() {
    let client = backend();
    client.respond(endpoints::ME, session_expiring_in(3600));
    let nav = navigator();
    let _handle = spawn(&client, &nav, with_refresh(config()));

    time::sleep(Duration::from_secs(899)).await;
    assert_eq!(count(&client, Method::Get, REFRESH_URL), 0);

    // First scheduled cycle one cadence period after the loop started.
    time::sleep(Duration::from_secs(2)).await;
    assert_eq!(count(&client, Method::Get, REFRESH_URL), 1);
}

#[tokio::test(start_paused = true)]
async fn test_short_session_kept_alive_by_renewals() {
    let client = backend();
    client.respond(endpoints::ME, session_expiring_in(600));
    let nav = navigator();
    let handle = spawn(&client, &nav, with_refresh(config()));

    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(count(&client, Method::Get, REFRESH_URL), 1, "eager refresh");

    // Renewed at 4s, still 600s left: renewed again at 544s, well before
    // the 614s expiry and the 900s cadence tick.
    time::sleep(Duration::from_secs(790)).await;

    assert_eq!(handle.verdict(), Verdict::Healthy);
    assert_eq!(count(&client, Method::Get, REFRESH_URL), 2);
    assert!(nav.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_custom_refresher_replaces_http_fetch() {
    let client = backend();
    client.respond(endpoints::ME, session_expiring_in(600));
    let nav = navigator();
    let refresher = CountingRefresher::default();
    let handle = spawn_with_refresher(&client, &nav, with_refresh(config()), &refresher);

    time::sleep(Duration::from_secs(10)).await;

    assert_eq!(refresher.calls(), 1);
    assert_eq!(count(&client, Method::Get, REFRESH_URL), 0);
    assert_eq!(count(&client, Method::Post, endpoints::REFRESH_TOKEN), 1);
    assert_eq!(handle.verdict(), Verdict::Healthy);
}

#[tokio::test(start_paused = true)]
async fn test_custom_refresher_ignored_without_url() {
    let client = backend();
    client.respond(endpoints::ME, session_expiring_in(600));
    let nav = navigator();
    let refresher = CountingRefresher::default();
    let handle = spawn_with_refresher(&client, &nav, config(), &refresher);

    let snapshot = wait_until(&handle, |s| s.verdict.is_logged_out()).await;

    assert_eq!(refresher.calls(), 0);
    assert_eq!(count(&client, Method::Post, endpoints::REFRESH_TOKEN), 0);
    assert_eq!(
        snapshot.verdict,
        Verdict::LoggedOut(LogoutReason::SessionExpired)
    );
}

#[tokio::test(start_paused = true)]
async fn test_refresh_loop_waits_for_expiry_data() {
    let client = backend();
    let nav = navigator();
    let _handle = spawn(&client, &nav, with_refresh(config()));

    time::sleep(Duration::from_secs(1000)).await;

    assert_eq!(count(&client, Method::Get, REFRESH_URL), 0);
}

// =========================================================================
// Revalidation and teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_revalidate_respects_dedup_window() {
    let client = backend();
    let nav = navigator();
    let mut config = config();
    config.poll.interval = Duration::from_secs(3600);
    let handle = spawn(&client, &nav, config);

    time::sleep(Duration::from_secs(5)).await;
    assert_eq!(count(&client, Method::Get, endpoints::ME), 1);

    handle.revalidate_session().await.unwrap();
    time::sleep(Duration::from_secs(1)).await;
    assert_eq!(count(&client, Method::Get, endpoints::ME), 1, "within window");

    time::sleep(Duration::from_secs(30)).await;
    handle.revalidate_session().await.unwrap();
    handle.revalidate_health().await.unwrap();
    time::sleep(Duration::from_secs(1)).await;
    assert_eq!(count(&client, Method::Get, endpoints::ME), 2);
    assert_eq!(count(&client, Method::Get, endpoints::HEALTH), 2);
}

#[tokio::test(start_paused = true)]
async fn test_polls_follow_interval() {
    let client = backend();
    let nav = navigator();
    let _handle = spawn(&client, &nav, config());

    time::sleep(Duration::from_secs(95)).await;

    // 0s, 30s, 60s, 90s.
    assert_eq!(count(&client, Method::Get, endpoints::HEALTH), 4);
    assert_eq!(count(&client, Method::Get, endpoints::ME), 4);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_leaves_nothing_running() {
    let client = backend();
    client.respond(endpoints::ME, session_expiring_in(60));
    let nav = navigator();
    let handle = spawn(&client, &nav, with_refresh(config()));

    time::sleep(Duration::from_secs(1)).await;
    let requests = client.requests().len();
    let mut snapshots = handle.subscribe();

    handle.shutdown().await;
    time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(client.requests().len(), requests, "no polls or refreshes");
    assert!(nav.navigations().is_empty(), "expiry never fired");
    assert!(snapshots.changed().await.is_err(), "actor is gone");
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_stops_supervisor() {
    let client = backend();
    let nav = navigator();
    let handle = spawn(&client, &nav, config());

    time::sleep(Duration::from_secs(1)).await;
    let requests = client.requests().len();
    drop(handle);
    time::sleep(Duration::from_secs(600)).await;

    assert_eq!(client.requests().len(), requests);
}
