//! Supervisor actor: the single owner of a page's liveness state.
//!
//! Poll results, expiry fires and refresh outcomes all arrive as
//! [`LivenessEvent`]s on one channel. Only the actor applies them, so
//! there is no shared mutable state; the outside world reads snapshots
//! from a `watch` channel and sends commands through a
//! [`SupervisorHandle`].

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use vigil_protocol::{endpoints, JsonApi};
use vigil_session::Navigator;
use vigil_tick::{Cadence, CadenceConfig, Dedup};
use vigil_transport::HttpClient;

use crate::{
    Effect, ExpiryScheduler, HttpRefresher, LivenessConfig, LivenessError, LivenessEvent,
    LivenessSnapshot, LivenessState, LogoutReason, RefreshCycle, RefreshLoop, TokenRefresher,
    Verdict,
};

/// Command channel capacity.
const COMMAND_BUFFER: usize = 32;

/// Commands sent to the supervisor actor.
#[derive(Debug)]
enum Command {
    /// Poll health now, subject to the dedup window.
    RevalidateHealth,
    /// Poll the session now, subject to the dedup window.
    RevalidateSession,
    Shutdown,
}

// ---------------------------------------------------------------------------
// Supervisor (builder)
// ---------------------------------------------------------------------------

/// Configures and spawns the supervisor for one page.
pub struct Supervisor<C, N, R = HttpRefresher<C>> {
    api: JsonApi<C>,
    navigator: Arc<N>,
    config: LivenessConfig,
    /// `None` when refresh is disabled.
    refresher: Option<Arc<R>>,
}

impl<C: HttpClient, N: Navigator> Supervisor<C, N, HttpRefresher<C>> {
    /// Refresh runs against `config.refresh.url` when one is set.
    pub fn new(api: JsonApi<C>, navigator: Arc<N>, config: LivenessConfig) -> Self {
        let config = config.validated();
        let refresher = config
            .refresh
            .url
            .as_ref()
            .map(|url| Arc::new(HttpRefresher::new(api.clone(), url)));
        Self {
            api,
            navigator,
            config,
            refresher,
        }
    }
}

impl<C: HttpClient, N: Navigator, R: TokenRefresher> Supervisor<C, N, R> {
    /// Replaces the source of fresh tokens. Has no effect unless a
    /// refresh URL is configured.
    pub fn with_refresher<R2: TokenRefresher>(self, refresher: R2) -> Supervisor<C, N, R2> {
        if !self.config.refresh.is_enabled() {
            tracing::warn!("custom refresher ignored: no refresh url configured");
        }
        Supervisor {
            refresher: self
                .config
                .refresh
                .is_enabled()
                .then(|| Arc::new(refresher)),
            api: self.api,
            navigator: self.navigator,
            config: self.config,
        }
    }

    /// Starts the actor. Must be called inside a Tokio runtime.
    pub fn spawn(self) -> SupervisorHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let threshold = self
            .refresher
            .is_some()
            .then_some(self.config.refresh.cadence);
        let state = LivenessState::new(threshold);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());

        let poll = self.config.poll.clone();
        let cadence =
            || Cadence::new(CadenceConfig::every(poll.interval).with_jitter(poll.initial_jitter));
        let expiry = ExpiryScheduler::new(self.config.expiry.grace, events_tx.clone());

        let actor = SupervisorActor {
            health_cadence: cadence(),
            session_cadence: cadence(),
            health_dedup: Dedup::new(poll.dedup_window),
            session_dedup: Dedup::new(poll.dedup_window),
            expiry,
            api: self.api,
            navigator: self.navigator,
            config: self.config,
            refresher: self.refresher,
            refresh_loop: None,
            state,
            snapshots: snapshot_tx,
            events_tx,
            events: events_rx,
            commands: command_rx,
            polls: JoinSet::new(),
        };

        let task = tokio::spawn(actor.run());

        SupervisorHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            task: Some(task),
        }
    }
}

// ---------------------------------------------------------------------------
// SupervisorHandle
// ---------------------------------------------------------------------------

/// Handle to a running supervisor.
///
/// Dropping the handle stops the actor, the same as
/// [`shutdown`](Self::shutdown) without waiting for it.
#[derive(Debug)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<LivenessSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// The latest published snapshot.
    pub fn snapshot(&self) -> LivenessSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn verdict(&self) -> Verdict {
        self.snapshots.borrow().verdict
    }

    pub fn show_banner(&self) -> bool {
        self.snapshots.borrow().show_banner()
    }

    /// A receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<LivenessSnapshot> {
        self.snapshots.clone()
    }

    /// Asks for a health poll now (e.g. on window focus). Dropped if one
    /// ran within the dedup window or is still in flight.
    pub async fn revalidate_health(&self) -> Result<(), LivenessError> {
        self.send(Command::RevalidateHealth).await
    }

    /// Asks for a session poll now. Same dedup rules as health.
    pub async fn revalidate_session(&self) -> Result<(), LivenessError> {
        self.send(Command::RevalidateSession).await
    }

    /// Stops the actor and waits for it to finish. No state changes,
    /// navigations or requests happen after this returns.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    async fn send(&self, command: Command) -> Result<(), LivenessError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LivenessError::Stopped)
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// SupervisorActor
// ---------------------------------------------------------------------------

struct SupervisorActor<C, N, R> {
    api: JsonApi<C>,
    navigator: Arc<N>,
    config: LivenessConfig,
    state: LivenessState,
    snapshots: watch::Sender<LivenessSnapshot>,
    events_tx: mpsc::UnboundedSender<LivenessEvent>,
    events: mpsc::UnboundedReceiver<LivenessEvent>,
    commands: mpsc::Receiver<Command>,
    health_cadence: Cadence,
    session_cadence: Cadence,
    health_dedup: Dedup,
    session_dedup: Dedup,
    /// In-flight polls. Dropping the set aborts them.
    polls: JoinSet<()>,
    expiry: ExpiryScheduler,
    refresher: Option<Arc<R>>,
    refresh_loop: Option<RefreshLoop>,
}

impl<C: HttpClient, N: Navigator, R: TokenRefresher> SupervisorActor<C, N, R> {
    /// Runs the actor loop until shutdown or until the handle is dropped.
    async fn run(mut self) {
        tracing::info!(
            refresh = self.refresher.is_some(),
            poll_secs = self.config.poll.interval.as_secs(),
            "liveness supervisor started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::RevalidateHealth) => self.poll_health(),
                    Some(Command::RevalidateSession) => self.poll_session(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event).await,
                _ = self.health_cadence.wait_for_tick() => self.poll_health(),
                _ = self.session_cadence.wait_for_tick() => self.poll_session(),
                Some(_) = self.polls.join_next(), if !self.polls.is_empty() => {}
            }
        }

        self.stop_background();
        tracing::info!("liveness supervisor stopped");
    }

    fn poll_health(&mut self) {
        if self.state.is_logged_out() {
            return;
        }
        if !self.health_dedup.try_begin_now() {
            tracing::debug!("health poll deduplicated");
            return;
        }
        let api = self.api.clone();
        let sink = self.events_tx.clone();
        self.polls.spawn(async move {
            let result = api.health().await;
            let _ = sink.send(LivenessEvent::HealthPolled(result));
        });
    }

    fn poll_session(&mut self) {
        if self.state.is_logged_out() {
            return;
        }
        if !self.session_dedup.try_begin_now() {
            tracing::debug!("session poll deduplicated");
            return;
        }
        let api = self.api.clone();
        let sink = self.events_tx.clone();
        self.polls.spawn(async move {
            let result = api.me().await;
            let _ = sink.send(LivenessEvent::SessionPolled(result));
        });
    }

    async fn handle_event(&mut self, event: LivenessEvent) {
        match &event {
            LivenessEvent::HealthPolled(_) => self.health_dedup.finish(),
            LivenessEvent::SessionPolled(_) => self.session_dedup.finish(),
            LivenessEvent::ExpiryFired { generation } if !self.expiry.is_current(*generation) => {
                tracing::debug!(generation, "stale expiry fire ignored");
                return;
            }
            _ => {}
        }

        let path = self.navigator.current_path();
        let effects = self.state.apply(event, Utc::now(), &path);
        for effect in effects {
            self.carry_out(effect).await;
        }

        let next = self.state.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    async fn carry_out(&mut self, effect: Effect) {
        match effect {
            Effect::ArmExpiry { seconds } => self.expiry.arm(seconds),
            Effect::StartRefreshLoop => self.start_refresh_loop(),
            Effect::RefreshNow => {
                if let Some(refresh) = &self.refresh_loop {
                    refresh.trigger();
                }
            }
            Effect::RenewBefore { seconds } => {
                if let Some(refresh) = &mut self.refresh_loop {
                    refresh.renew_before(seconds, self.config.refresh.renewal_lead);
                }
            }
            Effect::LoggedOut { reason, redirect } => self.log_out(reason, redirect).await,
        }
    }

    fn start_refresh_loop(&mut self) {
        let Some(refresher) = &self.refresher else {
            return;
        };
        if self.refresh_loop.is_some() {
            return;
        }
        let cycle = RefreshCycle::new(self.api.clone(), Arc::clone(refresher), &self.config.refresh);
        self.refresh_loop = Some(RefreshLoop::start(
            cycle,
            self.config.refresh.cadence,
            self.events_tx.clone(),
        ));
    }

    async fn log_out(&mut self, reason: LogoutReason, redirect: bool) {
        self.stop_background();
        self.health_cadence.pause();
        self.session_cadence.pause();

        if reason == LogoutReason::SessionForbidden {
            // Best effort: clears the server-side cookie if there is one.
            if let Err(e) = self.api.logout().await {
                tracing::debug!(error = %e, "logout request failed");
            }
        }

        if redirect {
            tracing::info!(to = endpoints::LOGIN_PAGE, "redirecting to login");
            self.navigator.navigate(endpoints::LOGIN_PAGE);
        }
    }

    /// Cancels every timer and aborts in-flight polls and refresh cycles.
    fn stop_background(&mut self) {
        self.expiry.cancel();
        self.refresh_loop = None;
        self.polls.abort_all();
    }
}
