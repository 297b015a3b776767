//! Connection manager
//!
//! One background worker task owns the socket. It connects, queries the
//! tracked printer objects, subscribes to updates and then dispatches
//! inbound frames until the connection drops or it is told to stop. Every
//! exit path ends in the same backoff-and-retry step; nothing on the
//! network path is fatal.
//!
//! `stop` is bounded: the worker gets `thread_join_timeout` to close the
//! socket and exit, after which it is aborted and the shared state is
//! reset regardless.
//!
//! `reconfigure` and `full_restart` share one guard. A call that finds it
//! taken returns `false` immediately instead of queueing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;

use kv_core::config::{ClientConfig, ConfigProvider};
use kv_core::error::ConnectionError;
use kv_core::ConnectionStatus;
use kv_protocol::{LifecycleNotice, Message, Request, StatusMap};
use serde_json::Value;

use crate::mailbox::Offer;
use crate::state::SharedState;
use crate::tunnel::{ActiveConnection, ExponentialBackoff, TunnelEvent};

/// Budget for the graceful close handshake during stop
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause between tearing down and starting again in reconfigure/restart
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Delay between a ready notice and the full restart it triggers
const RESTART_DELAY: Duration = Duration::from_secs(1);

/// Capacity of the facade → worker command channel
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Requests from facade callers to the worker
#[derive(Debug, Clone, Copy)]
pub(crate) enum WorkerCommand {
    QueryStatus,
}

pub(crate) struct Worker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
    pub(crate) commands: mpsc::Sender<WorkerCommand>,
}

pub(crate) struct ClientInner {
    pub(crate) config: Arc<dyn ConfigProvider>,
    pub(crate) state: Arc<SharedState>,
    /// Held for the whole of a reconfigure or full restart
    lifecycle_guard: tokio::sync::Mutex<()>,
    /// A full restart is pending or running; the worker must not subscribe
    restarting: Arc<AtomicBool>,
    /// Cancels a full restart scheduled by a ready notice
    scheduled_restart: parking_lot::Mutex<Option<CancellationToken>>,
    pub(crate) worker: parking_lot::Mutex<Option<Worker>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(restart) = self.scheduled_restart.get_mut().take() {
            restart.cancel();
        }
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}

/// Persistent client for a Moonraker host.
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct KlipperClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl KlipperClient {
    /// Create a stopped client reading its configuration from `config`
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                state: Arc::new(SharedState::new()),
                lifecycle_guard: tokio::sync::Mutex::new(()),
                restarting: Arc::new(AtomicBool::new(false)),
                scheduled_restart: parking_lot::Mutex::new(None),
                worker: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// Create a stopped client with a fixed configuration
    pub fn with_config(config: ClientConfig) -> Self {
        Self::new(Arc::new(config))
    }

    /// Launch the connection worker. No-op if it is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        self.start_unless(&CancellationToken::new());
    }

    /// Launch the worker unless `cancel` has fired.
    ///
    /// Checked under the worker lock so a concurrent `stop` either sees the
    /// new worker or prevents it.
    fn start_unless(&self, cancel: &CancellationToken) -> bool {
        let mut slot = self.inner.worker.lock();
        if cancel.is_cancelled() {
            return false;
        }
        if slot.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            tracing::debug!("Client already running");
            return true;
        }

        let worker_cancel = CancellationToken::new();
        let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let ctx = WorkerContext {
            config: Arc::clone(&self.inner.config),
            state: Arc::clone(&self.inner.state),
            restarting: Arc::clone(&self.inner.restarting),
            client: Arc::downgrade(&self.inner),
        };
        let handle = tokio::spawn(run_loop(ctx, worker_cancel.clone(), command_rx));

        tracing::info!("Client started");
        *slot = Some(Worker {
            handle,
            cancel: worker_cancel,
            commands,
        });
        true
    }

    /// Stop the worker and reset the status record.
    ///
    /// Idempotent. Finishes within `thread_join_timeout` even if the worker
    /// hangs; a worker that does not exit in time is aborted. A full restart
    /// scheduled by a ready notice is called off.
    pub async fn stop(&self) {
        if let Some(restart) = self.inner.scheduled_restart.lock().take() {
            tracing::debug!("Cancelling scheduled full restart");
            restart.cancel();
        }
        self.shutdown().await;
    }

    /// Stop the worker without touching a scheduled restart
    async fn shutdown(&self) {
        let worker = self.inner.worker.lock().take();

        if let Some(worker) = worker {
            tracing::info!("Stopping client");
            self.inner.state.set_connection(ConnectionStatus::Closing);
            worker.cancel.cancel();

            let join_timeout = self.inner.config.snapshot().websocket.thread_join_timeout;
            let mut handle = worker.handle;
            match tokio::time::timeout(join_timeout, &mut handle).await {
                Ok(Ok(())) => tracing::debug!("Connection worker exited"),
                Ok(Err(e)) => tracing::warn!("Connection worker failed: {}", e),
                Err(_) => {
                    tracing::warn!(
                        "Connection worker did not exit within {:?}, aborting",
                        join_timeout
                    );
                    handle.abort();
                }
            }
        } else {
            tracing::debug!("Stop requested but client is not running");
        }

        self.inner.state.reset_after_stop();
    }

    /// Tear the connection down and bring it back up with fresh settings.
    ///
    /// Returns `false` without doing anything if a reconfigure or full
    /// restart is already in progress.
    pub async fn reconfigure(&self) -> bool {
        let Ok(_guard) = self.inner.lifecycle_guard.try_lock() else {
            tracing::info!("Reconfigure already in progress, ignoring request");
            return false;
        };

        tracing::info!("Reconfiguring client");
        self.shutdown().await;
        tokio::time::sleep(SETTLE_DELAY).await;

        match self.inner.config.snapshot().endpoint() {
            Ok(url) => tracing::info!("Reconnecting to {}", url),
            Err(e) => tracing::warn!("Reconfigured without a usable endpoint: {}", e),
        }
        self.start();
        true
    }

    /// Hard reset after the firmware restarted.
    ///
    /// Like [`reconfigure`](Self::reconfigure), but also clears the
    /// response mailbox and the announced flag. Returns `false` if a
    /// reconfigure or restart is already in progress.
    pub async fn full_restart(&self) -> bool {
        self.restart_unless(&CancellationToken::new()).await
    }

    /// Full restart that does not bring the worker back once `cancel` fires
    async fn restart_unless(&self, cancel: &CancellationToken) -> bool {
        let Ok(_guard) = self.inner.lifecycle_guard.try_lock() else {
            tracing::info!("Restart already in progress, ignoring request");
            return false;
        };

        tracing::info!("Performing full restart");
        self.inner.restarting.store(true, Ordering::SeqCst);
        self.shutdown().await;
        self.inner.state.full_reset();
        tokio::time::sleep(SETTLE_DELAY).await;

        self.inner.restarting.store(false, Ordering::SeqCst);
        if self.start_unless(cancel) {
            tracing::info!("Full restart complete");
        } else {
            tracing::info!("Client stopped during restart, not reconnecting");
        }
        true
    }

    /// Whether the worker task is alive
    pub fn is_running(&self) -> bool {
        self.inner
            .worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }
}

/// What the worker needs from the client, without keeping it alive
#[derive(Clone)]
struct WorkerContext {
    config: Arc<dyn ConfigProvider>,
    state: Arc<SharedState>,
    restarting: Arc<AtomicBool>,
    client: Weak<ClientInner>,
}

async fn run_loop(
    ctx: WorkerContext,
    cancel: CancellationToken,
    mut commands: mpsc::Receiver<WorkerCommand>,
) {
    let mut backoff = ExponentialBackoff::from_config(&ctx.config.snapshot().websocket);

    while !cancel.is_cancelled() {
        let config = ctx.config.snapshot();

        let delay = match config.endpoint() {
            Ok(url) => {
                match run_session(&ctx, &url, &config, &cancel, &mut commands, &mut backoff).await {
                    Ok(()) => break,
                    Err(e) => tracing::warn!("Connection to {} lost: {}", url, e),
                }
                ctx.state.set_connection(ConnectionStatus::Idle);
                backoff.next_delay()
            }
            Err(e) => {
                let e = ConnectionError::from(e);
                tracing::warn!("{}", e);
                config.websocket.reconnect_delay
            }
        };

        tracing::info!("Retrying in {:?}", delay);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    ctx.state.set_connection(ConnectionStatus::Idle);
    tracing::debug!("Connection worker exiting");
}

/// One connection's lifetime. `Ok` means the worker was told to stop.
async fn run_session(
    ctx: &WorkerContext,
    url: &str,
    config: &ClientConfig,
    cancel: &CancellationToken,
    commands: &mut mpsc::Receiver<WorkerCommand>,
    backoff: &mut ExponentialBackoff,
) -> Result<(), ConnectionError> {
    let ws = &config.websocket;

    ctx.state.set_connection(ConnectionStatus::Connecting);
    tracing::info!("Connecting to {}", url);
    let mut conn = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        conn = ActiveConnection::open(url, ws) => conn?,
    };
    tracing::info!("Connected to {}", url);

    conn.send_request(&Request::query()).await?;
    if ctx.restarting.load(Ordering::SeqCst) {
        tracing::info!("Restart pending, not subscribing");
        ctx.state.set_connection(ConnectionStatus::Connected);
    } else {
        conn.send_request(&Request::subscribe()).await?;
        ctx.state.set_connection(ConnectionStatus::Subscribing);
    }

    let mut ping_timer = ws.pings_enabled().then(|| {
        tokio::time::interval_at(Instant::now() + ws.ping_interval, ws.ping_interval)
    });
    let mut pong_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                ctx.state.set_connection(ConnectionStatus::Closing);
                conn.close(CLOSE_TIMEOUT).await;
                return Ok(());
            }

            event = conn.recv() => {
                pong_deadline = None;
                match event? {
                    TunnelEvent::Message(message) => dispatch(ctx, message, backoff),
                    TunnelEvent::Activity => {}
                }
            }

            _ = tick(&mut ping_timer) => {
                conn.send_ping().await?;
                if pong_deadline.is_none() {
                    pong_deadline = Some(Instant::now() + ws.ping_timeout);
                }
            }

            _ = expire(pong_deadline) => {
                conn.close(CLOSE_TIMEOUT).await;
                return Err(ConnectionError::Closed(format!(
                    "no response to ping within {:?}",
                    ws.ping_timeout
                )));
            }

            Some(command) = commands.recv() => match command {
                WorkerCommand::QueryStatus => conn.send_request(&Request::query()).await?,
            },
        }
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn dispatch(ctx: &WorkerContext, message: Message, backoff: &mut ExponentialBackoff) {
    match message {
        Message::SubscribeAck { id } => {
            tracing::info!("Subscription acknowledged ({})", id);
            ctx.state.set_connection(ConnectionStatus::Subscribed);
            backoff.reset();
        }
        Message::QueryResult { id, status, raw } => {
            tracing::debug!("Status query result ({})", id);
            apply_status(ctx, &status, raw);
        }
        Message::StatusNotification { status, raw } => apply_status(ctx, &status, raw),
        Message::TextEvent { text } => {
            let templates = ctx.config.snapshot().response;
            match ctx.state.offer_response(&text, &templates) {
                Offer::Current => tracing::info!("Response received: {}", text),
                Offer::Queued => tracing::info!("Response queued: {}", text),
                Offer::Rejected => {}
            }
        }
        Message::Lifecycle(notice) => handle_lifecycle(ctx, notice),
        Message::RequestFailed { id, message } => match id {
            Some(id) => tracing::warn!("Request {} failed: {}", id, message),
            None => tracing::warn!("Remote error: {}", message),
        },
        Message::Unparseable { reason } => tracing::debug!("Ignoring frame: {}", reason),
    }
}

fn apply_status(ctx: &WorkerContext, status: &StatusMap, raw: Value) {
    let change = ctx.state.apply_status(status, raw);
    if let Some(t) = change.transition {
        tracing::info!("Print state changed: {} -> {}", t.from, t.to);
    }
}

fn handle_lifecycle(ctx: &WorkerContext, notice: LifecycleNotice) {
    ctx.state.record_lifecycle(notice);
    match notice {
        LifecycleNotice::Ready => {
            tracing::info!("Klipper reported ready, scheduling full restart");
            schedule_full_restart(ctx);
        }
        LifecycleNotice::Shutdown => tracing::warn!("Klipper shut down (MCU disconnected)"),
        LifecycleNotice::Disconnected => tracing::warn!("Moonraker lost its connection to Klipper"),
    }
}

/// Restart from a separate task; the restart stops this worker.
///
/// The task holds the client weakly and gives up if `stop` runs or the
/// last handle is dropped before the delay is over.
fn schedule_full_restart(ctx: &WorkerContext) {
    if ctx.restarting.swap(true, Ordering::SeqCst) {
        tracing::debug!("Full restart already scheduled");
        return;
    }
    let Some(inner) = ctx.client.upgrade() else {
        ctx.restarting.store(false, Ordering::SeqCst);
        return;
    };

    let cancel = CancellationToken::new();
    *inner.scheduled_restart.lock() = Some(cancel.clone());
    let client = Arc::downgrade(&inner);
    drop(inner);

    let restarting = Arc::clone(&ctx.restarting);
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Scheduled full restart cancelled");
                restarting.store(false, Ordering::SeqCst);
                return;
            }
            _ = tokio::time::sleep(RESTART_DELAY) => {}
        }

        let Some(inner) = client.upgrade() else {
            restarting.store(false, Ordering::SeqCst);
            return;
        };
        let client = KlipperClient { inner };
        if !client.restart_unless(&cancel).await {
            restarting.store(false, Ordering::SeqCst);
        }
    });
}
