//! Category sync service.
//!
//! One task owns the `CacheState`, the push socket, the keepalive interval and
//! the reconnect timer, and handles every event in order, so nothing needs a
//! lock. Callers talk to it through a cloneable `CategoryHandle`: commands go
//! in over an mpsc channel, state comes out through a `watch` snapshot.
//!
//! Fetches run as separate tasks and report back. They are neither cancelled
//! nor sequenced, so a slow response can overwrite a newer one.

mod fetcher;
mod state;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::CategorySource;
use crate::channel::{
    transition, ChannelEvent, ChannelState, Effect, ReconnectPolicy, SocketConnector, SocketFrame,
};
use crate::config::Config;
use crate::models::{CategoryNode, ClientMessage, Inbound};
use crate::store::FallbackStore;

pub use fetcher::{CategoryFetcher, FetchOutcome};
pub use state::CacheState;

/// Injected collaborators.
pub struct SyncDeps {
    pub source: Arc<dyn CategorySource>,
    pub connector: Arc<dyn SocketConnector>,
    pub store: Arc<dyn FallbackStore>,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub ws_url: String,
    /// Handshake budget; an elapsed connect counts as a socket error.
    pub connect_timeout: Duration,
    pub keepalive: Duration,
    pub reconnect: ReconnectPolicy,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ws_url: config.ws_url(),
            connect_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
            keepalive: Duration::from_secs(config.keepalive_secs.max(1)),
            reconnect: config.reconnect.clone(),
        }
    }
}

#[derive(Debug)]
enum Command {
    Fetch,
    Reconnect,
    ClearCache,
}

#[derive(Debug)]
enum ConnEvent {
    Opened,
    Frame(String),
    Closed(Option<u16>),
    Errored(String),
}

#[derive(Debug)]
enum Event {
    Conn { generation: u64, event: ConnEvent },
    FetchDone(FetchOutcome),
}

/// UI-facing handle to the running service. Cheap to clone.
#[derive(Clone)]
pub struct CategoryHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<CacheState>,
    shutdown: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CategoryHandle {
    pub fn snapshot(&self) -> CacheState {
        self.state.borrow().clone()
    }

    pub fn categories(&self) -> Vec<CategoryNode> {
        self.state.borrow().categories.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<CacheState> {
        self.state.clone()
    }

    /// Refetch the category list.
    pub fn fetch_categories(&self) {
        self.send(Command::Fetch);
    }

    /// Reopen the push channel. No-op while it is connecting or connected.
    pub fn reconnect(&self) {
        self.send(Command::Reconnect);
    }

    /// Purge every local category cache, empty the list and refetch.
    pub fn clear_local_storage(&self) {
        self.send(Command::ClearCache);
    }

    /// Stop the service and wait until its socket and timers are released.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Category sync task ended abnormally");
            }
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Category sync service is stopped, dropping command");
        }
    }
}

/// Entry point: builds the service and spawns it on the current runtime.
pub struct CategorySyncService;

impl CategorySyncService {
    pub fn start(deps: SyncDeps, options: SyncOptions) -> CategoryHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(CacheState::default());
        let shutdown = CancellationToken::new();

        let task = SyncTask {
            state: CacheState::default(),
            channel: ChannelState::default(),
            fetcher: Arc::new(CategoryFetcher::new(deps.source, deps.store.clone())),
            connector: deps.connector,
            store: deps.store,
            options,
            events: event_tx,
            publisher: state_tx,
            connection: None,
            closing: Vec::new(),
            fetches: Vec::new(),
            next_generation: 0,
            keepalive: None,
            reconnect_at: None,
            in_flight: 0,
            shutdown: shutdown.clone(),
        };
        let join = tokio::spawn(task.run(command_rx, event_rx));

        CategoryHandle {
            commands: command_tx,
            state: state_rx,
            shutdown,
            task: Arc::new(Mutex::new(Some(join))),
        }
    }
}

struct Connection {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct SyncTask {
    state: CacheState,
    channel: ChannelState,
    fetcher: Arc<CategoryFetcher>,
    connector: Arc<dyn SocketConnector>,
    store: Arc<dyn FallbackStore>,
    options: SyncOptions,
    events: mpsc::UnboundedSender<Event>,
    publisher: watch::Sender<CacheState>,
    connection: Option<Connection>,
    /// Connection tasks told to close but not yet finished.
    closing: Vec<JoinHandle<()>>,
    fetches: Vec<JoinHandle<()>>,
    next_generation: u64,
    keepalive: Option<Interval>,
    reconnect_at: Option<Instant>,
    in_flight: usize,
    shutdown: CancellationToken,
}

impl SyncTask {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        info!(ws_url = %self.options.ws_url, "Category sync started");
        self.start_fetch();
        self.dispatch(ChannelEvent::Connect);
        self.publish();

        loop {
            let reconnect_due = self
                .reconnect_at
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All category handles dropped");
                        break;
                    }
                },

                Some(event) = events.recv() => self.handle_event(event),

                _ = tokio::time::sleep_until(reconnect_due), if self.reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.dispatch(ChannelEvent::ReconnectDue);
                }

                _ = next_tick(&mut self.keepalive) => self.dispatch(ChannelEvent::KeepaliveDue),
            }

            self.closing.retain(|task| !task.is_finished());
            self.fetches.retain(|task| !task.is_finished());
            self.publish();
        }

        // Also reached when every handle is dropped; stop in-flight fetches too.
        self.shutdown.cancel();
        self.dispatch(ChannelEvent::Dispose);
        self.publish();
        for task in self.closing.drain(..).chain(self.fetches.drain(..)) {
            let _ = task.await;
        }
        // No fetch is left to write the snapshot back.
        self.store.end_session();
        info!("Category sync stopped");
    }

    fn handle_command(&mut self, command: Command) {
        debug!(command = ?command, "Category command");
        match command {
            Command::Fetch => self.start_fetch(),
            Command::Reconnect => self.dispatch(ChannelEvent::Connect),
            Command::ClearCache => {
                self.store.purge();
                self.state.categories.clear();
                self.start_fetch();
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::FetchDone(outcome) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.state.apply_fetch(outcome);
                self.state.is_loading = self.in_flight > 0;
            }
            Event::Conn { generation, event } => {
                let current = self.connection.as_ref().map(|c| c.generation);
                if current != Some(generation) {
                    debug!(generation, current = ?current, "Ignoring event from a released socket");
                    return;
                }
                let channel_event = match event {
                    ConnEvent::Opened => ChannelEvent::Opened,
                    ConnEvent::Frame(text) => ChannelEvent::Message(Inbound::parse(&text)),
                    ConnEvent::Closed(code) => ChannelEvent::Closed { code },
                    ConnEvent::Errored(reason) => ChannelEvent::Errored(reason),
                };
                self.dispatch(channel_event);
            }
        }
    }

    fn dispatch(&mut self, event: ChannelEvent) {
        let (next, effects) = transition(&self.channel, event, &self.options.reconnect);
        self.channel = next;
        self.state.connection_status = next.status;
        self.state.reconnect_attempt = next.reconnect_attempt;
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::OpenSocket => self.open_socket(),
            Effect::CloseSocket => self.close_socket(),
            Effect::StartKeepalive => {
                let period = self.options.keepalive;
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.keepalive = Some(interval);
            }
            Effect::StopKeepalive => self.keepalive = None,
            Effect::SendPing => {
                if let Some(conn) = &self.connection {
                    match ClientMessage::Ping.to_json() {
                        Ok(ping) => {
                            if conn.outbound.send(ping).is_err() {
                                debug!("Socket writer gone, ping dropped");
                            }
                        }
                        Err(e) => warn!(error = %e, "Failed to encode ping"),
                    }
                }
            }
            Effect::ScheduleReconnect(delay) => self.reconnect_at = Some(Instant::now() + delay),
            Effect::CancelReconnect => self.reconnect_at = None,
            Effect::Fetch => self.start_fetch(),
            Effect::RemoveCategory(id) => self.state.remove_category(id),
            Effect::ReplaceCategories(categories) => self.state.replace_categories(categories),
        }
    }

    fn start_fetch(&mut self) {
        self.in_flight += 1;
        self.state.is_loading = true;
        self.state.error = None;

        let fetcher = self.fetcher.clone();
        let events = self.events.clone();
        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                outcome = fetcher.fetch() => {
                    let _ = events.send(Event::FetchDone(outcome));
                }
            }
        });
        self.fetches.push(task);
    }

    fn open_socket(&mut self) {
        self.close_socket();

        self.next_generation += 1;
        let generation = self.next_generation;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let cancel = self.shutdown.child_token();

        let task = tokio::spawn(run_connection(
            generation,
            self.options.ws_url.clone(),
            self.options.connect_timeout,
            self.connector.clone(),
            self.events.clone(),
            outbound_rx,
            cancel.clone(),
        ));
        self.connection = Some(Connection {
            generation,
            outbound,
            cancel,
            task,
        });
    }

    fn close_socket(&mut self) {
        if let Some(conn) = self.connection.take() {
            debug!(generation = conn.generation, "Releasing socket");
            conn.cancel.cancel();
            self.closing.push(conn.task);
        }
    }

    fn publish(&self) {
        self.publisher.send_if_modified(|current| {
            if *current == self.state {
                false
            } else {
                *current = self.state.clone();
                true
            }
        });
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Owns one socket from connect to close and reports what happens to it.
async fn run_connection(
    generation: u64,
    url: String,
    connect_timeout: Duration,
    connector: Arc<dyn SocketConnector>,
    events: mpsc::UnboundedSender<Event>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let report = |event: ConnEvent| {
        let _ = events.send(Event::Conn { generation, event });
    };

    debug!(generation, url = %url, "Connecting push channel");
    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        result = tokio::time::timeout(connect_timeout, connector.connect(&url)) => result,
    };
    let (mut sink, mut stream) = match connected {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            report(ConnEvent::Errored(e.to_string()));
            return;
        }
        Err(_) => {
            warn!(generation, timeout_ms = connect_timeout.as_millis() as u64, "Push channel connect timed out");
            report(ConnEvent::Errored("connect timed out".to_string()));
            return;
        }
    };
    report(ConnEvent::Opened);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                sink.close().await;
                return;
            }

            text = outbound.recv() => match text {
                Some(text) => {
                    if let Err(e) = sink.send_text(text).await {
                        report(ConnEvent::Errored(e.to_string()));
                        return;
                    }
                }
                None => {
                    sink.close().await;
                    return;
                }
            },

            frame = stream.next_frame() => match frame {
                SocketFrame::Text(text) => report(ConnEvent::Frame(text)),
                SocketFrame::Closed(code) => {
                    report(ConnEvent::Closed(code));
                    return;
                }
                SocketFrame::Error(reason) => {
                    report(ConnEvent::Errored(reason));
                    return;
                }
            },
        }
    }
}
