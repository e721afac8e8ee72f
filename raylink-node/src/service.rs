//! Node service core logic.
//!
//! A capture node listens for display nodes, fans rays out to them and
//! logs where each reply places the highlight. A display node connects
//! to the capture node, announces itself and answers rays.
//! Both are fed [`NodeCommand`]s, normally typed on stdin.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use raylink_core::geometry::fmt_vec3;
use raylink_core::{
    CaptureDispatcher, CaptureEvent, CaptureLoop, Connection, ConnectionInfo, DisplayDispatcher,
    Hello, LifecycleEvent, Packet, PinholeCamera, PointerEvent, RelayError, Router, SceneMesh,
    Session, SessionRegistry, SessionRole, WireMessage,
};

use crate::config::NodeConfig;

/// How long a new peer has to introduce itself.
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

// ── Commands ─────────────────────────────────────────────────────

/// One line of operator input.
///
/// ```text
/// tap X Y     touch began at screen pixel (X, Y)
/// click X Y   primary mouse button down at (X, Y)
/// found       anchor tracked again
/// lost        anchor tracking lost
/// toggle      flip the capture switch
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeCommand {
    Pointer(PointerEvent),
    Lifecycle(LifecycleEvent),
}

impl FromStr for NodeCommand {
    type Err = RelayError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| RelayError::Other("empty command".into()))?
            .to_ascii_lowercase();

        let command = match verb.as_str() {
            "tap" | "click" => {
                let x = parse_coord(words.next(), "x")?;
                let y = parse_coord(words.next(), "y")?;
                let event = if verb == "tap" {
                    PointerEvent::touch_began(x, y)
                } else {
                    PointerEvent::mouse_down(x, y)
                };
                NodeCommand::Pointer(event)
            }
            "found" => NodeCommand::Lifecycle(LifecycleEvent::TargetFound),
            "lost" => NodeCommand::Lifecycle(LifecycleEvent::TargetLost),
            "toggle" => NodeCommand::Lifecycle(LifecycleEvent::ManualToggle),
            other => return Err(RelayError::Other(format!("unknown command {other:?}"))),
        };

        if let Some(extra) = words.next() {
            return Err(RelayError::Other(format!("unexpected argument {extra:?}")));
        }
        Ok(command)
    }
}

fn parse_coord(word: Option<&str>, axis: &str) -> Result<f32, RelayError> {
    let word = word.ok_or_else(|| RelayError::Other(format!("missing {axis} coordinate")))?;
    word.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RelayError::Other(format!("bad {axis} coordinate {word:?}")))
}

/// Read [`NodeCommand`]s from stdin until EOF. Bad lines are logged and
/// skipped.
pub fn spawn_stdin_commands() -> mpsc::Receiver<NodeCommand> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match line.parse::<NodeCommand>() {
                    Ok(command) => {
                        if tx.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{e}"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("stdin read error: {e}");
                    break;
                }
            }
        }
        debug!("stdin closed");
    });
    rx
}

// ── RelayNode ────────────────────────────────────────────────────

/// The top-level node service; runs whichever side the config names.
pub struct RelayNode {
    config: NodeConfig,
    running: Arc<AtomicBool>,
}

impl RelayNode {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the node from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run until stopped, or until a display node loses its capture node.
    pub async fn run(&self, commands: mpsc::Receiver<NodeCommand>) -> Result<(), RelayError> {
        self.running.store(true, Ordering::SeqCst);

        let result = match self.config.node.role {
            SessionRole::Capture => {
                let (events_tx, events_rx) = mpsc::unbounded_channel();
                let node = CaptureNode::new(&self.config, events_tx)?;
                tokio::spawn(log_capture_events(events_rx));
                let listener =
                    TcpListener::bind(self.config.connection_info().to_socket_string()).await?;
                node.run(listener, commands, &self.running).await
            }
            SessionRole::Display => {
                let node = DisplayNode::new(&self.config)?;
                node.run(&self.config.connection_info(), commands, &self.running)
                    .await
            }
        };

        self.running.store(false, Ordering::SeqCst);
        info!("{} node stopped", self.config.node.role);
        result
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ── Capture side ─────────────────────────────────────────────────

pub struct CaptureNode {
    session: Session,
    dispatcher: Arc<CaptureDispatcher>,
    sampler: CaptureLoop<PinholeCamera>,
    tick: Duration,
    heartbeat: Duration,
}

impl CaptureNode {
    pub fn new(
        config: &NodeConfig,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Result<Self, RelayError> {
        let session = Session::new(SessionRole::Capture);
        let capture = &config.capture;
        let sampler = CaptureLoop::new(&session, capture.camera, capture.tracked_anchor())?;
        let dispatcher = CaptureDispatcher::new(
            &session,
            Arc::new(SessionRegistry::new()),
            capture.anchor_table(),
            capture.reply_timeout(),
            events,
        )?
        .with_fallback_anchor(sampler.anchor().pose);
        Ok(Self {
            session,
            dispatcher: Arc::new(dispatcher),
            sampler,
            tick: capture.tick(),
            heartbeat: config.heartbeat(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dispatcher(&self) -> &Arc<CaptureDispatcher> {
        &self.dispatcher
    }

    /// Accept displays on `listener` and turn commands into captures
    /// until `running` is cleared.
    ///
    /// Pointer input is buffered between ticks; each tick sends what the
    /// input gate lets through and retires expired captures.
    pub async fn run(
        self,
        listener: TcpListener,
        mut commands: mpsc::Receiver<NodeCommand>,
        running: &Arc<AtomicBool>,
    ) -> Result<(), RelayError> {
        info!("capture node listening on {}", listener.local_addr()?);
        let acceptor = tokio::spawn(accept_displays(
            listener,
            Arc::clone(&self.dispatcher),
            self.heartbeat,
        ));

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut queued: Vec<PointerEvent> = Vec::new();
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !queued.is_empty() {
                        let sent = self.sampler.run_tick(&queued, &self.dispatcher).await;
                        debug!(queued = queued.len(), sent, "capture tick");
                        queued.clear();
                    }
                    self.dispatcher.expire_stale();
                }
                command = commands.recv(), if commands_open => match command {
                    Some(NodeCommand::Pointer(event)) => queued.push(event),
                    Some(NodeCommand::Lifecycle(event)) => {
                        if let Some(state) = self.session.on_lifecycle(event) {
                            info!("input capture {state}");
                        }
                    }
                    None => commands_open = false,
                },
                _ = wait_for_stop(running) => break,
            }
        }

        acceptor.abort();
        Ok(())
    }
}

async fn accept_displays(
    listener: TcpListener,
    dispatcher: Arc<CaptureDispatcher>,
    heartbeat: Duration,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("accept error: {e}");
                continue;
            }
        };
        debug!("connection from {peer}");
        tokio::spawn(serve_display(stream, Arc::clone(&dispatcher), heartbeat));
    }
}

/// Serve one display connection until it closes.
///
/// The peer must open with a display [`Hello`]; anything else closes the
/// connection before it is registered.
pub async fn serve_display(stream: TcpStream, dispatcher: Arc<CaptureDispatcher>, heartbeat: Duration) {
    let conn = Connection::with_heartbeat(stream, heartbeat);
    let addr = conn.peer_addr();
    let (sender, mut rx) = conn.into_split();
    let id = sender.id();

    let hello = match read_hello(&mut rx).await {
        Ok(hello) => hello,
        Err(e) => {
            warn!(connection = %id, "rejecting peer: {e}");
            return;
        }
    };
    if hello.role != SessionRole::Display {
        warn!(
            connection = %id,
            "rejecting {} peer {:?}: only displays may join",
            hello.role,
            hello.node_name
        );
        return;
    }

    dispatcher.on_session_start(sender.clone(), hello.node_name, addr);
    let mut router = Router::new();
    dispatcher.register(&mut router);
    while let Some(packet) = rx.recv().await {
        router.route(packet, &sender).await;
    }
    dispatcher.on_session_stop(id);
}

async fn read_hello(rx: &mut mpsc::Receiver<Packet>) -> Result<Hello, RelayError> {
    let packet = tokio::time::timeout(HELLO_TIMEOUT, rx.recv())
        .await
        .map_err(|_| RelayError::Other(format!("no hello within {HELLO_TIMEOUT:?}")))?
        .ok_or(RelayError::ChannelClosed)?;
    Hello::from_packet(&packet)
}

/// Stand-in for rendering: log where each reply puts the highlight.
async fn log_capture_events(mut events: mpsc::UnboundedReceiver<CaptureEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            CaptureEvent::Hit(report) => match report.world_position {
                Some(position) => info!(
                    request_id = report.request_id,
                    from = %report.from,
                    "highlight target at {}",
                    fmt_vec3(position)
                ),
                None => info!(
                    request_id = report.request_id,
                    from = %report.from,
                    "no highlight: {}",
                    report.debug_info
                ),
            },
            CaptureEvent::Expired {
                request_id,
                target_id,
                answered,
                expected,
            } => warn!(
                request_id,
                target = %target_id,
                "{answered}/{expected} displays answered before the deadline"
            ),
            CaptureEvent::SessionStarted(_) | CaptureEvent::SessionStopped(_) => {}
        }
    }
}

// ── Display side ─────────────────────────────────────────────────

pub struct DisplayNode {
    session: Session,
    name: String,
    dispatcher: Arc<DisplayDispatcher<SceneMesh>>,
    heartbeat: Duration,
}

impl DisplayNode {
    pub fn new(config: &NodeConfig) -> Result<Self, RelayError> {
        let session = Session::new(SessionRole::Display);
        let display_config = &config.display;
        let mesh = display_config.scene_mesh()?;
        let anchor_count = display_config.anchors.len();
        info!("scene: {} colliders, {anchor_count} anchors", mesh.len());
        for collider in mesh.colliders() {
            debug!(label = %collider.label, layer = ?collider.layer, "collider loaded");
        }
        let dispatcher = DisplayDispatcher::new(
            &session,
            mesh,
            display_config.anchor_table(),
            display_config.layer_mask()?,
        )?;
        Ok(Self {
            session,
            name: config.node.name.clone(),
            dispatcher: Arc::new(dispatcher),
            heartbeat: config.heartbeat(),
        })
    }

    /// Connect to the capture node and answer rays until either side
    /// goes away or `running` is cleared. There is no reconnect.
    pub async fn run(
        self,
        info: &ConnectionInfo,
        mut commands: mpsc::Receiver<NodeCommand>,
        running: &Arc<AtomicBool>,
    ) -> Result<(), RelayError> {
        let stream = TcpStream::connect(info.to_socket_string()).await?;
        let (sender, mut rx) = Connection::with_heartbeat(stream, self.heartbeat).into_split();
        info!("connected to capture node at {info}");

        let hello = Hello {
            role: SessionRole::Display,
            node_name: self.name.clone(),
        };
        sender.send(hello.to_packet()?).await?;

        let mut router = Router::new();
        self.dispatcher.register(&mut router);
        let mut commands_open = true;

        loop {
            tokio::select! {
                packet = rx.recv() => match packet {
                    Some(packet) => {
                        router.route(packet, &sender).await;
                    }
                    None => {
                        info!("capture node closed the connection");
                        break;
                    }
                },
                command = commands.recv(), if commands_open => match command {
                    Some(NodeCommand::Lifecycle(event)) => {
                        self.session.on_lifecycle(event);
                    }
                    Some(NodeCommand::Pointer(_)) => debug!("pointer input ignored on a display node"),
                    None => commands_open = false,
                },
                _ = wait_for_stop(running) => break,
            }
        }
        Ok(())
    }
}

/// Resolves when `running` becomes false.
async fn wait_for_stop(running: &Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────
