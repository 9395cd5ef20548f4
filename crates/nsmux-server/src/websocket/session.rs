//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use nsmux_core::{ConnectionId, Frame, NamespaceHub};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};

use super::connection::ClientConnection;
use super::liveness::MissedPings;
use super::pool::ConnectionPool;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_REJECTED_TOTAL,
};

/// How long the writer gets to flush and send a Close frame at teardown.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Floor for the ping cadence.
const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Per-connection tuning taken from [`ServerConfig`].
#[derive(Clone, Copy, Debug)]
pub struct SessionSettings {
    /// Ping cadence and liveness check interval.
    pub heartbeat_interval: Duration,
    /// Silence after which the connection is dropped.
    pub heartbeat_timeout: Duration,
    /// Outbound queue capacity.
    pub send_queue_capacity: usize,
}

impl From<&ServerConfig> for SessionSettings {
    /// Out-of-range values are clamped: the interval to at least one second,
    /// the timeout to at least one interval, the queue to at least one slot.
    fn from(config: &ServerConfig) -> Self {
        let heartbeat_interval = config.heartbeat_interval().max(MIN_PING_INTERVAL);
        Self {
            heartbeat_interval,
            heartbeat_timeout: config.heartbeat_timeout().max(heartbeat_interval),
            send_queue_capacity: config.send_queue_capacity.max(1),
        }
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection in the pool
/// 2. Spawns the writer: queued frames, periodic Ping frames, liveness
/// 3. Spawns the reader: connect hook, then every inbound frame in order
/// 4. Once the reader ends for any reason (close, error, heartbeat timeout,
///    shutdown, or a panicking handler), removes the connection from the pool
///    and runs the hub's disconnect path
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    hub: Arc<NamespaceHub>,
    pool: Arc<ConnectionPool>,
    settings: SessionSettings,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<Frame>(settings.send_queue_capacity);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    if !pool.add(Arc::clone(&connection)) {
        warn!("connection limit reached, closing");
        counter!(WS_REJECTED_TOTAL, "reason" => "capacity").increment(1);
        let _ = ws_tx
            .send(Message::Close(Some(CloseFrame {
                code: close_code::AGAIN,
                reason: String::from("server full").into(),
            })))
            .await;
        return;
    }

    let connection_start = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let mut writer = tokio::spawn(
        write_loop(ws_tx, send_rx, Arc::clone(&connection), settings).in_current_span(),
    );
    let reader = tokio::spawn(
        read_loop(ws_rx, Arc::clone(&connection), Arc::clone(&hub), shutdown).in_current_span(),
    );

    if reader.await.is_err_and(|e| e.is_panic()) {
        error!("handler panicked, dropping connection");
    }

    // Teardown runs however the reader ended.
    connection.close();
    let _ = pool.remove(&conn_id);
    info!(
        dropped = connection.drop_count(),
        age = ?connection.age(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());

    hub.on_disconnect(&conn_id);

    if tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
}

/// Fire the connect hook, then route inbound frames one at a time until the
/// peer goes away, the connection is closed, or the server shuts down.
async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    connection: Arc<ClientConnection>,
    hub: Arc<NamespaceHub>,
    shutdown: CancellationToken,
) {
    hub.on_connect(&connection.id);

    loop {
        let next = tokio::select! {
            next = ws_rx.next() => next,
            () = connection.closed() => break,
            () = shutdown.cancelled() => {
                debug!("server shutting down");
                break;
            }
        };
        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "websocket read error");
                break;
            }
            None => break,
        };

        connection.mark_alive();
        match msg {
            Message::Text(text) => hub.on_message(&connection.id, text.as_str().as_bytes()),
            Message::Binary(data) => hub.on_message(&connection.id, &data),
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

/// Forward queued frames and ping on every interval tick. A peer that stays
/// silent for the heartbeat timeout is closed. On close the queue is
/// flushed and a Close frame sent.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut send_rx: mpsc::Receiver<Frame>,
    connection: Arc<ClientConnection>,
    settings: SessionSettings,
) {
    let mut ping_interval = tokio::time::interval(settings.heartbeat_interval);
    let _ = ping_interval.tick().await;
    let mut missed = MissedPings::new(settings.heartbeat_interval, settings.heartbeat_timeout);

    loop {
        tokio::select! {
            biased;
            () = connection.closed() => {
                while let Ok(frame) = send_rx.try_recv() {
                    if ws_tx.send(Message::Text(String::clone(&frame).into())).await.is_err() {
                        break;
                    }
                }
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            msg = send_rx.recv() => {
                let Some(frame) = msg else { break };
                if ws_tx.send(Message::Text(String::clone(&frame).into())).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if missed.record(connection.check_alive()) {
                    warn!(
                        silent_for = ?connection.last_pong_elapsed(),
                        limit = missed.limit(),
                        "client unresponsive, disconnecting"
                    );
                    connection.close();
                    continue;
                }
                if ws_tx.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
    connection.close();
}
