//! Boardcast Signaling Relay Server
//!
//! Relays room-scoped payloads between clients: drawing broadcasts fan out
//! to every other room member, while offers, answers and ICE candidates are
//! delivered only to the peer they address. Presence (`peer-joined` /
//! `peer-left`) is generated here: the newcomer learns about every existing
//! member so that the smaller id on each pair can initiate its offer.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use boardcast_core::protocol::Payload;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::{collections::HashSet, net::SocketAddr, sync::Arc};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_PORT: u16 = 3030;
const CHANNEL_CAPACITY: usize = 256;

/// One relayed message: sender, optional addressee, wire text.
///
/// `target: None` fans out to everyone but the sender; `target: Some(id)`
/// is delivered to that peer alone.
type RoomMessage = (String, Option<String>, String);

/// Room state.
struct Room {
    tx: broadcast::Sender<RoomMessage>,
    peers: HashSet<String>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
        }
    }
}

/// Shared application state.
struct AppState {
    rooms: DashMap<String, Room>,
}

impl AppState {
    fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Add a peer to a room; returns a receiver for the room plus the peers
    /// that were already present.
    fn join_room(
        &self,
        room_id: &str,
        peer_id: &str,
    ) -> (broadcast::Receiver<RoomMessage>, Vec<String>) {
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(Room::new);
        let existing: Vec<String> = room.peers.iter().cloned().collect();
        room.peers.insert(peer_id.to_string());
        (room.tx.subscribe(), existing)
    }

    /// Remove a peer from a room, dropping the room once empty.
    fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.peers.remove(peer_id);
            if room.peers.is_empty() {
                drop(room);
                self.rooms.remove(room_id);
            }
        }
    }

    fn peer_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|r| r.peers.len()).unwrap_or(0)
    }

    /// Send a message into a room's channel.
    fn publish(&self, room_id: &str, from: &str, target: Option<String>, text: String) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.tx.send((from.to_string(), target, text));
        }
    }

    /// Fan out a payload to the whole room (excluding the sender at the
    /// subscriber side).
    fn broadcast(&self, room_id: &str, from: &str, payload: &Payload) {
        match payload.encode() {
            Ok(text) => self.publish(room_id, from, None, text),
            Err(e) => warn!("failed to encode broadcast payload: {e}"),
        }
    }

    /// Deliver a payload to a single peer in the room.
    fn send_to(&self, room_id: &str, from: &str, target: &str, payload: &Payload) {
        match payload.encode() {
            Ok(text) => self.publish(room_id, from, Some(target.to_string()), text),
            Err(e) => warn!("failed to encode targeted payload: {e}"),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardcast_server=info,tower_http=info".into()),
        )
        .init();

    let port = std::env::var("BOARDCAST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let state = Arc::new(AppState::new());

    let app = Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Boardcast relay server listening on {addr}");
    info!("WebSocket endpoint: ws://localhost:{port}/ws");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {addr}: {e}");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}

async fn index() -> &'static str {
    "Boardcast Relay Server - Connect via WebSocket at /ws"
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one client connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("new connection: {peer_id}");

    let (mut sender, mut receiver) = socket.split();
    let mut current_room: Option<String> = None;
    let mut room_rx: Option<broadcast::Receiver<RoomMessage>> = None;

    loop {
        tokio::select! {
            // Messages from this client.
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match Payload::decode(&text) {
                            Ok(payload) => handle_payload(
                                &state,
                                &peer_id,
                                &mut current_room,
                                &mut room_rx,
                                payload,
                                text.as_str().to_string(),
                            ),
                            Err(e) => {
                                warn!("undecodable payload from {peer_id}: {e}");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary, ping, pong.
                    Some(Err(e)) => {
                        warn!("websocket error for {peer_id}: {e}");
                        break;
                    }
                }
            }

            // Messages from the room.
            msg = async {
                match &mut room_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => std::future::pending::<Option<RoomMessage>>().await,
                }
            } => {
                if let Some((from, target, text)) = msg {
                    let deliver = match &target {
                        Some(target) => *target == peer_id,
                        None => from != peer_id,
                    };
                    if deliver && sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect.
    if let Some(room) = current_room {
        depart(&state, &room, &peer_id);
    }
    info!("connection closed: {peer_id}");
}

/// Route one decoded payload.
fn handle_payload(
    state: &AppState,
    peer_id: &str,
    current_room: &mut Option<String>,
    room_rx: &mut Option<broadcast::Receiver<RoomMessage>>,
    payload: Payload,
    raw: String,
) {
    match &payload {
        Payload::Join { room } => {
            // A second join for the current room is already satisfied.
            if current_room.as_deref() == Some(room.as_str()) {
                return;
            }
            if let Some(old_room) = current_room.take() {
                depart(state, &old_room, peer_id);
            }

            let (rx, existing) = state.join_room(room, peer_id);
            *room_rx = Some(rx);
            *current_room = Some(room.clone());

            // The newcomer learns about every existing member; each pair
            // resolves its offer role from the id order.
            for other in existing {
                let notice = Payload::PeerJoined {
                    user_id: other.clone(),
                };
                state.send_to(room, &other, peer_id, &notice);
            }

            state.broadcast(
                room,
                peer_id,
                &Payload::PeerJoined {
                    user_id: peer_id.to_string(),
                },
            );
            info!(
                "peer {peer_id} joined room {room} ({} members)",
                state.peer_count(room)
            );
        }
        Payload::Leave { .. } => {
            if let Some(room) = current_room.take() {
                depart(state, &room, peer_id);
                info!("peer {peer_id} left room {room}");
            }
            *room_rx = None;
        }
        Payload::Offer { target_user_id, .. }
        | Payload::Answer { target_user_id, .. }
        | Payload::IceCandidate { target_user_id, .. } => {
            if let Some(room) = current_room.as_deref() {
                state.publish(room, peer_id, Some(target_user_id.clone()), raw);
            }
        }
        Payload::StrokeCommitted { .. } | Payload::StrokesReplaced { .. } => {
            if let Some(room) = current_room.as_deref() {
                state.publish(room, peer_id, None, raw);
            }
        }
        // Presence payloads originate here, not from clients.
        Payload::PeerJoined { .. } | Payload::PeerLeft { .. } => {
            warn!("ignoring client-sent presence payload from {peer_id}");
        }
    }
}

/// Remove a peer from a room and notify the remaining members.
fn depart(state: &AppState, room: &str, peer_id: &str) {
    state.leave_room(room, peer_id);
    state.broadcast(
        room,
        peer_id,
        &Payload::PeerLeft {
            user_id: peer_id.to_string(),
        },
    );
}
