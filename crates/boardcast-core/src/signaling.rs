//! Signaling channel transport.
//!
//! Platform-agnostic client interface for the relay server, with a native
//! implementation (background thread) and a WASM implementation (browser
//! WebSocket). Both decode the wire protocol at the boundary and surface
//! typed events via polling.

use crate::protocol::{Payload, ProtocolError};
use thiserror::Error;

/// Transport errors reported at the signaling boundary.
///
/// Transport-level reconnection is the transport's own concern; this core
/// only reports unavailability.
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("signaling transport unavailable: {0}")]
    Unavailable(String),
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Connection state of a signaling transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events surfaced by a signaling transport.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Transport connected to the relay.
    Connected,
    /// Transport disconnected from the relay.
    Disconnected,
    /// One decoded payload from the room.
    Payload(Payload),
    /// Transport-level error.
    Error { message: String },
}

/// Room-scoped pub/sub bus the session components publish through.
///
/// Implementations must deliver payloads reliably and in the order they
/// were sent. Components receive it by handle (dependency injection), never
/// through ambient globals.
pub trait SignalingChannel {
    /// Publish one payload to the room.
    fn send(&mut self, payload: &Payload) -> Result<(), SignalingError>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<ChannelEvent>;

    /// Current transport state.
    fn state(&self) -> ChannelState;

    fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }
}

// ============================================================================
// WASM WebSocket Client
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod wasm_client {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    /// Signaling client for WASM.
    ///
    /// Events accumulate in a shared buffer and are drained via
    /// `poll_events()` from the frame loop.
    pub struct WasmSignalingClient {
        ws: Option<WebSocket>,
        state: ChannelState,
        events: Rc<RefCell<Vec<ChannelEvent>>>,
        // Closures must outlive the socket callbacks.
        _on_open: Option<Closure<dyn Fn()>>,
        _on_message: Option<Closure<dyn Fn(MessageEvent)>>,
        _on_close: Option<Closure<dyn Fn(CloseEvent)>>,
        _on_error: Option<Closure<dyn Fn(ErrorEvent)>>,
    }

    impl WasmSignalingClient {
        pub fn new() -> Self {
            Self {
                ws: None,
                state: ChannelState::Disconnected,
                events: Rc::new(RefCell::new(Vec::new())),
                _on_open: None,
                _on_message: None,
                _on_close: None,
                _on_error: None,
            }
        }

        /// Connect to the relay.
        pub fn connect(&mut self, url: &str) -> Result<(), SignalingError> {
            if self.ws.is_some() {
                return Err(SignalingError::Unavailable("already connected".into()));
            }

            let ws = WebSocket::new(url)
                .map_err(|e| SignalingError::InvalidUrl(format!("{e:?}")))?;
            ws.set_binary_type(web_sys::BinaryType::Arraybuffer);
            self.state = ChannelState::Connecting;

            let events = self.events.clone();

            let events_open = events.clone();
            let on_open = Closure::wrap(Box::new(move || {
                events_open.borrow_mut().push(ChannelEvent::Connected);
            }) as Box<dyn Fn()>);
            ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

            let events_msg = events.clone();
            let on_message = Closure::wrap(Box::new(move |e: MessageEvent| {
                if let Ok(txt) = e.data().dyn_into::<js_sys::JsString>() {
                    let text: String = txt.into();
                    match Payload::decode(&text) {
                        Ok(payload) => {
                            events_msg.borrow_mut().push(ChannelEvent::Payload(payload));
                        }
                        Err(err) => {
                            events_msg.borrow_mut().push(ChannelEvent::Error {
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }) as Box<dyn Fn(MessageEvent)>);
            ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

            let events_close = events.clone();
            let on_close = Closure::wrap(Box::new(move |_e: CloseEvent| {
                events_close.borrow_mut().push(ChannelEvent::Disconnected);
            }) as Box<dyn Fn(CloseEvent)>);
            ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

            let events_err = events;
            let on_error = Closure::wrap(Box::new(move |_e: ErrorEvent| {
                events_err.borrow_mut().push(ChannelEvent::Error {
                    message: "websocket error".to_string(),
                });
            }) as Box<dyn Fn(ErrorEvent)>);
            ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

            self.ws = Some(ws);
            self._on_open = Some(on_open);
            self._on_message = Some(on_message);
            self._on_close = Some(on_close);
            self._on_error = Some(on_error);

            Ok(())
        }

        pub fn disconnect(&mut self) {
            if let Some(ws) = self.ws.take() {
                let _ = ws.close();
            }
            self.state = ChannelState::Disconnected;
            self._on_open = None;
            self._on_message = None;
            self._on_close = None;
            self._on_error = None;
        }
    }

    impl SignalingChannel for WasmSignalingClient {
        fn send(&mut self, payload: &Payload) -> Result<(), SignalingError> {
            let text = payload.encode()?;
            match &self.ws {
                Some(ws) => ws
                    .send_with_str(&text)
                    .map_err(|e| SignalingError::Unavailable(format!("{e:?}"))),
                None => Err(SignalingError::Unavailable("not connected".into())),
            }
        }

        fn poll_events(&mut self) -> Vec<ChannelEvent> {
            let mut events = self.events.borrow_mut();
            for event in events.iter() {
                match event {
                    ChannelEvent::Connected => self.state = ChannelState::Connected,
                    ChannelEvent::Disconnected => self.state = ChannelState::Disconnected,
                    ChannelEvent::Error { .. } => self.state = ChannelState::Error,
                    ChannelEvent::Payload(_) => {}
                }
            }
            std::mem::take(&mut *events)
        }

        fn state(&self) -> ChannelState {
            self.state
        }
    }

    impl Default for WasmSignalingClient {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_client::WasmSignalingClient;

// ============================================================================
// Native WebSocket Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    enum SocketCommand {
        Send(String),
        Close,
    }

    /// Signaling client for native platforms.
    ///
    /// Socket I/O runs on a background thread; all state mutation stays on
    /// the caller's thread via the command/event channels.
    pub struct NativeSignalingClient {
        state: ChannelState,
        events: Vec<ChannelEvent>,
        cmd_tx: Option<Sender<SocketCommand>>,
        event_rx: Option<Receiver<ChannelEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeSignalingClient {
        pub fn new() -> Self {
            Self {
                state: ChannelState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to the relay.
        pub fn connect(&mut self, url: &str) -> Result<(), SignalingError> {
            if self.cmd_tx.is_some() {
                return Err(SignalingError::Unavailable("already connected".into()));
            }

            let parsed = Url::parse(url).map_err(|e| SignalingError::InvalidUrl(e.to_string()))?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(SignalingError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed.scheme()
                )));
            }

            self.state = ChannelState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<SocketCommand>();
            let (event_tx, event_rx) = channel::<ChannelEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("signaling thread: connecting to {url}");

                let (mut socket, response) = match connect(&url) {
                    Ok(ok) => ok,
                    Err(e) => {
                        log::error!("signaling connection failed: {e}");
                        let _ = event_tx.send(ChannelEvent::Error {
                            message: format!("connection failed: {e}"),
                        });
                        return;
                    }
                };
                log::info!("signaling connected, status: {}", response.status());
                let _ = event_tx.send(ChannelEvent::Connected);

                // Short read timeout keeps the loop responsive to commands.
                if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
                    let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                    let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                }

                loop {
                    match cmd_rx.try_recv() {
                        Ok(SocketCommand::Send(text)) => {
                            if let Err(e) = socket.send(Message::Text(text)) {
                                log::error!("signaling send error: {e}");
                                break;
                            }
                        }
                        Ok(SocketCommand::Close) | Err(TryRecvError::Disconnected) => {
                            let _ = socket.close(None);
                            break;
                        }
                        Err(TryRecvError::Empty) => {}
                    }

                    match socket.read() {
                        Ok(Message::Text(text)) => match Payload::decode(&text) {
                            Ok(payload) => {
                                let _ = event_tx.send(ChannelEvent::Payload(payload));
                            }
                            Err(e) => {
                                log::warn!("undecodable signaling payload: {e}");
                                let _ = event_tx.send(ChannelEvent::Error {
                                    message: e.to_string(),
                                });
                            }
                        },
                        Ok(Message::Ping(data)) => {
                            let _ = socket.send(Message::Pong(data));
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(ref e))
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => {
                            log::error!("signaling read error: {e}");
                            break;
                        }
                    }
                }

                log::info!("signaling thread exiting");
                let _ = event_tx.send(ChannelEvent::Disconnected);
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);

            Ok(())
        }

        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(SocketCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ChannelState::Disconnected;
        }
    }

    impl SignalingChannel for NativeSignalingClient {
        fn send(&mut self, payload: &Payload) -> Result<(), SignalingError> {
            let text = payload.encode()?;
            match &self.cmd_tx {
                Some(tx) => tx
                    .send(SocketCommand::Send(text))
                    .map_err(|e| SignalingError::Unavailable(e.to_string())),
                None => Err(SignalingError::Unavailable("not connected".into())),
            }
        }

        fn poll_events(&mut self) -> Vec<ChannelEvent> {
            if let Some(rx) = &self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        ChannelEvent::Connected => self.state = ChannelState::Connected,
                        ChannelEvent::Disconnected => self.state = ChannelState::Disconnected,
                        ChannelEvent::Error { .. } => self.state = ChannelState::Error,
                        ChannelEvent::Payload(_) => {}
                    }
                    self.events.push(event);
                }
            }
            std::mem::take(&mut self.events)
        }

        fn state(&self) -> ChannelState {
            self.state
        }
    }

    impl Default for NativeSignalingClient {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeSignalingClient {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeSignalingClient;

/// Platform-specific signaling client type.
#[cfg(target_arch = "wasm32")]
pub type PlatformSignalingClient = WasmSignalingClient;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformSignalingClient = NativeSignalingClient;
