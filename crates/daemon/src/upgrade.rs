//! WebSocket upgrade handling
//!
//! Every path accepts an upgrade. Requests without one get a fixed 400
//! response and never become sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{future, Sink, SinkExt, StreamExt};
use tracing::{debug, warn};

use tunnelgate_core::TunnelError;
use tunnelgate_exit::{CloseNotice, Connect, Frame, SessionHandler};

/// Body returned to plain HTTP requests
pub const NOT_UPGRADE_BODY: &str = "Bad Request: expected a websocket upgrade";

/// Inbound message stream of an upgraded socket
pub type FrameStream = BoxStream<'static, Result<Frame, axum::Error>>;

/// Outbound message sink of an upgraded socket
pub type FrameSink = std::pin::Pin<Box<dyn Sink<Frame, Error = axum::Error> + Send>>;

/// Map a received message to a frame. Ping and pong are answered by axum
/// and dropped here.
pub fn frame_from_message(msg: Message) -> Option<Frame> {
    match msg {
        Message::Binary(data) => Some(Frame::Data(data)),
        Message::Text(text) => Some(Frame::Data(Bytes::copy_from_slice(text.as_str().as_bytes()))),
        Message::Close(close) => Some(Frame::Close(
            close.map(|c| CloseNotice::new(c.code, c.reason.as_str())),
        )),
        Message::Ping(_) | Message::Pong(_) => None,
    }
}

pub fn message_from_frame(frame: Frame) -> Message {
    match frame {
        Frame::Data(data) => Message::Binary(data),
        Frame::Close(notice) => Message::Close(notice.map(|n| CloseFrame {
            code: n.code(),
            reason: n.reason().to_string().into(),
        })),
    }
}

/// Split an upgraded socket into the halves a session consumes
pub fn split_socket(socket: WebSocket) -> (FrameStream, FrameSink) {
    let (sink, stream) = socket.split();

    let frames = stream
        .filter_map(|item| {
            future::ready(match item {
                Ok(msg) => frame_from_message(msg).map(Ok),
                Err(e) => Some(Err(e)),
            })
        })
        .boxed();

    let sink: FrameSink = Box::pin(
        sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(message_from_frame(frame)))),
    );

    (frames, sink)
}

/// Fallback handler for every request
pub async fn tunnel_handler<C: Connect>(
    State(handler): State<Arc<SessionHandler<C>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!("{} from {}: {}", TunnelError::NotAnUpgradeRequest, peer, rejection);
            return (StatusCode::BAD_REQUEST, NOT_UPGRADE_BODY).into_response();
        }
    };

    debug!("WebSocket upgrade from {}", peer);
    ws.on_failed_upgrade(move |e| warn!("WebSocket upgrade from {} failed: {}", peer, e))
        .on_upgrade(move |socket| async move {
            let (inbound_rx, inbound_tx) = split_socket(socket);
            let summary = handler.run(inbound_rx, inbound_tx).await;
            debug!("Session {} from {} finished", summary.id, peer);
        })
}
