//! HTTP-Router – WebSocket-Endpunkt und statische Dateien
//!
//! Auf dem Hauptport laufen zwei Dinge: `GET /ws` wird zu einer
//! WebSocket-Verbindung aufgewertet, alles andere liefert Dateien aus dem
//! konfigurierten Verzeichnis (Browser-Client). CORS ist offen, jede Origin
//! wird gespiegelt.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
    routing::get,
    Router,
};
use cipherpost_observability::request_timing_layer;
use cipherpost_protocol::{ProtokollFehler, ServerEvent};
use futures_util::{future, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::connection::{ClientConnection, Eingang};
use crate::server_state::RelayState;

#[derive(Clone)]
struct WsState {
    relay: Arc<RelayState>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Baut den Router fuer den Hauptport
///
/// Zum Ausliefern muss der Router mit
/// `into_make_service_with_connect_info::<SocketAddr>()` gestartet werden,
/// damit die Peer-Adresse im Log erscheint. Ohne sie laeuft er trotzdem.
pub fn relay_router(
    relay: Arc<RelayState>,
    statisches_verzeichnis: impl AsRef<Path>,
    shutdown_rx: watch::Receiver<bool>,
) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(statisches_verzeichnis.as_ref()))
        .layer(CorsLayer::very_permissive())
        .layer(request_timing_layer())
        .with_state(WsState { relay, shutdown_rx })
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<WsState>,
) -> Response {
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unbekannt".to_string());

    ws.max_message_size(state.relay.config.max_frame_bytes)
        .on_upgrade(move |socket| websocket_bedienen(socket, peer, state))
}

/// Uebersetzt eine WebSocket-Nachricht in einen `Eingang`
fn eingang_aus(nachricht: Result<Message, axum::Error>, peer: &str) -> Eingang {
    match nachricht {
        Ok(Message::Text(text)) => Eingang::Daten(text.into_bytes()),
        Ok(Message::Binary(_)) => Eingang::Fehlerhaft(ProtokollFehler::FrameTyp("binary")),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => Eingang::Ignoriert,
        Ok(Message::Close(_)) => Eingang::Geschlossen,
        Err(e) => {
            tracing::warn!(peer = %peer, fehler = %e, "WebSocket-Lesefehler");
            Eingang::Geschlossen
        }
    }
}

async fn websocket_bedienen(socket: WebSocket, peer: String, state: WsState) {
    let (sink, stream) = socket.split();

    let ausgang = sink.with(|ereignis: ServerEvent| {
        future::ready(
            ereignis
                .to_json()
                .map(Message::Text)
                .map_err(axum::Error::new),
        )
    });

    let peer_log = peer.clone();
    let eingang = stream.map(move |nachricht| eingang_aus(nachricht, &peer_log));

    if let Err(e) = ClientConnection::neu(state.relay, peer.clone())
        .verarbeiten(eingang, ausgang, state.shutdown_rx)
        .await
    {
        tracing::warn!(peer = %peer, fehler = %e, "WebSocket-Verbindung mit Fehler beendet");
    }
}
