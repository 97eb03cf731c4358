//! TCP-Listener – Rohe Frame-Verbindungen
//!
//! Optionaler zweiter Transport neben dem WebSocket-Endpunkt. Jede
//! Verbindung spricht das Frame-Format aus `cipherpost_protocol::wire`
//! (4 Byte Laenge + JSON-Umschlag) und laeuft in einem eigenen tokio-Task
//! durch dieselbe `ClientConnection` wie WebSocket-Clients.

use cipherpost_protocol::{FrameCodec, ServerEvent};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;

use crate::connection::{ClientConnection, Eingang};
use crate::error::RelayResult;
use crate::server_state::RelayState;

/// TCP-Relay-Server
pub struct TcpRelayServer {
    state: Arc<RelayState>,
    bind_addr: SocketAddr,
}

impl TcpRelayServer {
    pub fn neu(state: Arc<RelayState>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    /// Bindet den Socket und akzeptiert Verbindungen
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> RelayResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        annehmen(self.state, listener, shutdown_rx).await
    }
}

/// Accept-Loop auf einem bereits gebundenen Listener
pub async fn annehmen(
    state: Arc<RelayState>,
    listener: TcpListener,
    mut shutdown_rx: watch::Receiver<bool>,
) -> RelayResult<()> {
    let lokale_addr = listener.local_addr()?;
    tracing::info!(adresse = %lokale_addr, "TCP-Relay gestartet");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        tracing::debug!(peer = %peer_addr, "TCP-Verbindung akzeptiert");
                        tokio::spawn(verbindung_bedienen(
                            Arc::clone(&state),
                            stream,
                            peer_addr,
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("TCP-Relay: Shutdown-Signal empfangen");
                    break;
                }
            }
        }
    }

    tracing::info!("TCP-Relay gestoppt");
    Ok(())
}

async fn verbindung_bedienen(
    state: Arc<RelayState>,
    stream: TcpStream,
    peer_addr: SocketAddr,
    shutdown_rx: watch::Receiver<bool>,
) {
    let codec = FrameCodec::with_max_size(state.config.max_frame_bytes);
    let (ausgang, frames) = Framed::new(stream, codec).split::<ServerEvent>();

    // Lesefehler (z.B. zu grosser Frame) beenden nur diese Verbindung
    let eingang = frames.map(move |frame| match frame {
        Ok(daten) => Eingang::Daten(daten.to_vec()),
        Err(e) => {
            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
            Eingang::Geschlossen
        }
    });

    if let Err(e) = ClientConnection::neu(state, peer_addr.to_string())
        .verarbeiten(eingang, ausgang, shutdown_rx)
        .await
    {
        tracing::warn!(peer = %peer_addr, fehler = %e, "TCP-Verbindung mit Fehler beendet");
    }
}
