//! Client-Connection – Verarbeitungsschleife einer einzelnen Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Die Schleife ist unabhaengig vom Transport: WebSocket und
//! TCP-Frames liefern beide einen Strom von `Eingang`-Werten und nehmen
//! `ServerEvent`s ueber einen `Sink` entgegen.
//!
//! ```text
//! Transport --Eingang--> MessageDispatcher --> Send-Queue --> Sink --> Transport
//! ```
//!
//! Endet die Schleife (Client trennt, Transportfehler, Shutdown), wird die
//! Verbindung immer ueber `MessageDispatcher::trennen` aufgeraeumt.

use cipherpost_core::types::ConnectionId;
use cipherpost_protocol::{ProtokollFehler, ServerEvent};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::watch;

use crate::dispatcher::{MessageDispatcher, VerbindungsKontext};
use crate::error::{RelayError, RelayResult};
use crate::server_state::RelayState;

/// Ein Element des eingehenden Stroms, bereits vom Transport uebersetzt
#[derive(Debug)]
pub enum Eingang {
    /// Rohe Ereignisdaten (WebSocket-Text oder TCP-Frame)
    Daten(Vec<u8>),
    /// Vom Transport als ungueltig erkannt (z.B. binaerer WebSocket-Frame)
    Fehlerhaft(ProtokollFehler),
    /// Transport-interne Nachricht ohne Bedeutung fuer den Relay (Ping/Pong)
    Ignoriert,
    /// Gegenstelle hat die Verbindung geschlossen
    Geschlossen,
}

/// Verarbeitet eine einzelne Client-Verbindung
pub struct ClientConnection {
    state: Arc<RelayState>,
    peer: String,
}

impl ClientConnection {
    pub fn neu(state: Arc<RelayState>, peer: impl Into<String>) -> Self {
        Self {
            state,
            peer: peer.into(),
        }
    }

    /// Startet die Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung endet oder ein Shutdown-Signal eingeht. Ein
    /// Fehler betrifft nur diese Verbindung.
    pub async fn verarbeiten<E, A>(
        self,
        mut eingang: E,
        mut ausgang: A,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> RelayResult<()>
    where
        E: Stream<Item = Eingang> + Unpin,
        A: Sink<ServerEvent> + Unpin,
        A::Error: Display,
    {
        let verbindung = ConnectionId::new();
        let mut sende_rx = self.state.verbindung_oeffnen(verbindung);
        let mut ctx = VerbindungsKontext::neu(verbindung, self.peer.clone());
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        tracing::info!(peer = %self.peer, verbindung = %verbindung, "Neue Verbindung");

        let ergebnis = loop {
            tokio::select! {
                // Eingehende Daten vom Client
                element = eingang.next() => match element {
                    Some(Eingang::Daten(daten)) => dispatcher.daten_verarbeiten(&daten, &mut ctx),
                    Some(Eingang::Fehlerhaft(fehler)) => dispatcher.fehlerhaft(&fehler, &mut ctx),
                    Some(Eingang::Ignoriert) => {}
                    Some(Eingang::Geschlossen) | None => {
                        tracing::info!(peer = %self.peer, "Verbindung vom Client getrennt");
                        break Ok(());
                    }
                },

                // Ausgehende Ereignisse aus der Send-Queue
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = ausgang.send(ausgehend).await {
                        tracing::warn!(peer = %self.peer, fehler = %e, "Senden fehlgeschlagen");
                        break Err(RelayError::transport(e));
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %self.peer, "Shutdown-Signal, Verbindung wird getrennt");
                        break Ok(());
                    }
                }
            }
        };

        dispatcher.trennen(&mut ctx);
        tracing::debug!(peer = %self.peer, verbindung = %verbindung, "Verbindungs-Task beendet");
        ergebnis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::RelayConfig;
    use cipherpost_observability::RelayMetrics;
    use futures_util::stream;
    use tokio::sync::mpsc;

    fn state() -> Arc<RelayState> {
        RelayState::neu(RelayConfig::default(), RelayMetrics::neu().unwrap())
    }

    fn ausgang() -> (
        impl Sink<ServerEvent, Error = String> + Unpin,
        mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = futures_util::sink::unfold(tx, |tx, ev: ServerEvent| async move {
            tx.send(ev).map_err(|e| e.to_string())?;
            Ok::<_, String>(tx)
        });
        (Box::pin(sink), rx)
    }

    #[tokio::test]
    async fn register_und_schliessen() {
        let state = state();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (sink, mut rx) = ausgang();

        // Eingang bleibt nach dem Register offen, bis der Shutdown kommt
        let (ein_tx, ein_rx) = mpsc::unbounded_channel();
        ein_tx
            .send(Eingang::Daten(
                br#"{"event":"register","data":{"publicKey":"abc"}}"#.to_vec(),
            ))
            .unwrap();
        let eingang = tokio_stream_aus(ein_rx);

        let verbindung = ClientConnection::neu(Arc::clone(&state), "test");
        let task = tokio::spawn(verbindung.verarbeiten(eingang, sink, shutdown_rx));

        let registered = rx.recv().await.unwrap();
        assert_eq!(registered.name(), "registered");
        assert_eq!(rx.recv().await.unwrap().name(), "users");
        assert_eq!(state.registry().verzeichnis.len(), 1);

        ein_tx.send(Eingang::Geschlossen).unwrap();
        task.await.unwrap().unwrap();

        assert!(state.registry().verzeichnis.is_empty());
        assert_eq!(state.metriken.connections.get(), 0);
    }

    #[tokio::test]
    async fn ende_des_stroms_raeumt_auf() {
        let state = state();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (sink, _rx) = ausgang();
        let eingang = stream::iter(vec![Eingang::Ignoriert]);

        ClientConnection::neu(Arc::clone(&state), "test")
            .verarbeiten(eingang, sink, shutdown_rx)
            .await
            .unwrap();

        assert_eq!(state.broadcaster.anzahl(), 0);
    }

    #[tokio::test]
    async fn shutdown_beendet_schleife() {
        let state = state();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (sink, _rx) = ausgang();
        let eingang = stream::pending::<Eingang>();

        let task = tokio::spawn(
            ClientConnection::neu(Arc::clone(&state), "test").verarbeiten(eingang, sink, shutdown_rx),
        );
        tokio::task::yield_now().await;
        shutdown_tx.send(true).unwrap();

        task.await.unwrap().unwrap();
        assert_eq!(state.metriken.connections.get(), 0);
    }

    #[tokio::test]
    async fn fehlerhafter_frame_wird_beantwortet() {
        let state = state();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (sink, mut rx) = ausgang();

        let (ein_tx, ein_rx) = mpsc::unbounded_channel();
        ein_tx
            .send(Eingang::Fehlerhaft(ProtokollFehler::FrameTyp("binary")))
            .unwrap();

        let task = tokio::spawn(
            ClientConnection::neu(Arc::clone(&state), "test").verarbeiten(
                tokio_stream_aus(ein_rx),
                sink,
                shutdown_rx,
            ),
        );

        match rx.recv().await.unwrap() {
            ServerEvent::Error(e) => assert!(e.message.contains("binary")),
            anderes => panic!("Erwartet error, erhalten {anderes:?}"),
        }

        drop(ein_tx);
        task.await.unwrap().unwrap();
    }

    /// Stream aus einem mpsc-Empfaenger, ohne tokio-stream als Abhaengigkeit
    fn tokio_stream_aus(
        rx: mpsc::UnboundedReceiver<Eingang>,
    ) -> impl Stream<Item = Eingang> + Unpin {
        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|e| (e, rx))
        }))
    }
}
