//! Event-Broadcaster – Send-Queues aller offenen Verbindungen
//!
//! Jede Verbindung bekommt beim Verbindungsaufbau eine Queue, nicht erst nach
//! der Registrierung: auch unregistrierte Verbindungen empfangen das
//! `users`-Broadcast. Antworten, Zustellungen und Broadcasts laufen alle ueber
//! dieselbe Queue, dadurch bleibt die Reihenfolge pro Verbindung erhalten.
//!
//! ## Senden
//! - An eine Verbindung: `an_verbindung_senden`
//! - An alle offenen Verbindungen: `an_alle_senden`

use cipherpost_core::types::ConnectionId;
use cipherpost_protocol::ServerEvent;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// VerbindungsSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
///
/// Die Queue ist unbegrenzt: der Relay blockiert nie auf einem langsamen
/// Empfaenger, der Speicherbedarf waechst stattdessen mit dessen Rueckstand.
#[derive(Clone, Debug)]
pub struct VerbindungsSender {
    pub verbindung: ConnectionId,
    pub tx: mpsc::UnboundedSender<ServerEvent>,
}

impl VerbindungsSender {
    /// Reiht ein Ereignis ein
    ///
    /// Gibt `false` zurueck wenn die Verbindung ihre Queue schon geschlossen hat.
    pub fn senden(&self, ereignis: ServerEvent) -> bool {
        match self.tx.send(ereignis) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(
                    verbindung = %self.verbindung,
                    "Send-Queue geschlossen (Verbindung getrennt)"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Verteilt ausgehende Ereignisse an offene Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    verbindungen: DashMap<ConnectionId, VerbindungsSender>,
}

impl EventBroadcaster {
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                verbindungen: DashMap::new(),
            }),
        }
    }

    /// Legt die Queue einer neuen Verbindung an und gibt das Empfangsende zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und schreibt in den Transport.
    pub fn verbindung_registrieren(
        &self,
        verbindung: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .verbindungen
            .insert(verbindung, VerbindungsSender { verbindung, tx });
        tracing::debug!(verbindung = %verbindung, "Verbindung im Broadcaster registriert");
        rx
    }

    /// Entfernt eine Verbindung; gibt `false` zurueck wenn sie nicht registriert war
    pub fn verbindung_entfernen(&self, verbindung: &ConnectionId) -> bool {
        let entfernt = self.inner.verbindungen.remove(verbindung).is_some();
        if entfernt {
            tracing::debug!(verbindung = %verbindung, "Verbindung aus Broadcaster entfernt");
        }
        entfernt
    }

    /// Sendet ein Ereignis an genau eine Verbindung
    pub fn an_verbindung_senden(&self, verbindung: &ConnectionId, ereignis: ServerEvent) -> bool {
        match self.inner.verbindungen.get(verbindung) {
            Some(sender) => sender.senden(ereignis),
            None => {
                tracing::debug!(
                    verbindung = %verbindung,
                    ereignis = ereignis.name(),
                    "Verbindung unbekannt, Ereignis verworfen"
                );
                false
            }
        }
    }

    /// Sendet ein Ereignis an alle offenen Verbindungen
    ///
    /// Gibt die Anzahl erfolgreich eingereihter Ereignisse zurueck.
    pub fn an_alle_senden(&self, ereignis: &ServerEvent) -> usize {
        self.inner
            .verbindungen
            .iter()
            .filter(|eintrag| eintrag.value().senden(ereignis.clone()))
            .count()
    }

    pub fn ist_registriert(&self, verbindung: &ConnectionId) -> bool {
        self.inner.verbindungen.contains_key(verbindung)
    }

    /// Anzahl offener Verbindungen
    pub fn anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}
