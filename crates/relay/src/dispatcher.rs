//! Message-Dispatcher – Routet Client-Ereignisse an die Handler
//!
//! Der Dispatcher parst eingehende Daten, prueft den Verbindungszustand und
//! ruft den passenden Handler auf. Fehlerhafte Eingaben werden mit einem
//! `error`-Ereignis beantwortet und aendern keinen Zustand.
//!
//! ## Zustaende
//! ```text
//! Unregistriert --register--> Registriert --register--> Registriert (neue Identitaet)
//!       |                          |
//!       +-------- Trennen ---------+--> Geschlossen (terminal)
//! ```
//! Im Zustand `Geschlossen` wird jedes weitere Ereignis ignoriert.

use cipherpost_core::types::{ConnectionId, UserId};
use cipherpost_protocol::{ClientEvent, ProtokollFehler, ServerEvent};
use std::sync::Arc;

use crate::handlers::{key_handler, message_handler, registration_handler};
use crate::server_state::RelayState;

/// Zustand einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    Unregistriert,
    Registriert(UserId),
    Geschlossen,
}

/// Kontext der aktuellen Verbindung
#[derive(Debug)]
pub struct VerbindungsKontext {
    pub verbindung: ConnectionId,
    /// Gegenstelle fuer Logging
    pub peer: String,
    pub zustand: VerbindungsZustand,
}

impl VerbindungsKontext {
    pub fn neu(verbindung: ConnectionId, peer: impl Into<String>) -> Self {
        Self {
            verbindung,
            peer: peer.into(),
            zustand: VerbindungsZustand::Unregistriert,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self.zustand {
            VerbindungsZustand::Registriert(uid) => Some(uid),
            _ => None,
        }
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.zustand == VerbindungsZustand::Geschlossen
    }
}

/// Zentraler Dispatcher fuer Client-Ereignisse
pub struct MessageDispatcher {
    state: Arc<RelayState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    /// Parst rohe Daten (WebSocket-Text oder TCP-Frame) und verarbeitet sie
    pub fn daten_verarbeiten(&self, daten: &[u8], ctx: &mut VerbindungsKontext) {
        match ClientEvent::from_slice(daten) {
            Ok(ereignis) => self.dispatch(ereignis, ctx),
            Err(fehler) => self.fehlerhaft(&fehler, ctx),
        }
    }

    /// Verarbeitet ein geparstes Ereignis
    pub fn dispatch(&self, ereignis: ClientEvent, ctx: &mut VerbindungsKontext) {
        if ctx.ist_geschlossen() {
            tracing::trace!(
                verbindung = %ctx.verbindung,
                ereignis = ereignis.name(),
                "Ereignis nach Verbindungsende ignoriert"
            );
            return;
        }

        tracing::trace!(
            verbindung = %ctx.verbindung,
            ereignis = ereignis.name(),
            "Ereignis empfangen"
        );

        match ereignis {
            ClientEvent::Register(req) => {
                let uid = registration_handler::handle_register(req, ctx.verbindung, &self.state);
                ctx.zustand = VerbindungsZustand::Registriert(uid);
            }
            ClientEvent::GetPublicKey(req) => {
                key_handler::handle_get_public_key(req, ctx.verbindung, &self.state);
            }
            ClientEvent::PrivateMessage(req) => {
                message_handler::handle_private_message(req, ctx.verbindung, &self.state);
            }
        }
    }

    /// Beantwortet eine fehlerhafte Eingabe mit einem `error`-Ereignis
    pub fn fehlerhaft(&self, fehler: &ProtokollFehler, ctx: &mut VerbindungsKontext) {
        if ctx.ist_geschlossen() {
            return;
        }

        self.state.metriken.malformed_events_total.inc();
        tracing::warn!(
            verbindung = %ctx.verbindung,
            peer = %ctx.peer,
            fehler = %fehler,
            "Fehlerhaftes Ereignis abgelehnt"
        );
        self.state
            .broadcaster
            .an_verbindung_senden(&ctx.verbindung, ServerEvent::error(fehler.client_meldung()));
    }

    /// Beendet die Verbindung und raeumt ihren Zustand auf
    ///
    /// Idempotent: ein zweiter Aufruf hat keine Wirkung.
    pub fn trennen(&self, ctx: &mut VerbindungsKontext) {
        if ctx.ist_geschlossen() {
            return;
        }
        registration_handler::handle_trennen(ctx.verbindung, &self.state);
        ctx.zustand = VerbindungsZustand::Geschlossen;
    }
}
