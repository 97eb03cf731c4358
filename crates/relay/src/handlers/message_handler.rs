//! Nachrichten-Handler – `private-message`
//!
//! Der Relay sieht nur Absender, Ziel und einen opaken Payload. Zugestellt
//! wird hoechstens einmal an die aktuelle Verbindung des Ziels; alles andere
//! wird still verworfen.

use cipherpost_core::types::{ConnectionId, UserId};
use cipherpost_protocol::events::PrivateMessageRequest;
use cipherpost_protocol::ServerEvent;
use std::sync::Arc;

use crate::server_state::RelayState;

/// Verarbeitet `private-message`
///
/// Ziel-Aufloesung und Einreihen passieren unter dem Registry-Lock, damit
/// die Nachricht nie bei einer Verbindung landet, die das Ziel inzwischen
/// verlassen hat.
pub fn handle_private_message(
    req: PrivateMessageRequest,
    verbindung: ConnectionId,
    state: &Arc<RelayState>,
) {
    let registry = state.registry();

    let Some(absender) = registry.presence.identitaet(&verbindung) else {
        drop(registry);
        state.metriken.messages_dropped_total.inc();
        tracing::debug!(verbindung = %verbindung, "Nachricht von unregistrierter Verbindung verworfen");
        return;
    };

    let ziel = UserId::parsen(&req.to).and_then(|uid| registry.presence.verbindung(&uid));
    let zugestellt = match ziel {
        Some(ziel_verbindung) => state.broadcaster.an_verbindung_senden(
            &ziel_verbindung,
            ServerEvent::private_message(absender, req.encrypted),
        ),
        None => false,
    };
    drop(registry);

    if zugestellt {
        state.metriken.messages_relayed_total.inc();
        tracing::trace!(von = %absender, an = %req.to, "Nachricht zugestellt");
    } else {
        state.metriken.messages_dropped_total.inc();
        tracing::debug!(von = %absender, an = %req.to, "Ziel unbekannt, Nachricht verworfen");
    }
}
