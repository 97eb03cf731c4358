//! Registrierungs-Handler – `register` und Verbindungsende
//!
//! Beide Operationen aendern die Mitgliedschaft und loesen deshalb ein
//! `users`-Broadcast aus. Mutation, Snapshot und Broadcast passieren unter
//! demselben Registry-Lock.

use cipherpost_core::types::{ConnectionId, UserId};
use cipherpost_protocol::events::RegisterRequest;
use cipherpost_protocol::ServerEvent;
use std::sync::Arc;

use crate::server_state::{RelayState, ReRegistrierung};

/// Verarbeitet `register`
///
/// Vergibt eine neue Identitaet, traegt den Schluessel ein, bestaetigt dem
/// Absender mit `registered` und sendet danach die Benutzerliste an alle.
/// Die Bestaetigung wird vor dem Broadcast eingereiht, der Absender sieht
/// also immer zuerst `registered`.
pub fn handle_register(
    req: RegisterRequest,
    verbindung: ConnectionId,
    state: &Arc<RelayState>,
) -> UserId {
    let key_bytes = req.public_key.len();
    let mut registry = state.registry();

    let registrierung = registry.presence.registrieren(verbindung);
    if let Some(alt) = registrierung.vorherige {
        match state.config.reregistrierung {
            ReRegistrierung::Bereinigen => {
                registry.verzeichnis.entfernen(&alt);
                tracing::info!(
                    verbindung = %verbindung,
                    alte_user_id = %alt,
                    "Erneute Registrierung, alte Identitaet entfernt"
                );
            }
            ReRegistrierung::Beibehalten => {
                tracing::warn!(
                    verbindung = %verbindung,
                    alte_user_id = %alt,
                    "Erneute Registrierung, alte Identitaet bleibt im Verzeichnis"
                );
            }
        }
    }

    let user_id = registrierung.user_id;
    registry
        .verzeichnis
        .einfuegen(user_id, req.public_key.clone());

    state.broadcaster.an_verbindung_senden(
        &verbindung,
        ServerEvent::registered(user_id, req.public_key),
    );
    state.benutzerliste_senden(&registry);
    drop(registry);

    state.metriken.registrations_total.inc();
    tracing::info!(
        verbindung = %verbindung,
        user_id = %user_id,
        key_bytes,
        "Benutzer registriert"
    );

    user_id
}

/// Verarbeitet das Ende einer Verbindung
///
/// Meldet die Verbindung beim Broadcaster ab, entfernt eine vorhandene
/// Identitaet aus Presence und Verzeichnis und sendet die neue Benutzerliste
/// an alle verbleibenden Verbindungen. Ohne Identitaet passiert ausser der
/// Abmeldung nichts. Mehrfacher Aufruf ist wirkungslos.
pub fn handle_trennen(verbindung: ConnectionId, state: &Arc<RelayState>) {
    let mut registry = state.registry();

    // Zuerst abmelden, damit das Broadcast die eigene Queue nicht mehr trifft
    state.verbindung_schliessen(&verbindung);

    let Some(user_id) = registry.presence.entfernen(&verbindung) else {
        return;
    };
    registry.verzeichnis.entfernen(&user_id);
    state.benutzerliste_senden(&registry);
    drop(registry);

    tracing::info!(verbindung = %verbindung, user_id = %user_id, "Benutzer getrennt");
}
