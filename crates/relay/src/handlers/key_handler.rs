//! Schluessel-Handler – `get-public-key`

use cipherpost_core::types::{ConnectionId, UserId};
use cipherpost_protocol::events::GetPublicKeyRequest;
use cipherpost_protocol::ServerEvent;
use std::sync::Arc;

use crate::server_state::RelayState;

/// Verarbeitet `get-public-key`
///
/// Antwortet mit `public-key-response` oder mit `error {"User not found"}`.
/// Eine Ziel-ID, die nicht exakt einer vergebenen Identitaet entspricht,
/// gilt als unbekannt.
pub fn handle_get_public_key(
    req: GetPublicKeyRequest,
    verbindung: ConnectionId,
    state: &Arc<RelayState>,
) {
    let treffer = UserId::parsen(&req.target_user_id).and_then(|ziel| {
        state
            .registry()
            .verzeichnis
            .get(&ziel)
            .cloned()
            .map(|key| (ziel, key))
    });

    let antwort = match treffer {
        Some((ziel, key)) => ServerEvent::public_key_response(ziel, key),
        None => {
            tracing::debug!(
                verbindung = %verbindung,
                ziel = %req.target_user_id,
                "Schluessel-Abfrage fuer unbekannten Benutzer"
            );
            ServerEvent::benutzer_nicht_gefunden()
        }
    };

    state.broadcaster.an_verbindung_senden(&verbindung, antwort);
}
