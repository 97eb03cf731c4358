//! Presence-Registry – Wer ist online, unter welcher Identitaet?
//!
//! Haelt die Bijektion zwischen aktiven Verbindungen und den Identitaeten die
//! der Relay ihnen vergeben hat. Beide Richtungen werden als eigene Map
//! gefuehrt, damit `private-message` das Ziel ohne lineare Suche findet.
//!
//! Wie das `Verzeichnis` ist die Registry nicht selbst synchronisiert; der
//! Registry-Lock in `RelayState` schuetzt beide gemeinsam.

use cipherpost_core::types::{ConnectionId, UserId};
use std::collections::HashMap;

/// Ergebnis einer Registrierung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registrierung {
    /// Frisch vergebene Identitaet
    pub user_id: UserId,
    /// Identitaet die diese Verbindung vorher trug (erneutes `register`)
    pub vorherige: Option<UserId>,
}

/// Zuordnung Verbindung <-> Identitaet
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    nach_verbindung: HashMap<ConnectionId, UserId>,
    nach_benutzer: HashMap<UserId, ConnectionId>,
}

impl PresenceRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Vergibt der Verbindung eine neue Identitaet
    ///
    /// Eine bereits vorhandene Identitaet der Verbindung wird ersetzt und in
    /// `Registrierung::vorherige` zurueckgegeben. Was mit deren
    /// Verzeichnis-Eintrag passiert, entscheidet der Aufrufer.
    pub fn registrieren(&mut self, verbindung: ConnectionId) -> Registrierung {
        let mut user_id = UserId::new();
        while self.nach_benutzer.contains_key(&user_id) {
            user_id = UserId::new();
        }

        let vorherige = self.nach_verbindung.insert(verbindung, user_id);
        if let Some(alt) = vorherige {
            self.nach_benutzer.remove(&alt);
        }
        self.nach_benutzer.insert(user_id, verbindung);

        tracing::debug!(
            verbindung = %verbindung,
            user_id = %user_id,
            "Identitaet vergeben"
        );

        Registrierung { user_id, vorherige }
    }

    /// Identitaet einer Verbindung
    pub fn identitaet(&self, verbindung: &ConnectionId) -> Option<UserId> {
        self.nach_verbindung.get(verbindung).copied()
    }

    /// Verbindung einer Identitaet (Routing fuer `private-message`)
    pub fn verbindung(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.nach_benutzer.get(user_id).copied()
    }

    /// Entfernt die Verbindung und gibt ihre Identitaet zurueck
    pub fn entfernen(&mut self, verbindung: &ConnectionId) -> Option<UserId> {
        let user_id = self.nach_verbindung.remove(verbindung)?;
        self.nach_benutzer.remove(&user_id);
        Some(user_id)
    }

    /// Alle aktuell vergebenen Identitaeten
    pub fn identitaeten(&self) -> impl Iterator<Item = &UserId> {
        self.nach_benutzer.keys()
    }

    pub fn anzahl(&self) -> usize {
        self.nach_verbindung.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.nach_verbindung.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrieren_vergibt_identitaet() {
        let mut p = PresenceRegistry::neu();
        let conn = ConnectionId::new();

        let reg = p.registrieren(conn);
        assert!(reg.vorherige.is_none());
        assert_eq!(p.identitaet(&conn), Some(reg.user_id));
        assert_eq!(p.verbindung(&reg.user_id), Some(conn));
        assert_eq!(p.anzahl(), 1);
    }

    #[test]
    fn identitaeten_sind_eindeutig() {
        let mut p = PresenceRegistry::neu();
        let a = p.registrieren(ConnectionId::new()).user_id;
        let b = p.registrieren(ConnectionId::new()).user_id;
        assert_ne!(a, b);
    }

    #[test]
    fn erneutes_registrieren_ersetzt_identitaet() {
        let mut p = PresenceRegistry::neu();
        let conn = ConnectionId::new();

        let erste = p.registrieren(conn);
        let zweite = p.registrieren(conn);

        assert_ne!(erste.user_id, zweite.user_id);
        assert_eq!(zweite.vorherige, Some(erste.user_id));
        assert_eq!(p.identitaet(&conn), Some(zweite.user_id));
        assert!(p.verbindung(&erste.user_id).is_none());
        assert_eq!(p.anzahl(), 1);
    }

    #[test]
    fn entfernen_raeumt_beide_richtungen() {
        let mut p = PresenceRegistry::neu();
        let conn = ConnectionId::new();
        let uid = p.registrieren(conn).user_id;

        assert_eq!(p.entfernen(&conn), Some(uid));
        assert!(p.identitaet(&conn).is_none());
        assert!(p.verbindung(&uid).is_none());
        assert!(p.ist_leer());
    }

    #[test]
    fn entfernen_unregistrierter_verbindung() {
        let mut p = PresenceRegistry::neu();
        assert!(p.entfernen(&ConnectionId::new()).is_none());
    }
}
