//! Verzeichnis – Zuordnung Identitaet -> Public Key
//!
//! Das Verzeichnis ist die Quelle fuer das `users`-Broadcast und fuer
//! `get-public-key`-Abfragen. Die Reihenfolge des Snapshots ist die
//! Reihenfolge der ersten Einfuegung; ein erneutes Einfuegen derselben
//! Identitaet ueberschreibt nur den Schluessel.
//!
//! Das Verzeichnis selbst ist nicht synchronisiert. Es lebt zusammen mit der
//! `PresenceRegistry` hinter dem Registry-Lock in `RelayState`.

use cipherpost_core::types::{PublicKey, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Eintrag {
    public_key: PublicKey,
    /// Monotone Einfuegeposition fuer die Snapshot-Reihenfolge
    position: u64,
}

/// Public-Key-Verzeichnis aller registrierten Identitaeten
#[derive(Debug, Default)]
pub struct Verzeichnis {
    eintraege: HashMap<UserId, Eintrag>,
    naechste_position: u64,
}

impl Verzeichnis {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Fuegt einen Eintrag ein oder ueberschreibt den Schluessel
    ///
    /// Gibt den vorherigen Schluessel zurueck falls die Identitaet schon
    /// eingetragen war. Ihre Position im Snapshot bleibt dann erhalten.
    pub fn einfuegen(&mut self, user_id: UserId, public_key: PublicKey) -> Option<PublicKey> {
        if let Some(eintrag) = self.eintraege.get_mut(&user_id) {
            return Some(std::mem::replace(&mut eintrag.public_key, public_key));
        }

        let position = self.naechste_position;
        self.naechste_position += 1;
        self.eintraege.insert(
            user_id,
            Eintrag {
                public_key,
                position,
            },
        );
        None
    }

    /// Schluessel einer Identitaet
    pub fn get(&self, user_id: &UserId) -> Option<&PublicKey> {
        self.eintraege.get(user_id).map(|e| &e.public_key)
    }

    /// Entfernt einen Eintrag; fehlende Eintraege sind kein Fehler
    pub fn entfernen(&mut self, user_id: &UserId) -> Option<PublicKey> {
        self.eintraege.remove(user_id).map(|e| e.public_key)
    }

    pub fn enthaelt(&self, user_id: &UserId) -> bool {
        self.eintraege.contains_key(user_id)
    }

    /// Alle Eintraege in Einfuegereihenfolge
    pub fn snapshot(&self) -> Vec<(UserId, PublicKey)> {
        let mut liste: Vec<(&UserId, &Eintrag)> = self.eintraege.iter().collect();
        liste.sort_by_key(|(_, e)| e.position);
        liste
            .into_iter()
            .map(|(uid, e)| (*uid, e.public_key.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }
}
