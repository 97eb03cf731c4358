//! Gemeinsamer Relay-Zustand
//!
//! Haelt Registry, Broadcaster und Metriken als geteilte Referenzen, die
//! zwischen den Verbindungs-Tasks geteilt werden.
//!
//! ## Registry-Lock
//! Presence und Verzeichnis liegen gemeinsam hinter einem einzigen
//! `parking_lot::Mutex`. Jede Aenderung haelt den Lock ueber Mutation,
//! Snapshot und Einreihen des `users`-Broadcasts hinweg. Dadurch sieht jede
//! Verbindung die Snapshots in derselben Reihenfolge wie die Aenderungen, und
//! ein Snapshot enthaelt nie einen halb eingetragenen Benutzer. Der Lock wird
//! nie ueber ein `.await` gehalten.

use cipherpost_core::types::ConnectionId;
use cipherpost_observability::RelayMetrics;
use cipherpost_protocol::{wire::DEFAULT_MAX_FRAME_SIZE, ServerEvent};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::broadcast::EventBroadcaster;
use crate::directory::Verzeichnis;
use crate::presence::PresenceRegistry;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Verhalten bei einem zweiten `register` auf derselben Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReRegistrierung {
    /// Der Verzeichnis-Eintrag der alten Identitaet wird entfernt
    #[default]
    Bereinigen,
    /// Der alte Eintrag bleibt stehen, bis der Prozess endet
    Beibehalten,
}

/// Konfiguration des Relays
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub reregistrierung: ReRegistrierung,
    /// Maximale Groesse eines eingehenden Ereignisses in Bytes
    pub max_frame_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reregistrierung: ReRegistrierung::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Presence und Verzeichnis, gemeinsam gesperrt
#[derive(Debug, Default)]
pub struct Registry {
    pub presence: PresenceRegistry,
    pub verzeichnis: Verzeichnis,
}

impl Registry {
    /// Presence-Identitaeten und Verzeichnis-Eintraege sind dieselbe Menge
    ///
    /// Mit `ReRegistrierung::Beibehalten` gilt das nach einer erneuten
    /// Registrierung nicht mehr.
    pub fn konsistent(&self) -> bool {
        self.presence.anzahl() == self.verzeichnis.len()
            && self
                .presence
                .identitaeten()
                .all(|uid| self.verzeichnis.enthaelt(uid))
    }
}

// ---------------------------------------------------------------------------
// RelayState
// ---------------------------------------------------------------------------

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    pub config: Arc<RelayConfig>,
    registry: Mutex<Registry>,
    pub broadcaster: EventBroadcaster,
    pub metriken: RelayMetrics,
}

impl RelayState {
    pub fn neu(config: RelayConfig, metriken: RelayMetrics) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            registry: Mutex::new(Registry::default()),
            broadcaster: EventBroadcaster::neu(),
            metriken,
        })
    }

    /// Sperrt Presence und Verzeichnis
    pub fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock()
    }

    /// Meldet eine neue Verbindung an und gibt ihre Send-Queue zurueck
    pub fn verbindung_oeffnen(
        &self,
        verbindung: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerEvent> {
        let rx = self.broadcaster.verbindung_registrieren(verbindung);
        self.metriken.connections.inc();
        rx
    }

    /// Meldet eine Verbindung ab
    ///
    /// Gibt `false` zurueck wenn sie bereits abgemeldet war.
    pub fn verbindung_schliessen(&self, verbindung: &ConnectionId) -> bool {
        let entfernt = self.broadcaster.verbindung_entfernen(verbindung);
        if entfernt {
            self.metriken.connections.dec();
        }
        entfernt
    }

    /// Sendet den aktuellen Verzeichnis-Snapshot an alle offenen Verbindungen
    ///
    /// Nimmt die gesperrte Registry entgegen, damit der Snapshot nur unter dem
    /// Lock gebildet werden kann.
    pub fn benutzerliste_senden(&self, registry: &Registry) -> usize {
        let snapshot = ServerEvent::Users(registry.verzeichnis.snapshot());
        let empfaenger = self.broadcaster.an_alle_senden(&snapshot);

        self.metriken
            .registered_users
            .set(registry.verzeichnis.len() as i64);
        self.metriken.broadcasts_total.inc();

        tracing::debug!(
            eintraege = registry.verzeichnis.len(),
            empfaenger,
            "Benutzerliste gesendet"
        );
        empfaenger
    }
}
