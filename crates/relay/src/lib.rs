//! cipherpost-relay – Presence, Verzeichnis und Nachrichten-Routing
//!
//! Dieser Crate implementiert den Kern des Relays fuer Ende-zu-Ende
//! verschluesselte Nachrichten. Er ordnet ephemere Transport-Verbindungen
//! stabilen Benutzer-Identitaeten zu, fuehrt das Public-Key-Verzeichnis und
//! leitet verschluesselte Payloads anhand der Identitaet weiter. Klartext
//! sieht der Relay nie.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket (/ws)        TCP-Frames (optional)
//!     |                       |
//!     +-----------+-----------+
//!                 v
//! ClientConnection (pro Verbindung ein Task)
//!     |  State Machine: Unregistriert -> Registriert -> Geschlossen
//!     v
//! MessageDispatcher
//!     +-- registration_handler (register, Trennen)
//!     +-- key_handler          (get-public-key)
//!     +-- message_handler      (private-message)
//!
//! RelayState
//!     +-- Registry (Mutex): PresenceRegistry + Verzeichnis
//!     +-- EventBroadcaster: Send-Queue pro Verbindung
//! ```

pub mod broadcast;
pub mod connection;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod http;
pub mod presence;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::{ClientConnection, Eingang};
pub use directory::Verzeichnis;
pub use dispatcher::{MessageDispatcher, VerbindungsKontext, VerbindungsZustand};
pub use error::{RelayError, RelayResult};
pub use http::relay_router;
pub use presence::PresenceRegistry;
pub use server_state::{RelayConfig, RelayState, ReRegistrierung, Registry};
pub use tcp::TcpRelayServer;
