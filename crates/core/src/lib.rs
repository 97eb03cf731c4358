//! cipherpost-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Cipherpost-Crates gemeinsam genutzt werden: Verbindungs- und
//! Benutzer-IDs sowie den opaken Public Key.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{CipherpostError, Result};
pub use types::{ConnectionId, PublicKey, UserId};
