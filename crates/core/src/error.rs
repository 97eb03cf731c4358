//! Fehlertypen fuer Cipherpost
//!
//! Crate-uebergreifende Fehler. Transport- und Protokollfehler leben in den
//! jeweiligen Crates (`RelayError`, `ProtokollFehler`).

use thiserror::Error;

/// Globaler Result-Alias fuer Cipherpost
pub type Result<T> = std::result::Result<T, CipherpostError>;

/// Alle crate-uebergreifenden Fehler im Cipherpost-System
#[derive(Debug, Error)]
pub enum CipherpostError {
    /// Ungueltige oder widerspruechliche Konfiguration (fuehrt zum Abbruch beim Start)
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}
