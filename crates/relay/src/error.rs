//! Fehlertypen fuer den Relay

use thiserror::Error;

/// Fehlertyp fuer den Relay
///
/// Alle Varianten betreffen genau eine Verbindung oder den Start eines
/// Listeners; keiner dieser Fehler beendet den Prozess.
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler beim Binden oder Annehmen (TCP-Listener)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Senden an den Transport fehlgeschlagen
    #[error("Transportfehler: {0}")]
    Transport(String),
}

impl RelayError {
    /// Erstellt einen Transportfehler
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }
}

/// Result-Typ fuer den Relay
pub type RelayResult<T> = Result<T, RelayError>;
