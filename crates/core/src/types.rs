//! Gemeinsame Identifikationstypen fuer Cipherpost
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Verbindungs-Handles und Benutzer-Identitaeten zur Compilezeit
//! auszuschliessen. Verbindungs-IDs verlassen den Server nie.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Handle einer einzelnen Transport-Verbindung
///
/// Wird beim Annehmen der Verbindung vergeben und ist nach dem Trennen
/// bedeutungslos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Vom Relay vergebene Benutzer-Identitaet
///
/// Wird bei jeder Registrierung frisch erzeugt und nie wiederverwendet.
/// Auf dem Draht als nackter UUID-String.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Erstellt eine neue zufaellige UserId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parst eine vom Client gelieferte ID
    ///
    /// Akzeptiert nur exakt die Form, in der der Relay IDs ausgibt
    /// (kleingeschrieben, mit Bindestrichen). Andere UUID-Schreibweisen wie
    /// `urn:uuid:`, Grossbuchstaben oder Klammern sind eine andere
    /// Zeichenkette und damit eine unbekannte Identitaet. Aufrufer behandeln
    /// `None` entsprechend.
    pub fn parsen(roh: &str) -> Option<Self> {
        let uuid = Uuid::parse_str(roh).ok()?;
        (uuid.hyphenated().to_string() == roh).then_some(Self(uuid))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaker Public Key eines Clients
///
/// Der Relay validiert oder interpretiert den Inhalt nicht.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(pub String);

impl PublicKey {
    pub fn new(inhalt: impl Into<String>) -> Self {
        Self(inhalt.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Laenge in Bytes (nur fuer Logging)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PublicKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
