//! Relay-Ereignisse (Client <-> Relay)
//!
//! Definiert alle Ereignisse die ueber eine Client-Verbindung laufen.
//!
//! ## Design
//! - Umschlag `{"event": ..., "data": ...}`, beim Senden via adjacently tagged Enums
//! - Eingehend wird zweistufig gelesen: erst der Umschlag mit rohem `data`,
//!   dann die Nutzdaten passend zum Event-Namen. Die Reihenfolge der
//!   Schluessel im Umschlag spielt so keine Rolle.
//! - Event-Namen in kebab-case, Feldnamen in camelCase (Kompatibilitaet mit
//!   bestehenden Browser-Clients)
//! - Der verschluesselte Payload ([`Chiffrat`]) bleibt roher JSON-Text und
//!   wird Byte fuer Byte weitergereicht

use cipherpost_core::types::{PublicKey, UserId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

/// Fehlermeldung bei unbekanntem Ziel einer Schluessel-Abfrage
///
/// Der Wortlaut ist Teil des Protokolls, Clients vergleichen darauf.
pub const FEHLER_BENUTZER_NICHT_GEFUNDEN: &str = "User not found";

/// Praefix fuer Fehlermeldungen bei fehlerhaften Ereignissen
pub const FEHLER_UNGUELTIGES_EREIGNIS: &str = "Malformed event";

// ---------------------------------------------------------------------------
// Protokollfehler
// ---------------------------------------------------------------------------

/// Fehler beim Parsen eingehender Ereignisse
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    /// Kein gueltiges JSON oder falsche Struktur (fehlende Felder, falsche Typen)
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Event-Name ist nicht Teil des Protokolls
    #[error("unbekanntes Ereignis '{0}'")]
    UnbekanntesEreignis(String),

    /// Frame ist kein UTF-8
    #[error("Frame ist kein gueltiges UTF-8")]
    KeinUtf8,

    /// Frame-Typ wird nicht unterstuetzt (z.B. binaere WebSocket-Frames)
    #[error("nicht unterstuetzter Frame-Typ: {0}")]
    FrameTyp(&'static str),
}

impl ProtokollFehler {
    /// Meldung fuer das `error`-Ereignis an den Client
    pub fn client_meldung(&self) -> String {
        format!("{FEHLER_UNGUELTIGES_EREIGNIS}: {self}")
    }
}

// ---------------------------------------------------------------------------
// Umschlag
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Umschlag<'a> {
    event: String,
    #[serde(borrow)]
    data: &'a RawValue,
}

impl<'a> Umschlag<'a> {
    fn lesen(json: &'a str) -> Result<Self, ProtokollFehler> {
        Ok(serde_json::from_str(json)?)
    }

    fn daten<T: DeserializeOwned>(&self) -> Result<T, ProtokollFehler> {
        Ok(serde_json::from_str(self.data.get())?)
    }
}

// ---------------------------------------------------------------------------
// Chiffrat
// ---------------------------------------------------------------------------

/// Verschluesselter Payload einer privaten Nachricht
///
/// Haelt den exakten JSON-Text aus dem eingehenden Ereignis. Beim
/// Serialisieren wird genau dieser Text wieder ausgegeben, Zahlen und
/// Schluesselreihenfolge bleiben also unangetastet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chiffrat(Box<RawValue>);

impl Chiffrat {
    /// Uebernimmt JSON-Text unveraendert (muss gueltiges JSON sein)
    pub fn aus_text(json: impl Into<String>) -> serde_json::Result<Self> {
        RawValue::from_string(json.into()).map(Self)
    }

    /// Serialisiert einen Wert als Payload
    pub fn aus_wert<T: Serialize + ?Sized>(wert: &T) -> serde_json::Result<Self> {
        serde_json::value::to_raw_value(wert).map(Self)
    }

    /// Der rohe JSON-Text
    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl PartialEq for Chiffrat {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Chiffrat {}

// ---------------------------------------------------------------------------
// Eingehende Ereignisse (Client -> Relay)
// ---------------------------------------------------------------------------

/// Registrierung mit dem eigenen Public Key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub public_key: PublicKey,
}

/// Abfrage des Public Keys eines anderen Benutzers
///
/// Die Ziel-ID bleibt ein String: eine nicht parsbare ID ist ein
/// Lookup-Fehlschlag, kein fehlerhaftes Ereignis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPublicKeyRequest {
    pub target_user_id: String,
}

/// Verschluesselte Nachricht an einen anderen Benutzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessageRequest {
    pub to: String,
    pub encrypted: Chiffrat,
}

/// Alle Ereignisse die ein Client senden darf
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Register(RegisterRequest),
    GetPublicKey(GetPublicKeyRequest),
    PrivateMessage(PrivateMessageRequest),
}

impl ClientEvent {
    /// Erstellt ein `register`-Ereignis
    pub fn register(public_key: impl Into<String>) -> Self {
        Self::Register(RegisterRequest {
            public_key: PublicKey::new(public_key),
        })
    }

    /// Erstellt ein `get-public-key`-Ereignis
    pub fn get_public_key(target_user_id: impl Into<String>) -> Self {
        Self::GetPublicKey(GetPublicKeyRequest {
            target_user_id: target_user_id.into(),
        })
    }

    /// Erstellt ein `private-message`-Ereignis
    pub fn private_message(to: impl Into<String>, encrypted: Chiffrat) -> Self {
        Self::PrivateMessage(PrivateMessageRequest {
            to: to.into(),
            encrypted,
        })
    }

    /// Name des Ereignisses fuer Logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::GetPublicKey(_) => "get-public-key",
            Self::PrivateMessage(_) => "private-message",
        }
    }

    /// Deserialisiert ein Ereignis aus JSON-Text
    pub fn from_json(json: &str) -> Result<Self, ProtokollFehler> {
        let umschlag = Umschlag::lesen(json)?;
        match umschlag.event.as_str() {
            "register" => Ok(Self::Register(umschlag.daten()?)),
            "get-public-key" => Ok(Self::GetPublicKey(umschlag.daten()?)),
            "private-message" => Ok(Self::PrivateMessage(umschlag.daten()?)),
            _ => Err(ProtokollFehler::UnbekanntesEreignis(umschlag.event)),
        }
    }

    /// Deserialisiert ein Ereignis aus rohen Frame-Bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtokollFehler> {
        let text = std::str::from_utf8(bytes).map_err(|_| ProtokollFehler::KeinUtf8)?;
        Self::from_json(text)
    }

    /// Serialisiert das Ereignis als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Ausgehende Ereignisse (Relay -> Client)
// ---------------------------------------------------------------------------

/// Bestaetigung einer Registrierung bzw. Antwort auf eine Schluessel-Abfrage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityKey {
    pub user_id: UserId,
    pub public_key: PublicKey,
}

/// Fehlermeldung an den anfragenden Client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Zugestellte verschluesselte Nachricht
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateMessageDelivery {
    pub from: UserId,
    pub encrypted: Chiffrat,
}

/// Alle Ereignisse die der Relay sendet
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Registered(IdentityKey),
    /// Verzeichnis-Snapshot als Liste von `[userId, publicKey]`-Paaren
    Users(Vec<(UserId, PublicKey)>),
    PublicKeyResponse(IdentityKey),
    Error(ErrorPayload),
    PrivateMessage(PrivateMessageDelivery),
}

impl ServerEvent {
    pub fn registered(user_id: UserId, public_key: PublicKey) -> Self {
        Self::Registered(IdentityKey {
            user_id,
            public_key,
        })
    }

    pub fn public_key_response(user_id: UserId, public_key: PublicKey) -> Self {
        Self::PublicKeyResponse(IdentityKey {
            user_id,
            public_key,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Fehler fuer eine fehlgeschlagene Schluessel-Abfrage
    pub fn benutzer_nicht_gefunden() -> Self {
        Self::error(FEHLER_BENUTZER_NICHT_GEFUNDEN)
    }

    pub fn private_message(from: UserId, encrypted: Chiffrat) -> Self {
        Self::PrivateMessage(PrivateMessageDelivery { from, encrypted })
    }

    /// Name des Ereignisses fuer Logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Registered(_) => "registered",
            Self::Users(_) => "users",
            Self::PublicKeyResponse(_) => "public-key-response",
            Self::Error(_) => "error",
            Self::PrivateMessage(_) => "private-message",
        }
    }

    /// Serialisiert das Ereignis als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert ein Ereignis aus JSON (Client-Seite, Tests)
    pub fn from_json(json: &str) -> Result<Self, ProtokollFehler> {
        let umschlag = Umschlag::lesen(json)?;
        match umschlag.event.as_str() {
            "registered" => Ok(Self::Registered(umschlag.daten()?)),
            "users" => Ok(Self::Users(umschlag.daten()?)),
            "public-key-response" => Ok(Self::PublicKeyResponse(umschlag.daten()?)),
            "error" => Ok(Self::Error(umschlag.daten()?)),
            "private-message" => Ok(Self::PrivateMessage(umschlag.daten()?)),
            _ => Err(ProtokollFehler::UnbekanntesEreignis(umschlag.event)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_aus_browser_json() {
        let ev = ClientEvent::from_json(r#"{"event":"register","data":{"publicKey":"abc"}}"#)
            .unwrap();
        assert_eq!(ev, ClientEvent::register("abc"));
        assert_eq!(ev.name(), "register");
    }

    #[test]
    fn data_vor_event_wird_akzeptiert() {
        let ev = ClientEvent::from_json(
            r#"{"data":{"to":"x","encrypted":{"b":1,"a":2}},"event":"private-message"}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            ClientEvent::private_message("x", Chiffrat::aus_text(r#"{"b":1,"a":2}"#).unwrap())
        );
    }

    #[test]
    fn get_public_key_feldname() {
        let ev = ClientEvent::from_json(
            r#"{"event":"get-public-key","data":{"targetUserId":"u-1"}}"#,
        )
        .unwrap();
        if let ClientEvent::GetPublicKey(req) = ev {
            assert_eq!(req.target_user_id, "u-1");
        } else {
            panic!("Erwartet GetPublicKey");
        }
    }

    #[test]
    fn private_message_payload_bleibt_opak() {
        let roh = r#"{"event":"private-message","data":{"to":"x","encrypted":{"iv":[1,2,3],"ct":"Zm9v"}}}"#;
        let ev = ClientEvent::from_json(roh).unwrap();
        if let ClientEvent::PrivateMessage(req) = ev {
            assert_eq!(req.encrypted.as_str(), r#"{"iv":[1,2,3],"ct":"Zm9v"}"#);
        } else {
            panic!("Erwartet PrivateMessage");
        }
    }

    #[test]
    fn payload_text_wird_unveraendert_weitergegeben() {
        let payload = r#"{"nonce":123456789012345678901234567890,"ct":"x","iv":1.10}"#;
        let roh = format!(r#"{{"event":"private-message","data":{{"to":"x","encrypted":{payload}}}}}"#);
        let ClientEvent::PrivateMessage(req) = ClientEvent::from_json(&roh).unwrap() else {
            panic!("Erwartet PrivateMessage");
        };

        let raus = ServerEvent::private_message(UserId::new(), req.encrypted)
            .to_json()
            .unwrap();
        assert!(raus.contains(&format!(r#""encrypted":{payload}"#)), "{raus}");
    }

    #[test]
    fn payload_mit_leerraum_bleibt_erhalten() {
        let roh = r#"{"event":"private-message","data":{"to":"x","encrypted":[ 1 ,  "a" ]}}"#;
        let ClientEvent::PrivateMessage(req) = ClientEvent::from_json(roh).unwrap() else {
            panic!("Erwartet PrivateMessage");
        };
        assert_eq!(req.encrypted.as_str(), r#"[ 1 ,  "a" ]"#);
    }

    #[test]
    fn unbekanntes_event_ist_fehler() {
        let err = ClientEvent::from_json(r#"{"event":"shout","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtokollFehler::UnbekanntesEreignis(ref n) if n == "shout"));
        assert!(err.client_meldung().starts_with(FEHLER_UNGUELTIGES_EREIGNIS));
    }

    #[test]
    fn fehlende_felder_sind_fehler() {
        assert!(ClientEvent::from_json(r#"{"event":"register","data":{}}"#).is_err());
        assert!(ClientEvent::from_json(r#"{"event":"register"}"#).is_err());
        assert!(ClientEvent::from_json(r#"{"data":{"publicKey":"k"}}"#).is_err());
        assert!(ClientEvent::from_json(r#"{"event":"private-message","data":{"to":"x"}}"#).is_err());
        assert!(ClientEvent::from_json(r#"{"event":"register","data":{"publicKey":42}}"#).is_err());
        assert!(ClientEvent::from_json(r#"{"event":42,"data":{}}"#).is_err());
        assert!(ClientEvent::from_json("kein json").is_err());
    }

    #[test]
    fn ungueltiges_utf8() {
        let err = ClientEvent::from_slice(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ProtokollFehler::KeinUtf8));
    }

    #[test]
    fn chiffrat_aus_text_prueft_json() {
        assert!(Chiffrat::aus_text("{nicht json").is_err());
        assert_eq!(Chiffrat::aus_wert(&json!("E1")).unwrap().as_str(), r#""E1""#);
    }

    #[test]
    fn users_ist_liste_von_paaren() {
        let uid = UserId(uuid::Uuid::nil());
        let ev = ServerEvent::Users(vec![(uid, PublicKey::from("abc"))]);
        let wert: serde_json::Value = serde_json::from_str(&ev.to_json().unwrap()).unwrap();
        assert_eq!(
            wert,
            json!({
                "event": "users",
                "data": [["00000000-0000-0000-0000-000000000000", "abc"]]
            })
        );
        assert_eq!(ServerEvent::from_json(&ev.to_json().unwrap()).unwrap(), ev);
    }

    #[test]
    fn registered_feldnamen() {
        let uid = UserId::new();
        let ev = ServerEvent::registered(uid, PublicKey::from("pk"));
        let wert: serde_json::Value = serde_json::from_str(&ev.to_json().unwrap()).unwrap();
        assert_eq!(wert["event"], "registered");
        assert_eq!(wert["data"]["userId"], uid.to_string());
        assert_eq!(wert["data"]["publicKey"], "pk");
    }

    #[test]
    fn lookup_fehler_wortlaut() {
        let wert: serde_json::Value =
            serde_json::from_str(&ServerEvent::benutzer_nicht_gefunden().to_json().unwrap())
                .unwrap();
        assert_eq!(wert, json!({"event": "error", "data": {"message": "User not found"}}));
    }

    #[test]
    fn zustellung_client_seitig_lesen() {
        let uid = UserId::new();
        let ev = ServerEvent::private_message(uid, Chiffrat::aus_text(r#"{"n":1.10}"#).unwrap());
        let zurueck = ServerEvent::from_json(&ev.to_json().unwrap()).unwrap();
        assert_eq!(zurueck, ev);
    }

    #[test]
    fn server_event_namen() {
        let uid = UserId::new();
        assert_eq!(ServerEvent::Users(vec![]).name(), "users");
        assert_eq!(
            ServerEvent::public_key_response(uid, PublicKey::from("k")).name(),
            "public-key-response"
        );
        assert_eq!(
            ServerEvent::private_message(uid, Chiffrat::aus_wert(&json!("E1")).unwrap()).name(),
            "private-message"
        );
    }
}
