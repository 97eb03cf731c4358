//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Die Umgebungsvariable `PORT` ueberschreibt den
//! HTTP-Port aus der Datei.

use cipherpost_core::CipherpostError;
use cipherpost_observability::logging::{log_format_gueltig, log_level_gueltig};
use cipherpost_relay::{RelayConfig, ReRegistrierung};
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Verhalten
    pub relay: RelayEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer alle Listener
    pub bind_adresse: String,
    /// HTTP-Port (WebSocket unter `/ws` und statische Dateien)
    pub port: u16,
    /// Port fuer rohe TCP-Frame-Verbindungen (leer = deaktiviert)
    pub tcp_port: Option<u16>,
    /// Verzeichnis mit dem Browser-Client
    pub statisches_verzeichnis: String,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
            tcp_port: None,
            statisches_verzeichnis: "public".into(),
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Verhalten bei erneutem `register`: "bereinigen" oder "beibehalten"
    pub reregistrierung: ReRegistrierung,
    /// Maximale Groesse eines eingehenden Ereignisses in Bytes
    pub max_frame_bytes: usize,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            reregistrierung: relay.reregistrierung,
            max_frame_bytes: relay.max_frame_bytes,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

/// Herkunft der geladenen Konfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KonfigQuelle {
    Datei,
    /// Datei fehlt, es gelten die Standardwerte
    Standardwerte,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    ///
    /// Existiert die Datei nicht, gilt die Standardkonfiguration. Das Logging
    /// laeuft zu diesem Zeitpunkt noch nicht, deshalb meldet der Aufrufer die
    /// fehlende Datei anhand der zurueckgegebenen [`KonfigQuelle`].
    pub fn laden(pfad: &str) -> anyhow::Result<(Self, KonfigQuelle)> {
        let (mut config, quelle) = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => (
                toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
                KonfigQuelle::Datei,
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Self::default(), KonfigQuelle::Standardwerte)
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };

        config.port_ueberschreiben(std::env::var("PORT").ok().as_deref())?;
        config.validieren()?;
        Ok((config, quelle))
    }

    /// Uebernimmt den Wert der Umgebungsvariable `PORT`, falls gesetzt
    pub fn port_ueberschreiben(&mut self, wert: Option<&str>) -> cipherpost_core::Result<()> {
        let Some(wert) = wert.map(str::trim).filter(|w| !w.is_empty()) else {
            return Ok(());
        };
        self.netzwerk.port = wert.parse().map_err(|_| {
            CipherpostError::Konfiguration(format!("PORT ist keine gueltige Portnummer: '{wert}'"))
        })?;
        Ok(())
    }

    /// Prueft die Konfiguration auf Widersprueche
    pub fn validieren(&self) -> cipherpost_core::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            return Err(CipherpostError::Konfiguration(format!(
                "Unbekanntes Log-Level: '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(CipherpostError::Konfiguration(format!(
                "Unbekanntes Log-Format: '{}'",
                self.logging.format
            )));
        }
        if self.relay.max_frame_bytes == 0 {
            return Err(CipherpostError::Konfiguration(
                "relay.max_frame_bytes muss groesser als 0 sein".into(),
            ));
        }

        let port = self.netzwerk.port;
        if port != 0 && self.netzwerk.tcp_port == Some(port) {
            return Err(CipherpostError::Konfiguration(format!(
                "tcp_port und port sind beide {port}"
            )));
        }
        if port != 0 && self.observability.aktiviert && self.observability.port == port {
            return Err(CipherpostError::Konfiguration(format!(
                "observability.port und port sind beide {port}"
            )));
        }
        Ok(())
    }

    /// Relay-Konfiguration fuer den `RelayState`
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            reregistrierung: self.relay.reregistrierung,
            max_frame_bytes: self.relay.max_frame_bytes,
        }
    }

    /// Gibt die Bind-Adresse fuer HTTP/WebSocket zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Gibt die Bind-Adresse fuer TCP-Frames zurueck, falls aktiviert
    pub fn tcp_bind_adresse(&self) -> Option<String> {
        self.netzwerk
            .tcp_port
            .map(|port| format!("{}:{}", self.netzwerk.bind_adresse, port))
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.port, 3000);
        assert!(cfg.netzwerk.tcp_port.is_none());
        assert_eq!(cfg.netzwerk.statisches_verzeichnis, "public");
        assert_eq!(cfg.relay.reregistrierung, ReRegistrierung::Bereinigen);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn bind_adressen() {
        let mut cfg = ServerConfig::default();
        assert_eq!(cfg.http_bind_adresse(), "0.0.0.0:3000");
        assert_eq!(cfg.tcp_bind_adresse(), None);
        assert_eq!(cfg.observability_bind_adresse(), "0.0.0.0:9300");

        cfg.netzwerk.tcp_port = Some(4000);
        assert_eq!(cfg.tcp_bind_adresse().as_deref(), Some("0.0.0.0:4000"));
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            port = 8080
            tcp_port = 8081

            [relay]
            reregistrierung = "beibehalten"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.port, 8080);
        assert_eq!(cfg.netzwerk.tcp_port, Some(8081));
        assert_eq!(cfg.relay.reregistrierung, ReRegistrierung::Beibehalten);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.relay.max_frame_bytes, RelayConfig::default().max_frame_bytes);
        assert!(cfg.observability.aktiviert);
    }

    #[test]
    fn unbekannter_reregistrierungs_modus_ist_fehler() {
        let toml = r#"
            [relay]
            reregistrierung = "vergessen"
        "#;
        assert!(toml::from_str::<ServerConfig>(toml).is_err());
    }

    #[test]
    fn port_aus_umgebung() {
        let mut cfg = ServerConfig::default();
        cfg.port_ueberschreiben(Some("5000")).unwrap();
        assert_eq!(cfg.netzwerk.port, 5000);

        cfg.port_ueberschreiben(None).unwrap();
        cfg.port_ueberschreiben(Some("  ")).unwrap();
        assert_eq!(cfg.netzwerk.port, 5000);

        assert!(matches!(
            cfg.port_ueberschreiben(Some("abc")),
            Err(CipherpostError::Konfiguration(_))
        ));
    }

    #[test]
    fn validierung_erkennt_fehler() {
        let mut cfg = ServerConfig::default();
        cfg.logging.level = "laut".into();
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.relay.max_frame_bytes = 0;
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.netzwerk.tcp_port = Some(3000);
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.observability.port = 3000;
        assert!(cfg.validieren().is_err());
        cfg.observability.aktiviert = false;
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let (cfg, quelle) = ServerConfig::laden("/nicht/vorhanden/cipherpost.toml").unwrap();
        assert_eq!(cfg.logging.format, "text");
        assert_eq!(quelle, KonfigQuelle::Standardwerte);
    }

    #[test]
    fn vorhandene_datei_wird_als_quelle_gemeldet() {
        let pfad = std::env::temp_dir().join(format!(
            "cipherpost-config-{}.toml",
            std::process::id()
        ));
        std::fs::write(&pfad, "[logging]\nlevel = \"debug\"\n").unwrap();

        let ergebnis = ServerConfig::laden(pfad.to_str().unwrap());
        std::fs::remove_file(&pfad).unwrap();

        let (cfg, quelle) = ergebnis.unwrap();
        assert_eq!(quelle, KonfigQuelle::Datei);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn relay_config_uebernimmt_werte() {
        let mut cfg = ServerConfig::default();
        cfg.relay.reregistrierung = ReRegistrierung::Beibehalten;
        cfg.relay.max_frame_bytes = 4096;
        let relay = cfg.relay_config();
        assert_eq!(relay.reregistrierung, ReRegistrierung::Beibehalten);
        assert_eq!(relay.max_frame_bytes, 4096);
    }
}
