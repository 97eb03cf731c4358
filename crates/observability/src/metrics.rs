//! Prometheus-kompatible Metriken fuer den Relay
//!
//! Registrierte Metriken:
//! - `cipherpost_connections` – Gauge: Aktuell offene Verbindungen
//! - `cipherpost_registered_users` – Gauge: Eintraege im Verzeichnis
//! - `cipherpost_registrations_total` – Counter: Erfolgreiche Registrierungen
//! - `cipherpost_messages_relayed_total` – Counter: Zugestellte private Nachrichten
//! - `cipherpost_messages_dropped_total` – Counter: Verworfene private Nachrichten
//! - `cipherpost_broadcasts_total` – Counter: `users`-Broadcasts
//! - `cipherpost_malformed_events_total` – Counter: Abgelehnte fehlerhafte Ereignisse

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Relay-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Zaehler.
#[derive(Clone)]
pub struct RelayMetrics {
    pub registry: Arc<Registry>,

    pub connections: IntGauge,
    pub registered_users: IntGauge,
    pub registrations_total: IntCounter,
    pub messages_relayed_total: IntCounter,
    pub messages_dropped_total: IntCounter,
    pub broadcasts_total: IntCounter,
    pub malformed_events_total: IntCounter,
}

fn gauge(registry: &Registry, name: &str, hilfe: &str) -> Result<IntGauge> {
    let g = IntGauge::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn zaehler(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounter> {
    let c = IntCounter::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl RelayMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connections = gauge(
            &registry,
            "cipherpost_connections",
            "Anzahl aktuell offener Verbindungen",
        )?;
        let registered_users = gauge(
            &registry,
            "cipherpost_registered_users",
            "Anzahl registrierter Identitaeten im Verzeichnis",
        )?;
        let registrations_total = zaehler(
            &registry,
            "cipherpost_registrations_total",
            "Gesamtanzahl erfolgreicher Registrierungen",
        )?;
        let messages_relayed_total = zaehler(
            &registry,
            "cipherpost_messages_relayed_total",
            "Gesamtanzahl zugestellter privater Nachrichten",
        )?;
        let messages_dropped_total = zaehler(
            &registry,
            "cipherpost_messages_dropped_total",
            "Gesamtanzahl verworfener privater Nachrichten (unbekanntes Ziel oder Absender)",
        )?;
        let broadcasts_total = zaehler(
            &registry,
            "cipherpost_broadcasts_total",
            "Gesamtanzahl versendeter Benutzerlisten-Broadcasts",
        )?;
        let malformed_events_total = zaehler(
            &registry,
            "cipherpost_malformed_events_total",
            "Gesamtanzahl abgelehnter fehlerhafter Ereignisse",
        )?;

        Ok(Self {
            registry: Arc::new(registry),
            connections,
            registered_users,
            registrations_total,
            messages_relayed_total,
            messages_dropped_total,
            broadcasts_total,
            malformed_events_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RelayMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<RelayMetrics>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = RelayMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn zwei_instanzen_kollidieren_nicht() {
        let a = RelayMetrics::neu().unwrap();
        let b = RelayMetrics::neu().unwrap();
        a.registrations_total.inc();
        assert_eq!(a.registrations_total.get(), 1);
        assert_eq!(b.registrations_total.get(), 0);
    }

    #[test]
    fn gauge_verbindungen_setzen() {
        let metriken = RelayMetrics::neu().unwrap();
        metriken.connections.inc();
        metriken.connections.inc();
        metriken.connections.dec();
        assert_eq!(metriken.connections.get(), 1);
    }

    #[test]
    fn clone_teilt_zaehler() {
        let metriken = RelayMetrics::neu().unwrap();
        let kopie = metriken.clone();
        kopie.messages_dropped_total.inc_by(3);
        assert_eq!(metriken.messages_dropped_total.get(), 3);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = RelayMetrics::neu().unwrap();
        metriken.registered_users.set(2);
        metriken.messages_relayed_total.inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("cipherpost_registered_users 2"));
        assert!(output.contains("cipherpost_messages_relayed_total 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn alle_metriken_in_registry_registriert() {
        let metriken = RelayMetrics::neu().unwrap();
        let families = metriken.registry.gather();
        let namen: Vec<&str> = families.iter().map(|f| f.get_name()).collect();

        for erwartet in [
            "cipherpost_connections",
            "cipherpost_registered_users",
            "cipherpost_registrations_total",
            "cipherpost_messages_relayed_total",
            "cipherpost_messages_dropped_total",
            "cipherpost_broadcasts_total",
            "cipherpost_malformed_events_total",
        ] {
            assert!(namen.contains(&erwartet), "{erwartet} fehlt");
        }
    }
}
