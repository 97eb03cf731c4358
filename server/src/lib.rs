//! cipherpost-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Relay-Zustand und alle Listener und stellt den
//! oeffentlichen Einstiegspunkt fuer Tests bereit.

pub mod config;

use anyhow::{Context, Result};
use cipherpost_observability::{observability_server_starten, RelayMetrics};
use cipherpost_relay::{relay_router, RelayState, TcpRelayServer};
use config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Server und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    // Ohne Signal-Handler laeuft der Server bis der Prozess beendet wird
                    tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht registriert werden");
                    std::future::pending::<()>().await;
                    drop(shutdown_tx);
                }
            }
        });

        self.laufen(shutdown_rx).await
    }

    /// Startet alle Listener und laeuft bis `shutdown_rx` `true` meldet
    ///
    /// Reihenfolge:
    /// 1. Metriken und Relay-Zustand anlegen
    /// 2. TCP-Frame-Listener starten (optional)
    /// 3. Observability-Server starten (optional)
    /// 4. HTTP-Listener (WebSocket + statische Dateien) bis zum Shutdown
    pub async fn laufen(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let metriken = RelayMetrics::neu().context("Metriken konnten nicht erstellt werden")?;
        let state = RelayState::neu(self.config.relay_config(), metriken.clone());
        let mut nebenlaeufer: Vec<JoinHandle<()>> = Vec::new();

        if let Some(adresse) = self.config.tcp_bind_adresse() {
            let addr: SocketAddr = adresse
                .parse()
                .with_context(|| format!("Ungueltige TCP-Adresse '{adresse}'"))?;
            let tcp = TcpRelayServer::neu(Arc::clone(&state), addr);
            let rx = shutdown_rx.clone();
            nebenlaeufer.push(tokio::spawn(async move {
                if let Err(e) = tcp.starten(rx).await {
                    tracing::error!(adresse = %addr, fehler = %e, "TCP-Relay fehlgeschlagen");
                }
            }));
        }

        if self.config.observability.aktiviert {
            let adresse = self.config.observability_bind_adresse();
            let addr: SocketAddr = adresse
                .parse()
                .with_context(|| format!("Ungueltige Observability-Adresse '{adresse}'"))?;
            let rx = shutdown_rx.clone();
            nebenlaeufer.push(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, metriken, rx).await {
                    tracing::error!(adresse = %addr, fehler = %e, "Observability-Server fehlgeschlagen");
                }
            }));
        }

        let http_adresse = self.config.http_bind_adresse();
        let listener = TcpListener::bind(&http_adresse)
            .await
            .with_context(|| format!("HTTP-Port '{http_adresse}' konnte nicht gebunden werden"))?;
        let app = relay_router(
            state,
            &self.config.netzwerk.statisches_verzeichnis,
            shutdown_rx.clone(),
        );

        tracing::info!(
            adresse = %listener.local_addr()?,
            statisch = %self.config.netzwerk.statisches_verzeichnis,
            reregistrierung = ?self.config.relay.reregistrierung,
            "Cipherpost-Relay laeuft"
        );

        let mut http_shutdown = shutdown_rx;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = http_shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("HTTP-Server fehlgeschlagen")?;

        for aufgabe in nebenlaeufer {
            let _ = aufgabe.await;
        }

        tracing::info!("Server beendet");
        Ok(())
    }
}
