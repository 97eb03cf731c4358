//! Health-Check-Endpunkt fuer Cipherpost
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Belegung des Relays

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::RelayMetrics;

/// Status des Health-Checks
///
/// Der Relay hat keine Abhaengigkeiten, die ausfallen koennten. Antwortet
/// der Prozess, ist er gesund.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub online_connections: i64,
    pub registered_users: i64,
}

/// Geteilter Zustand fuer den Health-Check-Handler
///
/// Liest die Belegung aus den Gauges der Relay-Metriken.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Arc<Instant>,
    pub metriken: RelayMetrics,
}

impl HealthState {
    pub fn neu(metriken: RelayMetrics) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            metriken,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    fn antwort(&self) -> HealthResponse {
        HealthResponse {
            status: HealthStatus::Healthy,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            online_connections: self.metriken.connections.get(),
            registered_users: self.metriken.registered_users.get(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(metriken: RelayMetrics) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(HealthState::neu(metriken))
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.antwort()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn health_state_frisch() {
        let state = HealthState::neu(RelayMetrics::neu().unwrap());
        assert!(state.uptime_seconds() < 5);
    }

    #[test]
    fn health_antwort_liest_gauges() {
        let metriken = RelayMetrics::neu().unwrap();
        metriken.connections.set(3);
        metriken.registered_users.set(2);

        let antwort = HealthState::neu(metriken).antwort();
        assert_eq!(antwort.status, HealthStatus::Healthy);
        assert_eq!(antwort.online_connections, 3);
        assert_eq!(antwort.registered_users, 2);
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "0.1.0".to_string(),
            uptime_seconds: 3600,
            online_connections: 4,
            registered_users: 1,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptime_seconds\":3600"));
        assert!(json.contains("\"online_connections\":4"));
    }

    #[tokio::test]
    async fn health_endpunkt_antwortet() {
        let app = health_router(RelayMetrics::neu().unwrap());
        let antwort = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);
    }
}
