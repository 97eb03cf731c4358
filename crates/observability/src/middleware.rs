//! Request-Tracing fuer Axum-Router
//!
//! Jede HTTP-Anfrage (statische Dateien, WebSocket-Upgrade, Health,
//! Metriken) wird als tracing-Span mit Methode, Pfad und Status protokolliert.

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;

/// Erstellt den Axum-Layer fuer Request-Tracing.
pub fn request_timing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}
