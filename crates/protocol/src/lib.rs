//! cipherpost-protocol – Relay-Protokoll-Definitionen
//!
//! Dieses Crate definiert alle Ereignisse die zwischen Client und Relay
//! ausgetauscht werden, sowie das Frame-Format fuer rohe TCP-Verbindungen.
//!
//! Jede Nachricht ist ein JSON-Objekt `{"event": "<name>", "data": ...}`,
//! unabhaengig vom Transport (WebSocket-Textframe oder TCP-Frame).

pub mod events;
pub mod wire;

pub use events::{Chiffrat, ClientEvent, ProtokollFehler, ServerEvent};
pub use wire::FrameCodec;
