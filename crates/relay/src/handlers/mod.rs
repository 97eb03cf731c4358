//! Handler fuer alle Client-Ereignisse
//!
//! Jeder Handler ist fuer einen Ereignistyp zustaendig und arbeitet auf dem
//! gemeinsamen `RelayState`. Handler sind synchron: sie sperren die Registry,
//! aendern sie und reihen Antworten ein, ohne je zu warten.

pub mod key_handler;
pub mod message_handler;
pub mod registration_handler;
