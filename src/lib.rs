//! Incident Relay - tail an event log and raise a ticket for every event.

pub mod config;
pub mod display;
pub mod forwarder;
pub mod monitor;
pub mod ticket;
pub mod watcher;
