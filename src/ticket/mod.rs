//! Remote ticketing API.

mod client;
mod error;
mod types;

pub use client::{TicketApi, TicketClient};
pub use error::TicketError;
pub use types::{NewTicket, TicketId, TicketSession};
