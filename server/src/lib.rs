//! # Arena Game Server Library
//!
//! Authoritative server for the arena brawler. It owns the canonical player
//! roster, resolves combat, and keeps every connected client synchronized
//! through full-state snapshots.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The registry is the single source of truth for position, health and
//! kills. Clients stream their own predicted state; combat outcomes are
//! decided here and only here, and a client learns about damage done to it
//! from the snapshots it receives back.
//!
//! ### Connection Lifecycle
//! Every accepted socket gets its own task: handshake, duplicate-join
//! rejection, the inbound line loop, and disconnect cleanup. A join and its
//! first broadcast are atomic with respect to every other connect and
//! disconnect, and a departure is visible to all remaining clients within
//! one broadcast cycle.
//!
//! ### State Broadcasting
//! After any visible mutation the full roster is serialized once and fanned
//! out through per-connection bounded queues. The connection that triggered
//! the update throttles its own snapshot requests to one per 50 ms; joins
//! and departures broadcast immediately.
//!
//! ## Module Organization
//!
//! - [`registry`]: player roster, id assignment, update intake clamping,
//!   and the time-windowed reconnect guard.
//! - [`combat`]: the hit resolver run after every applied update.
//! - [`network`]: TCP accept loop, per-connection tasks, snapshot fan-out.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("0.0.0.0:7777").await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! Per-connection failures never take the process down: malformed lines are
//! dropped, write failures are isolated to the affected queue, and a read
//! error is just a disconnect.

pub mod combat;
pub mod network;
pub mod registry;
