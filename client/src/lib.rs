//! # Arena Game Client Library
//!
//! Client-side network layer for the arena brawler: connecting to the
//! server, streaming the locally predicted state, and reconciling what the
//! server says about everyone else.
//!
//! ## Architecture Overview
//!
//! The local player is predicted by the input/render collaborator and never
//! waits on the network; this library's job is to keep that prediction and
//! the server's authority eventually consistent:
//!
//! ### Session
//! One long-lived TCP stream per client. A receive loop dispatches inbound
//! lines by kind (snapshots, attack events, anything else), a writer drains
//! the outbound queue, and a fixed-rate send loop transmits the latest
//! published local state. Losing the stream is reported exactly once.
//!
//! ### Remote Reconciliation
//! Snapshots land as interpolation *targets*; each render tick remote views
//! ease toward them, dash and knockback impulses play out on their own
//! wall-clock delays, and views that go unseen for too long are evicted
//! even when no snapshot arrives to say so.
//!
//! ### Self Reconciliation
//! The server never moves the local player, but it does decide damage. A
//! drop in the authoritative health is applied locally as the damage the
//! prediction missed, with knockback inferred from the nearest attacker;
//! an authoritative kill count ahead of the local one registers a kill.
//!
//! ## Module Organization
//!
//! - [`network`]: connect-with-retry, the session task trio, and the
//!   [`network::SessionEvent`] stream the collaborator consumes.
//! - [`remote`]: [`remote::RemoteWorld`], [`remote::RemotePlayer`] views
//!   and the [`remote::LocalPlayer`] combat mirror.

pub mod network;
pub mod remote;
