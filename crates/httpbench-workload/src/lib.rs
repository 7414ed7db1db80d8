//! The workload processes that run inside the benchmark containers.
//!
//! Two halves: [`client`] repeats a GET request against a target
//! endpoint over a pinned HTTP version and records per-request timing
//! as JSON lines; [`server`] answers each request with a
//! client-chosen number of random bytes. The orchestrator packages the
//! two binaries into container images and wires them together over a
//! dedicated network.

#![warn(missing_docs)]

pub mod client;
pub mod server;

pub use client::{BodyMode, ClientError, HttpVersion, RepeatClient, RequestRecord};
