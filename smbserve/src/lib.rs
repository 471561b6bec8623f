//! # smbserve
//!
//! A file-sharing protocol server core for the **Server Message Block (SMB)**
//! family, covering both the legacy (CIFS-style, AndX-batched) dialect and the
//! modern compounded-command SMB2 dialects.
//!
//! This crate provides:
//! - **Protocol layer** ([`protocol`]): value-object types for headers,
//!   command bodies (Negotiate, Session Setup, Tree Connect, Create, Read,
//!   Write, etc.), and message chains. Wire-format encode/decode is out of
//!   scope; messages travel between peers as decoded frames.
//! - **Server layer** ([`server`]): the connection/session/tree state machine
//!   and the per-family command dispatch engines, including compounding,
//!   credit grants, signing policy, pending-request tracking, and the ordered
//!   per-connection response queue.
//! - **Store layer** ([`store`]): the `FileStore` capability the dispatch
//!   engine calls into, plus an in-memory implementation used by tests and
//!   the demo binary.
//! - **Transport layer** ([`transport`]): frame-level read/write stream
//!   abstractions and an in-process channel transport.
//! - **Utilities** ([`util`]): the security-provider seam and the signing-key
//!   derivation helpers.

/// Protocol value objects: headers, bodies, and message chains.
pub mod protocol;
/// The `FileStore` capability and the in-memory backing store.
pub mod store;
/// Server core: connections, sessions, shares, and command dispatch.
pub mod server;
/// Frame-level transport abstractions.
pub mod transport;
/// Authentication seam and crypto helpers.
pub mod util;
