//! Agent Client Protocol transport.
//!
//! - `codec`: NDJSON line framing with a per-line cap.
//! - `protocol`: JSON-RPC envelopes, ids and error objects.
//! - `schema`: typed ACP payloads.
//! - `rpc`: the bidirectional connection with request correlation.
//! - `connection`: the `initialize` handshake and typed outbound calls.
//! - `tap`: optional pass-through traffic observation.

pub mod codec;
pub mod connection;
pub mod protocol;
pub mod rpc;
pub mod schema;
pub mod tap;
