//! Pure domain logic for marketplace webhook ingestion.
//!
//! No I/O lives here: signature verification, fixed-point money,
//! event-type routing, payload decoding, retry policy, and the queue
//! vocabulary shared by the API server and the workers.

pub mod error;
pub mod events;
pub mod money;
pub mod payload;
pub mod queue;
pub mod retry;
pub mod signature;
pub mod types;
