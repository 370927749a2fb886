//! Shared domain vocabulary for the Emporia notification core.
//!
//! Every other crate in the workspace speaks in these types: database ids,
//! UTC timestamps, the closed identity / notification / priority / channel
//! variants, and the [`Clock`](clock::Clock) seam used by the in-memory stores.

pub mod channels;
pub mod clock;
pub mod error;
pub mod notification;
pub mod types;
