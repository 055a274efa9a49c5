//! Relay core: rule evaluation, deduplicated dispatch and chunking.
//!
//! ## Module Structure
//!
//! - `cache`: source channel admission filter (`EndpointCache`)
//! - `condition`: attributes, conditions and their evaluation
//! - `chunk`: size-bounded splitting of outgoing text
//! - `format`: relay and listing text
//! - `mentions`: per-bridge mention allow-list
//! - `router`: the dispatch pass (`Router`)
//! - `transport`: the send primitive the router depends on

pub mod cache;
pub mod chunk;
pub mod condition;
pub mod format;
pub mod mentions;
pub mod router;
pub mod transport;

pub use condition::{Attribute, Condition};
pub use mentions::{MentionKind, MentionPolicy};
pub use router::Router;
pub use transport::Transport;
