//! Core types for the noalloc HTTP/1.1 pipeline transport.
//!
//! This crate provides the contracts shared by the transport adapter
//! (`noalloc-transport`) and the collaborators it drives.
//!
//! ## Modules
//!
//! - `error`: Transport error taxonomy and exchange phases
//! - `method`: Abstract request methods
//! - `message`: Pipeline messages and request headers
//! - `content`: Length-bounded request content sources
//! - `wire`: Connection provider, wire engine and exchange contracts

mod content;
mod error;
mod message;
mod method;
mod wire;

pub use content::*;
pub use error::*;
pub use message::*;
pub use method::*;
pub use wire::*;

pub use tokio_util::sync::CancellationToken;
