//! LSP Protocol Implementation
//!
//! Protocol handling only; the validation pipeline lives in
//! [`crate::controller`].

pub mod backend;
pub mod capabilities;
pub mod server;

pub use backend::Backend;
pub use capabilities::CapabilityFlags;
