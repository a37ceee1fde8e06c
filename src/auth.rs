//! Identifiers, secrets, and nonce utilities shared by the launch and service layers.

pub mod id;
pub mod nonce;
pub mod secret;

pub use id::*;
pub use nonce::*;
pub use secret::*;
