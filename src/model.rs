//! Entities persisted through the data connector: consumers, resource links, share keys,
//! users, plus the protocol vocabulary and outcome values they carry.

pub mod consumer;
pub mod message;
pub mod outcome;
pub mod resource_link;
pub mod share_key;
pub mod user;

pub use consumer::*;
pub use message::*;
pub use outcome::*;
pub use resource_link::*;
pub use share_key::*;
pub use user::*;
