//! Core types for chattr.

pub mod chat;
pub mod message;
pub mod stream;

pub use chat::*;
pub use message::*;
pub use stream::*;
