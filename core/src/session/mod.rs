//! Conversation state: message types and the durable session store

pub mod message;
pub mod store;

pub use message::{Message, Role};
pub use store::SessionStore;
