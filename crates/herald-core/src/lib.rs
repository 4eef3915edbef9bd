//! # herald-core
//!
//! Core types for the Herald agent runtime: messages and their causes, the
//! error taxonomy, and the runtime event bus. Every other crate in the
//! workspace speaks in these types.

pub mod error;
pub mod event;
pub mod message;
pub mod types;

pub use error::{HeraldError, Result};
pub use event::{EventBus, RuntimeEvent};
pub use message::{InstructContent, Message};
pub use types::{ActionKind, RoleId, SubscriptionId};
