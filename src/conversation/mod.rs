//! Report conversation: paging, composing, editing and deleting messages.

pub mod grouping;
pub mod policy;
pub mod state;

pub use state::{ConversationState, FetchStatus, ListUpdate, MessageEntry, MessageMode};
