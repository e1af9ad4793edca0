//! Lodgechat core — chat session reconciliation for the resident portal assistant.
//!
//! The centerpiece is [`reconciler::Reconciler`], which owns one conversation at a
//! time and decides where its transcript lives: the local cache (a single JSON
//! file slot) while the user is anonymous, or the remote account store once they
//! are signed in. Locally cached sessions are migrated to the account, best
//! effort, on login.

pub mod config;
pub mod error;
pub mod inference;
pub mod markdown;
pub mod model;
pub mod reconciler;
pub mod store;
pub mod title;

pub use error::{ChatError, Result};
pub use model::{ChatSession, Feedback, Message, Role, SessionOrigin};
pub use reconciler::Reconciler;
pub use store::{LocalCacheStore, RemoteStore, SessionStore};
