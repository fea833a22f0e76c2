//! Claude hook support: the durable cross-process session store and the
//! classification of hook events into workspace notifications.
//!
//! The CLI invokes this from `cmux claude-hook <session-start|stop|notification>`
//! with the hook JSON on stdin; the store keeps enough state to route the
//! resulting status updates and notifications back to the workspace and
//! surface that launched the agent.

pub mod classify;
pub mod store;

pub use classify::{
    classify, last_assistant_message, message_text, normalize_body, NotificationClass,
    TRANSCRIPT_BODY_LIMIT,
};
pub use store::{normalize_opt, normalize_session_id, ConsumeQuery, SessionRecord, SessionStore};
