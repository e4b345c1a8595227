//! Chat Messages
//!
//! The wire envelope shared by client and server, plus the closed set of
//! local directives a message can carry in its `action` field.

mod action;
mod envelope;

pub use action::{dispatch, Action, ActionHandler, Notification, UnknownAction};
pub use envelope::{now_timestamp, Message, ParseError, SYSTEM_SENDER};
