//! Local Directives
//!
//! A message with a non-empty `action` names a directive for the receiving
//! application. The set of directives is closed: names are looked up in a
//! fixed table and dispatched through a `match`, never evaluated.

use std::fmt;
use std::str::FromStr;

use super::envelope::Message;

/// Directives a receiving application understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Append the message to the visible chat
    PushText,
    /// Clear the visible chat
    ClearChat,
    /// Show that the connection is down
    ConnectionDisable,
    /// Show that the connection is back
    ConnectionEnable,
}

const ACTIONS: [(&str, Action); 4] = [
    ("push_text", Action::PushText),
    ("clear_chat", Action::ClearChat),
    ("connection_disable", Action::ConnectionDisable),
    ("connection_enable", Action::ConnectionEnable),
];

impl Action {
    /// Wire name of the directive
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::PushText => "push_text",
            Action::ClearChat => "clear_chat",
            Action::ConnectionDisable => "connection_disable",
            Action::ConnectionEnable => "connection_enable",
        }
    }

    /// Build a local message carrying this directive
    pub fn message(self, text: impl Into<String>) -> Message {
        Message::system(text).with_action(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ACTIONS
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, action)| *action)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// A directive name outside the known set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

/// How an inbound message should be treated by the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Plain chat (empty `action`)
    Chat,
    /// A known directive
    Directive(Action),
    /// A directive name this build does not know
    Unknown(String),
}

impl Notification {
    /// Classify a message by its `action` field
    pub fn classify(message: &Message) -> Self {
        if !message.is_directive() {
            return Notification::Chat;
        }
        match message.action.parse::<Action>() {
            Ok(action) => Notification::Directive(action),
            Err(UnknownAction(name)) => Notification::Unknown(name),
        }
    }
}

/// Application-side receiver of directives
pub trait ActionHandler {
    fn push_text(&mut self, message: &Message);
    fn clear_chat(&mut self, message: &Message);
    fn connection_disable(&mut self, message: &Message);
    fn connection_enable(&mut self, message: &Message);
}

/// Route a message to the matching handler method
///
/// Plain chat is treated as `push_text`. Unknown directives are returned as
/// an error and no handler method runs.
pub fn dispatch<H>(handler: &mut H, message: &Message) -> Result<Notification, UnknownAction>
where
    H: ActionHandler + ?Sized,
{
    let notification = Notification::classify(message);
    match &notification {
        Notification::Chat | Notification::Directive(Action::PushText) => {
            handler.push_text(message)
        }
        Notification::Directive(Action::ClearChat) => handler.clear_chat(message),
        Notification::Directive(Action::ConnectionDisable) => handler.connection_disable(message),
        Notification::Directive(Action::ConnectionEnable) => handler.connection_enable(message),
        Notification::Unknown(name) => return Err(UnknownAction(name.clone())),
    }
    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl ActionHandler for Recorder {
        fn push_text(&mut self, _: &Message) {
            self.calls.push("push_text");
        }
        fn clear_chat(&mut self, _: &Message) {
            self.calls.push("clear_chat");
        }
        fn connection_disable(&mut self, _: &Message) {
            self.calls.push("connection_disable");
        }
        fn connection_enable(&mut self, _: &Message) {
            self.calls.push("connection_enable");
        }
    }

    #[test]
    fn test_parse_known_actions() {
        for (name, action) in ACTIONS {
            assert_eq!(name.parse::<Action>().unwrap(), action);
            assert_eq!(action.as_str(), name);
        }
    }

    #[test]
    fn test_parse_unknown_action() {
        let err = "rm_rf".parse::<Action>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown action: rm_rf");
    }

    #[test]
    fn test_classify() {
        let chat = Message::new("bob", "hi");
        assert_eq!(Notification::classify(&chat), Notification::Chat);

        let clear = chat.clone().with_action("clear_chat");
        assert_eq!(
            Notification::classify(&clear),
            Notification::Directive(Action::ClearChat)
        );

        let odd = chat.with_action("self.quit()");
        assert_eq!(
            Notification::classify(&odd),
            Notification::Unknown("self.quit()".to_string())
        );
    }

    #[test]
    fn test_dispatch_routes_to_handler() {
        let mut recorder = Recorder::default();

        dispatch(&mut recorder, &Message::new("bob", "hi")).unwrap();
        dispatch(&mut recorder, &Action::ClearChat.message("")).unwrap();
        dispatch(&mut recorder, &Action::ConnectionDisable.message("offline")).unwrap();
        dispatch(&mut recorder, &Action::ConnectionEnable.message("online")).unwrap();

        assert_eq!(
            recorder.calls,
            vec!["push_text", "clear_chat", "connection_disable", "connection_enable"]
        );
    }

    #[test]
    fn test_dispatch_unknown_runs_nothing() {
        let mut recorder = Recorder::default();
        let msg = Message::new("bob", "hi").with_action("shutdown");

        assert!(dispatch(&mut recorder, &msg).is_err());
        assert!(recorder.calls.is_empty());
    }
}
