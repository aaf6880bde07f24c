//! # Actions
//!
//! Everything that can happen in Locally becomes an `Action`.
//! User presses Enter? That's `Action::Submit(text)`.
//! A frame arrives? That's `Action::Stream { cycle, event }`.
//!
//! The `update()` function takes the current state and an action,
//! mutates the state and returns an [`Effect`] for the adapter to perform.
//! No side effects here. I/O happens elsewhere.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::api::{ApiError, ChatRequest, Conversation, Message};
use crate::core::conversations::validate_rename;
use crate::core::health::HealthStatus;
use crate::core::session::CycleId;
use crate::core::state::App;
use crate::stream::StreamEvent;

#[derive(Debug, Clone)]
pub enum Action {
    Submit(String),
    /// One decoded event of chat cycle `cycle`.
    Stream { cycle: CycleId, event: StreamEvent },
    StreamFailed { cycle: CycleId, error: ApiError },
    /// The transport ended without an error (with or without `done`).
    StreamClosed { cycle: CycleId },
    CancelChat,

    RefreshConversations,
    ConversationsLoaded(Vec<Conversation>),
    SelectConversation(String),
    MessagesLoaded { id: String, messages: Vec<Message> },
    HistoryLoaded(Vec<Message>),
    NewConversation,
    RequestRename { id: String, title: String },
    Renamed {
        id: String,
        title: String,
        success: bool,
        at: DateTime<Utc>,
    },
    RequestDelete(String),
    Deleted { id: String, success: bool },

    HealthChanged(HealthStatus),
    Quit,
}

/// Work the adapter must do after an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    SpawnChat { cycle: CycleId, request: ChatRequest },
    /// Abort the transport task of the cycle that was just cancelled.
    CancelChat,
    RefreshConversations,
    LoadMessages(String),
    Rename { id: String, title: String },
    Delete(String),
    Quit,
}

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::Submit(text) => match app.session.begin(&text) {
            Some((cycle, request)) => {
                app.status_message = String::from("Thinking...");
                Effect::SpawnChat { cycle, request }
            }
            None => Effect::None,
        },

        Action::Stream { cycle, event } => {
            let was_current = app.session.current_cycle() == Some(cycle);
            app.session.apply(cycle, event);
            after_cycle(app, was_current)
        }

        Action::StreamFailed { cycle, error } => {
            let was_current = app.session.fail(cycle, &error);
            after_cycle(app, was_current)
        }

        Action::StreamClosed { cycle } => {
            let was_current = app.session.close(cycle);
            after_cycle(app, was_current)
        }

        Action::CancelChat => match app.session.cancel() {
            Some(_) => {
                app.status_message = String::from("Cancelled");
                Effect::CancelChat
            }
            None => Effect::None,
        },

        Action::RefreshConversations => {
            app.conversations_loading = true;
            Effect::RefreshConversations
        }

        Action::ConversationsLoaded(items) => {
            app.conversations.replace(items);
            app.conversations_loading = false;
            Effect::None
        }

        Action::SelectConversation(id) => {
            let is_active = app.session.active_conversation() == Some(id.as_str());
            if is_active && app.session.in_flight() {
                debug!("Conversation {} is busy, not reloading", id);
                return Effect::None;
            }
            if is_active {
                info!("Reloading conversation {}", id);
            } else {
                info!("Switching to conversation {}", id);
            }
            // Cancels any in-flight cycle; its late events become stale
            app.session.open_conversation(id.clone());
            Effect::LoadMessages(id)
        }

        Action::MessagesLoaded { id, messages } => {
            if !app.session.receive_history(&id, messages) {
                debug!("Dropping messages for {} (no longer shown)", id);
            }
            Effect::None
        }

        Action::HistoryLoaded(messages) => {
            if app.session.active_conversation().is_none() && app.session.messages().is_empty() {
                app.session.load_detached(messages);
            }
            Effect::None
        }

        Action::NewConversation => {
            app.session.start_new_conversation();
            app.status_message = String::from("New conversation");
            Effect::None
        }

        Action::RequestRename { id, title } => {
            let Some(current) = app.conversations.get(&id) else {
                return Effect::None;
            };
            match validate_rename(&current.title, &title) {
                Some(title) => Effect::Rename { id, title },
                None => Effect::None,
            }
        }

        Action::Renamed {
            id,
            title,
            success,
            at,
        } => {
            if success {
                app.conversations.rename(&id, &title, at);
                app.status_message = format!("Renamed to \"{title}\"");
            } else {
                app.status_message = String::from("Rename failed");
            }
            Effect::None
        }

        Action::RequestDelete(id) => Effect::Delete(id),

        Action::Deleted { id, success } => {
            if success {
                app.conversations.remove(&id);
                app.session.forget_conversation(&id);
                app.status_message = String::from("Conversation deleted");
            } else {
                app.status_message = String::from("Delete failed");
            }
            Effect::None
        }

        Action::HealthChanged(status) => {
            app.health = status;
            Effect::None
        }

        Action::Quit => Effect::Quit,
    }
}

/// Runs after a cycle update. If that update ended the cycle and the server
/// assigned a new conversation, the cached listing is stale.
fn after_cycle(app: &mut App, was_current: bool) -> Effect {
    if !was_current || app.session.in_flight() {
        return Effect::None;
    }
    let outcome = app.session.last_outcome();
    app.status_message = match &outcome.error {
        Some(_) => String::from("Request failed"),
        None => String::from("Ready"),
    };
    if outcome.conversation_changed() {
        app.conversations_loading = true;
        Effect::RefreshConversations
    } else {
        Effect::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;
    use crate::test_support::test_app;
    use chrono::TimeZone;

    fn delta(s: &str) -> StreamEvent {
        StreamEvent::ContentDelta(s.to_string())
    }

    fn conv(id: &str, title: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            title: title.to_string(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn submit(app: &mut App, text: &str) -> CycleId {
        match update(app, Action::Submit(text.to_string())) {
            Effect::SpawnChat { cycle, .. } => cycle,
            other => panic!("expected SpawnChat, got {:?}", other),
        }
    }

    #[test]
    fn test_submit_blank_is_noop() {
        let mut app = test_app();
        assert_eq!(update(&mut app, Action::Submit("   ".into())), Effect::None);
        assert!(app.session.messages().is_empty());
    }

    #[test]
    fn test_submit_while_loading_is_noop() {
        let mut app = test_app();
        submit(&mut app, "first");
        assert_eq!(update(&mut app, Action::Submit("second".into())), Effect::None);
        assert_eq!(app.session.messages().len(), 1);
    }

    #[test]
    fn test_full_cycle_in_existing_conversation() {
        let mut app = test_app();
        update(&mut app, Action::SelectConversation("c1".into()));
        let cycle = submit(&mut app, "Hello");

        update(&mut app, Action::Stream { cycle, event: delta("Hi") });
        update(&mut app, Action::Stream { cycle, event: delta(" there") });
        let effect = update(&mut app, Action::Stream { cycle, event: StreamEvent::Done });

        // Same conversation: no refresh
        assert_eq!(effect, Effect::None);
        assert_eq!(app.session.messages()[1].content, "Hi there");
        assert!(!app.session.is_loading());
        assert_eq!(app.status_message, "Ready");

        // Transport closing after done changes nothing
        assert_eq!(update(&mut app, Action::StreamClosed { cycle }), Effect::None);
    }

    #[test]
    fn test_new_conversation_triggers_refresh_at_end() {
        let mut app = test_app();
        let cycle = submit(&mut app, "Hello");

        let effect = update(
            &mut app,
            Action::Stream {
                cycle,
                event: StreamEvent::ConversationAssigned("c42".into()),
            },
        );
        assert_eq!(effect, Effect::None);
        update(&mut app, Action::Stream { cycle, event: delta("Hi") });

        let effect = update(&mut app, Action::StreamClosed { cycle });
        assert_eq!(effect, Effect::RefreshConversations);
        assert_eq!(app.session.active_conversation(), Some("c42"));
    }

    #[test]
    fn test_stream_failure_appends_error() {
        let mut app = test_app();
        let cycle = submit(&mut app, "Hello");
        update(
            &mut app,
            Action::StreamFailed {
                cycle,
                error: ApiError::Protocol("malformed frame".into()),
            },
        );
        let last = app.session.messages().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Error connecting to the server.");
        assert!(!app.session.is_loading());
        assert_eq!(app.status_message, "Request failed");
    }

    #[test]
    fn test_switch_conversation_mid_stream_discards_late_events() {
        let mut app = test_app();
        update(&mut app, Action::SelectConversation("c1".into()));
        let cycle = submit(&mut app, "Hello");
        update(&mut app, Action::Stream { cycle, event: delta("partial") });

        let effect = update(&mut app, Action::SelectConversation("c2".into()));
        assert_eq!(effect, Effect::LoadMessages("c2".into()));
        assert!(!app.session.in_flight());

        update(&mut app, Action::Stream { cycle, event: delta(" late") });
        update(&mut app, Action::StreamClosed { cycle });
        assert!(app.session.messages().is_empty());
        assert_eq!(app.session.active_conversation(), Some("c2"));
    }

    #[test]
    fn test_select_active_conversation_reloads_when_idle() {
        let mut app = test_app();
        update(&mut app, Action::SelectConversation("c1".into()));
        update(
            &mut app,
            Action::MessagesLoaded {
                id: "c1".into(),
                messages: vec![Message::user("hi")],
            },
        );

        assert_eq!(
            update(&mut app, Action::SelectConversation("c1".into())),
            Effect::LoadMessages("c1".into())
        );
        update(
            &mut app,
            Action::MessagesLoaded {
                id: "c1".into(),
                messages: vec![Message::user("hi"), Message::assistant("hello")],
            },
        );
        assert_eq!(app.session.messages().len(), 2);
    }

    #[test]
    fn test_select_active_conversation_while_streaming_is_noop() {
        let mut app = test_app();
        update(&mut app, Action::SelectConversation("c1".into()));
        submit(&mut app, "Hello");
        assert_eq!(
            update(&mut app, Action::SelectConversation("c1".into())),
            Effect::None
        );
        assert!(app.session.in_flight());
    }

    #[test]
    fn test_messages_arriving_after_submit_are_spliced_in_front() {
        let mut app = test_app();
        update(&mut app, Action::SelectConversation("c1".into()));
        let cycle = submit(&mut app, "follow-up");

        update(
            &mut app,
            Action::MessagesLoaded {
                id: "c1".into(),
                messages: vec![Message::user("earlier"), Message::assistant("answer")],
            },
        );
        update(&mut app, Action::Stream { cycle, event: delta("sure") });
        update(&mut app, Action::Stream { cycle, event: StreamEvent::Done });

        let contents: Vec<_> = app
            .session
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["earlier", "answer", "follow-up", "sure"]);
    }

    #[test]
    fn test_messages_for_stale_selection_are_dropped() {
        let mut app = test_app();
        update(&mut app, Action::SelectConversation("c1".into()));
        update(&mut app, Action::SelectConversation("c2".into()));
        update(
            &mut app,
            Action::MessagesLoaded {
                id: "c1".into(),
                messages: vec![Message::user("old")],
            },
        );
        assert!(app.session.messages().is_empty());

        update(
            &mut app,
            Action::MessagesLoaded {
                id: "c2".into(),
                messages: vec![Message::user("hi"), Message::assistant("hello")],
            },
        );
        assert_eq!(app.session.messages().len(), 2);
    }

    #[test]
    fn test_rename_flow() {
        let mut app = test_app();
        update(
            &mut app,
            Action::ConversationsLoaded(vec![conv("a", "Old"), conv("b", "Other")]),
        );
        assert!(!app.conversations_loading);

        assert_eq!(
            update(
                &mut app,
                Action::RequestRename {
                    id: "a".into(),
                    title: "Old".into()
                }
            ),
            Effect::None
        );
        assert_eq!(
            update(
                &mut app,
                Action::RequestRename {
                    id: "a".into(),
                    title: " New ".into()
                }
            ),
            Effect::Rename {
                id: "a".into(),
                title: "New".into()
            }
        );

        let at = Utc.with_ymd_and_hms(2025, 5, 5, 5, 5, 5).unwrap();
        update(
            &mut app,
            Action::Renamed {
                id: "a".into(),
                title: "New".into(),
                success: true,
                at,
            },
        );
        let renamed = app.conversations.get("a").unwrap();
        assert_eq!(renamed.title, "New");
        assert_eq!(renamed.updated_at, at);
        assert_eq!(app.conversations.get("b").unwrap().title, "Other");
    }

    #[test]
    fn test_failed_rename_keeps_listing() {
        let mut app = test_app();
        update(&mut app, Action::ConversationsLoaded(vec![conv("a", "Old")]));
        let before = app.conversations.clone();
        update(
            &mut app,
            Action::Renamed {
                id: "a".into(),
                title: "New".into(),
                success: false,
                at: Utc::now(),
            },
        );
        assert_eq!(app.conversations, before);
        assert_eq!(app.status_message, "Rename failed");
    }

    #[test]
    fn test_delete_active_clears_transcript() {
        let mut app = test_app();
        update(
            &mut app,
            Action::ConversationsLoaded(vec![conv("a", "One"), conv("b", "Two")]),
        );
        update(&mut app, Action::SelectConversation("a".into()));
        update(
            &mut app,
            Action::MessagesLoaded {
                id: "a".into(),
                messages: vec![Message::user("hi")],
            },
        );

        assert_eq!(
            update(&mut app, Action::RequestDelete("a".into())),
            Effect::Delete("a".into())
        );
        update(
            &mut app,
            Action::Deleted {
                id: "a".into(),
                success: true,
            },
        );

        assert!(app.conversations.get("a").is_none());
        assert_eq!(app.conversations.len(), 1);
        assert!(app.session.messages().is_empty());
        assert_eq!(app.session.active_conversation(), None);
    }

    #[test]
    fn test_delete_other_keeps_transcript() {
        let mut app = test_app();
        update(
            &mut app,
            Action::ConversationsLoaded(vec![conv("a", "One"), conv("b", "Two")]),
        );
        update(&mut app, Action::SelectConversation("a".into()));
        update(
            &mut app,
            Action::MessagesLoaded {
                id: "a".into(),
                messages: vec![Message::user("hi")],
            },
        );
        update(
            &mut app,
            Action::Deleted {
                id: "b".into(),
                success: true,
            },
        );
        assert_eq!(app.session.messages().len(), 1);
        assert_eq!(app.session.active_conversation(), Some("a"));
    }

    #[test]
    fn test_cancel_chat() {
        let mut app = test_app();
        assert_eq!(update(&mut app, Action::CancelChat), Effect::None);
        let cycle = submit(&mut app, "Hello");
        assert_eq!(update(&mut app, Action::CancelChat), Effect::CancelChat);
        update(&mut app, Action::Stream { cycle, event: delta("late") });
        assert_eq!(app.session.messages().len(), 1);
    }

    #[test]
    fn test_history_only_fills_empty_detached_view() {
        let mut app = test_app();
        update(&mut app, Action::HistoryLoaded(vec![Message::user("legacy")]));
        assert_eq!(app.session.messages().len(), 1);

        update(&mut app, Action::SelectConversation("c1".into()));
        update(&mut app, Action::HistoryLoaded(vec![Message::user("legacy")]));
        assert!(app.session.messages().is_empty());
    }

    #[test]
    fn test_health_and_quit() {
        let mut app = test_app();
        let up = HealthStatus {
            is_up: true,
            is_checking: false,
        };
        update(&mut app, Action::HealthChanged(up));
        assert_eq!(app.health, up);
        assert_eq!(update(&mut app, Action::Quit), Effect::Quit);
    }
}
