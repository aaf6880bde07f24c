use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};

use crate::core::state::App;
use crate::tui::component::Component;
use crate::tui::components::{MessageList, Sidebar, TitleBar};
use crate::tui::{Focus, TuiState};

/// Draws one frame.
///
/// ```text
/// ┌─────────┬──────────────────────────────────┐
/// │         │ title bar              [chip]    │
/// │ sidebar │ messages                         │
/// │         │                                  │
/// │         │ input                            │
/// └─────────┴──────────────────────────────────┘
/// ```
pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState) {
    use Constraint::{Length, Min};

    let [sidebar_area, main_area] =
        Layout::horizontal([Length(tui.sidebar.width()), Min(0)]).areas(frame.area());

    tui.input_box.is_loading = app.session.is_loading();
    tui.input_box.locked = app.session.in_flight();
    tui.input_box.focused = tui.focus == Focus::Input;
    let input_height = tui.input_box.calculate_height(main_area.width);

    let [title_area, messages_area, input_area] =
        Layout::vertical([Length(1), Min(0), Length(input_height)]).areas(main_area);

    Sidebar {
        state: &mut tui.sidebar,
        conversations: &app.conversations,
        active_id: app.session.active_conversation(),
        focused: tui.focus == Focus::Sidebar,
        loading: app.conversations_loading,
        now: Utc::now(),
    }
    .render(frame, sidebar_area);

    let is_streaming = app.session.in_flight() && !app.session.is_loading();
    MessageList::new(&mut tui.message_list, app.session.messages(), is_streaming)
        .render(frame, messages_area);

    let title = app
        .active_title()
        .unwrap_or(app.new_conversation_title.as_str())
        .to_string();
    TitleBar::new(
        title,
        app.status_message.clone(),
        app.health,
        tui.message_list.has_unseen_content(),
    )
    .render(frame, title_area);

    tui.input_box.render(frame, input_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{Action, update};
    use crate::stream::StreamEvent;
    use crate::test_support::test_app;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen(app: &App, tui: &mut TuiState) -> String {
        let backend = TestBackend::new(100, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw_ui(f, app, tui)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_thinking_until_first_byte() {
        let mut app = test_app();
        let mut tui = TuiState::new();
        let cycle = match update(&mut app, Action::Submit("Hello".into())) {
            crate::core::action::Effect::SpawnChat { cycle, .. } => cycle,
            other => panic!("expected SpawnChat, got {:?}", other),
        };

        let text = screen(&app, &mut tui);
        assert!(text.contains("Thinking..."));
        assert!(text.contains("Hello"));
        assert!(text.contains("Checking API..."));

        update(
            &mut app,
            Action::Stream {
                cycle,
                event: StreamEvent::ContentDelta("Hi there".into()),
            },
        );
        let text = screen(&app, &mut tui);
        assert!(text.contains("Hi there"));
        assert!(text.contains("Receiving..."));
    }

    #[test]
    fn test_collapsed_sidebar_hides_list() {
        let app = test_app();
        let mut tui = TuiState::new();
        tui.sidebar.toggle_collapsed();
        let text = screen(&app, &mut tui);
        assert!(!text.contains("Conversations"));
        assert!(text.contains("New conversation"));
    }

    #[test]
    fn test_title_placeholder_until_server_names_conversation() {
        let mut app = test_app();
        app.new_conversation_title = String::from("Untitled");
        let mut tui = TuiState::new();

        // Sending creates the conversation server-side; nothing is created up front
        let cycle = match update(&mut app, Action::Submit("Hello".into())) {
            crate::core::action::Effect::SpawnChat { cycle, request } => {
                assert_eq!(request.conversation_id, None);
                cycle
            }
            other => panic!("expected SpawnChat, got {:?}", other),
        };
        assert!(screen(&app, &mut tui).contains("Untitled"));

        update(
            &mut app,
            Action::Stream {
                cycle,
                event: StreamEvent::ConversationAssigned("c1".into()),
            },
        );
        update(
            &mut app,
            Action::ConversationsLoaded(vec![crate::api::Conversation {
                id: "c1".into(),
                title: "Greetings".into(),
                updated_at: chrono::Utc::now(),
            }]),
        );
        let text = screen(&app, &mut tui);
        assert!(text.contains("Greetings"));
        assert!(!text.contains("Untitled"));
    }
}
