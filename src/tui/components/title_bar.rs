//! # TitleBar Component
//!
//! Top status bar: which conversation is open, the transient status message,
//! and the backend health chip on the right.
//!
//! Purely presentational. Every field is a prop copied from `App` or
//! `TuiState` each frame.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;

use crate::core::health::HealthStatus;
use crate::tui::component::Component;

pub struct TitleBar {
    /// Title of the active conversation ("New conversation" when none)
    pub conversation_title: String,
    /// Status message (e.g. "Thinking...", "Rename failed")
    pub status_message: String,
    pub health: HealthStatus,
    /// Whether there's content below the current scroll position
    pub has_unseen_content: bool,
}

impl TitleBar {
    pub fn new(
        conversation_title: String,
        status_message: String,
        health: HealthStatus,
        has_unseen_content: bool,
    ) -> Self {
        Self {
            conversation_title,
            status_message,
            health,
            has_unseen_content,
        }
    }

    fn chip_style(&self) -> Style {
        let bg = if self.health.is_checking {
            Color::Yellow
        } else if self.health.is_up {
            Color::Blue
        } else {
            Color::Red
        };
        Style::default()
            .fg(Color::Black)
            .bg(bg)
            .add_modifier(Modifier::BOLD)
    }
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let chip = format!(" {} ", self.health.label());
        let [text_area, chip_area] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(chip.len() as u16)])
                .areas(area);

        let mut title_text = format!("Locally | {}", self.conversation_title);
        if !self.status_message.is_empty() {
            title_text.push_str(" | ");
            title_text.push_str(&self.status_message);
        }
        if self.has_unseen_content {
            title_text.push_str(" | ↓ New");
        }

        frame.render_widget(Span::raw(title_text), text_area);
        frame.render_widget(Span::styled(chip, self.chip_style()), chip_area);
    }
}
