use chrono::Local;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget, Wrap};

use crate::api::{Message as ChatMessage, Role};
use crate::tui::markdown;

/// Horizontal padding (per side) between the border and text content.
const CONTENT_PAD_H: u16 = 1;
/// Total horizontal space consumed by borders (1 left + 1 right) and padding.
const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Total vertical space consumed by borders (1 top + 1 bottom).
const VERTICAL_OVERHEAD: u16 = 2;

/// One transcript entry drawn as a rounded box titled with the role and time.
///
/// Created fresh each frame by `MessageList`. `is_open` marks the assistant
/// reply that is still streaming; its border is drawn bold.
#[derive(Clone, Copy)]
pub struct Message<'a> {
    pub message: &'a ChatMessage,
    pub is_open: bool,
}

impl<'a> Message<'a> {
    pub fn new(message: &'a ChatMessage, is_open: bool) -> Self {
        Self { message, is_open }
    }

    /// Height this message needs at `width`, without drawing it.
    ///
    /// Plain bodies are measured with `textwrap` using the same options as
    /// `Paragraph`'s word wrap; markdown bodies ask the paragraph itself.
    /// Saturates at `u16::MAX` rows.
    pub fn calculate_height(message: &ChatMessage, width: u16) -> u16 {
        let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            return 1;
        }

        let content = message.content.trim();
        if content.is_empty() {
            return VERTICAL_OVERHEAD;
        }

        let lines = if message.role == Role::Assistant {
            body(message).line_count(content_width)
        } else {
            let options = textwrap::Options::new(content_width as usize)
                .break_words(true)
                .word_separator(textwrap::WordSeparator::AsciiSpace);
            textwrap::wrap(content, options).len()
        };

        u16::try_from(lines)
            .unwrap_or(u16::MAX)
            .max(1)
            .saturating_add(VERTICAL_OVERHEAD)
    }
}

/// Assistant replies are markdown; what the user typed is shown as typed.
fn body(message: &ChatMessage) -> Paragraph<'_> {
    let content = message.content.trim();
    match message.role {
        Role::Assistant => Paragraph::new(markdown::render(content, Color::Blue))
            .wrap(Wrap { trim: false }),
        _ => Paragraph::new(content)
            .style(role_style(message.role))
            .wrap(Wrap { trim: true }),
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn role_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Green),
        Role::Assistant => Style::default().fg(Color::Blue),
        Role::System => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    }
}

impl<'a> Widget for Message<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = role_style(self.message.role);
        let border_style = if self.is_open {
            style.add_modifier(Modifier::BOLD)
        } else {
            style.add_modifier(Modifier::DIM)
        };

        let time = self.message.timestamp.with_timezone(&Local).format("%H:%M");
        let title = format!("{} · {}", role_label(self.message.role), time);

        let block = Block::bordered()
            .title(title)
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title_style(border_style)
            .padding(Padding::horizontal(CONTENT_PAD_H));

        let inner_area = block.inner(area);
        block.render(area, buf);

        body(self.message).render(inner_area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculate_height_empty_placeholder_is_border_only() {
        let message = ChatMessage::assistant("");
        assert_eq!(Message::calculate_height(&message, 80), VERTICAL_OVERHEAD);
    }

    #[test]
    fn calculate_height_zero_width_returns_minimum() {
        let message = ChatMessage::user("Hello world");
        assert_eq!(Message::calculate_height(&message, HORIZONTAL_OVERHEAD), 1);
    }

    #[test]
    fn calculate_height_wraps_at_width_boundary() {
        let message = ChatMessage::user("Hello world");
        // content_width = 5 → "Hello" | "world"
        assert_eq!(Message::calculate_height(&message, 9), 2 + VERTICAL_OVERHEAD);
    }

    #[test]
    fn calculate_height_grows_while_streaming() {
        let mut message = ChatMessage::assistant("Hi");
        let before = Message::calculate_height(&message, 14);
        message.content.push_str(" there, this reply keeps going");
        assert!(Message::calculate_height(&message, 14) > before);
    }

    #[test]
    fn calculate_height_saturates_instead_of_wrapping() {
        let message = ChatMessage::user("x\n".repeat(70_000));
        assert_eq!(Message::calculate_height(&message, 40), u16::MAX);
    }

    #[test]
    fn calculate_height_counts_markdown_lines() {
        // "# Title", blank, ╭──, │ code, ╰──
        let message = ChatMessage::assistant("# Title\n\n```\ncode\n```");
        assert_eq!(Message::calculate_height(&message, 40), 5 + VERTICAL_OVERHEAD);
    }

    #[test]
    fn assistant_reply_renders_markdown() {
        let message = ChatMessage::assistant("# Title\n\nSome **bold** text\n\n```\nlet x = 1;\n```");
        let height = Message::calculate_height(&message, 40);
        let area = Rect::new(0, 0, 40, height);
        let mut buf = Buffer::empty(area);
        Message::new(&message, false).render(area, &mut buf);

        let rows: Vec<String> = (0..height)
            .map(|y| (0..40).map(|x| buf[(x, y)].symbol()).collect())
            .collect();
        assert!(rows.iter().any(|r| r.contains("# Title")));
        assert!(rows.iter().any(|r| r.contains("Some bold text")));
        assert!(rows.iter().any(|r| r.contains("╭──")));
        assert!(rows.iter().any(|r| r.contains("│ let x = 1;")));
        assert!(!rows.iter().any(|r| r.contains("```")));
        // Bottom border sits on the last row: nothing was clipped.
        assert!(rows[height as usize - 1].contains('╰'));
    }

    #[test]
    fn user_message_is_not_markdown() {
        let message = ChatMessage::user("# not a heading");
        let area = Rect::new(0, 0, 40, 3);
        let mut buf = Buffer::empty(area);
        Message::new(&message, false).render(area, &mut buf);
        let row: String = (0..40).map(|x| buf[(x, 1)].symbol()).collect();
        assert!(row.contains("# not a heading"));
    }

    #[test]
    fn styles_per_role() {
        assert_eq!(role_style(Role::User).fg, Some(Color::Green));
        assert_eq!(role_style(Role::Assistant).fg, Some(Color::Blue));
        assert_eq!(role_label(Role::Assistant), "assistant");
    }
}
