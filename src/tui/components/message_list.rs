//! # MessageList Component
//!
//! Scrollable view of the transcript.
//!
//! `MessageList` is a transient component (created each frame) that wraps
//! `&'a mut MessageListState` (persistent state) and the messages (props).
//! While the view is pinned to the bottom it follows the streaming reply.
//!
//! ## Layout
//!
//! Message heights are cached per width and summed into prefix heights, so
//! the scroll offset can be mapped to the messages under the viewport with
//! a binary search. Only those messages are drawn: the `ScrollView` canvas
//! holds the visible window, not the whole transcript. Offsets are `usize`
//! because a long transcript easily passes `u16::MAX` rows.

use std::ops::Range;

use chrono::{DateTime, Utc};
use ratatui::Frame;
use ratatui::layout::{Alignment, Position, Rect, Size};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::api::{Message as ChatMessage, Role};
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::Message;
use crate::tui::event::TuiEvent;

/// Scroll state for the message list. Lives in `TuiState`.
pub struct MessageListState {
    /// Inner scroll of the visible window; driven from `offset` each frame
    scroll_state: ScrollViewState,
    /// First transcript row shown at the top of the viewport
    pub offset: usize,
    /// When true, auto-scroll to bottom on new content
    pub stick_to_bottom: bool,
    /// Cached layout measurements
    pub layout: LayoutCache,
    /// Last known viewport height (for scroll clamping between frames)
    pub viewport_height: u16,
}

impl Default for MessageListState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            offset: 0,
            stick_to_bottom: true,
            layout: LayoutCache::new(),
            viewport_height: 0,
        }
    }

    fn max_offset(&self) -> usize {
        self.layout
            .total_height()
            .saturating_sub(self.viewport_height as usize)
    }

    /// Clamp scroll offset so it never exceeds the content bounds.
    pub fn clamp_scroll(&mut self) {
        self.offset = self.offset.min(self.max_offset());
    }

    /// Re-engage auto-scroll once the user has scrolled back to the end.
    pub fn repin_if_at_bottom(&mut self) {
        let max = self.max_offset();
        if self.offset >= max {
            self.stick_to_bottom = true;
            self.offset = max;
        }
    }

    /// True when content continues below the viewport.
    pub fn has_unseen_content(&self) -> bool {
        !self.stick_to_bottom && self.offset < self.max_offset()
    }

    fn scroll_up(&mut self, rows: usize) {
        self.offset = self.offset.saturating_sub(rows);
        self.stick_to_bottom = false;
    }

    fn scroll_down(&mut self, rows: usize) {
        self.offset = self.offset.saturating_add(rows);
        self.repin_if_at_bottom();
    }

    fn page(&self) -> usize {
        (self.viewport_height as usize).max(1)
    }
}

pub struct MessageList<'a> {
    pub state: &'a mut MessageListState,
    pub messages: &'a [ChatMessage],
    /// An assistant reply is still streaming into the last message
    pub is_streaming: bool,
}

impl<'a> MessageList<'a> {
    pub fn new(
        state: &'a mut MessageListState,
        messages: &'a [ChatMessage],
        is_streaming: bool,
    ) -> Self {
        Self {
            state,
            messages,
            is_streaming,
        }
    }
}

impl<'a> Component for MessageList<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        if self.messages.is_empty() {
            self.state.layout.clear();
            self.state.offset = 0;
            let hint = Paragraph::new("Ask anything. Enter to send, Tab for conversations.")
                .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC))
                .alignment(Alignment::Center);
            let middle = Rect::new(area.x, area.y + area.height / 2, area.width, 1);
            frame.render_widget(hint, middle.intersection(area));
            return;
        }

        // 1. Update layout cache
        let content_width = area.width.saturating_sub(1); // -1 for scrollbar
        self.state.layout.update(self.messages, content_width);

        // 2. Resolve the scroll offset
        self.state.viewport_height = area.height;
        if self.state.stick_to_bottom {
            self.state.offset = self.state.max_offset();
        } else {
            self.state.clamp_scroll();
        }
        let offset = self.state.offset;
        let layout = &self.state.layout;
        let visible = layout.visible_range(offset, area.height);

        // 3. Draw the visible window into a ScrollView sized to it
        let window_top = layout.top(visible.start);
        let window_height = layout.top(visible.end) - window_top;
        let canvas_height = u16::try_from(window_height).unwrap_or(u16::MAX);
        let mut scroll_view = ScrollView::new(Size::new(content_width, canvas_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Never)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let last = self.messages.len() - 1;
        for i in visible {
            let message = &self.messages[i];
            let height = layout.heights[i];
            let y = layout.top(i) - window_top;
            let Ok(y) = u16::try_from(y) else { break };
            if y.checked_add(height).is_none_or(|bottom| bottom > canvas_height) {
                break;
            }
            let is_open = self.is_streaming && i == last && message.role == Role::Assistant;
            scroll_view.render_widget(Message::new(message, is_open), Rect::new(0, y, content_width, height));
        }

        let inner = u16::try_from(offset - window_top).unwrap_or(u16::MAX);
        self.state.scroll_state.set_offset(Position { x: 0, y: inner });
        let view_area = Rect {
            width: content_width,
            ..area
        };
        frame.render_stateful_widget(scroll_view, view_area, &mut self.state.scroll_state);

        // 4. Scrollbar over the whole transcript
        let mut scrollbar = ScrollbarState::new(self.state.max_offset())
            .position(offset)
            .viewport_content_length(area.height as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut scrollbar,
        );
    }
}

impl EventHandler for MessageListState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => self.scroll_up(1),
            TuiEvent::ScrollDown => self.scroll_down(1),
            TuiEvent::ScrollPageUp => self.scroll_up(self.page()),
            TuiEvent::ScrollPageDown => self.scroll_down(self.page()),
            _ => {}
        }
        None
    }
}

/// What a cached height was measured from. A message whose key still
/// matches keeps its height.
#[derive(Clone, Copy, PartialEq, Eq)]
struct LayoutKey {
    role: Role,
    timestamp: DateTime<Utc>,
    len: usize,
}

impl LayoutKey {
    fn of(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            timestamp: message.timestamp,
            len: message.content.len(),
        }
    }
}

/// Cached layout measurements
#[derive(Default)]
pub struct LayoutCache {
    pub heights: Vec<u16>,
    /// Running sum of `heights`: entry `i` is the bottom row of message `i`
    pub prefix_heights: Vec<usize>,
    keys: Vec<LayoutKey>,
    content_width: u16,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear(&mut self) {
        self.heights.clear();
        self.prefix_heights.clear();
        self.keys.clear();
    }

    /// Number of leading heights still valid for `messages` at `content_width`.
    fn reusable_count(&self, messages: &[ChatMessage], content_width: u16) -> usize {
        if self.content_width != content_width {
            return 0;
        }
        self.keys
            .iter()
            .zip(messages)
            .take_while(|(key, message)| **key == LayoutKey::of(message))
            .count()
    }

    fn update(&mut self, messages: &[ChatMessage], content_width: u16) {
        let reusable = self.reusable_count(messages, content_width);
        self.heights.truncate(reusable);
        self.keys.truncate(reusable);
        self.prefix_heights.truncate(reusable);

        let mut total = self.total_height();
        for message in &messages[reusable..] {
            let height = Message::calculate_height(message, content_width);
            total += height as usize;
            self.heights.push(height);
            self.keys.push(LayoutKey::of(message));
            self.prefix_heights.push(total);
        }
        self.content_width = content_width;
    }

    pub fn total_height(&self) -> usize {
        self.prefix_heights.last().copied().unwrap_or(0)
    }

    /// Top row of message `i`; `top(len)` is the total height.
    pub fn top(&self, i: usize) -> usize {
        match i {
            0 => 0,
            _ => self.prefix_heights[i - 1],
        }
    }

    /// Messages overlapping rows `offset..offset + viewport_height`.
    pub fn visible_range(&self, offset: usize, viewport_height: u16) -> Range<usize> {
        let end_row = offset.saturating_add(viewport_height as usize);
        let start = self.prefix_heights.partition_point(|&bottom| bottom <= offset);
        let end = self
            .prefix_heights
            .partition_point(|&bottom| bottom < end_row)
            .saturating_add(1)
            .min(self.prefix_heights.len());
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn draw(state: &mut MessageListState, messages: &[ChatMessage], width: u16, height: u16) -> String {
        let backend = TestBackend::new(width, height);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| {
                MessageList::new(state, messages, false).render(f, f.area());
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_empty_transcript_shows_hint() {
        let mut state = MessageListState::new();
        let text = draw(&mut state, &[], 80, 10);
        assert!(text.contains("Ask anything"));
    }

    #[test]
    fn test_renders_messages_and_caches_heights() {
        let mut state = MessageListState::new();
        let messages = vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi there")];
        let text = draw(&mut state, &messages, 60, 12);
        assert!(text.contains("Hello"));
        assert!(text.contains("Hi there"));
        assert_eq!(state.layout.heights, vec![3, 3]);
        assert_eq!(state.layout.prefix_heights, vec![3, 6]);
    }

    #[test]
    fn test_assistant_markdown_is_rendered() {
        let mut state = MessageListState::new();
        let messages = vec![
            ChatMessage::user("Show me"),
            ChatMessage::assistant("## Result\n\n```\nok\n```"),
        ];
        let text = draw(&mut state, &messages, 60, 20);
        assert!(text.contains("## Result"));
        assert!(text.contains("╭──"));
        assert!(text.contains("│ ok"));
        assert!(!text.contains("```"));
    }

    #[test]
    fn test_scroll_up_unpins_and_scroll_down_repins() {
        let mut state = MessageListState::new();
        let messages: Vec<_> = (0..10).map(|i| ChatMessage::user(format!("m{i}"))).collect();
        draw(&mut state, &messages, 40, 6);
        assert!(state.stick_to_bottom);
        assert_eq!(state.offset, 30 - 6);

        state.handle_event(&TuiEvent::ScrollUp);
        assert!(!state.stick_to_bottom);
        assert!(state.has_unseen_content());

        for _ in 0..50 {
            state.handle_event(&TuiEvent::ScrollDown);
        }
        assert!(state.stick_to_bottom);
        assert_eq!(state.offset, 30 - 6);
    }

    #[test]
    fn test_page_up_moves_by_viewport() {
        let mut state = MessageListState::new();
        let messages: Vec<_> = (0..10).map(|i| ChatMessage::user(format!("m{i}"))).collect();
        draw(&mut state, &messages, 40, 6);

        state.handle_event(&TuiEvent::ScrollPageUp);
        assert_eq!(state.offset, 24 - 6);
        for _ in 0..10 {
            state.handle_event(&TuiEvent::ScrollPageUp);
        }
        assert_eq!(state.offset, 0);
        let text = draw(&mut state, &messages, 40, 6);
        assert!(text.contains("m0"));
        assert!(!text.contains("m9"));
    }

    #[test]
    fn test_visible_range_selects_overlapping_messages() {
        let mut cache = LayoutCache::new();
        let messages: Vec<_> = (0..5).map(|i| ChatMessage::user(format!("m{i}"))).collect();
        cache.update(&messages, 40);
        // rows: m0 0..3, m1 3..6, m2 6..9, m3 9..12, m4 12..15
        assert_eq!(cache.visible_range(0, 3), 0..1);
        assert_eq!(cache.visible_range(4, 3), 1..3);
        assert_eq!(cache.visible_range(12, 10), 4..5);
        assert_eq!(cache.top(5), 15);
    }

    #[test]
    fn test_streaming_growth_only_remeasures_changed_tail() {
        let mut cache = LayoutCache::new();
        let mut messages = vec![ChatMessage::user("question"), ChatMessage::assistant("a")];
        cache.update(&messages, 20);
        assert_eq!(cache.reusable_count(&messages, 20), 2);

        messages[1].content.push_str(" much longer reply that now wraps");
        assert_eq!(cache.reusable_count(&messages, 20), 1);
        cache.update(&messages, 20);
        assert!(cache.heights[1] > 3);
        assert_eq!(cache.total_height(), 3 + cache.heights[1] as usize);

        assert_eq!(cache.reusable_count(&messages, 30), 0);
    }

    #[test]
    fn test_transcript_taller_than_u16_rows() {
        // 22,000 three-row messages = 66,000 rows
        let messages: Vec<_> = (0..22_000)
            .map(|i| ChatMessage::user(format!("m{i}")))
            .collect();
        let mut state = MessageListState::new();

        let text = draw(&mut state, &messages, 40, 10);
        assert_eq!(state.layout.total_height(), 66_000);
        assert_eq!(state.offset, 66_000 - 10);
        assert!(text.contains("m21999"));

        for _ in 0..10_000 {
            state.handle_event(&TuiEvent::ScrollPageUp);
        }
        assert_eq!(state.offset, 0);
        let text = draw(&mut state, &messages, 40, 10);
        assert!(text.contains("m0 "));
        assert!(!text.contains("m21999"));

        state.offset = 65_535 + 3;
        let text = draw(&mut state, &messages, 40, 10);
        assert!(text.contains("m21846"));
    }
}
