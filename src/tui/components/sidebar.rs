//! # Sidebar Component
//!
//! The conversation list: browse, search, rename, delete. Tab moves focus
//! here, Ctrl+B collapses it to a thin strip.
//!
//! Follows the persistent state + transient wrapper pattern:
//! - `SidebarState` lives in `TuiState`
//! - `Sidebar` is created each frame with borrowed state and props

use chrono::{DateTime, Utc};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, List, ListItem, ListState, Padding, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::api::Conversation;
use crate::core::conversations::{ConversationList, relative_time};
use crate::tui::component::Component;
use crate::tui::event::TuiEvent;

pub const EXPANDED_WIDTH: u16 = 32;
pub const COLLAPSED_WIDTH: u16 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarMode {
    Browse,
    /// Typing into the search field
    Search,
    /// Editing the title of conversation `id`
    Rename { id: String, buffer: String },
}

/// Events emitted by the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarEvent {
    Select(String),
    Rename { id: String, title: String },
    Delete(String),
    /// Hand focus back to the input box
    Leave,
}

pub struct SidebarState {
    pub collapsed: bool,
    pub mode: SidebarMode,
    pub search: String,
    pub selected: usize,
    pub confirm_delete: bool,
    pub list_state: ListState,
}

impl Default for SidebarState {
    fn default() -> Self {
        Self::new()
    }
}

impl SidebarState {
    pub fn new() -> Self {
        Self {
            collapsed: false,
            mode: SidebarMode::Browse,
            search: String::new(),
            selected: 0,
            confirm_delete: false,
            list_state: ListState::default(),
        }
    }

    pub fn width(&self) -> u16 {
        if self.collapsed {
            COLLAPSED_WIDTH
        } else {
            EXPANDED_WIDTH
        }
    }

    pub fn toggle_collapsed(&mut self) {
        self.collapsed = !self.collapsed;
        self.mode = SidebarMode::Browse;
        self.confirm_delete = false;
    }

    /// Keeps `selected` inside the visible (filtered) range.
    fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
        self.list_state
            .select(if len == 0 { None } else { Some(self.selected) });
    }

    /// Handle a key event while the sidebar has focus.
    pub fn handle_event(
        &mut self,
        event: &TuiEvent,
        conversations: &ConversationList,
    ) -> Option<SidebarEvent> {
        match &mut self.mode {
            SidebarMode::Search => {
                match event {
                    TuiEvent::InputChar(c) => {
                        self.search.push(*c);
                        self.selected = 0;
                    }
                    TuiEvent::Paste(text) => {
                        self.search.push_str(text.trim());
                        self.selected = 0;
                    }
                    TuiEvent::Backspace => {
                        self.search.pop();
                    }
                    TuiEvent::Submit => self.mode = SidebarMode::Browse,
                    TuiEvent::Escape => {
                        self.search.clear();
                        self.mode = SidebarMode::Browse;
                    }
                    _ => {}
                }
                let len = conversations.filtered(&self.search).len();
                self.clamp(len);
                None
            }
            SidebarMode::Rename { id, buffer } => match event {
                TuiEvent::InputChar(c) => {
                    buffer.push(*c);
                    None
                }
                TuiEvent::Backspace => {
                    buffer.pop();
                    None
                }
                TuiEvent::Submit => {
                    let event = SidebarEvent::Rename {
                        id: std::mem::take(id),
                        title: std::mem::take(buffer),
                    };
                    self.mode = SidebarMode::Browse;
                    Some(event)
                }
                TuiEvent::Escape => {
                    self.mode = SidebarMode::Browse;
                    None
                }
                _ => None,
            },
            SidebarMode::Browse => self.handle_browse(event, conversations),
        }
    }

    fn handle_browse(
        &mut self,
        event: &TuiEvent,
        conversations: &ConversationList,
    ) -> Option<SidebarEvent> {
        // Reset delete confirmation on any non-delete key
        if !matches!(event, TuiEvent::InputChar('d')) {
            self.confirm_delete = false;
        }

        let visible = conversations.filtered(&self.search);
        self.clamp(visible.len());
        let current = visible.get(self.selected).copied();

        match event {
            TuiEvent::Escape | TuiEvent::SwitchFocus => Some(SidebarEvent::Leave),
            TuiEvent::CursorUp => {
                self.selected = self.selected.saturating_sub(1);
                self.clamp(visible.len());
                None
            }
            TuiEvent::CursorDown => {
                self.selected += 1;
                self.clamp(visible.len());
                None
            }
            TuiEvent::Submit => current.map(|c| SidebarEvent::Select(c.id.clone())),
            TuiEvent::InputChar('/') => {
                self.mode = SidebarMode::Search;
                None
            }
            TuiEvent::InputChar('r') => {
                if let Some(c) = current {
                    self.mode = SidebarMode::Rename {
                        id: c.id.clone(),
                        buffer: c.title.clone(),
                    };
                }
                None
            }
            TuiEvent::InputChar('d') => {
                let c = current?;
                if self.confirm_delete {
                    self.confirm_delete = false;
                    Some(SidebarEvent::Delete(c.id.clone()))
                } else {
                    self.confirm_delete = true;
                    None
                }
            }
            _ => None,
        }
    }

    fn help_text(&self) -> &'static str {
        match self.mode {
            SidebarMode::Search => " Enter keep  Esc clear ",
            SidebarMode::Rename { .. } => " Enter save  Esc cancel ",
            SidebarMode::Browse if self.confirm_delete => " d again to delete ",
            SidebarMode::Browse => " / find  r rename  d del ",
        }
    }
}

/// Transient render wrapper for the sidebar.
pub struct Sidebar<'a> {
    pub state: &'a mut SidebarState,
    pub conversations: &'a ConversationList,
    pub active_id: Option<&'a str>,
    pub focused: bool,
    pub loading: bool,
    pub now: DateTime<Utc>,
}

impl<'a> Sidebar<'a> {
    fn item(&self, conv: &Conversation, index: usize, width: usize) -> ListItem<'static> {
        let is_active = self.active_id == Some(conv.id.as_str());
        let marker = if is_active { "● " } else { "  " };

        let title = match &self.state.mode {
            SidebarMode::Rename { id, buffer } if *id == conv.id => format!("{buffer}▏"),
            _ => conv.title.clone(),
        };
        let title = truncate_to_width(&title, width.saturating_sub(2));

        let mut title_style = Style::default().fg(if is_active { Color::Cyan } else { Color::Gray });
        if self.focused && index == self.state.selected && self.state.confirm_delete {
            title_style = title_style.fg(Color::Red);
        }

        ListItem::new(vec![
            Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Cyan)),
                Span::styled(title, title_style),
            ]),
            Line::from(Span::styled(
                format!("  {}", relative_time(conv.updated_at, self.now)),
                Style::default().fg(Color::DarkGray),
            )),
        ])
    }
}

impl<'a> Component for Sidebar<'a> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let border_color = if self.focused {
            Color::Cyan
        } else {
            Color::DarkGray
        };

        if self.state.collapsed {
            let block = Block::bordered()
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(border_color));
            frame.render_widget(Paragraph::new("»").block(block), area);
            return;
        }

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color))
            .title(" Conversations ")
            .title_bottom(Line::from(self.state.help_text()).centered())
            .padding(Padding::horizontal(1));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [search_area, list_area] =
            Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(inner);

        let search_style = if self.state.mode == SidebarMode::Search {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let search_text = if self.state.search.is_empty() && self.state.mode != SidebarMode::Search {
            "/ search".to_string()
        } else {
            format!("/ {}", self.state.search)
        };
        frame.render_widget(Paragraph::new(search_text).style(search_style), search_area);

        let visible = self.conversations.filtered(&self.state.search);
        if visible.is_empty() {
            let text = if self.loading {
                "Loading conversations..."
            } else if !self.state.search.trim().is_empty() {
                "No conversations found"
            } else {
                "No conversations yet"
            };
            frame.render_widget(
                Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
                list_area,
            );
            return;
        }

        let width = list_area.width as usize;
        let items: Vec<ListItem> = visible
            .iter()
            .enumerate()
            .map(|(i, conv)| self.item(conv, i, width))
            .collect();

        let highlight = if self.focused {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        self.state.clamp(items.len());
        let list = List::new(items).highlight_style(highlight);
        frame.render_stateful_widget(list, list_area, &mut self.state.list_state);
    }
}

/// Truncate `s` to at most `max_width` terminal columns, adding "…" if cut.
fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}
