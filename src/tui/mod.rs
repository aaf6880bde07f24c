//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! and translates keyboard events into core::Action values.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Background work
//!
//! Every request runs on a tokio task and reports back as an `Action` over a
//! std mpsc channel that the loop drains between frames. The chat stream is
//! the only task that is ever aborted: its handles are kept next to the
//! cycle id they belong to and dropped as soon as the session moves on.

mod component;
mod components;
mod event;
mod markdown;
mod ui;

use log::{debug, info, warn};
use std::io::stdout;
use std::sync::mpsc;
use std::time::Duration;

use chrono::Utc;
use crossterm::cursor::{SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
};
use crossterm::execute;
use tokio::task::AbortHandle;

use crate::api::{ApiClient, ApiError, ChatBackend, ChatRequest};
use crate::core::action::{Action, Effect, update};
use crate::core::config::ResolvedConfig;
use crate::core::conversations;
use crate::core::health::spawn_health_monitor;
use crate::core::session::{CycleId, EVENT_BUFFER};
use crate::core::state::App;
use crate::stream::StreamEvent;
use crate::tui::component::EventHandler;
use crate::tui::components::{InputBox, InputEvent, MessageListState, SidebarEvent, SidebarState};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// Which pane receives keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Input,
    Sidebar,
}

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    pub message_list: MessageListState,
    pub input_box: InputBox,
    pub sidebar: SidebarState,
    pub focus: Focus,
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            message_list: MessageListState::new(),
            input_box: InputBox::new(),
            sidebar: SidebarState::new(),
            focus: Focus::Input, // User expects to type immediately
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, steady block cursor)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), DisableMouseCapture, DisableBracketedPaste);
    }
}

/// The transport task of the cycle currently streaming.
struct ActiveChat {
    cycle: CycleId,
    handles: Vec<AbortHandle>,
}

impl ActiveChat {
    fn abort(self) {
        debug!("Aborting transport for cycle {:?}", self.cycle);
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// Runs effects returned by `update` and owns the background tasks.
struct Driver {
    client: ApiClient,
    tx: mpsc::Sender<Action>,
    chat: Option<ActiveChat>,
}

impl Driver {
    /// Applies `action` and performs its effect. Returns true to quit.
    fn dispatch(&mut self, app: &mut App, action: Action) -> bool {
        let effect = update(app, action);
        let quit = self.perform(effect);

        // The session dropped the cycle (switched, deleted, cancelled,
        // finished): its transport has nothing left to deliver
        if let Some(chat) = self.chat.take() {
            if app.session.current_cycle() == Some(chat.cycle) {
                self.chat = Some(chat);
            } else {
                chat.abort();
            }
        }
        quit
    }

    fn perform(&mut self, effect: Effect) -> bool {
        match effect {
            Effect::None => {}
            Effect::Quit => return true,
            Effect::SpawnChat { cycle, request } => {
                if let Some(previous) = self.chat.take() {
                    previous.abort();
                }
                self.chat = Some(spawn_chat(self.client.clone(), cycle, request, self.tx.clone()));
            }
            Effect::CancelChat => {
                if let Some(chat) = self.chat.take() {
                    chat.abort();
                }
            }
            Effect::RefreshConversations => {
                let client = self.client.clone();
                self.spawn(async move {
                    Action::ConversationsLoaded(conversations::fetch_conversations(&client).await)
                });
            }
            Effect::LoadMessages(id) => {
                let client = self.client.clone();
                self.spawn(async move {
                    let messages = conversations::fetch_messages(&client, &id).await;
                    Action::MessagesLoaded { id, messages }
                });
            }
            Effect::Rename { id, title } => {
                let client = self.client.clone();
                self.spawn(async move {
                    let success = conversations::rename(&client, &id, &title).await;
                    Action::Renamed {
                        id,
                        title,
                        success,
                        at: Utc::now(),
                    }
                });
            }
            Effect::Delete(id) => {
                let client = self.client.clone();
                self.spawn(async move {
                    let success = conversations::delete(&client, &id).await;
                    Action::Deleted { id, success }
                });
            }
        }
        false
    }

    /// Runs a one-shot request and posts its resulting action.
    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = Action> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let action = task.await;
            if tx.send(action).is_err() {
                warn!("Failed to deliver background result: receiver dropped");
            }
        });
    }
}

pub fn run(config: ResolvedConfig, legacy_history: bool) -> std::io::Result<()> {
    let client = ApiClient::with_timeout(config.base_url.clone(), config.request_timeout);
    let mut app = App::from_config(&config);
    let mut tui = TuiState::new();

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = match TerminalModeGuard::new() {
        Ok(guard) => Some(guard),
        Err(e) => {
            warn!("Failed to enable terminal modes: {}", e);
            None
        }
    };

    // Channel for actions from background tasks
    let (tx, rx) = mpsc::channel();

    let health_tx = tx.clone();
    let _health_monitor = spawn_health_monitor(
        client.clone(),
        config.health_interval,
        config.health_timeout,
        move |status| {
            let _ = health_tx.send(Action::HealthChanged(status));
        },
    );

    let mut driver = Driver {
        client: client.clone(),
        tx: tx.clone(),
        chat: None,
    };

    driver.dispatch(&mut app, Action::RefreshConversations);
    if legacy_history {
        let client = client.clone();
        driver.spawn(async move {
            let messages = conversations::fetch_legacy_history(&client)
                .await
                .unwrap_or_default();
            Action::HistoryLoaded(messages)
        });
    }

    let mut needs_redraw = true;

    'main: loop {
        if needs_redraw {
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui))?;
            needs_redraw = false;
        }

        // Short poll while a reply streams so deltas show up promptly
        let timeout = if app.session.in_flight() {
            Duration::from_millis(50)
        } else {
            Duration::from_millis(250)
        };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if handle_event(event, &mut app, &mut tui, &mut driver) {
                break 'main;
            }
        }

        // Handle background task actions (stream events, fetch results)
        while let Ok(action) = rx.try_recv() {
            needs_redraw = true;
            debug!("Event loop received: {:?}", action);
            if driver.dispatch(&mut app, action) {
                break 'main;
            }
        }
    }

    if let Some(chat) = driver.chat.take() {
        chat.abort();
    }
    ratatui::restore();
    info!("Locally shutting down");
    Ok(())
}

/// Routes one terminal event. Returns true to quit.
fn handle_event(event: TuiEvent, app: &mut App, tui: &mut TuiState, driver: &mut Driver) -> bool {
    match event {
        TuiEvent::Resize => return false,
        TuiEvent::ForceQuit => return driver.dispatch(app, Action::Quit),
        TuiEvent::NewConversation => {
            tui.message_list = MessageListState::new();
            tui.focus = Focus::Input;
            return driver.dispatch(app, Action::NewConversation);
        }
        TuiEvent::RefreshConversations => {
            return driver.dispatch(app, Action::RefreshConversations);
        }
        TuiEvent::ToggleSidebar => {
            tui.sidebar.toggle_collapsed();
            if tui.sidebar.collapsed {
                tui.focus = Focus::Input;
            }
            return false;
        }
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown => {
            tui.message_list.handle_event(&event);
            return false;
        }
        _ => {}
    }

    match tui.focus {
        Focus::Sidebar => {
            let Some(sidebar_event) = tui.sidebar.handle_event(&event, &app.conversations) else {
                return false;
            };
            match sidebar_event {
                SidebarEvent::Select(id) => {
                    tui.focus = Focus::Input;
                    if app.session.active_conversation() != Some(id.as_str()) {
                        tui.message_list = MessageListState::new();
                    }
                    driver.dispatch(app, Action::SelectConversation(id))
                }
                SidebarEvent::Rename { id, title } => {
                    driver.dispatch(app, Action::RequestRename { id, title })
                }
                SidebarEvent::Delete(id) => driver.dispatch(app, Action::RequestDelete(id)),
                SidebarEvent::Leave => {
                    tui.focus = Focus::Input;
                    false
                }
            }
        }
        Focus::Input => match event {
            TuiEvent::SwitchFocus => {
                if !tui.sidebar.collapsed {
                    tui.focus = Focus::Sidebar;
                }
                false
            }
            TuiEvent::Escape if app.session.in_flight() => driver.dispatch(app, Action::CancelChat),
            _ => {
                tui.input_box.locked = app.session.in_flight();
                match tui.input_box.handle_event(&event) {
                    Some(InputEvent::Submit(text)) => {
                        tui.message_list.stick_to_bottom = true;
                        driver.dispatch(app, Action::Submit(text))
                    }
                    Some(InputEvent::ContentChanged) | None => false,
                }
            }
        },
    }
}

/// Starts the chat stream for `cycle` on two tasks.
///
/// The stream task runs the backend; the forward task relays its events as
/// actions and, once the event channel closes, reports how the stream ended.
/// Only the forward task talks to the loop, so the closing action always
/// comes after the last event.
fn spawn_chat(
    client: ApiClient,
    cycle: CycleId,
    request: ChatRequest,
    tx: mpsc::Sender<Action>,
) -> ActiveChat {
    info!("Spawning chat request for cycle {:?}", cycle);

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<StreamEvent>(EVENT_BUFFER);

    let stream_handle = tokio::spawn(async move { client.stream_chat(request, event_tx).await });
    let stream_abort = stream_handle.abort_handle();

    let forward_handle = tokio::spawn(async move {
        let mut forwarded = 0usize;
        while let Some(event) = event_rx.recv().await {
            forwarded += 1;
            if tx.send(Action::Stream { cycle, event }).is_err() {
                warn!("Failed to forward stream event: receiver dropped");
                return;
            }
        }

        let closing = match stream_handle.await {
            Ok(Ok(())) => Action::StreamClosed { cycle },
            Ok(Err(error)) => Action::StreamFailed { cycle, error },
            Err(e) if e.is_cancelled() => {
                debug!("Stream task for cycle {:?} was aborted", cycle);
                return;
            }
            Err(e) => Action::StreamFailed {
                cycle,
                error: ApiError::Transport(format!("stream task failed: {e}")),
            },
        };
        info!("Cycle {:?}: forwarded {} events", cycle, forwarded);
        if tx.send(closing).is_err() {
            warn!("Failed to send stream closing action: receiver dropped");
        }
    });

    ActiveChat {
        cycle,
        handles: vec![stream_abort, forward_handle.abort_handle()],
    }
}
