//! # TUI Components
//!
//! ## Stateless Components (Props-Based Rendering)
//!
//! - `TitleBar`: conversation title, status message, health chip
//! - `Message`: one transcript entry
//!
//! ## Stateful Components (Event-Driven)
//!
//! - `InputBox`: prompt editor, disabled while a cycle is in flight
//! - `MessageList`: scrollable transcript that follows the streaming reply
//! - `Sidebar`: conversation list with search, rename and delete
//!
//! Components receive external data as props (struct fields), never by
//! reaching into `App`. The event loop copies what each one needs per frame.
//!
//! ```text
//! components/
//! ├── mod.rs           (this file)
//! ├── title_bar.rs
//! ├── message.rs
//! ├── message_list.rs
//! ├── input_box.rs
//! └── sidebar.rs
//! ```

pub mod input_box;
pub mod message;
pub mod message_list;
pub mod sidebar;
mod title_bar;

pub use input_box::{InputBox, InputEvent};
pub use message_list::{MessageList, MessageListState};
pub use sidebar::{Sidebar, SidebarEvent, SidebarState};
pub use title_bar::TitleBar;
