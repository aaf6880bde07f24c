//! Locally library exports for testing

pub mod api;
pub mod core;
pub mod stream;
pub mod tui;

#[cfg(test)]
pub mod test_support;
