//! # Conversations
//!
//! The cached conversation listing shown in the sidebar, and the
//! non-streaming calls that keep it in sync with the backend.
//!
//! The wrappers at the bottom never fail: a listing that can't be fetched is
//! empty, a rename that didn't go through is `false`. The caller keeps its
//! previous state and carries on.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::api::{ApiClient, Conversation, Message, Role};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationList {
    items: Vec<Conversation>,
}

impl ConversationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Conversation] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.items.iter().find(|c| c.id == id)
    }

    /// Replaces the cache with a fresh listing, keeping server order.
    pub fn replace(&mut self, items: Vec<Conversation>) {
        debug!("Conversation list replaced ({} entries)", items.len());
        self.items = items;
    }

    /// Updates the title and `updated_at` of the matching entry only.
    pub fn rename(&mut self, id: &str, title: &str, now: DateTime<Utc>) -> bool {
        match self.items.iter_mut().find(|c| c.id == id) {
            Some(conv) => {
                conv.title = title.to_string();
                conv.updated_at = now;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|c| c.id != id);
        self.items.len() != before
    }

    /// Case-insensitive title search. A blank term matches everything.
    pub fn filtered(&self, term: &str) -> Vec<&Conversation> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.items.iter().collect();
        }
        self.items
            .iter()
            .filter(|c| c.title.to_lowercase().contains(&term))
            .collect()
    }
}

/// Returns the title to send, or `None` if the edit should be dropped
/// (blank, or the same as the current title).
pub fn validate_rename(current: &str, proposed: &str) -> Option<String> {
    let proposed = proposed.trim();
    if proposed.is_empty() || proposed == current {
        return None;
    }
    Some(proposed.to_string())
}

/// Short relative timestamp for the sidebar ("5 min ago", "yesterday", "Oct 3").
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let mins = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if mins < 1 {
        "just now".to_string()
    } else if mins < 60 {
        format!("{mins} min ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days == 1 {
        "yesterday".to_string()
    } else if days < 7 {
        format!("{days} days ago")
    } else {
        then.format("%b %-d").to_string()
    }
}

// ============================================================================
// Degrading wrappers
// ============================================================================

pub async fn fetch_conversations(client: &ApiClient) -> Vec<Conversation> {
    match client.list_conversations().await {
        Ok(items) => {
            info!("Fetched {} conversations", items.len());
            items
        }
        Err(e) => {
            warn!("Failed to fetch conversations ({}): {}", e.kind(), e);
            Vec::new()
        }
    }
}

pub async fn fetch_messages(client: &ApiClient, id: &str) -> Vec<Message> {
    match client.conversation_messages(id).await {
        Ok(messages) => {
            debug!("Fetched {} messages for {}", messages.len(), id);
            messages
        }
        Err(e) => {
            warn!("Failed to fetch messages for {} ({}): {}", id, e.kind(), e);
            Vec::new()
        }
    }
}

/// Creates an empty conversation named `title`.
///
/// The view never calls this: sending without a conversation id makes the
/// server create one. Public for library callers.
pub async fn create(client: &ApiClient, title: &str) -> Option<Conversation> {
    match client.create_conversation(title).await {
        Ok(conv) => {
            info!("Created conversation {}", conv.id);
            Some(conv)
        }
        Err(e) => {
            warn!("Failed to create conversation ({}): {}", e.kind(), e);
            None
        }
    }
}

pub async fn rename(client: &ApiClient, id: &str, title: &str) -> bool {
    match client.rename_conversation(id, title).await {
        Ok(success) => {
            if !success {
                warn!("Backend refused rename of {}", id);
            }
            success
        }
        Err(e) => {
            warn!("Failed to rename {} ({}): {}", id, e.kind(), e);
            false
        }
    }
}

pub async fn delete(client: &ApiClient, id: &str) -> bool {
    match client.delete_conversation(id).await {
        Ok(success) => {
            if !success {
                warn!("Backend refused delete of {}", id);
            }
            success
        }
        Err(e) => {
            warn!("Failed to delete {} ({}): {}", id, e.kind(), e);
            false
        }
    }
}

/// The single-conversation history endpoint. System entries are hidden.
pub async fn fetch_legacy_history(client: &ApiClient) -> Option<Vec<Message>> {
    match client.history().await {
        Ok(messages) => Some(
            messages
                .into_iter()
                .filter(|m| m.role != Role::System)
                .collect(),
        ),
        Err(e) => {
            warn!("Failed to fetch history ({}): {}", e.kind(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn conv(id: &str, title: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            title: title.to_string(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn sample() -> ConversationList {
        let mut list = ConversationList::new();
        list.replace(vec![
            conv("a", "Rust lifetimes"),
            conv("b", "Dinner ideas"),
            conv("c", "rustup troubles"),
        ]);
        list
    }

    #[test]
    fn test_rename_touches_only_matching_entry() {
        let mut list = sample();
        let untouched = list.clone();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        assert!(list.rename("b", "Lunch ideas", now));

        let renamed = list.get("b").unwrap();
        assert_eq!(renamed.title, "Lunch ideas");
        assert_eq!(renamed.updated_at, now);
        assert_eq!(list.get("a"), untouched.get("a"));
        assert_eq!(list.get("c"), untouched.get("c"));
    }

    #[test]
    fn test_rename_unknown_id() {
        let mut list = sample();
        assert!(!list.rename("zzz", "x", Utc::now()));
        assert_eq!(list, sample());
    }

    #[test]
    fn test_remove() {
        let mut list = sample();
        assert!(list.remove("a"));
        assert!(!list.remove("a"));
        assert_eq!(list.len(), 2);
        assert!(list.get("a").is_none());
    }

    #[test]
    fn test_filtered_is_case_insensitive() {
        let list = sample();
        let ids: Vec<_> = list.filtered("RUST").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(list.filtered("  ").len(), 3);
        assert!(list.filtered("nothing").is_empty());
    }

    #[test]
    fn test_validate_rename() {
        assert_eq!(validate_rename("Old", "  New  "), Some("New".to_string()));
        assert_eq!(validate_rename("Old", "Old"), None);
        assert_eq!(validate_rename("Old", " Old "), None);
        assert_eq!(validate_rename("Old", "   "), None);
    }

    #[test]
    fn test_relative_time_buckets() {
        let now = Utc.with_ymd_and_hms(2025, 10, 20, 12, 0, 0).unwrap();
        assert_eq!(relative_time(now - Duration::seconds(30), now), "just now");
        assert_eq!(relative_time(now - Duration::minutes(5), now), "5 min ago");
        assert_eq!(relative_time(now - Duration::hours(3), now), "3h ago");
        assert_eq!(relative_time(now - Duration::hours(30), now), "yesterday");
        assert_eq!(relative_time(now - Duration::days(4), now), "4 days ago");
        assert_eq!(relative_time(now - Duration::days(17), now), "Oct 3");
    }
}
