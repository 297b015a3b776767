//! Response mailbox
//!
//! Holds firmware text lines that matched a configured template, one at a
//! time. Consumers read [`ResponseMailbox::peek`] and call
//! [`ResponseMailbox::clear_and_advance`] once they are done with it; lines
//! that arrive in the meantime wait in arrival order.

use std::collections::VecDeque;

use kv_core::config::ResponseTemplates;

/// Outcome of [`ResponseMailbox::offer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Became the current item
    Current,
    /// Queued behind the current item
    Queued,
    /// Matched no template (or was empty) and was dropped
    Rejected,
}

/// One current item plus an overflow FIFO
#[derive(Debug, Default)]
pub struct ResponseMailbox {
    current: Option<String>,
    pending: VecDeque<String>,
}

impl ResponseMailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `text` if it matches one of `templates` verbatim
    pub fn offer(&mut self, text: &str, templates: &ResponseTemplates) -> Offer {
        if text.is_empty() {
            return Offer::Rejected;
        }
        let Some(hit) = templates.find(text) else {
            tracing::debug!("Dropping unmatched response: {:?}", text);
            return Offer::Rejected;
        };
        tracing::debug!(
            "Response {:?} matched {}.{}",
            text,
            hit.category,
            hit.identifier
        );

        if self.current.is_none() {
            self.current = Some(text.to_string());
            Offer::Current
        } else {
            self.pending.push_back(text.to_string());
            Offer::Queued
        }
    }

    /// Drop the current item and promote the oldest queued one
    pub fn clear_and_advance(&mut self) -> Option<&str> {
        self.current = self.pending.pop_front();
        self.current.as_deref()
    }

    /// Current item
    pub fn peek(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Whether a current item is waiting to be consumed
    pub fn has_pending(&self) -> bool {
        self.current.is_some()
    }

    /// Items waiting behind the current one, oldest first
    pub fn queued(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.current = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn templates() -> ResponseTemplates {
        let mut t = ResponseTemplates::new();
        t.insert("filament", "runout", "A");
        t.insert("filament", "runout", "B");
        t.insert("macros", "park", "C");
        t
    }

    #[test]
    fn test_fifo_order() {
        let t = templates();
        let mut mailbox = ResponseMailbox::new();

        assert_eq!(mailbox.offer("A", &t), Offer::Current);
        assert_eq!(mailbox.offer("B", &t), Offer::Queued);
        assert_eq!(mailbox.peek(), Some("A"));
        assert_eq!(mailbox.queued().collect::<Vec<_>>(), vec!["B"]);

        assert_eq!(mailbox.clear_and_advance(), Some("B"));
        assert_eq!(mailbox.queued().count(), 0);

        assert_eq!(mailbox.clear_and_advance(), None);
        assert!(!mailbox.has_pending());
    }

    #[test]
    fn test_burst_is_delivered_in_order() {
        let t = templates();
        let mut mailbox = ResponseMailbox::new();
        for text in ["C", "A", "B", "A"] {
            mailbox.offer(text, &t);
        }

        let mut seen = vec![mailbox.peek().unwrap().to_string()];
        while let Some(next) = mailbox.clear_and_advance() {
            seen.push(next.to_string());
        }
        assert_eq!(seen, vec!["C", "A", "B", "A"]);
    }

    #[test]
    fn test_unmatched_text_changes_nothing() {
        let t = templates();
        let mut mailbox = ResponseMailbox::new();
        assert_eq!(mailbox.offer("ok", &t), Offer::Rejected);
        assert_eq!(mailbox.offer("", &t), Offer::Rejected);
        assert!(!mailbox.has_pending());

        mailbox.offer("A", &t);
        assert_eq!(mailbox.offer("a", &t), Offer::Rejected);
        assert_eq!(mailbox.peek(), Some("A"));
        assert_eq!(mailbox.queued().count(), 0);
    }

    #[test]
    fn test_empty_templates_admit_nothing() {
        let mut mailbox = ResponseMailbox::new();
        assert_eq!(mailbox.offer("A", &ResponseTemplates::new()), Offer::Rejected);
    }

    #[test]
    fn test_clear() {
        let t = templates();
        let mut mailbox = ResponseMailbox::new();
        mailbox.offer("A", &t);
        mailbox.offer("B", &t);
        mailbox.clear();
        assert_eq!(mailbox.peek(), None);
        assert_eq!(mailbox.clear_and_advance(), None);
    }
}
