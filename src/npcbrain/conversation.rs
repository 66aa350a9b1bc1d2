//! The `conversation` module owns the bounded conversation log of one NPC brain.
//!
//! **Key properties:**
//! - **System prompt pinned**: index 0 is always the original system turn and is never evicted.
//! - **Keep-newest trimming**: once the log grows past `max_turns`, it is collapsed to the
//!   system turn plus the newest `keep_turns` turns, in their original order.
//! - **Single owner**: mutation takes `&mut self`, so one log can only serve one decision at
//!   a time without any internal locking.
//!
//! Trimming is plain truncation. Older turns (including anything the NPC promised or learned
//! about the player in them) are dropped for good; nothing is summarized.
//!
//! ```rust
//! use npcbrain::ConversationLog;
//!
//! let mut log = ConversationLog::new("You are Gillian.", 4, 2).unwrap();
//! for i in 0..5 {
//!     log.append_user(format!("message {}", i));
//! }
//! // The fourth append overflowed the log and left [system, message 2, message 3].
//! assert_eq!(log.len(), 4);
//! assert_eq!(&*log.turns()[1].content, "message 2");
//! ```

use crate::npcbrain::client_wrapper::{Message, Role};
use crate::npcbrain::config::ConfigError;
use std::sync::Arc;

/// Default length above which the log is trimmed.
pub const DEFAULT_MAX_TURNS: usize = 12;
/// Default number of non-system turns kept by a trim.
pub const DEFAULT_KEEP_TURNS: usize = 10;

/// Ordered, bounded sequence of turns with the system prompt first.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    turns: Vec<Message>,
    max_turns: usize,
    keep_turns: usize,
}

impl ConversationLog {
    /// Creates a log holding exactly the system turn.
    ///
    /// `keep_turns` must be at least 1 and smaller than `max_turns`, otherwise trimming would
    /// either empty the log or never shrink it.
    pub fn new(
        system_prompt: impl Into<Arc<str>>,
        max_turns: usize,
        keep_turns: usize,
    ) -> Result<Self, ConfigError> {
        if keep_turns == 0 || keep_turns >= max_turns {
            return Err(ConfigError::InvalidHistoryBounds {
                max_turns,
                keep_turns,
            });
        }
        Ok(ConversationLog {
            turns: vec![Message::new(Role::System, system_prompt)],
            max_turns,
            keep_turns,
        })
    }

    /// Appends a player turn, then trims.
    pub fn append_user(&mut self, content: impl Into<Arc<str>>) {
        self.push(Message::new(Role::User, content));
    }

    /// Appends the model's answer, then trims.
    pub fn append_assistant(&mut self, content: impl Into<Arc<str>>) {
        self.push(Message::new(Role::Assistant, content));
    }

    fn push(&mut self, message: Message) {
        self.turns.push(message);
        self.trim();
    }

    /// Collapses the log to `[system] + newest keep_turns` once it exceeds `max_turns`.
    ///
    /// Returns how many turns were dropped.
    pub fn trim(&mut self) -> usize {
        if self.turns.len() <= self.max_turns {
            return 0;
        }
        let tail_start = self.turns.len() - self.keep_turns;
        let dropped = tail_start - 1;
        self.turns.drain(1..tail_start);
        log::debug!(
            "ConversationLog::trim(): dropped {} turns, {} remain",
            dropped,
            self.turns.len()
        );
        dropped
    }

    /// All turns, system turn first.
    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn system_turn(&self) -> &Message {
        &self.turns[0]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the system turn is always present.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn keep_turns(&self) -> usize {
        self.keep_turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(max: usize, keep: usize, appended: usize) -> ConversationLog {
        let mut log = ConversationLog::new("system", max, keep).unwrap();
        for i in 0..appended {
            if i % 2 == 0 {
                log.append_user(format!("turn {}", i));
            } else {
                log.append_assistant(format!("turn {}", i));
            }
        }
        log
    }

    #[test]
    fn test_new_log_holds_only_system_turn() {
        let log = ConversationLog::new("You are an NPC.", 12, 10).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log.system_turn().role, Role::System);
        assert_eq!(&*log.system_turn().content, "You are an NPC.");
    }

    #[test]
    fn test_invalid_bounds_are_rejected() {
        assert!(ConversationLog::new("s", 12, 0).is_err());
        assert!(ConversationLog::new("s", 10, 10).is_err());
        assert!(ConversationLog::new("s", 5, 8).is_err());
    }

    #[test]
    fn test_no_trim_until_max_is_exceeded() {
        let log = filled(12, 10, 11);
        assert_eq!(log.len(), 12);
    }

    #[test]
    fn test_trim_keeps_system_and_newest_turns() {
        let log = filled(12, 10, 12);
        assert_eq!(log.len(), 11);
        assert_eq!(log.turns()[0].role, Role::System);
        let contents: Vec<&str> = log.turns()[1..].iter().map(|m| &*m.content).collect();
        let expected: Vec<String> = (2..12).map(|i| format!("turn {}", i)).collect();
        assert_eq!(contents, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_system_turn_survives_many_appends() {
        let log = filled(12, 10, 200);
        assert_eq!(log.turns()[0].role, Role::System);
        assert_eq!(&*log.turns()[0].content, "system");
        assert!(log.len() <= 12);
        assert_eq!(&*log.turns().last().unwrap().content, "turn 199");
    }

    #[test]
    fn test_trim_result_length() {
        // Oversized logs built by hand: trim must leave 1 + min(keep, L - 1) turns.
        for extra in 1..20 {
            let mut log = ConversationLog::new("system", 12, 10).unwrap();
            for i in 0..(12 + extra - 1) {
                log.turns.push(Message::new(Role::User, format!("m{}", i)));
            }
            let before: Vec<Arc<str>> = log.turns.iter().map(|m| m.content.clone()).collect();
            let input_len = before.len();
            log.trim();
            assert_eq!(log.len(), 1 + 10usize.min(input_len - 1));
            let tail: Vec<Arc<str>> = log.turns[1..].iter().map(|m| m.content.clone()).collect();
            assert_eq!(tail, before[input_len - 10..].to_vec());
        }
    }
}
