//! The `!command` lookup table and the dispatch decision.
use std::collections::HashMap;

/// The leading character that marks a chat message as a command.
pub const TRIGGER_SIGIL: char = '!';

/// Trigger-to-reply mapping. Keys carry the sigil (`"!help"`). Populated by
/// an external admin surface; from here it is read-only apart from the
/// one-time default seeding.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    entries: HashMap<String, String>,
}

impl CommandTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, trigger: K, reply: V) {
        self.entries.insert(trigger.into(), reply.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seeds the boot defaults, only when the table holds nothing yet.
    pub fn seed_defaults(&mut self) {
        if !self.is_empty() {
            return;
        }
        self.insert("!help", "Commands start with '!'. Try !commands.");
        self.insert("!commands", "!help !commands !hello");
        self.insert("!hello", "Hello from MrLarbin!");
    }

    /// Looks a trigger up, exact match first, then an ASCII
    /// case-insensitive pass for typing variance.
    #[must_use]
    pub fn lookup(&self, trigger: &str) -> Option<&str> {
        if let Some(reply) = self.entries.get(trigger) {
            return Some(reply);
        }
        self.entries
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(trigger))
            .map(|(_, reply)| reply.as_str())
    }

    /// The dispatch decision for one chat message: trim it, require the
    /// sigil, take the first word as the trigger. Pure; the caller does the
    /// sending.
    #[must_use]
    pub fn dispatch(&self, text: &str) -> Option<&str> {
        let text = text.trim();
        if !text.starts_with(TRIGGER_SIGIL) {
            return None;
        }
        let trigger = text.split_whitespace().next()?;
        self.lookup(trigger)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CommandTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(entries: I) -> Self {
        CommandTable {
            entries: entries
                .into_iter()
                .map(|(trigger, reply)| (trigger.into(), reply.into()))
                .collect(),
        }
    }
}
