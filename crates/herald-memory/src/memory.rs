use std::collections::HashMap;

use herald_core::{ActionKind, Message};
use tracing::trace;

/// A role's message log.
///
/// Messages are kept in insertion order. Alongside the log sits an index from
/// cause to the positions of the messages it caused; `append` updates both in
/// one step, so the index never disagrees with the log.
#[derive(Debug, Default, Clone)]
pub struct Memory {
    storage: Vec<Message>,
    index: HashMap<ActionKind, Vec<usize>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the end of the log.
    pub fn append(&mut self, message: Message) {
        let position = self.storage.len();
        trace!(
            message_id = %message.id(),
            cause_by = %message.cause_by(),
            position,
            "memory append"
        );
        self.index
            .entry(message.cause_by())
            .or_default()
            .push(position);
        self.storage.push(message);
    }

    /// Append several messages, in order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.append(message);
        }
    }

    /// Every message caused by `cause`, in insertion order.
    pub fn get_by_cause(&self, cause: ActionKind) -> Vec<&Message> {
        self.index
            .get(&cause)
            .map(|positions| positions.iter().map(|&i| &self.storage[i]).collect())
            .unwrap_or_default()
    }

    /// Every message caused by any of `causes`, in insertion order.
    pub fn get_by_causes(&self, causes: &[ActionKind]) -> Vec<&Message> {
        let mut positions: Vec<usize> = causes
            .iter()
            .filter_map(|cause| self.index.get(cause))
            .flatten()
            .copied()
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions.into_iter().map(|i| &self.storage[i]).collect()
    }

    /// The most recent `k` messages, oldest first.
    pub fn latest_n(&self, k: usize) -> &[Message] {
        let start = self.storage.len().saturating_sub(k);
        &self.storage[start..]
    }

    /// The most recently appended message.
    pub fn latest(&self) -> Option<&Message> {
        self.storage.last()
    }

    /// The most recent message caused by `cause`.
    pub fn latest_by_cause(&self, cause: ActionKind) -> Option<&Message> {
        self.index
            .get(&cause)
            .and_then(|positions| positions.last())
            .map(|&i| &self.storage[i])
    }

    /// Number of messages caused by `cause`.
    pub fn count_by_cause(&self, cause: ActionKind) -> usize {
        self.index.get(&cause).map_or(0, Vec::len)
    }

    /// The whole log, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
