//! A group of roles that pass messages to each other until nothing is left
//! to do.

use std::collections::VecDeque;

use herald_core::{Message, Result, RoleId};
use herald_memory::Memory;
use tracing::{debug, info, warn};

use crate::role::Role;

pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Routes every produced message to each member that watches its cause,
/// other than the member that produced it. Producers are told apart by
/// [`RoleId`], so members may share a profile.
///
/// A round delivers the messages produced in the previous round. The team
/// stops when a round produces nothing or after `max_rounds` rounds.
pub struct Team {
    roles: Vec<Role>,
    history: Memory,
    max_rounds: usize,
}

impl Default for Team {
    fn default() -> Self {
        Self::new()
    }
}

impl Team {
    pub fn new() -> Self {
        Self {
            roles: Vec::new(),
            history: Memory::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn hire(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Every message seen by the team, the initial requirement included.
    pub fn history(&self) -> &Memory {
        &self.history
    }

    /// Post `requirement` and run rounds until the team is quiet.
    ///
    /// Returns the messages the roles produced, in order. The first role
    /// error stops the run and is returned as is.
    pub async fn run(&mut self, requirement: impl Into<String>) -> Result<Vec<Message>> {
        // Each pending message carries the id of the member that produced it.
        let mut pending: VecDeque<(Option<RoleId>, Message)> =
            VecDeque::from([(None, Message::new(requirement))]);
        let mut produced = Vec::new();

        for round in 1..=self.max_rounds {
            if pending.is_empty() {
                break;
            }
            debug!(round, messages = pending.len(), "team round");
            let mut next = VecDeque::new();

            while let Some((producer, message)) = pending.pop_front() {
                self.history.append(message.clone());
                for role in &mut self.roles {
                    let from_self = producer == Some(role.id());
                    if from_self || !role.is_watching(message.cause_by()) {
                        continue;
                    }
                    if let Some(output) = role.run(Some(message.clone())).await? {
                        info!(round, role = %role, cause = %output.cause_by(), "role produced a message");
                        next.push_back((Some(role.id()), output.clone()));
                        produced.push(output);
                    }
                }
            }
            pending = next;
        }

        if !pending.is_empty() {
            warn!(
                max_rounds = self.max_rounds,
                undelivered = pending.len(),
                "team stopped at round limit"
            );
            self.history.extend(pending.into_iter().map(|(_, message)| message));
        }
        Ok(produced)
    }
}
