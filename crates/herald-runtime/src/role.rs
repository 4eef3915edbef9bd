//! # Roles
//!
//! A role is an actor with a private memory and an ordered list of
//! capabilities. Each call to [`Role::run`] is one perceive → decide → act
//! step:
//!
//! 1. the supplied message (if any) is appended to memory;
//! 2. the cause of the latest message picks a capability, or nothing;
//! 3. the chosen capability runs and its output is appended to memory and
//!    returned.
//!
//! `state` always names the last capability that completed. It moves in the
//! same synchronous step as the output append, so a cancelled or failed act
//! never leaves a half-made transition behind.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use herald_core::{ActionKind, EventBus, HeraldError, Message, Result, RoleId, RuntimeEvent};
use herald_memory::Memory;
use tracing::{debug, info, warn};

use crate::action::{Action, ActionContext};

/// How a watched cause is turned into a capability index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// Explicit table. Selecting the capability that already ran last is a no-op.
    ByCause(HashMap<ActionKind, usize>),
    /// Every watched cause selects capability 0, every time.
    EveryCycle,
}

pub struct Role {
    id: RoleId,
    name: String,
    profile: String,
    goal: String,
    constraints: String,
    actions: Vec<Arc<dyn Action>>,
    watch: HashSet<ActionKind>,
    routing: Routing,
    state: Option<usize>,
    memory: Memory,
    events: Option<EventBus>,
}

impl Role {
    pub fn builder(name: impl Into<String>, profile: impl Into<String>) -> RoleBuilder {
        RoleBuilder::new(name, profile)
    }

    pub fn id(&self) -> RoleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn constraints(&self) -> &str {
        &self.constraints
    }

    /// Index of the last capability that completed.
    pub fn state(&self) -> Option<usize> {
        self.state
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    pub fn action_kinds(&self) -> Vec<ActionKind> {
        self.actions.iter().map(|a| a.kind()).collect()
    }

    pub fn is_watching(&self, cause: ActionKind) -> bool {
        self.watch.contains(&cause)
    }

    /// Publish state changes on `bus` unless the role already has a bus.
    pub fn attach_events(&mut self, bus: EventBus) {
        if self.events.is_none() {
            self.events = Some(bus);
        }
    }

    /// Record a message without reacting to it.
    pub fn perceive(&mut self, message: Message) {
        self.memory.append(message);
    }

    /// Decide which capability the latest message calls for, if any.
    pub fn think(&self) -> Option<usize> {
        let latest = self.memory.latest()?;
        let cause = latest.cause_by();
        if !self.watch.contains(&cause) {
            debug!(role = %self.name, cause = %cause, "cause not watched, ignoring");
            return None;
        }

        match &self.routing {
            Routing::EveryCycle => Some(0),
            Routing::ByCause(table) => {
                let Some(&target) = table.get(&cause) else {
                    warn!(role = %self.name, cause = %cause, "watched cause has no route");
                    return None;
                };
                if self.state == Some(target) {
                    debug!(role = %self.name, state = target, "already in target state, nothing to do");
                    return None;
                }
                Some(target)
            }
        }
    }

    async fn act(&mut self, index: usize) -> Result<Message> {
        let action = Arc::clone(&self.actions[index]);
        debug!(role = %self.name, action = action.name(), "acting");

        let output = {
            let ctx = ActionContext {
                memory: &self.memory,
                name: &self.name,
                profile: &self.profile,
                goal: &self.goal,
                constraints: &self.constraints,
            };
            action.run(&ctx).await?
        };

        // Commit: state, output message and index move together.
        let from = self.state.replace(index);
        let mut message = Message::caused_by(output.content, action.kind()).with_role(&self.profile);
        if let Some(instruct) = output.instruct_content {
            message = message.with_instruct_content(instruct);
        }
        self.memory.append(message.clone());

        if from != Some(index) {
            if let Some(bus) = &self.events {
                bus.publish(RuntimeEvent::RoleStateChanged {
                    role_id: self.id,
                    role: self.name.clone(),
                    from,
                    to: index,
                });
            }
        }
        info!(role = %self.name, action = action.name(), message_id = %message.id(), "action completed");
        Ok(message)
    }

    /// One perceive → decide → act step.
    ///
    /// Returns `Ok(None)` when the role decided not to act. Capability errors
    /// are returned unchanged and leave `state` where it was.
    ///
    /// `state` moves when the capability succeeds, not when the decision is
    /// made, so a cause whose last act failed is retried instead of suppressed.
    pub async fn run(&mut self, message: Option<Message>) -> Result<Option<Message>> {
        if let Some(message) = message {
            self.perceive(message);
        }
        match self.think() {
            Some(index) => self.act(index).await.map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Role")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("profile", &self.profile)
            .field("actions", &self.action_kinds())
            .field("watch", &self.watch)
            .field("routing", &self.routing)
            .field("state", &self.state)
            .field("memory_len", &self.memory.len())
            .finish()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.profile)
    }
}

pub struct RoleBuilder {
    id: Option<RoleId>,
    name: String,
    profile: String,
    goal: String,
    constraints: String,
    actions: Vec<Arc<dyn Action>>,
    watch: Vec<ActionKind>,
    routes: Vec<(ActionKind, usize)>,
    events: Option<EventBus>,
}

impl RoleBuilder {
    fn new(name: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            profile: profile.into(),
            goal: String::new(),
            constraints: String::new(),
            actions: Vec::new(),
            watch: Vec::new(),
            routes: Vec::new(),
            events: None,
        }
    }

    /// Reuse a known identity, e.g. when rebuilding a role after a restart.
    pub fn id(mut self, id: RoleId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn constraints(mut self, constraints: impl Into<String>) -> Self {
        self.constraints = constraints.into();
        self
    }

    pub fn action(self, action: impl Action + 'static) -> Self {
        self.shared_action(Arc::new(action))
    }

    pub fn shared_action(mut self, action: Arc<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn watch(mut self, causes: impl IntoIterator<Item = ActionKind>) -> Self {
        self.watch.extend(causes);
        self
    }

    /// Route `cause` to the capability at `index`.
    pub fn route(mut self, cause: ActionKind, index: usize) -> Self {
        self.routes.push((cause, index));
        self
    }

    pub fn events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn build(self) -> Result<Role> {
        let invalid = |reason: String| HeraldError::InvalidRole {
            name: self.name.clone(),
            reason,
        };

        if self.actions.is_empty() {
            return Err(invalid("a role needs at least one capability".into()));
        }
        let watch: HashSet<ActionKind> = self.watch.iter().copied().collect();

        let routing = if self.routes.is_empty() {
            if self.actions.len() > 1 {
                return Err(invalid(format!(
                    "{} capabilities but no routing table",
                    self.actions.len()
                )));
            }
            Routing::EveryCycle
        } else {
            let mut table = HashMap::new();
            for (cause, index) in &self.routes {
                if *index >= self.actions.len() {
                    return Err(invalid(format!(
                        "route {cause} -> {index} is out of range ({} capabilities)",
                        self.actions.len()
                    )));
                }
                if !watch.contains(cause) {
                    return Err(invalid(format!("route for unwatched cause {cause}")));
                }
                table.insert(*cause, *index);
            }
            Routing::ByCause(table)
        };

        Ok(Role {
            id: self.id.unwrap_or_default(),
            name: self.name,
            profile: self.profile,
            goal: self.goal,
            constraints: self.constraints,
            actions: self.actions,
            watch,
            routing,
            state: None,
            memory: Memory::new(),
            events: self.events,
        })
    }
}
