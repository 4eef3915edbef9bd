use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a subscription (one live role/trigger binding).
pub type SubscriptionId = Uuid;

/// Identity of a role instance, assigned once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The kind of action that caused a message.
///
/// Every message carries one, and roles route on it: a role watches a set of
/// kinds and maps each to the capability it should run next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// A requirement coming from outside the system (a user, or a trigger firing).
    UserRequirement,
    /// Structured parse of a subscription requirement.
    ParseSubRequirement,
    /// Generated per-URL crawler code.
    WriteCrawlerCode,
    /// Binding of a synthesized crawl to a schedule.
    RunSubscription,
    /// One run of a synthesized crawl.
    SubAction,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::UserRequirement,
        ActionKind::ParseSubRequirement,
        ActionKind::WriteCrawlerCode,
        ActionKind::RunSubscription,
        ActionKind::SubAction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::UserRequirement => "UserRequirement",
            ActionKind::ParseSubRequirement => "ParseSubRequirement",
            ActionKind::WriteCrawlerCode => "WriteCrawlerCode",
            ActionKind::RunSubscription => "RunSubscription",
            ActionKind::SubAction => "SubAction",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown action kind '{s}'"))
    }
}
