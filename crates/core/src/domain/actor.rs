use std::fmt;

use serde::{Deserialize, Serialize};

/// Role allowed to approve or reject approval requests.
pub const SALES_APPROVAL_MANAGER: &str = "sales_approval_manager";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user on whose behalf an operation runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub roles: Vec<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: UserId(user_id.into()), roles: Vec::new() }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        let wanted = role.trim().to_ascii_lowercase();
        self.roles.iter().any(|held| held.trim().to_ascii_lowercase() == wanted)
    }
}
