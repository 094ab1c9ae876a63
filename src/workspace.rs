use crate::error::{LabError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Editor,
    Owner,
}

/// Tenant boundary: every prompt belongs to exactly one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub owner: Uuid,
    pub members: HashMap<Uuid, Role>,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(owner: Uuid, name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LabError::ValidationFailed("workspace name is required".into()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner,
            members: HashMap::from([(owner, Role::Owner)]),
            created_at: Utc::now(),
        })
    }

    pub fn role_of(&self, account: Uuid) -> Option<Role> {
        self.members.get(&account).copied()
    }

    pub fn can_view(&self, account: Uuid) -> bool {
        self.role_of(account).is_some()
    }

    pub fn can_edit(&self, account: Uuid) -> bool {
        self.role_of(account).is_some_and(|r| r >= Role::Editor)
    }

    pub fn require_view(&self, account: Uuid) -> Result<()> {
        if self.can_view(account) {
            Ok(())
        } else {
            Err(LabError::Forbidden(format!("not a member of workspace '{}'", self.name)))
        }
    }

    pub fn require_edit(&self, account: Uuid) -> Result<()> {
        if self.can_edit(account) {
            Ok(())
        } else {
            Err(LabError::Forbidden(format!("read-only access to workspace '{}'", self.name)))
        }
    }

    pub fn add_member(&mut self, by: Uuid, account: Uuid, role: Role) -> Result<()> {
        self.require_owner(by)?;
        if role == Role::Owner {
            return Err(LabError::ValidationFailed("a workspace has exactly one owner".into()));
        }
        if self.members.contains_key(&account) {
            return Err(LabError::ValidationFailed("account is already a member".into()));
        }
        self.members.insert(account, role);
        Ok(())
    }

    pub fn remove_member(&mut self, by: Uuid, account: Uuid) -> Result<()> {
        self.require_owner(by)?;
        if account == self.owner {
            return Err(LabError::ValidationFailed("the owner cannot be removed".into()));
        }
        self.members
            .remove(&account)
            .map(|_| ())
            .ok_or_else(|| LabError::NotFound(format!("member {account}")))
    }

    fn require_owner(&self, account: Uuid) -> Result<()> {
        if account == self.owner {
            Ok(())
        } else {
            Err(LabError::Forbidden("only the workspace owner can manage members".into()))
        }
    }
}
