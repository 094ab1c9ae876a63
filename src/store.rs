//! In-process persistence for accounts, workspaces, prompts, test sessions and
//! share links.

use crate::billing::{Plan, UsageMeter};
use crate::chat::ChatSession;
use crate::core::feedback::FeedbackLog;
use crate::core::form::PromptForm;
use crate::core::versions::VersionHistory;
use crate::error::{LabError, Result};
use crate::sharing::ShareLink;
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub plan: Plan,
    pub suspended: bool,
    pub usage: UsageMeter,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: &str, plan: Plan) -> Result<Self> {
        let email = email.trim().to_lowercase();
        let valid = email
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.') && !domain.starts_with('.'));
        if !valid {
            return Err(LabError::ValidationFailed(format!("'{email}' is not a valid email address")));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            email,
            plan,
            suspended: false,
            usage: UsageMeter::default(),
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRecord {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub owner: Uuid,
    pub form: PromptForm,
    pub history: VersionHistory,
    pub feedback: FeedbackLog,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptRecord {
    pub fn new(workspace_id: Uuid, owner: Uuid, form: PromptForm) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            owner,
            form,
            history: VersionHistory::default(),
            feedback: FeedbackLog::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A keyed collection behind an async lock. Reads hand out clones; writes go
/// through closures so the lock is never held across an await.
pub struct Table<T> {
    kind: &'static str,
    rows: RwLock<HashMap<Uuid, T>>,
}

impl<T: Clone> Table<T> {
    fn new(kind: &'static str) -> Self {
        Self { kind, rows: RwLock::new(HashMap::new()) }
    }

    pub async fn insert(&self, id: Uuid, row: T) {
        self.rows.write().await.insert(id, row);
    }

    pub async fn get(&self, id: Uuid) -> Result<T> {
        self.rows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| LabError::NotFound(format!("{} {id}", self.kind)))
    }

    pub async fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&id)
            .ok_or_else(|| LabError::NotFound(format!("{} {id}", self.kind)))?;
        f(row)
    }

    pub async fn remove(&self, id: Uuid) -> Result<T> {
        self.rows
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| LabError::NotFound(format!("{} {id}", self.kind)))
    }

    pub async fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows.read().await.values().filter(|r| pred(r)).cloned().collect()
    }

    pub async fn count(&self, pred: impl Fn(&T) -> bool) -> usize {
        self.rows.read().await.values().filter(|r| pred(r)).count()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

pub struct Store {
    pub accounts: Table<Account>,
    pub workspaces: Table<Workspace>,
    pub prompts: Table<PromptRecord>,
    pub sessions: Table<ChatSession>,
    pub shares: Table<ShareLink>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            accounts: Table::new("account"),
            workspaces: Table::new("workspace"),
            prompts: Table::new("prompt"),
            sessions: Table::new("chat session"),
            shares: Table::new("share link"),
        }
    }
}

impl Store {
    pub async fn account_by_email(&self, email: &str) -> Option<Account> {
        let email = email.trim().to_lowercase();
        self.accounts.filter(|a| a.email == email).await.into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalised_and_checked() {
        let a = Account::new(" Ana@Clinic.io ", Plan::Free).unwrap();
        assert_eq!(a.email, "ana@clinic.io");
        assert!(Account::new("nobody", Plan::Free).is_err());
        assert!(Account::new("a@localhost", Plan::Free).is_err());
    }

    #[tokio::test]
    async fn table_crud() {
        let store = Store::default();
        let a = Account::new("a@b.co", Plan::Pro).unwrap();
        let id = a.id;
        store.accounts.insert(id, a).await;

        assert_eq!(store.accounts.get(id).await.unwrap().plan, Plan::Pro);
        store.accounts.update(id, |a| { a.suspended = true; Ok(()) }).await.unwrap();
        assert!(store.accounts.get(id).await.unwrap().suspended);
        assert_eq!(store.accounts.count(|a| a.suspended).await, 1);
        assert!(store.account_by_email("A@B.co").await.is_some());

        store.accounts.remove(id).await.unwrap();
        let err = store.accounts.get(id).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Not Found: account {id}"));
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let store = Store::default();
        let res = store.prompts.update(Uuid::new_v4(), |_| Ok(())).await;
        assert!(matches!(res, Err(LabError::NotFound(_))));
    }
}
