//! Back-office views over the store.

use crate::billing::{Feature, Plan};
use crate::error::Result;
use crate::store::{Account, Store};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
    pub accounts: usize,
    pub suspended_accounts: usize,
    pub accounts_by_plan: BTreeMap<String, usize>,
    pub workspaces: usize,
    pub prompts: usize,
    pub versions: usize,
    pub pending_corrections: usize,
    pub test_sessions: usize,
    pub active_share_links: usize,
    pub monthly_usage: BTreeMap<String, u32>,
}

pub struct AdminConsole<'a> {
    store: &'a Store,
}

impl<'a> AdminConsole<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn dashboard(&self, now: DateTime<Utc>) -> Dashboard {
        let accounts = self.store.accounts.filter(|_| true).await;
        let prompts = self.store.prompts.filter(|_| true).await;

        let mut dash = Dashboard {
            accounts: accounts.len(),
            suspended_accounts: accounts.iter().filter(|a| a.suspended).count(),
            workspaces: self.store.workspaces.len().await,
            prompts: prompts.len(),
            versions: prompts.iter().map(|p| p.history.len()).sum(),
            pending_corrections: prompts.iter().map(|p| p.feedback.pending().len()).sum(),
            test_sessions: self.store.sessions.len().await,
            active_share_links: self.store.shares.count(|l| l.is_active(now)).await,
            ..Dashboard::default()
        };

        for account in &accounts {
            *dash.accounts_by_plan.entry(format!("{:?}", account.plan)).or_insert(0) += 1;
            for feature in [Feature::Generation, Feature::Optimization, Feature::TestMessage] {
                *dash.monthly_usage.entry(feature.to_string()).or_insert(0) += account.usage.monthly_total(feature, now);
            }
        }
        dash
    }

    pub async fn list_accounts(&self) -> Vec<Account> {
        let mut accounts = self.store.accounts.filter(|_| true).await;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.email.cmp(&b.email)));
        accounts
    }

    pub async fn set_plan(&self, account: Uuid, plan: Plan) -> Result<()> {
        self.store
            .accounts
            .update(account, |a| {
                log::info!("Plan change for {}: {:?} -> {:?}", a.email, a.plan, plan);
                a.plan = plan;
                Ok(())
            })
            .await
    }

    pub async fn suspend(&self, account: Uuid) -> Result<()> {
        self.set_suspended(account, true).await
    }

    pub async fn reinstate(&self, account: Uuid) -> Result<()> {
        self.set_suspended(account, false).await
    }

    async fn set_suspended(&self, account: Uuid, suspended: bool) -> Result<()> {
        self.store
            .accounts
            .update(account, |a| {
                a.suspended = suspended;
                log::warn!("Account {} suspended={suspended}", a.email);
                Ok(())
            })
            .await
    }
}
