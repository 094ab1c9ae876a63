//! The prompt laboratory: form → Master Prompt → test chat → corrections →
//! optimized prompt, with tenancy, plan gating and rate limiting on every step.

use crate::ai::agents::{PromptAgents, PromptEvaluation, VoiceCommandResponse};
use crate::ai::client::LlmBackend;
use crate::billing::{Feature, Plan, PlanLimits};
use crate::chat::ChatSession;
use crate::config::AppConfig;
use crate::core::feedback::OptimizationPair;
use crate::core::form::{FieldUpdate, PromptForm};
use crate::core::versions::{PromptVersion, VersionSource};
use crate::error::{LabError, Result};
use crate::export::{self, ExportFormat};
use crate::rate_limit::RateLimiter;
use crate::sharing::ShareLink;
use crate::store::{Account, PromptRecord, Store};
use crate::upload;
use crate::workspace::{Role, Workspace};
use chrono::Utc;
use std::num::NonZeroU32;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StudioOptions {
    pub rate_limit: NonZeroU32,
    pub rate_window: Duration,
    pub max_upload_bytes: usize,
}

impl Default for StudioOptions {
    fn default() -> Self {
        Self {
            rate_limit: NonZeroU32::new(20).unwrap_or(NonZeroU32::MIN),
            rate_window: Duration::from_secs(60),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl From<&AppConfig> for StudioOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            rate_limit: config.rate_limit,
            rate_window: config.rate_window,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

pub struct Studio<B> {
    store: Store,
    agents: PromptAgents<B>,
    limiter: RateLimiter,
    max_upload_bytes: usize,
}

impl<B: LlmBackend> Studio<B> {
    pub fn new(backend: B, options: StudioOptions) -> Self {
        Self {
            store: Store::default(),
            agents: PromptAgents::new(backend),
            limiter: RateLimiter::new(options.rate_limit, options.rate_window),
            max_upload_bytes: options.max_upload_bytes,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn agents(&self) -> &PromptAgents<B> {
        &self.agents
    }

    // ----- accounts & workspaces -----

    pub async fn register_account(&self, email: &str, plan: Plan) -> Result<Account> {
        let account = Account::new(email, plan)?;
        if self.store.account_by_email(&account.email).await.is_some() {
            return Err(LabError::ValidationFailed(format!("'{}' is already registered", account.email)));
        }
        self.store.accounts.insert(account.id, account.clone()).await;
        log::info!("Registered account {} on {:?}", account.email, plan);
        Ok(account)
    }

    pub async fn create_workspace(&self, owner: Uuid, name: &str) -> Result<Workspace> {
        let account = self.gate(owner).await?;
        let owned = self.store.workspaces.count(|w| w.owner == owner).await;
        PlanLimits::check_count(account.plan.limits().max_workspaces, owned, "workspaces")?;

        let workspace = Workspace::new(owner, name)?;
        self.store.workspaces.insert(workspace.id, workspace.clone()).await;
        Ok(workspace)
    }

    pub async fn add_workspace_member(&self, by: Uuid, workspace: Uuid, account: Uuid, role: Role) -> Result<()> {
        self.gate(by).await?;
        self.store.accounts.get(account).await?;
        self.store
            .workspaces
            .update(workspace, |w| w.add_member(by, account, role))
            .await
    }

    // ----- prompts -----

    pub async fn create_prompt(&self, account: Uuid, workspace: Uuid, form: PromptForm) -> Result<PromptRecord> {
        let acct = self.gate(account).await?;
        self.store.workspaces.get(workspace).await?.require_edit(account)?;
        form.validate()?;

        let owned = self.store.prompts.count(|p| p.owner == account).await;
        PlanLimits::check_count(acct.plan.limits().max_prompts, owned, "prompts")?;

        let record = PromptRecord::new(workspace, account, form);
        self.store.prompts.insert(record.id, record.clone()).await;
        log::info!("Created prompt {} in workspace {workspace}", record.id);
        Ok(record)
    }

    pub async fn update_form(&self, account: Uuid, prompt: Uuid, form: PromptForm) -> Result<()> {
        self.gate(account).await?;
        self.editable_prompt(account, prompt).await?;
        form.validate()?;
        self.store
            .prompts
            .update(prompt, |p| {
                p.form = form;
                p.updated_at = Utc::now();
                Ok(())
            })
            .await
    }

    pub async fn prompt(&self, account: Uuid, prompt: Uuid) -> Result<PromptRecord> {
        self.gate(account).await?;
        self.viewable_prompt(account, prompt).await
    }
    pub async fn generate(&self, account: Uuid, prompt: Uuid) -> Result<PromptVersion> {
        let acct = self.gate(account).await?;
        let record = self.editable_prompt(account, prompt).await?;
        acct.usage.check(acct.plan, Feature::Generation, Utc::now())?;

        log::info!("Phase 1: generating master prompt for {prompt}");
        let content = self.agents.generate_master_prompt(&record.form).await?;

        let version = self.push_version(prompt, content, VersionSource::Generated, &[]).await?;
        self.record_usage(account, Feature::Generation).await?;
        log::info!("   -> version {} ({} tokens)", version.number, version.tokens);
        Ok(version)
    }

    pub async fn save_manual_version(&self, account: Uuid, prompt: Uuid, content: &str) -> Result<PromptVersion> {
        self.gate(account).await?;
        self.editable_prompt(account, prompt).await?;
        if content.trim().is_empty() {
            return Err(LabError::ValidationFailed("prompt text is empty".into()));
        }
        self.push_version(prompt, content.trim().to_string(), VersionSource::Manual, &[]).await
    }

    pub async fn restore_version(&self, account: Uuid, prompt: Uuid, number: u32) -> Result<PromptVersion> {
        self.gate(account).await?;
        self.editable_prompt(account, prompt).await?;
        self.store
            .prompts
            .update(prompt, |p| {
                p.updated_at = Utc::now();
                p.history.restore(number).cloned()
            })
            .await
    }

    // ----- testing & feedback -----

    pub async fn start_test_chat(&self, account: Uuid, prompt: Uuid) -> Result<ChatSession> {
        self.gate(account).await?;
        let record = self.viewable_prompt(account, prompt).await?;
        let version = record
            .history
            .latest()
            .ok_or_else(|| LabError::ValidationFailed("generate a prompt before testing it".into()))?;

        let session = ChatSession::new(prompt, version.number, account);
        self.store.sessions.insert(session.id, session.clone()).await;
        Ok(session)
    }

    pub async fn send_test_message(&self, account: Uuid, session: Uuid, text: &str) -> Result<String> {
        let acct = self.gate(account).await?;
        if text.trim().is_empty() {
            return Err(LabError::ValidationFailed("message is empty".into()));
        }
        let chat = self.own_session(account, session).await?;
        acct.usage.check(acct.plan, Feature::TestMessage, Utc::now())?;

        let record = self.store.prompts.get(chat.prompt_id).await?;
        let prompt_text = record
            .history
            .get(chat.version)
            .map(|v| v.content.clone())
            .ok_or_else(|| LabError::NotFound(format!("version {}", chat.version)))?;

        log::debug!("Test chat {session}: {} prior messages", chat.messages.len());
        let reply = self.agents.reply_as_agent(&prompt_text, &chat.turns(), text.trim()).await?;

        self.store
            .sessions
            .update(session, |s| {
                s.push_user(text.trim());
                s.push_agent(reply.clone());
                Ok(())
            })
            .await?;
        self.record_usage(account, Feature::TestMessage).await?;
        Ok(reply)
    }

    pub async fn add_correction(
        &self,
        account: Uuid,
        prompt: Uuid,
        query: &str,
        bad_response: &str,
        corrected_response: &str,
    ) -> Result<OptimizationPair> {
        self.gate(account).await?;
        self.editable_prompt(account, prompt).await?;
        self.store
            .prompts
            .update(prompt, |p| p.feedback.add(query, bad_response, corrected_response).cloned())
            .await
    }

    /// Turns the session's latest agent reply into an Optimization Pair.
    pub async fn correct_last_reply(&self, account: Uuid, session: Uuid, corrected: &str) -> Result<OptimizationPair> {
        let chat = self.own_session(account, session).await?;
        let (query, bad) = chat
            .last_exchange()
            .ok_or_else(|| LabError::ValidationFailed("the session has no agent reply to correct".into()))?;
        self.add_correction(account, chat.prompt_id, query, bad, corrected).await
    }

    pub async fn optimize(&self, account: Uuid, prompt: Uuid) -> Result<PromptVersion> {
        let acct = self.gate(account).await?;
        let record = self.editable_prompt(account, prompt).await?;
        acct.usage.check(acct.plan, Feature::Optimization, Utc::now())?;

        let pending = record.feedback.pending();
        if pending.is_empty() {
            return Err(LabError::ValidationFailed("add at least one correction before optimizing".into()));
        }
        let current = record
            .history
            .latest()
            .ok_or_else(|| LabError::ValidationFailed("generate a prompt before optimizing it".into()))?;

        log::info!("Phase 2: optimizing v{} of {prompt} with {} corrections", current.number, pending.len());
        let improved = self.agents.optimize_prompt(&current.content, &pending).await?;

        let version = self.push_version(prompt, improved, VersionSource::Optimized, &pending).await?;
        self.record_usage(account, Feature::Optimization).await?;
        log::info!("   -> version {} ({} tokens)", version.number, version.tokens);
        Ok(version)
    }

    pub async fn evaluate(&self, account: Uuid, prompt: Uuid) -> Result<PromptEvaluation> {
        self.gate(account).await?;
        let record = self.viewable_prompt(account, prompt).await?;
        let latest = record
            .history
            .latest()
            .ok_or_else(|| LabError::ValidationFailed("nothing to evaluate yet".into()))?;
        self.agents.evaluate_prompt(&latest.content).await
    }

    // ----- form assistance -----

    /// Fills the form from an uploaded document and returns the updates that applied.
    pub async fn extract_from_document(
        &self,
        account: Uuid,
        prompt: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<FieldUpdate>> {
        let acct = self.gate(account).await?;
        self.editable_prompt(account, prompt).await?;
        acct.usage.check(acct.plan, Feature::DocumentExtraction, Utc::now())?;

        let document = upload::validate_upload(filename, bytes, self.max_upload_bytes)?;
        let updates = self.agents.extract_fields(&document).await?;
        let applied = self.apply_updates(prompt, updates).await?;
        self.record_usage(account, Feature::DocumentExtraction).await?;
        Ok(applied)
    }

    pub async fn apply_voice_command(&self, account: Uuid, prompt: Uuid, transcript: &str) -> Result<VoiceCommandResponse> {
        let acct = self.gate(account).await?;
        let record = self.editable_prompt(account, prompt).await?;
        acct.usage.check(acct.plan, Feature::VoiceCommand, Utc::now())?;

        let mut response = self.agents.interpret_voice_command(transcript, &record.form).await?;
        response.updates = self.apply_updates(prompt, response.updates).await?;
        self.record_usage(account, Feature::VoiceCommand).await?;
        Ok(response)
    }

    // ----- export & sharing -----

    pub async fn export(&self, account: Uuid, prompt: Uuid, format: ExportFormat) -> Result<Vec<u8>> {
        let acct = self.gate(account).await?;
        acct.usage.check(acct.plan, Feature::Export, Utc::now())?;
        let record = self.viewable_prompt(account, prompt).await?;
        let latest = record
            .history
            .latest()
            .ok_or_else(|| LabError::ValidationFailed("nothing to export yet".into()))?;
        let rendered = export::render(format, &record.form.title, latest, Some(&record.form))?;
        self.record_usage(account, Feature::Export).await?;
        Ok(rendered)
    }

    pub async fn share_session(&self, account: Uuid, session: Uuid, ttl: Option<chrono::Duration>) -> Result<ShareLink> {
        let acct = self.gate(account).await?;
        acct.usage.check(acct.plan, Feature::Sharing, Utc::now())?;
        let chat = self.own_session(account, session).await?;
        if chat.messages.is_empty() {
            return Err(LabError::ValidationFailed("cannot share an empty conversation".into()));
        }
        let link = ShareLink::new(chat, account, ttl);
        self.store.shares.insert(link.token, link.clone()).await;
        self.record_usage(account, Feature::Sharing).await?;
        Ok(link)
    }

    /// Anonymous read of a shared conversation.
    pub async fn open_shared(&self, token: Uuid) -> Result<ChatSession> {
        let link = self.store.shares.get(token).await?;
        if !link.is_active(Utc::now()) {
            return Err(LabError::NotFound(format!("share link {token}")));
        }
        Ok(link.session)
    }

    pub async fn revoke_share(&self, account: Uuid, token: Uuid) -> Result<()> {
        self.gate(account).await?;
        self.store
            .shares
            .update(token, |link| {
                if link.created_by != account {
                    return Err(LabError::Forbidden("only the creator can revoke a share link".into()));
                }
                link.revoke();
                Ok(())
            })
            .await
    }

    // ----- helpers -----

    async fn gate(&self, account: Uuid) -> Result<Account> {
        let acct = self.store.accounts.get(account).await?;
        if acct.suspended {
            return Err(LabError::Forbidden(format!("account {} is suspended", acct.email)));
        }
        self.limiter.check(&account.to_string())?;
        Ok(acct)
    }

    async fn viewable_prompt(&self, account: Uuid, prompt: Uuid) -> Result<PromptRecord> {
        let record = self.store.prompts.get(prompt).await?;
        self.store.workspaces.get(record.workspace_id).await?.require_view(account)?;
        Ok(record)
    }

    async fn editable_prompt(&self, account: Uuid, prompt: Uuid) -> Result<PromptRecord> {
        let record = self.store.prompts.get(prompt).await?;
        self.store.workspaces.get(record.workspace_id).await?.require_edit(account)?;
        Ok(record)
    }

    async fn own_session(&self, account: Uuid, session: Uuid) -> Result<ChatSession> {
        let chat = self.store.sessions.get(session).await?;
        if chat.owner != account {
            return Err(LabError::Forbidden("test sessions are private to their owner".into()));
        }
        Ok(chat)
    }

    async fn push_version(
        &self,
        prompt: Uuid,
        content: String,
        source: VersionSource,
        applied: &[OptimizationPair],
    ) -> Result<PromptVersion> {
        let ids: Vec<Uuid> = applied.iter().map(|p| p.id).collect();
        self.store
            .prompts
            .update(prompt, |p| {
                let version = p.history.push(content, source, ids.len()).clone();
                p.feedback.mark_applied(&ids, version.number);
                p.updated_at = Utc::now();
                Ok(version)
            })
            .await
    }

    /// Applies each update to a copy of the form and keeps it only if the
    /// result still validates. Returns the updates that stuck.
    async fn apply_updates(&self, prompt: Uuid, updates: Vec<FieldUpdate>) -> Result<Vec<FieldUpdate>> {
        self.store
            .prompts
            .update(prompt, |p| {
                let mut applied = Vec::with_capacity(updates.len());
                for update in updates {
                    let mut candidate = p.form.clone();
                    match candidate.apply(&update).and_then(|()| candidate.validate()) {
                        Ok(()) => {
                            p.form = candidate;
                            applied.push(update);
                        }
                        Err(e) => log::warn!("Skipped form update {:?}: {e}", update.field),
                    }
                }
                if !applied.is_empty() {
                    p.updated_at = Utc::now();
                }
                Ok(applied)
            })
            .await
    }

    async fn record_usage(&self, account: Uuid, feature: Feature) -> Result<()> {
        self.store
            .accounts
            .update(account, |a| {
                a.usage.record(feature, Utc::now());
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::ScriptedBackend;
    use crate::core::form::{sample_form, FormField};

    struct Fixture {
        studio: Studio<ScriptedBackend>,
        account: Uuid,
        workspace: Uuid,
        prompt: Uuid,
    }

    async fn fixture(plan: Plan, replies: &[&str]) -> Fixture {
        let studio = Studio::new(ScriptedBackend::new(replies.iter().copied()), StudioOptions::default());
        let account = studio.register_account("ana@clinic.io", plan).await.unwrap().id;
        let workspace = studio.create_workspace(account, "Clinic").await.unwrap().id;
        let prompt = studio.create_prompt(account, workspace, sample_form()).await.unwrap().id;
        Fixture { studio, account, workspace, prompt }
    }

    #[tokio::test]
    async fn full_feedback_loop() {
        let f = fixture(Plan::Pro, &["You are Ana.", "It is free!", "You are Ana. Prices start at $40."]).await;
        let s = &f.studio;

        let v1 = s.generate(f.account, f.prompt).await.unwrap();
        assert_eq!((v1.number, v1.source), (1, VersionSource::Generated));

        let chat = s.start_test_chat(f.account, f.prompt).await.unwrap();
        let reply = s.send_test_message(f.account, chat.id, "How much is a cleaning?").await.unwrap();
        assert_eq!(reply, "It is free!");

        let pair = s.correct_last_reply(f.account, chat.id, "Cleanings start at $40.").await.unwrap();
        assert_eq!(pair.query, "How much is a cleaning?");
        assert_eq!(pair.bad_response, "It is free!");

        let v2 = s.optimize(f.account, f.prompt).await.unwrap();
        assert_eq!((v2.number, v2.source, v2.applied_pairs), (2, VersionSource::Optimized, 1));

        let record = s.prompt(f.account, f.prompt).await.unwrap();
        assert!(record.feedback.pending().is_empty());
        assert_eq!(record.feedback.all()[0].applied_in, Some(2));

        let optimizer_request = &s.agents().backend().requests()[2];
        assert!(optimizer_request.last_user_text().contains("You are Ana."));
        assert!(optimizer_request.last_user_text().contains("Cleanings start at $40."));

        let acct = s.store().accounts.get(f.account).await.unwrap();
        assert_eq!(acct.usage.monthly_total(Feature::Generation, Utc::now()), 1);
        assert_eq!(acct.usage.monthly_total(Feature::TestMessage, Utc::now()), 1);
    }

    #[tokio::test]
    async fn optimize_needs_pending_corrections() {
        let f = fixture(Plan::Pro, &["v1"]).await;
        f.studio.generate(f.account, f.prompt).await.unwrap();
        let err = f.studio.optimize(f.account, f.prompt).await.unwrap_err();
        assert!(matches!(err, LabError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn failed_generation_is_not_metered() {
        let f = fixture(Plan::Free, &[]).await;
        assert!(f.studio.generate(f.account, f.prompt).await.is_err());
        let acct = f.studio.store().accounts.get(f.account).await.unwrap();
        assert_eq!(acct.usage.monthly_total(Feature::Generation, Utc::now()), 0);
        assert!(f.studio.prompt(f.account, f.prompt).await.unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn free_plan_limits_prompts_and_workspaces() {
        let f = fixture(Plan::Free, &[]).await;
        for _ in 0..2 {
            f.studio.create_prompt(f.account, f.workspace, sample_form()).await.unwrap();
        }
        let err = f.studio.create_prompt(f.account, f.workspace, sample_form()).await.unwrap_err();
        assert!(matches!(err, LabError::QuotaExceeded { limit: 3, .. }));
        assert!(f.studio.create_workspace(f.account, "Second").await.is_err());
    }

    #[tokio::test]
    async fn free_plan_cannot_extract_or_share() {
        let f = fixture(Plan::Free, &["v1", "hello"]).await;
        let err = f
            .studio
            .extract_from_document(f.account, f.prompt, "a.txt", b"text".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, LabError::Forbidden(_)));

        f.studio.generate(f.account, f.prompt).await.unwrap();
        let chat = f.studio.start_test_chat(f.account, f.prompt).await.unwrap();
        f.studio.send_test_message(f.account, chat.id, "hi").await.unwrap();
        assert!(f.studio.share_session(f.account, chat.id, None).await.is_err());
    }

    #[tokio::test]
    async fn viewers_can_read_but_not_generate() {
        let f = fixture(Plan::Pro, &["v1"]).await;
        let viewer = f.studio.register_account("bob@clinic.io", Plan::Free).await.unwrap().id;
        f.studio.add_workspace_member(f.account, f.workspace, viewer, Role::Viewer).await.unwrap();

        f.studio.prompt(viewer, f.prompt).await.unwrap();
        assert!(matches!(f.studio.generate(viewer, f.prompt).await, Err(LabError::Forbidden(_))));

        let stranger = f.studio.register_account("eve@else.io", Plan::Pro).await.unwrap().id;
        assert!(f.studio.prompt(stranger, f.prompt).await.is_err());
    }

    #[tokio::test]
    async fn document_extraction_fills_the_form() {
        let f = fixture(Plan::Pro, &[r#"{"rules":["Always greet by name"],"tools":[{"name":"book_slot","description":"dup"}]}"#]).await;
        let applied = f
            .studio
            .extract_from_document(f.account, f.prompt, "policy.md", b"Greet patients by name.".to_vec())
            .await
            .unwrap();
        // the duplicate tool is skipped
        assert_eq!(applied, vec![FieldUpdate::new(FormField::Rule, "Always greet by name")]);
        let form = f.studio.prompt(f.account, f.prompt).await.unwrap().form;
        assert_eq!(form.rules.last().unwrap(), "Always greet by name");
    }

    #[tokio::test]
    async fn voice_command_updates_form() {
        let f = fixture(Plan::Pro, &[r#"{"updates":[{"field":"objective","value":"Sell whitening kits"}],"reply":"Done."}"#]).await;
        let resp = f.studio.apply_voice_command(f.account, f.prompt, "change the goal to selling whitening kits").await.unwrap();
        assert_eq!(resp.reply, "Done.");
        let form = f.studio.prompt(f.account, f.prompt).await.unwrap().form;
        assert_eq!(form.objective, "Sell whitening kits");
    }

    #[tokio::test]
    async fn sharing_round_trip() {
        let f = fixture(Plan::Pro, &["v1", "Hello!"]).await;
        f.studio.generate(f.account, f.prompt).await.unwrap();
        let chat = f.studio.start_test_chat(f.account, f.prompt).await.unwrap();
        assert!(f.studio.share_session(f.account, chat.id, None).await.is_err());

        f.studio.send_test_message(f.account, chat.id, "Hi").await.unwrap();
        let link = f.studio.share_session(f.account, chat.id, Some(chrono::Duration::days(7))).await.unwrap();
        assert_eq!(f.studio.open_shared(link.token).await.unwrap().messages.len(), 2);

        f.studio.revoke_share(f.account, link.token).await.unwrap();
        assert!(matches!(f.studio.open_shared(link.token).await, Err(LabError::NotFound(_))));
    }

    #[tokio::test]
    async fn restore_and_export() {
        let f = fixture(Plan::Free, &["first"]).await;
        f.studio.generate(f.account, f.prompt).await.unwrap();
        f.studio.save_manual_version(f.account, f.prompt, "second").await.unwrap();
        let v3 = f.studio.restore_version(f.account, f.prompt, 1).await.unwrap();
        assert_eq!((v3.number, v3.content.as_str()), (3, "first"));

        let md = f.studio.export(f.account, f.prompt, ExportFormat::Markdown).await.unwrap();
        let md = String::from_utf8(md).unwrap();
        assert!(md.contains("# Clinic receptionist"));
        assert!(md.contains("Restored"));

        let pdf = f.studio.export(f.account, f.prompt, ExportFormat::Pdf).await.unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        let acct = f.studio.store().accounts.get(f.account).await.unwrap();
        assert_eq!(acct.usage.monthly_total(Feature::Export, Utc::now()), 2);
    }

    #[tokio::test]
    async fn rate_limit_applies_per_account() {
        let studio = Studio::new(
            ScriptedBackend::default(),
            StudioOptions { rate_limit: NonZeroU32::new(2).unwrap(), ..StudioOptions::default() },
        );
        let account = studio.register_account("a@b.co", Plan::Business).await.unwrap().id;
        studio.create_workspace(account, "one").await.unwrap();
        studio.create_workspace(account, "two").await.unwrap();
        let err = studio.create_workspace(account, "three").await.unwrap_err();
        assert!(matches!(err, LabError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn suspended_accounts_are_locked_out() {
        let f = fixture(Plan::Pro, &[]).await;
        f.studio.store().accounts.update(f.account, |a| { a.suspended = true; Ok(()) }).await.unwrap();
        assert!(matches!(f.studio.generate(f.account, f.prompt).await, Err(LabError::Forbidden(_))));
    }

    #[tokio::test]
    async fn suspended_accounts_cannot_read_prompts() {
        let f = fixture(Plan::Pro, &[]).await;
        f.studio.prompt(f.account, f.prompt).await.unwrap();
        f.studio.store().accounts.update(f.account, |a| { a.suspended = true; Ok(()) }).await.unwrap();
        assert!(matches!(f.studio.prompt(f.account, f.prompt).await, Err(LabError::Forbidden(_))));
    }

    #[tokio::test]
    async fn voice_updates_cannot_break_the_form() {
        let f = fixture(
            Plan::Pro,
            &[
                r#"{"updates":[{"field":"objective","value":""},{"field":"flow","value":"Refund: ;"},{"field":"rule","value":"Never quote prices"}],"reply":"Done."}"#,
                "You are Ana.",
            ],
        )
        .await;
        let resp = f.studio.apply_voice_command(f.account, f.prompt, "clear the goal and add a refund flow").await.unwrap();
        assert_eq!(resp.updates, vec![FieldUpdate::new(FormField::Rule, "Never quote prices")]);

        let form = f.studio.prompt(f.account, f.prompt).await.unwrap().form;
        form.validate().unwrap();
        assert_eq!(form.objective, sample_form().objective);
        assert_eq!(form.flows, sample_form().flows);

        let v1 = f.studio.generate(f.account, f.prompt).await.unwrap();
        assert_eq!(v1.content, "You are Ana.");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let f = fixture(Plan::Pro, &[]).await;
        assert!(f.studio.register_account("ANA@clinic.io", Plan::Free).await.is_err());
    }
}
