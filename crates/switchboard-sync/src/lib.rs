// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pull-based reconciliation of voice conversations.
//!
//! The periodic run and the manual full sync share [`SyncService::run_window`],
//! which feeds every listed conversation through the same
//! [`reconcile_voice_call`] path the webhooks use.
//!
//! The in-progress guard is a process-local flag. Running more than one
//! scheduler instance against the same database needs a shared lease
//! instead; deployments run a single `serve` process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use switchboard_config::model::SyncConfig;
use switchboard_core::types::{
    ActorType, AuditEntry, ConversationQuery, ConversationSummary, Interaction, Provider,
};
use switchboard_core::{Clock, StorageAdapter, SwitchboardError, VoiceAgentApi};
use switchboard_ingest::reconcile_voice_call;
use switchboard_normalize::{VoiceCall, normalize_voice};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const MAX_PAGE_SIZE: usize = 100;

/// Counters for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Another run was already in progress; nothing was done.
    pub skipped: bool,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
}

/// Clears the in-progress flag when dropped, including on early return.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncService {
    storage: Arc<dyn StorageAdapter>,
    api: Arc<dyn VoiceAgentApi>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    agent_id: Option<String>,
    running: AtomicBool,
}

impl SyncService {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        api: Arc<dyn VoiceAgentApi>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            storage,
            api,
            clock,
            config,
            agent_id: None,
            running: AtomicBool::new(false),
        }
    }

    /// Restrict listing to one agent's conversations.
    pub fn with_agent_id(mut self, agent_id: Option<String>) -> Self {
        self.agent_id = agent_id.filter(|id| !id.trim().is_empty());
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Sync the configured lookback window ending now.
    pub async fn run_incremental(&self) -> Result<SyncReport, SwitchboardError> {
        let to = self.clock.now();
        let from = to - Duration::hours(self.config.lookback_hours);
        self.run_window(from, to).await
    }

    /// Sync the last `days` days (config default when `None`).
    pub async fn run_full(&self, days: Option<i64>) -> Result<SyncReport, SwitchboardError> {
        let days = days.unwrap_or(self.config.full_sync_days);
        if days <= 0 {
            return Err(SwitchboardError::Validation(format!(
                "sync window must be at least one day, got {days}"
            )));
        }
        let to = self.clock.now();
        let from = to - Duration::days(days);
        self.run_window(from, to).await
    }

    /// Reconcile every conversation started inside `[from, to]`.
    ///
    /// Returns immediately with `skipped: true` when a run is in progress.
    /// A failing conversation is counted and logged; the batch continues.
    pub async fn run_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<SyncReport, SwitchboardError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            info!("sync already in progress, skipping run");
            return Ok(SyncReport {
                skipped: true,
                ..SyncReport::default()
            });
        };

        let mut report = SyncReport {
            window_start: Some(from),
            window_end: Some(to),
            ..SyncReport::default()
        };
        let limit = self.config.batch_limit;
        let mut cursor = None;
        info!(from = %from, to = %to, limit, "sync run started");

        'pages: while report.fetched < limit {
            let query = ConversationQuery {
                agent_id: self.agent_id.clone(),
                start_after: Some(from),
                start_before: Some(to),
                page_size: (limit - report.fetched).min(MAX_PAGE_SIZE) as u32,
                cursor: cursor.take(),
            };
            let page = self.api.list_conversations(&query).await?;
            debug!(count = page.conversations.len(), has_more = page.has_more, "fetched page");

            for summary in page.conversations {
                if report.fetched >= limit {
                    break 'pages;
                }
                report.fetched += 1;
                match self.sync_conversation(&summary).await {
                    Ok(true) => report.created += 1,
                    Ok(false) => report.updated += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!(
                            conversation_id = %summary.conversation_id,
                            error = %e,
                            "conversation sync failed"
                        );
                    }
                }
            }

            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        self.record(&report).await;
        info!(
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "sync run finished"
        );
        Ok(report)
    }

    /// Reconcile one conversation. Returns `true` when it was new locally.
    async fn sync_conversation(&self, summary: &ConversationSummary) -> Result<bool, SwitchboardError> {
        let existing = self
            .storage
            .find_interaction_by_conversation(Provider::Elevenlabs, &summary.conversation_id)
            .await?;

        let document = self.api.get_conversation(&summary.conversation_id).await?;
        let mut call = normalize_voice(&document);
        call.fill_from(normalize_voice(&summary.raw));
        if call.conversation_id.is_none() {
            call.conversation_id = Some(summary.conversation_id.clone());
        }

        match existing {
            Some(interaction) => {
                let refresh = refresh_for(&interaction, call);
                reconcile_voice_call(self.storage.as_ref(), &refresh).await?;
                debug!(interaction_id = %interaction.id, "refreshed existing conversation");
                Ok(false)
            }
            None => {
                let interaction = reconcile_voice_call(self.storage.as_ref(), &call).await?;
                debug!(interaction_id = %interaction.id, "created conversation from sync");
                Ok(true)
            }
        }
    }

    async fn record(&self, report: &SyncReport) {
        let entry = AuditEntry::new(ActorType::Scheduler, "sync.run", "sync").metadata(json!({
            "success": report.failed == 0,
            "report": report,
        }));
        if let Err(e) = self.storage.append_audit(&entry).await {
            warn!(error = %e, "failed to write sync audit entry");
        }
    }

    /// Run [`run_incremental`](Self::run_incremental) every `interval_secs`
    /// until `cancel` fires.
    pub fn spawn_periodic(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let period = StdDuration::from_secs(self.config.interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval_secs = period.as_secs(), "periodic sync started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_incremental().await {
                            error!(error = %e, "periodic sync failed");
                        }
                    }
                }
            }
            info!("periodic sync stopped");
        })
    }
}

/// Narrow a listed call to what a sync may change on a known conversation.
///
/// Timestamps and call detail always merge. Status, outcome, intent and
/// agent only fill gaps, so a webhook's values are never replaced.
fn refresh_for(existing: &Interaction, call: VoiceCall) -> VoiceCall {
    VoiceCall {
        status: call.status.filter(|_| !existing.status.is_terminal()),
        outcome: call.outcome.filter(|_| existing.outcome.is_none()),
        intent: call.intent.filter(|_| existing.intent.is_none()),
        assigned_agent: call.assigned_agent.filter(|_| existing.assigned_agent.is_none()),
        direction: None,
        ..call
    }
}
