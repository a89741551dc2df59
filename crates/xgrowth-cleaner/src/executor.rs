//! Unfollow executor.
//!
//! A live run walks the ranked candidates strictly in order and moves its
//! `cleaner_runs` row through `planned → executing → completed | aborted`.
//! A dry run touches nothing and reports every candidate as a success.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;
use xgrowth_core::CleanerConfig;
use xgrowth_db::{CleanerRunCounts, NewUnfollowLogEntry};
use xgrowth_x::{Gateway, XError};

use crate::error::CleanerError;
use crate::pacer::Pacer;
use crate::ranker::Candidate;
use crate::stop::StopSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Planned,
    Executing,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    RateLimited,
    Operator,
}

impl AbortReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AbortReason::RateLimited => "rate_limited",
            AbortReason::Operator => "operator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Unfollowed,
    /// Dry run only.
    Simulated,
    /// The platform no longer had the follow; marked unfollowed without a log entry.
    AlreadyGone,
    Vetoed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateOutcome {
    pub user_id: String,
    pub username: String,
    pub kind: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tallies for one executor run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub batch_id: Uuid,
    pub dry_run: bool,
    pub state: RunState,
    /// Candidates admitted to the run after the daily cap.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub vetoed: usize,
    pub unprocessed: usize,
    /// Candidates dropped before the run because of the daily cap.
    pub deferred_by_daily_cap: usize,
    pub aborted_early: bool,
    pub abort_reason: Option<AbortReason>,
    pub reset_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<CandidateOutcome>,
}

impl RunSummary {
    fn new(batch_id: Uuid, dry_run: bool, total: usize, deferred_by_daily_cap: usize) -> Self {
        Self {
            batch_id,
            dry_run,
            state: RunState::Planned,
            total,
            succeeded: 0,
            failed: 0,
            vetoed: 0,
            unprocessed: 0,
            deferred_by_daily_cap,
            aborted_early: false,
            abort_reason: None,
            reset_at: None,
            outcomes: Vec::with_capacity(total),
        }
    }

    /// `(succeeded, failed, batch_id)`.
    #[must_use]
    pub fn outcome(&self) -> (usize, usize, Uuid) {
        (self.succeeded, self.failed, self.batch_id)
    }

    fn counts(&self) -> CleanerRunCounts {
        let clamp = |n: usize| i32::try_from(n).unwrap_or(i32::MAX);
        CleanerRunCounts {
            succeeded: clamp(self.succeeded),
            failed: clamp(self.failed),
            vetoed: clamp(self.vetoed),
        }
    }

    fn push(&mut self, candidate: &Candidate, kind: OutcomeKind, error: Option<String>) {
        match kind {
            OutcomeKind::Unfollowed | OutcomeKind::Simulated | OutcomeKind::AlreadyGone => {
                self.succeeded += 1;
            }
            OutcomeKind::Vetoed => self.vetoed += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
        self.outcomes.push(CandidateOutcome {
            user_id: candidate.user_id.clone(),
            username: candidate.username.clone(),
            kind,
            error,
        });
    }

    fn stop_early(&mut self, reason: AbortReason, unprocessed: usize) {
        self.aborted_early = true;
        self.abort_reason = Some(reason);
        self.unprocessed = unprocessed;
    }
}

pub struct UnfollowExecutor<'a, G> {
    pool: &'a PgPool,
    gateway: &'a G,
    pacer: Pacer,
    stop: StopSignal,
    max_per_day: u32,
    trigger_source: String,
}

impl<'a, G: Gateway> UnfollowExecutor<'a, G> {
    #[must_use]
    pub fn new(pool: &'a PgPool, gateway: &'a G, config: &CleanerConfig) -> Self {
        Self {
            pool,
            gateway,
            pacer: Pacer::fixed_delay(config.unfollow_delay_ms),
            stop: StopSignal::new(),
            max_per_day: config.max_unfollows_per_day,
            trigger_source: "cli".to_string(),
        }
    }

    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Recorded on the run row (`cli`, `scheduler`).
    #[must_use]
    pub fn with_trigger_source(mut self, source: impl Into<String>) -> Self {
        self.trigger_source = source.into();
        self
    }

    /// Runs (or, with `dry_run`, simulates) unfollows for `candidates`.
    ///
    /// The list is first trimmed to what the daily cap still allows. Rate
    /// limiting and operator stops end the run as `aborted` with the outcomes
    /// so far; per-candidate gateway failures are counted and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] if a store write fails. A live run is
    /// marked `aborted` on a best-effort basis before the error is returned.
    pub async fn execute(
        &mut self,
        candidates: Vec<Candidate>,
        dry_run: bool,
    ) -> Result<RunSummary, CleanerError> {
        let batch_id = Uuid::new_v4();
        let offered = candidates.len();
        let candidates = self.apply_daily_cap(candidates).await?;
        let mut summary = RunSummary::new(
            batch_id,
            dry_run,
            candidates.len(),
            offered - candidates.len(),
        );

        if dry_run {
            for candidate in &candidates {
                tracing::info!(
                    %batch_id,
                    user_id = %candidate.user_id,
                    username = %candidate.username,
                    reason = %candidate.reason(),
                    "[dry run] would unfollow"
                );
                summary.push(candidate, OutcomeKind::Simulated, None);
            }
            summary.state = RunState::Completed;
            return Ok(summary);
        }

        if candidates.is_empty() {
            tracing::info!("no unfollow candidates; nothing to do");
            summary.state = RunState::Completed;
            return Ok(summary);
        }

        let candidate_count = i32::try_from(candidates.len()).unwrap_or(i32::MAX);
        xgrowth_db::create_cleaner_run(self.pool, batch_id, &self.trigger_source, candidate_count)
            .await?;
        xgrowth_db::start_cleaner_run(self.pool, batch_id).await?;
        summary.state = RunState::Executing;
        tracing::info!(%batch_id, candidates = candidates.len(), "unfollow run started");

        if let Err(e) = self.run_live(&candidates, &mut summary).await {
            let message = format!("store error: {e}");
            abort_run_best_effort(self.pool, batch_id, summary.counts(), &message).await;
            return Err(e);
        }

        match summary.abort_reason {
            Some(reason) => {
                xgrowth_db::abort_cleaner_run(self.pool, batch_id, summary.counts(), reason.as_str())
                    .await?;
                summary.state = RunState::Aborted;
            }
            None => {
                xgrowth_db::complete_cleaner_run(self.pool, batch_id, summary.counts()).await?;
                summary.state = RunState::Completed;
            }
        }

        tracing::info!(
            %batch_id,
            state = ?summary.state,
            succeeded = summary.succeeded,
            failed = summary.failed,
            vetoed = summary.vetoed,
            unprocessed = summary.unprocessed,
            "unfollow run finished"
        );
        Ok(summary)
    }

    async fn run_live(
        &mut self,
        candidates: &[Candidate],
        summary: &mut RunSummary,
    ) -> Result<(), CleanerError> {
        let batch_id = summary.batch_id;

        for (index, candidate) in candidates.iter().enumerate() {
            if self.stop.is_raised() {
                tracing::warn!(%batch_id, "unfollow run stopped by operator");
                summary.stop_early(AbortReason::Operator, candidates.len() - index);
                break;
            }

            if xgrowth_db::is_whitelisted(self.pool, &candidate.user_id).await? {
                tracing::info!(
                    user_id = %candidate.user_id,
                    username = %candidate.username,
                    "candidate is whitelisted; skipping"
                );
                summary.push(candidate, OutcomeKind::Vetoed, None);
                continue;
            }

            self.pacer.acquire().await;
            let reason = candidate.reason();

            match self.gateway.unfollow(&candidate.user_id).await {
                Ok(_) => {
                    let entry = NewUnfollowLogEntry {
                        user_id: &candidate.user_id,
                        username: &candidate.username,
                        display_name: candidate.display_name.as_deref(),
                        days_inactive: candidate.days_inactive,
                        follower_count: candidate.follower_count,
                        last_tweet_date: candidate.last_tweet_date,
                        unfollow_score: Some(candidate.unfollow_score),
                        reason: &reason,
                        batch_id,
                    };
                    if !xgrowth_db::record_unfollow(self.pool, &entry).await? {
                        tracing::warn!(
                            user_id = %candidate.user_id,
                            "account was already marked unfollowed; no log entry written"
                        );
                    }
                    tracing::info!(
                        user_id = %candidate.user_id,
                        username = %candidate.username,
                        reason = %reason,
                        "unfollowed"
                    );
                    summary.push(candidate, OutcomeKind::Unfollowed, None);
                }
                Err(XError::NotFound { .. }) => {
                    xgrowth_db::mark_unfollowed_without_log(self.pool, &candidate.user_id, &reason)
                        .await?;
                    tracing::info!(
                        user_id = %candidate.user_id,
                        "follow no longer exists; marked unfollowed"
                    );
                    summary.push(candidate, OutcomeKind::AlreadyGone, None);
                }
                Err(XError::RateLimited { reset_at }) => {
                    tracing::warn!(
                        %batch_id,
                        processed = index,
                        reset_at = ?reset_at,
                        "rate limited; aborting unfollow run"
                    );
                    summary.reset_at = reset_at;
                    summary.stop_early(AbortReason::RateLimited, candidates.len() - index);
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = %candidate.user_id,
                        error = %e,
                        "unfollow failed; continuing"
                    );
                    summary.push(candidate, OutcomeKind::Failed, Some(e.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn apply_daily_cap(
        &self,
        mut candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, CleanerError> {
        let since = Utc::now() - Duration::hours(24);
        let done_today = xgrowth_db::count_unfollows_since(self.pool, since).await?;
        let room = usize::try_from((i64::from(self.max_per_day) - done_today).max(0))
            .unwrap_or(usize::MAX);

        if candidates.len() > room {
            tracing::warn!(
                done_today,
                cap = self.max_per_day,
                deferred = candidates.len() - room,
                "daily unfollow cap reached; deferring candidates"
            );
            candidates.truncate(room);
        }
        Ok(candidates)
    }
}

async fn abort_run_best_effort(
    pool: &PgPool,
    batch_id: Uuid,
    counts: CleanerRunCounts,
    message: &str,
) {
    if let Err(mark_err) = xgrowth_db::abort_cleaner_run(pool, batch_id, counts, message).await {
        tracing::error!(
            %batch_id,
            error = %mark_err,
            "failed to mark cleaner run as aborted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> Candidate {
        Candidate {
            user_id: id.to_string(),
            username: format!("user_{id}"),
            display_name: None,
            days_inactive: Some(500),
            follower_count: Some(5),
            tweet_count: Some(1),
            last_tweet_date: None,
            verified: false,
            unfollow_score: 150,
        }
    }

    #[test]
    fn push_tallies_by_kind() {
        let mut summary = RunSummary::new(Uuid::nil(), false, 4, 0);
        summary.push(&candidate("1"), OutcomeKind::Unfollowed, None);
        summary.push(&candidate("2"), OutcomeKind::AlreadyGone, None);
        summary.push(&candidate("3"), OutcomeKind::Vetoed, None);
        summary.push(&candidate("4"), OutcomeKind::Failed, Some("boom".to_string()));

        assert_eq!(summary.outcome(), (2, 1, Uuid::nil()));
        assert_eq!(summary.vetoed, 1);
        assert_eq!(
            summary.counts(),
            CleanerRunCounts {
                succeeded: 2,
                failed: 1,
                vetoed: 1
            }
        );
    }

    #[test]
    fn stop_early_records_reason() {
        let mut summary = RunSummary::new(Uuid::nil(), false, 10, 0);
        summary.stop_early(AbortReason::RateLimited, 6);
        assert!(summary.aborted_early);
        assert_eq!(summary.unprocessed, 6);
        assert_eq!(summary.abort_reason.map(AbortReason::as_str), Some("rate_limited"));
    }

    #[test]
    fn states_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&RunState::Aborted).unwrap(),
            "\"aborted\""
        );
        assert_eq!(
            serde_json::to_string(&OutcomeKind::AlreadyGone).unwrap(),
            "\"already_gone\""
        );
    }
}
