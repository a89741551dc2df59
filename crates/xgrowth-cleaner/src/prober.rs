//! Activity prober: looks up each account's latest post and records what was
//! seen.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use xgrowth_core::CleanerConfig;
use xgrowth_db::{ActivityObservation, ObservedPost};
use xgrowth_x::{Gateway, Post, XError};

use crate::error::CleanerError;
use crate::pacer::Pacer;
use crate::stop::StopSignal;

const STORED_TEXT_CHARS: usize = 100;

/// Outcome of one probe batch.
///
/// `processed` counts ids handled in any way; the per-outcome counters sum to
/// it. When the batch stopped early, `resume_index` is the position of the
/// first id left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeSummary {
    pub requested: usize,
    pub processed: usize,
    /// Accounts with an observed post.
    pub updated: usize,
    pub no_posts: usize,
    pub not_found: usize,
    pub unauthorized: usize,
    /// Accounts that became terminal (or vanished) before their update.
    pub skipped_terminal: usize,
    pub failed: usize,
    pub rate_limited: bool,
    pub reset_at: Option<DateTime<Utc>>,
    pub resume_index: Option<usize>,
    pub cancelled: bool,
}

pub struct ActivityProber<'a, G> {
    pool: &'a PgPool,
    gateway: &'a G,
    pacer: Pacer,
    stop: StopSignal,
    stale_after_days: i64,
    batch_size: u32,
}

impl<'a, G: Gateway> ActivityProber<'a, G> {
    #[must_use]
    pub fn new(pool: &'a PgPool, gateway: &'a G, config: &CleanerConfig) -> Self {
        Self {
            pool,
            gateway,
            pacer: Pacer::fixed_delay(config.probe_delay_ms),
            stop: StopSignal::new(),
            stale_after_days: config.probe_stale_after_days,
            batch_size: config.probe_batch_size,
        }
    }

    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Probes accounts never checked or not checked within the stale window,
    /// largest audience first. `limit` is capped at the configured batch size.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] if selecting or updating accounts fails.
    pub async fn probe_stale(&mut self, limit: Option<u32>) -> Result<ProbeSummary, CleanerError> {
        let limit = limit.map_or(self.batch_size, |l| l.min(self.batch_size));
        let stale_before = Utc::now() - Duration::days(self.stale_after_days);
        let ids =
            xgrowth_db::list_stale_account_ids(self.pool, stale_before, i64::from(limit)).await?;
        tracing::info!(due = ids.len(), limit, "probing stale accounts");
        self.probe(&ids).await
    }

    /// Probes `user_ids` in order, one gateway call each.
    ///
    /// A 429 stops the batch and is reported in the summary, not as an
    /// error. Other gateway failures skip the id.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] if a store write fails.
    pub async fn probe(&mut self, user_ids: &[String]) -> Result<ProbeSummary, CleanerError> {
        let mut summary = ProbeSummary {
            requested: user_ids.len(),
            ..ProbeSummary::default()
        };

        for (index, user_id) in user_ids.iter().enumerate() {
            if self.stop.is_raised() {
                tracing::warn!(processed = summary.processed, "probe cancelled by operator");
                summary.cancelled = true;
                summary.resume_index = Some(index);
                break;
            }
            self.pacer.acquire().await;

            match self.gateway.get_latest_post(user_id).await {
                Ok(latest) => {
                    let has_post = latest.post.is_some();
                    let observation = observation_for(
                        user_id,
                        latest.post.as_ref(),
                        latest.quota.remaining,
                        Utc::now(),
                    );
                    if xgrowth_db::record_activity_observation(self.pool, &observation).await? {
                        if has_post {
                            summary.updated += 1;
                        } else {
                            summary.no_posts += 1;
                        }
                    } else {
                        summary.skipped_terminal += 1;
                    }
                }
                Err(XError::NotFound {
                    rate_limit_remaining,
                    ..
                }) => {
                    let observation =
                        observation_for(user_id, None, rate_limit_remaining, Utc::now());
                    if xgrowth_db::record_activity_observation(self.pool, &observation).await? {
                        summary.not_found += 1;
                    } else {
                        summary.skipped_terminal += 1;
                    }
                }
                Err(XError::Unauthorized { .. }) => {
                    if xgrowth_db::mark_checked_without_observation(self.pool, user_id).await? {
                        tracing::info!(
                            user_id = %user_id,
                            "posts not visible (protected account); marked checked"
                        );
                        summary.unauthorized += 1;
                    } else {
                        summary.skipped_terminal += 1;
                    }
                }
                Err(XError::RateLimited { reset_at }) => {
                    tracing::warn!(
                        processed = summary.processed,
                        remaining = user_ids.len() - index,
                        reset_at = ?reset_at,
                        "rate limited; stopping probe batch"
                    );
                    summary.rate_limited = true;
                    summary.reset_at = reset_at;
                    summary.resume_index = Some(index);
                    break;
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "activity probe failed; skipping");
                    summary.failed += 1;
                }
            }
            summary.processed += 1;
        }

        tracing::info!(
            requested = summary.requested,
            processed = summary.processed,
            updated = summary.updated,
            no_posts = summary.no_posts,
            not_found = summary.not_found,
            failed = summary.failed,
            "probe batch finished"
        );
        Ok(summary)
    }
}

fn observation_for(
    user_id: &str,
    post: Option<&Post>,
    rate_limit_remaining: Option<i32>,
    now: DateTime<Utc>,
) -> ActivityObservation {
    ActivityObservation {
        user_id: user_id.to_owned(),
        days_inactive: post.map(|p| days_between(p.created_at, now)),
        post: post.map(|p| ObservedPost {
            id: p.id.clone(),
            created_at: p.created_at,
            text: Some(truncate_chars(&p.text, STORED_TEXT_CHARS)),
        }),
        rate_limit_remaining,
    }
}

/// Whole days from `then` to `now`; posts dated in the future count as 0.
fn days_between(then: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    let days = (now - then).num_days().max(0);
    i32::try_from(days).unwrap_or(i32::MAX)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
