//! Following-list sync: pages through the tracked account's follows and
//! upserts every user into the account store.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use xgrowth_core::CleanerConfig;
use xgrowth_x::{Gateway, XError};

use crate::error::CleanerError;
use crate::pacer::Pacer;
use crate::stop::StopSignal;

/// Upper bound on pages read in one sync. At 1000 users per page this
/// covers far more follows than X allows an account to hold.
pub const MAX_PAGES: u32 = 1_000;

/// Why a sync ended before the last page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncStop {
    RateLimited { reset_at: Option<DateTime<Utc>> },
    Failed { message: String },
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub pages: u32,
    pub upserted: u64,
    /// Accounts seen for the first time.
    pub inserted: u64,
    /// `None` when every page was read.
    pub stopped: Option<SyncStop>,
}

pub struct FollowingSync<'a, G> {
    pool: &'a PgPool,
    gateway: &'a G,
    pacer: Pacer,
    stop: StopSignal,
    max_pages: u32,
}

impl<'a, G: Gateway> FollowingSync<'a, G> {
    #[must_use]
    pub fn new(pool: &'a PgPool, gateway: &'a G, config: &CleanerConfig) -> Self {
        Self {
            pool,
            gateway,
            pacer: Pacer::fixed_delay(config.sync_page_delay_ms),
            stop: StopSignal::new(),
            max_pages: MAX_PAGES,
        }
    }

    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Reads every page of the following list.
    ///
    /// Gateway failures end the sync early and are reported in
    /// [`SyncSummary::stopped`]; pages already read stay stored. A cursor
    /// that repeats, or reaching the page limit, also ends the sync as
    /// [`SyncStop::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] if an upsert fails.
    pub async fn run(&mut self) -> Result<SyncSummary, CleanerError> {
        let mut summary = SyncSummary::default();
        let mut cursor: Option<String> = None;
        let mut seen_cursors: HashSet<String> = HashSet::new();

        loop {
            if self.stop.is_raised() {
                tracing::warn!(pages = summary.pages, "following sync cancelled by operator");
                summary.stopped = Some(SyncStop::Cancelled);
                break;
            }
            if summary.pages >= self.max_pages {
                tracing::error!(
                    pages = summary.pages,
                    "following sync hit the page limit; stopping"
                );
                summary.stopped = Some(SyncStop::Failed {
                    message: format!("page limit of {} reached", self.max_pages),
                });
                break;
            }
            self.pacer.acquire().await;

            let page = match self.gateway.list_following(cursor.as_deref()).await {
                Ok(page) => page,
                Err(XError::RateLimited { reset_at }) => {
                    tracing::warn!(
                        pages = summary.pages,
                        reset_at = ?reset_at,
                        "rate limited while reading following list; stopping sync"
                    );
                    summary.stopped = Some(SyncStop::RateLimited { reset_at });
                    break;
                }
                Err(e) => {
                    tracing::error!(pages = summary.pages, error = %e, "following page fetch failed");
                    summary.stopped = Some(SyncStop::Failed {
                        message: e.to_string(),
                    });
                    break;
                }
            };

            summary.pages += 1;
            for user in &page.users {
                if xgrowth_db::upsert_account(self.pool, user).await? {
                    summary.inserted += 1;
                }
                summary.upserted += 1;
            }
            tracing::info!(
                page = summary.pages,
                users = page.users.len(),
                remaining = ?page.quota.remaining,
                "stored following page"
            );

            match page.next_cursor {
                Some(next) if !seen_cursors.insert(next.clone()) => {
                    tracing::error!(
                        pages = summary.pages,
                        cursor = %next,
                        "following list returned a cursor already read; stopping"
                    );
                    summary.stopped = Some(SyncStop::Failed {
                        message: format!("pagination cursor {next} repeated"),
                    });
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(summary)
    }
}
