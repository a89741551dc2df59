//! Live integration tests for xgrowth-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/xgrowth-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, Utc};
use uuid::Uuid;
use xgrowth_core::{AutoWhitelistRule, FollowedUser, ProtectionPolicy};
use xgrowth_db::{
    abort_cleaner_run, add_to_whitelist, auto_whitelist, complete_cleaner_run,
    count_unfollows_since, create_cleaner_run, find_account_by_username, get_account,
    get_cleaner_run, get_cleaner_stats, list_activity_checks, list_eligible_accounts,
    list_stale_account_ids, list_unfollow_candidates, list_unfollows_by_batch,
    mark_checked_without_observation, mark_unfollowed_without_log, record_activity_observation,
    record_unfollow, remove_from_whitelist, start_cleaner_run, suggest_whitelist_candidates,
    update_unfollow_scores, upsert_account, ActivityObservation, CleanerRunCounts, DbError,
    EligibleFilter, NewUnfollowLogEntry, NewWhitelistEntry, ObservedPost,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_user(id: &str, followers: i64) -> FollowedUser {
    let mut user = FollowedUser::new(id, format!("user_{id}"));
    user.name = Some(format!("User {id}"));
    user.public_metrics.followers_count = Some(followers);
    user.public_metrics.tweet_count = Some(1_000);
    user
}

async fn insert_user(pool: &sqlx::PgPool, id: &str, followers: i64) {
    upsert_account(pool, &make_user(id, followers))
        .await
        .unwrap_or_else(|e| panic!("upsert_account failed for {id}: {e}"));
}

async fn set_score(pool: &sqlx::PgPool, id: &str, score: i32, days_inactive: Option<i32>) {
    sqlx::query("UPDATE accounts SET unfollow_score = $2, days_inactive = $3 WHERE user_id = $1")
        .bind(id)
        .bind(score)
        .bind(days_inactive)
        .execute(pool)
        .await
        .expect("set_score failed");
}

fn whitelist_entry<'a>(user_id: &'a str, reason: &'a str) -> NewWhitelistEntry<'a> {
    NewWhitelistEntry {
        user_id,
        username: "someone",
        display_name: None,
        reason,
        added_by: "manual",
    }
}

fn log_entry<'a>(user_id: &'a str, batch_id: Uuid) -> NewUnfollowLogEntry<'a> {
    NewUnfollowLogEntry {
        user_id,
        username: "someone",
        display_name: None,
        days_inactive: Some(400),
        follower_count: Some(10),
        last_tweet_date: None,
        unfollow_score: Some(120),
        reason: "Inactive for 400 days (score: 120)",
        batch_id,
    }
}

// ---------------------------------------------------------------------------
// Account Store
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn new_accounts_start_unchecked(pool: sqlx::PgPool) {
    let inserted = upsert_account(&pool, &make_user("1", 100)).await.unwrap();
    assert!(inserted);

    let row = get_account(&pool, "1").await.unwrap();
    assert_eq!(row.check_count, 0);
    assert!(row.last_checked_date.is_none());
    assert!(row.unfollow_score.is_none());
    assert!(!row.is_whitelisted);
    assert!(!row.is_terminal());
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_refreshes_profile_but_keeps_activity(pool: sqlx::PgPool) {
    insert_user(&pool, "1", 100).await;
    let observation = ActivityObservation {
        user_id: "1".to_string(),
        post: Some(ObservedPost {
            id: "t1".to_string(),
            created_at: Utc::now() - Duration::days(3),
            text: Some("hello".to_string()),
        }),
        days_inactive: Some(3),
        rate_limit_remaining: Some(99),
    };
    assert!(record_activity_observation(&pool, &observation).await.unwrap());
    set_score(&pool, "1", 40, Some(3)).await;

    let mut refreshed = make_user("1", 250);
    refreshed.username = "renamed".to_string();
    let inserted = upsert_account(&pool, &refreshed).await.unwrap();
    assert!(!inserted);

    let row = get_account(&pool, "1").await.unwrap();
    assert_eq!(row.username, "renamed");
    assert_eq!(row.follower_count, Some(250));
    assert_eq!(row.last_tweet_id.as_deref(), Some("t1"));
    assert_eq!(row.days_inactive, Some(3));
    assert_eq!(row.check_count, 1);
    assert_eq!(row.unfollow_score, Some(40));
}

#[sqlx::test(migrations = "../../migrations")]
async fn find_by_username_is_case_insensitive(pool: sqlx::PgPool) {
    insert_user(&pool, "77", 10).await;
    let found = find_account_by_username(&pool, "USER_77").await.unwrap();
    assert_eq!(found.map(|r| r.user_id), Some("77".to_string()));
    assert!(find_account_by_username(&pool, "nobody")
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_account_missing_is_not_found(pool: sqlx::PgPool) {
    let err = get_account(&pool, "404").await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn eligible_excludes_terminal_and_orders_by_followers(pool: sqlx::PgPool) {
    insert_user(&pool, "a", 10).await;
    insert_user(&pool, "b", 1_000).await;
    insert_user(&pool, "c", 500).await;
    assert!(mark_unfollowed_without_log(&pool, "b", "gone").await.unwrap());

    let rows = list_eligible_accounts(&pool, &EligibleFilter::default())
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn eligible_filters_by_score_and_staleness(pool: sqlx::PgPool) {
    insert_user(&pool, "a", 10).await;
    insert_user(&pool, "b", 20).await;
    set_score(&pool, "a", 10, None).await;
    set_score(&pool, "b", 90, None).await;
    mark_checked_without_observation(&pool, "b").await.unwrap();

    let high = list_eligible_accounts(
        &pool,
        &EligibleFilter {
            min_score: Some(50),
            ..EligibleFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].user_id, "b");

    let stale = list_eligible_accounts(
        &pool,
        &EligibleFilter {
            checked_before: Some(Utc::now() - Duration::days(7)),
            ..EligibleFilter::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].user_id, "a");
}

#[sqlx::test(migrations = "../../migrations")]
async fn stale_ids_are_capped_and_skip_recent_checks(pool: sqlx::PgPool) {
    for (id, followers) in [("a", 1), ("b", 3), ("c", 2)] {
        insert_user(&pool, id, followers).await;
    }
    mark_checked_without_observation(&pool, "b").await.unwrap();

    let ids = list_stale_account_ids(&pool, Utc::now() - Duration::days(7), 10)
        .await
        .unwrap();
    assert_eq!(ids, vec!["c".to_string(), "a".to_string()]);

    let capped = list_stale_account_ids(&pool, Utc::now() - Duration::days(7), 1)
        .await
        .unwrap();
    assert_eq!(capped, vec!["c".to_string()]);
}

// ---------------------------------------------------------------------------
// Probe writes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn observation_without_post_clears_activity_and_logs_check(pool: sqlx::PgPool) {
    insert_user(&pool, "1", 42).await;
    let observation = ActivityObservation {
        user_id: "1".to_string(),
        post: None,
        days_inactive: None,
        rate_limit_remaining: Some(10),
    };
    assert!(record_activity_observation(&pool, &observation).await.unwrap());

    let row = get_account(&pool, "1").await.unwrap();
    assert!(row.last_tweet_date.is_none());
    assert!(row.days_inactive.is_none());
    assert_eq!(row.check_count, 1);
    assert!(row.last_checked_date.is_some());

    let checks = list_activity_checks(&pool, "1", 10).await.unwrap();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].follower_count, Some(42));
    assert_eq!(checks[0].rate_limit_remaining, Some(10));
}

#[sqlx::test(migrations = "../../migrations")]
async fn probe_writes_skip_terminal_accounts(pool: sqlx::PgPool) {
    insert_user(&pool, "1", 42).await;
    mark_unfollowed_without_log(&pool, "1", "gone").await.unwrap();

    let observation = ActivityObservation {
        user_id: "1".to_string(),
        post: None,
        days_inactive: None,
        rate_limit_remaining: None,
    };
    assert!(!record_activity_observation(&pool, &observation).await.unwrap());
    assert!(!mark_checked_without_observation(&pool, "1").await.unwrap());

    let row = get_account(&pool, "1").await.unwrap();
    assert_eq!(row.check_count, 0);
    assert!(list_activity_checks(&pool, "1", 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn unauthorized_check_bumps_counters_without_record(pool: sqlx::PgPool) {
    insert_user(&pool, "1", 42).await;
    assert!(mark_checked_without_observation(&pool, "1").await.unwrap());
    assert!(mark_checked_without_observation(&pool, "1").await.unwrap());

    let row = get_account(&pool, "1").await.unwrap();
    assert_eq!(row.check_count, 2);
    assert!(list_activity_checks(&pool, "1", 10).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Scores and candidates
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn score_updates_skip_terminal_rows(pool: sqlx::PgPool) {
    insert_user(&pool, "a", 1).await;
    insert_user(&pool, "b", 1).await;
    mark_unfollowed_without_log(&pool, "b", "gone").await.unwrap();

    let updated = update_unfollow_scores(&pool, &[("a".to_string(), 70), ("b".to_string(), 70)])
        .await
        .unwrap();
    assert_eq!(updated, 1);
    assert_eq!(get_account(&pool, "a").await.unwrap().unfollow_score, Some(70));
    assert_eq!(get_account(&pool, "b").await.unwrap().unfollow_score, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn candidates_order_is_deterministic(pool: sqlx::PgPool) {
    for id in ["a", "b", "c", "d"] {
        insert_user(&pool, id, 10).await;
    }
    set_score(&pool, "a", 80, Some(200)).await;
    set_score(&pool, "b", 80, Some(400)).await;
    set_score(&pool, "c", 80, None).await;
    set_score(&pool, "d", 95, Some(100)).await;

    let rows = list_unfollow_candidates(&pool, 50, ProtectionPolicy::none(), 10)
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(ids, vec!["d", "b", "a", "c"]);

    let limited = list_unfollow_candidates(&pool, 50, ProtectionPolicy::none(), 2)
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn candidates_exclude_whitelisted_terminal_and_protected(pool: sqlx::PgPool) {
    for (id, followers) in [("w", 10), ("t", 10), ("v", 10), ("big", 50_000), ("ok", 10)] {
        insert_user(&pool, id, followers).await;
        set_score(&pool, id, 90, Some(500)).await;
    }
    sqlx::query("UPDATE accounts SET verified = TRUE WHERE user_id = 'v'")
        .execute(&pool)
        .await
        .unwrap();
    add_to_whitelist(&pool, &whitelist_entry("w", "friend"))
        .await
        .unwrap();
    mark_unfollowed_without_log(&pool, "t", "gone").await.unwrap();

    let open = list_unfollow_candidates(&pool, 50, ProtectionPolicy::none(), 10)
        .await
        .unwrap();
    let mut ids: Vec<_> = open.iter().map(|r| r.user_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["big", "ok", "v"]);

    let policy = ProtectionPolicy {
        exclude_verified: true,
        max_follower_count: Some(10_000),
    };
    let guarded = list_unfollow_candidates(&pool, 50, policy, 10)
        .await
        .unwrap();
    assert_eq!(guarded.len(), 1);
    assert_eq!(guarded[0].user_id, "ok");
}

#[sqlx::test(migrations = "../../migrations")]
async fn candidates_empty_is_ok(pool: sqlx::PgPool) {
    let rows = list_unfollow_candidates(&pool, 50, ProtectionPolicy::none(), 10)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

// ---------------------------------------------------------------------------
// Whitelist
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn whitelist_add_is_idempotent_and_forces_sentinel(pool: sqlx::PgPool) {
    insert_user(&pool, "1", 10).await;
    set_score(&pool, "1", 120, Some(900)).await;

    add_to_whitelist(&pool, &whitelist_entry("1", "first"))
        .await
        .unwrap();
    let second = add_to_whitelist(&pool, &whitelist_entry("1", "second"))
        .await
        .unwrap();
    assert_eq!(second.reason.as_deref(), Some("second"));
    assert_eq!(second.display_name.as_deref(), Some("User 1"));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM whitelist WHERE user_id = '1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let row = get_account(&pool, "1").await.unwrap();
    assert!(row.is_whitelisted);
    assert_eq!(row.effective_score, Some(xgrowth_core::SENTINEL_NEVER));
    assert_eq!(row.unfollow_score, Some(120));
}

#[sqlx::test(migrations = "../../migrations")]
async fn whitelist_remove_restores_real_score(pool: sqlx::PgPool) {
    insert_user(&pool, "1", 10).await;
    set_score(&pool, "1", 120, Some(900)).await;
    add_to_whitelist(&pool, &whitelist_entry("1", "temp"))
        .await
        .unwrap();

    assert!(remove_from_whitelist(&pool, "1").await.unwrap());
    assert!(!remove_from_whitelist(&pool, "1").await.unwrap());

    let row = get_account(&pool, "1").await.unwrap();
    assert!(!row.is_whitelisted);
    assert_eq!(row.effective_score, Some(120));
}

#[sqlx::test(migrations = "../../migrations")]
async fn auto_whitelist_adds_only_new_matches(pool: sqlx::PgPool) {
    insert_user(&pool, "small", 10).await;
    insert_user(&pool, "big", 200_000).await;
    insert_user(&pool, "bigger", 500_000).await;
    add_to_whitelist(&pool, &whitelist_entry("bigger", "manual"))
        .await
        .unwrap();

    let added = auto_whitelist(&pool, AutoWhitelistRule::MinFollowers(100_000))
        .await
        .unwrap();
    assert_eq!(added, 1);
    let again = auto_whitelist(&pool, AutoWhitelistRule::MinFollowers(100_000))
        .await
        .unwrap();
    assert_eq!(again, 0);

    let entry = xgrowth_db::get_whitelist_entry(&pool, "big")
        .await
        .unwrap()
        .expect("big should be whitelisted");
    assert_eq!(
        entry.reason.as_deref(),
        Some("Auto-added: High influence (200000 followers)")
    );
    assert_eq!(entry.added_by, "auto");
}

#[sqlx::test(migrations = "../../migrations")]
async fn auto_whitelist_verified(pool: sqlx::PgPool) {
    insert_user(&pool, "v", 10).await;
    insert_user(&pool, "n", 10).await;
    sqlx::query("UPDATE accounts SET verified = TRUE WHERE user_id = 'v'")
        .execute(&pool)
        .await
        .unwrap();

    let added = auto_whitelist(&pool, AutoWhitelistRule::Verified)
        .await
        .unwrap();
    assert_eq!(added, 1);
    assert!(get_account(&pool, "v").await.unwrap().is_whitelisted);
    assert!(!get_account(&pool, "n").await.unwrap().is_whitelisted);

    let entry = xgrowth_db::get_whitelist_entry(&pool, "v")
        .await
        .unwrap()
        .expect("v should be whitelisted");
    assert_eq!(entry.reason.as_deref(), Some("Auto-added: Verified account"));
    assert_eq!(entry.added_by, "auto");
}

#[sqlx::test(migrations = "../../migrations")]
async fn suggestions_skip_members_and_low_reach(pool: sqlx::PgPool) {
    insert_user(&pool, "huge", 80_000).await;
    insert_user(&pool, "active", 20_000).await;
    insert_user(&pool, "quiet", 20_000).await;
    insert_user(&pool, "small", 100).await;
    insert_user(&pool, "member", 90_000).await;
    set_score(&pool, "active", 0, Some(5)).await;
    set_score(&pool, "quiet", 0, Some(300)).await;
    add_to_whitelist(&pool, &whitelist_entry("member", "friend"))
        .await
        .unwrap();

    let rows = suggest_whitelist_candidates(&pool, 20).await.unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(ids, vec!["huge", "active"]);
}

// ---------------------------------------------------------------------------
// Unfollow log and runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn record_unfollow_is_atomic_and_terminal(pool: sqlx::PgPool) {
    insert_user(&pool, "1", 10).await;
    let batch_id = Uuid::new_v4();

    assert!(record_unfollow(&pool, &log_entry("1", batch_id)).await.unwrap());
    // Second attempt finds the account terminal and writes nothing.
    assert!(!record_unfollow(&pool, &log_entry("1", batch_id)).await.unwrap());

    let rows = list_unfollows_by_batch(&pool, batch_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].can_rollback);

    let row = get_account(&pool, "1").await.unwrap();
    assert!(row.is_terminal());
    assert_eq!(
        row.unfollow_reason.as_deref(),
        Some("Inactive for 400 days (score: 120)")
    );

    let recent = count_unfollows_since(&pool, Utc::now() - Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(recent, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn daily_count_includes_unlogged_terminal_marks(pool: sqlx::PgPool) {
    for id in ["logged", "gone", "kept"] {
        insert_user(&pool, id, 10).await;
    }
    record_unfollow(&pool, &log_entry("logged", Uuid::new_v4()))
        .await
        .unwrap();
    mark_unfollowed_without_log(&pool, "gone", "Account no longer exists")
        .await
        .unwrap();

    let recent = count_unfollows_since(&pool, Utc::now() - Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(recent, 2);

    let none_later = count_unfollows_since(&pool, Utc::now() + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(none_later, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn cleaner_run_lifecycle_planned_to_completed(pool: sqlx::PgPool) {
    let batch_id = Uuid::new_v4();
    let run = create_cleaner_run(&pool, batch_id, "cli", 3).await.unwrap();
    assert_eq!(run.status, "planned");

    start_cleaner_run(&pool, batch_id).await.unwrap();
    let counts = CleanerRunCounts {
        succeeded: 2,
        failed: 1,
        vetoed: 0,
    };
    complete_cleaner_run(&pool, batch_id, counts).await.unwrap();

    let run = get_cleaner_run(&pool, batch_id).await.unwrap();
    assert_eq!(run.status, "completed");
    assert_eq!(run.succeeded, 2);
    assert_eq!(run.failed, 1);
    assert!(run.started_at.is_some());
    assert!(run.completed_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn cleaner_run_abort_records_reason(pool: sqlx::PgPool) {
    let batch_id = Uuid::new_v4();
    create_cleaner_run(&pool, batch_id, "cli", 10).await.unwrap();
    start_cleaner_run(&pool, batch_id).await.unwrap();
    abort_cleaner_run(&pool, batch_id, CleanerRunCounts::default(), "rate_limited")
        .await
        .unwrap();

    let run = get_cleaner_run(&pool, batch_id).await.unwrap();
    assert_eq!(run.status, "aborted");
    assert_eq!(run.abort_reason.as_deref(), Some("rate_limited"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn cleaner_run_rejects_invalid_transitions(pool: sqlx::PgPool) {
    let batch_id = Uuid::new_v4();
    create_cleaner_run(&pool, batch_id, "cli", 1).await.unwrap();

    let err = complete_cleaner_run(&pool, batch_id, CleanerRunCounts::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidCleanerRunTransition {
            expected_status: "executing",
            ..
        }
    ));

    start_cleaner_run(&pool, batch_id).await.unwrap();
    let err = start_cleaner_run(&pool, batch_id).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidCleanerRunTransition {
            expected_status: "planned",
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn stats_bucket_active_accounts(pool: sqlx::PgPool) {
    for id in ["dead", "six", "three", "fresh", "unknown", "gone", "safe"] {
        insert_user(&pool, id, 10).await;
    }
    set_score(&pool, "dead", 130, Some(500)).await;
    set_score(&pool, "six", 80, Some(200)).await;
    set_score(&pool, "three", 20, Some(100)).await;
    set_score(&pool, "fresh", 0, Some(5)).await;
    set_score(&pool, "safe", 130, Some(800)).await;
    add_to_whitelist(&pool, &whitelist_entry("safe", "friend"))
        .await
        .unwrap();
    record_unfollow(&pool, &log_entry("gone", Uuid::new_v4()))
        .await
        .unwrap();

    let stats = get_cleaner_stats(&pool, 50, ProtectionPolicy::none())
        .await
        .unwrap();
    assert_eq!(stats.total_following, 6);
    assert_eq!(stats.dead_1year, 2);
    assert_eq!(stats.inactive_6months, 1);
    assert_eq!(stats.inactive_3months, 1);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.unchecked, 1);
    assert_eq!(stats.unfollow_candidates, 2);
    assert_eq!(stats.whitelisted_accounts, 1);
    assert_eq!(stats.total_unfollowed, 1);
    assert_eq!(stats.checks_last_24h, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn stats_candidates_follow_protection_policy(pool: sqlx::PgPool) {
    for (id, followers) in [("v", 10), ("big", 50_000), ("ok", 10)] {
        insert_user(&pool, id, followers).await;
        set_score(&pool, id, 130, Some(500)).await;
    }
    sqlx::query("UPDATE accounts SET verified = TRUE WHERE user_id = 'v'")
        .execute(&pool)
        .await
        .unwrap();
    let policy = ProtectionPolicy {
        exclude_verified: true,
        max_follower_count: Some(10_000),
    };

    let open = get_cleaner_stats(&pool, 50, ProtectionPolicy::none())
        .await
        .unwrap();
    assert_eq!(open.unfollow_candidates, 3);

    let guarded = get_cleaner_stats(&pool, 50, policy).await.unwrap();
    assert_eq!(guarded.unfollow_candidates, 1);
    let listed = list_unfollow_candidates(&pool, 50, policy, 10)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(guarded.total_following, 3);
}
