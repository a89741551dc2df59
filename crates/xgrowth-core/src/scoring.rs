//! Unfollow score heuristic.
//!
//! Higher scores mean an account is a better removal candidate. The function
//! is pure: it only looks at the attributes passed in.

/// Effective score of a whitelisted account. Sorts below every real score.
pub const SENTINEL_NEVER: i32 = -1000;

/// Stored attributes that feed the score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreInput<'a> {
    pub is_whitelisted: bool,
    /// `None` means no post has ever been observed.
    pub days_inactive: Option<i32>,
    pub follower_count: Option<i64>,
    pub tweet_count: Option<i64>,
    pub verified: bool,
    pub protected: bool,
    pub profile_image_url: Option<&'a str>,
}

/// Effective score: [`SENTINEL_NEVER`] for whitelisted accounts, the raw score
/// otherwise.
#[must_use]
pub fn score(input: &ScoreInput<'_>) -> i32 {
    if input.is_whitelisted {
        return SENTINEL_NEVER;
    }
    raw_score(input)
}

/// Score ignoring whitelist membership. This is the value persisted on the
/// account row; whitelisting is applied on read.
#[must_use]
pub fn raw_score(input: &ScoreInput<'_>) -> i32 {
    let total = inactivity_points(input.days_inactive)
        + follower_points(input.follower_count.unwrap_or(0))
        + flag_points(input.verified, input.protected)
        + image_points(input.profile_image_url)
        + tweet_points(input.tweet_count.unwrap_or(0));
    total.max(0)
}

fn inactivity_points(days_inactive: Option<i32>) -> i32 {
    match days_inactive {
        Some(d) if d > 730 => 100,
        Some(d) if d > 365 => 80,
        Some(d) if d > 180 => 50,
        Some(d) if d > 90 => 20,
        _ => 0,
    }
}

fn follower_points(followers: i64) -> i32 {
    if followers < 50 {
        30
    } else if followers < 500 {
        15
    } else if followers < 5_000 {
        5
    } else if followers > 1_000_000 {
        -50
    } else if followers > 100_000 {
        -20
    } else {
        0
    }
}

fn flag_points(verified: bool, protected: bool) -> i32 {
    let mut points = 0;
    if verified {
        points -= 40;
    }
    if protected {
        points += 10;
    }
    points
}

fn image_points(profile_image_url: Option<&str>) -> i32 {
    match profile_image_url {
        None => 15,
        Some(url) if url.is_empty() || url.contains("default_profile") => 15,
        Some(_) => 0,
    }
}

fn tweet_points(tweets: i64) -> i32 {
    if tweets < 10 {
        25
    } else if tweets < 100 {
        10
    } else {
        0
    }
}
