use std::future::Future;

use xgrowth_core::FollowedUser;

use crate::error::XError;
use crate::types::{FollowingPage, LatestPost, Quota};

/// The platform operations the cleaning pipeline depends on.
///
/// [`crate::XClient`] is the production implementation; pipeline tests use
/// scripted fakes.
pub trait Gateway: Send + Sync {
    /// One page of the tracked account's following list. `cursor` is the
    /// `next_cursor` of the previous page.
    fn list_following(
        &self,
        cursor: Option<&str>,
    ) -> impl Future<Output = Result<FollowingPage, XError>> + Send;

    /// Most recent post by `user_id`.
    fn get_latest_post(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<LatestPost, XError>> + Send;

    /// Removes the follow relationship to `user_id`.
    fn unfollow(&self, user_id: &str) -> impl Future<Output = Result<Quota, XError>> + Send;

    /// Resolves a username to a profile.
    fn lookup_user(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<FollowedUser, XError>> + Send;
}
