pub mod client;
pub mod error;
pub mod gateway;
pub(crate) mod retry;
pub mod types;

pub use client::{ClientOptions, XClient};
pub use error::XError;
pub use gateway::Gateway;
pub use types::{FollowingPage, LatestPost, Post, Quota};
