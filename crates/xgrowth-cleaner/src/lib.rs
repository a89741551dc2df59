//! The inactive-follower cleaning pipeline: following sync, activity probes,
//! scoring, ranking, and paced unfollow execution.

pub mod cycle;
pub mod error;
pub mod executor;
pub mod pacer;
pub mod prober;
pub mod ranker;
pub mod scorer;
pub mod stop;
pub mod sync;
pub mod whitelist;

pub use cycle::{
    build_report, recommendations, run_cleaning_cycle, CleanerReport, CycleOptions, CycleSummary,
};
pub use error::CleanerError;
pub use executor::{
    AbortReason, CandidateOutcome, OutcomeKind, RunState, RunSummary, UnfollowExecutor,
};
pub use pacer::Pacer;
pub use prober::{ActivityProber, ProbeSummary};
pub use ranker::{Candidate, CandidateRanker};
pub use scorer::recompute_all;
pub use stop::StopSignal;
pub use sync::{FollowingSync, SyncStop, SyncSummary};
pub use whitelist::{
    parse_import, AddOutcome, ImportEntry, ImportSummary, RemoveOutcome, WhitelistGuard,
};
