//! # reforge-github
//!
//! GitHub collaborators for reforge:
//! - [`PullRequestService`]: open/locate pull requests and query merge
//!   status over the GitHub REST API
//! - [`UsageService`]: per-agent usage quota checks gating the matcher
//! - [`TokenCache`]: explicit, resettable GitHub token resolution

mod pr;
mod token;
mod usage;

pub use pr::{
    GithubPrService, MockPullRequestService, OpenPullRequestParams, PullRequestInfo,
    PullRequestService, PullRequestStatus,
};
pub use token::TokenCache;
pub use usage::{
    format_seconds, CodexUsage, RateLimitWindow, UsageDetails, UsageService, UsageServiceAdapter,
};
