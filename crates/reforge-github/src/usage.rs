//! Agent usage quotas
//!
//! The matcher refuses to hand out work when the selected agent has no
//! token budget left for the day. Codex exposes a usage endpoint; the
//! Gemini family has no equivalent yet and is always allowed.

use async_trait::async_trait;
use reforge_core::{AgentId, ReforgeError, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

const CODEX_USAGE_URL: &str = "https://chatgpt.com/backend-api/wham/usage";
const WEEKLY_ALLOWANCE_PERCENT: f64 = 100.0;
const WEEKLY_WINDOW_DAYS: f64 = 7.0;

/// Port for the usage-quota collaborator
#[async_trait]
pub trait UsageService: Send + Sync {
    /// Whether the agent still has budget for today
    async fn has_tokens(&self, agent: AgentId) -> Result<bool>;
}

/// Dispatches quota checks per agent family
#[derive(Default)]
pub struct UsageServiceAdapter;

impl UsageServiceAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UsageService for UsageServiceAdapter {
    async fn has_tokens(&self, agent: AgentId) -> Result<bool> {
        match agent {
            AgentId::OpenaiCodex => CodexUsage::new()?.has_tokens().await,
            AgentId::GoogleGemini25Pro | AgentId::GoogleGemini25Flash => {
                warn!("Gemini usage checks are not implemented yet; defaulting to true");
                Ok(true)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthFile {
    tokens: AuthTokens,
}

#[derive(Debug, Deserialize)]
struct AuthTokens {
    access_token: String,
    account_id: String,
}

/// One rate-limit window as reported by the usage endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitWindow {
    pub used_percent: f64,
    pub limit_window_seconds: u64,
    pub reset_after_seconds: u64,
    #[serde(default)]
    pub limit_reached: bool,
}

#[derive(Debug, Deserialize)]
struct RateLimit {
    #[serde(default)]
    limit_reached: bool,
    primary_window: RateLimitWindow,
    secondary_window: RateLimitWindow,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    plan_type: String,
    rate_limit: RateLimit,
}

/// Computed usage summary for operators and the quota gate
#[derive(Debug, Clone)]
pub struct UsageDetails {
    pub plan_type: String,
    pub consumed_allowance: f64,
    pub remaining_for_today: f64,
    pub primary_window: RateLimitWindow,
    pub secondary_window: RateLimitWindow,
    pub limit_reached: bool,
}

/// Codex quota check against the account usage endpoint
///
/// The weekly allowance is pro-rated: after N of 7 window days, the agent
/// has earned N/7 of the weekly budget; it has tokens left while consumed
/// usage stays at or below that earned share.
pub struct CodexUsage {
    auth_path: PathBuf,
    usage_url: String,
    client: reqwest::Client,
}

impl CodexUsage {
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| ReforgeError::Usage("could not determine home directory".to_string()))?;
        Ok(Self {
            auth_path: home.join(".codex").join("auth.json"),
            usage_url: CODEX_USAGE_URL.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Override auth file and endpoint (test servers)
    pub fn with_endpoints(auth_path: PathBuf, usage_url: impl Into<String>) -> Self {
        Self {
            auth_path,
            usage_url: usage_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn read_auth(&self) -> Result<AuthFile> {
        let contents = std::fs::read_to_string(&self.auth_path).map_err(|e| {
            ReforgeError::Usage(format!(
                "could not read auth file at {}: {}",
                self.auth_path.display(),
                e
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            ReforgeError::Usage(format!(
                "could not parse auth file at {}: {}",
                self.auth_path.display(),
                e
            ))
        })
    }

    async fn fetch_usage(&self, token: &str, account_id: &str) -> Result<UsageData> {
        let response = self
            .client
            .get(&self.usage_url)
            .bearer_auth(token)
            .header("chatgpt-account-id", account_id)
            .send()
            .await
            .map_err(|e| ReforgeError::Usage(format!("failed to fetch usage data: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReforgeError::Usage(format!(
                "usage API request failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ReforgeError::Usage(format!("failed to parse usage data: {}", e)))
    }

    /// Fetch and summarize the account's current usage
    pub async fn usage_details(&self) -> Result<UsageDetails> {
        let auth = self.read_auth()?;
        let usage = self
            .fetch_usage(&auth.tokens.access_token, &auth.tokens.account_id)
            .await?;

        let remaining = prorated_remaining(&usage.rate_limit.secondary_window);

        Ok(UsageDetails {
            plan_type: usage.plan_type,
            consumed_allowance: usage.rate_limit.secondary_window.used_percent,
            remaining_for_today: remaining,
            primary_window: usage.rate_limit.primary_window,
            secondary_window: usage.rate_limit.secondary_window,
            limit_reached: usage.rate_limit.limit_reached,
        })
    }

    pub async fn has_tokens(&self) -> Result<bool> {
        let details = self.usage_details().await?;
        log_usage(&details);
        Ok(details.remaining_for_today >= 0.0)
    }
}

/// Remaining daily budget for the weekly window, in percent points.
/// Negative when usage has outrun the earned share.
fn prorated_remaining(weekly: &RateLimitWindow) -> f64 {
    let seconds_passed =
        weekly.limit_window_seconds.saturating_sub(weekly.reset_after_seconds) as f64;
    let days_passed = seconds_passed / (60.0 * 60.0 * 24.0);
    let earned = days_passed / WEEKLY_WINDOW_DAYS * WEEKLY_ALLOWANCE_PERCENT;
    earned - weekly.used_percent
}

fn log_usage(details: &UsageDetails) {
    info!("Plan: {}", details.plan_type);
    info!(
        "Total weekly usage so far: {:.2}%",
        details.consumed_allowance
    );
    info!(
        "Primary limit resets in {}",
        format_seconds(details.primary_window.reset_after_seconds)
    );
    info!(
        "Weekly limit resets in {}",
        format_seconds(details.secondary_window.reset_after_seconds)
    );

    if details.remaining_for_today >= 0.0 {
        info!(
            "You have {:.2}% of your token budget left for today",
            details.remaining_for_today
        );
    } else {
        warn!(
            "Daily budget exhausted ({:.2}% over the earned allowance)",
            -details.remaining_for_today
        );
    }
}

/// Render a duration in seconds as `Xd Yh Zm`
pub fn format_seconds(total: u64) -> String {
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    format!("{}d {}h {}m", days, hours, minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(used_percent: f64, days_passed: f64) -> RateLimitWindow {
        let total = 7 * 86_400;
        let passed = (days_passed * 86_400.0) as u64;
        RateLimitWindow {
            used_percent,
            limit_window_seconds: total,
            reset_after_seconds: total - passed,
            limit_reached: false,
        }
    }

    #[test]
    fn test_prorated_remaining_under_budget() {
        // 3.5 of 7 days passed earns 50%; 20% used leaves 30%.
        let remaining = prorated_remaining(&window(20.0, 3.5));
        assert!((remaining - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_prorated_remaining_over_budget() {
        // One day in, 40% used: over budget by ~25.7 points.
        let remaining = prorated_remaining(&window(40.0, 1.0));
        assert!(remaining < 0.0);
    }

    #[test]
    fn test_prorated_remaining_fresh_window() {
        let remaining = prorated_remaining(&window(0.0, 0.0));
        assert!((remaining - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(90_061), "1d 1h 1m");
        assert_eq!(format_seconds(59), "0d 0h 0m");
    }

    #[test]
    fn test_auth_file_parsing() {
        let json = r#"{"tokens": {"access_token": "tok", "account_id": "acc"}}"#;
        let auth: AuthFile = serde_json::from_str(json).unwrap();
        assert_eq!(auth.tokens.access_token, "tok");
        assert_eq!(auth.tokens.account_id, "acc");
    }

    #[test]
    fn test_missing_auth_file_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let usage = CodexUsage::with_endpoints(dir.path().join("auth.json"), "http://unused");
        assert!(matches!(usage.read_auth(), Err(ReforgeError::Usage(_))));
    }
}
