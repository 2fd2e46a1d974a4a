use qf_config::settings::Settings;
use qf_http::AdminGuard;
use sqlx::PgPool;

/// Base URLs for the sibling services the orchestrator calls synchronously
/// in `http`/`hybrid` mode (spec.md §6's `*_URL for sibling services`
/// convention: `ANALYST_URL`, `RISK_URL`, `EXECUTOR_URL`).
#[derive(Debug, Clone)]
pub struct SiblingUrls {
    pub analyst: String,
    pub risk: String,
    pub executor: String,
}

impl SiblingUrls {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(SiblingUrls {
            analyst: qf_config::settings::sibling_url("analyst")?,
            risk: qf_config::settings::sibling_url("risk")?,
            executor: qf_config::settings::sibling_url("executor")?,
        })
    }
}

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub http: reqwest::Client,
    pub siblings: SiblingUrls,
    pub admin_guard: AdminGuard,
}
