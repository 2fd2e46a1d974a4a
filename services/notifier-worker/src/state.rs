use qf_config::settings::Settings;
use qf_http::AdminGuard;
use qf_notify::{SeverityRouter, WebhookSink};
use sqlx::PgPool;

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub router: SeverityRouter,
    pub sink: WebhookSink,
    pub admin_guard: AdminGuard,
}
