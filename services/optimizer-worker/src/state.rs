use qf_config::settings::Settings;
use qf_http::AdminGuard;
use sqlx::PgPool;

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub admin_guard: AdminGuard,
}
