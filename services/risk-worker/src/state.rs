use qf_config::settings::Settings;
use sqlx::PgPool;

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
}
