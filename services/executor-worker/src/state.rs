use qf_config::settings::Settings;
use qf_exec::{Adapter, ExecutionGateway};
use sqlx::PgPool;

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub gateway: ExecutionGateway<Adapter>,
}
