use qf_config::settings::Settings;
use sqlx::PgPool;

use crate::strategy::{DeterministicSource, SignalSource};

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub source: Box<dyn SignalSource>,
}

impl AppState {
    pub fn new(pool: PgPool, settings: Settings) -> Self {
        AppState {
            pool,
            settings,
            source: Box::new(DeterministicSource),
        }
    }
}
