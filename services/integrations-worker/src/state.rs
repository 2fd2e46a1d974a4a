use qf_config::settings::Settings;
use qf_integrations::{WebhookKbSink, WebhookTicketSink};
use sqlx::PgPool;

pub struct AppState {
    pub pool: PgPool,
    pub settings: Settings,
    pub tickets: WebhookTicketSink,
    pub kb: WebhookKbSink,
}
