use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::payments::PaymentProvider;

/// Everything handlers need, passed explicitly through the router.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub payments: Arc<dyn PaymentProvider>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, payments: Arc<dyn PaymentProvider>) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            payments,
        }
    }
}
