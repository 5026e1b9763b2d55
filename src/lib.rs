pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod notifications;

pub use db::DbPool;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::auth::{OtpGenerator, TokenIssuer};
use crate::notifications::Mailer;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: TokenIssuer,
    pub otp: OtpGenerator,
    pub mailer: Arc<dyn Mailer>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the shared state. Secrets must already be set, see
    /// [`config::AuthConfig::ensure_secrets`].
    pub fn new(config: Config, db: DbPool, mailer: Arc<dyn Mailer>) -> Self {
        let tokens = TokenIssuer::new(&config.auth);
        let otp = OtpGenerator::new(&config.auth.otp_secret);
        Self {
            config,
            db,
            tokens,
            otp,
            mailer,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
