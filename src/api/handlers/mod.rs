//! Route handlers for the pages, the prediction endpoint and health.
//!
//! Handlers get their dependencies as `Extension`s: the [`Database`], the
//! [`AuthState`], the shared `InferencePool` and the [`SiteConfig`].
//!
//! [`Database`]: crate::storage::Database
//! [`AuthState`]: crate::auth::AuthState

pub mod error;
pub mod health;
pub mod home;
pub mod login;
pub mod logout;
pub mod predict;
pub mod signup;
pub mod views;

#[cfg(test)]
mod tests;

pub use self::error::AppError;

use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

pub const DEFAULT_PREDICTION_URL: &str = "/predict";

/// Page-level settings rendered into the dashboard.
#[derive(Clone, Debug)]
pub struct SiteConfig {
    prediction_url: Arc<str>,
}

impl SiteConfig {
    #[must_use]
    pub fn new(prediction_url: impl Into<String>) -> Self {
        let prediction_url = prediction_url.into();
        let prediction_url = if prediction_url.trim().is_empty() {
            DEFAULT_PREDICTION_URL.to_string()
        } else {
            prediction_url
        };
        Self {
            prediction_url: Arc::from(prediction_url),
        }
    }

    #[must_use]
    pub fn prediction_url(&self) -> &str {
        &self.prediction_url
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREDICTION_URL)
    }
}

/// Flash messages carried in the query string after a redirect.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FlashQuery {
    /// Error shown above the form
    pub error: Option<String>,
    /// Success notice shown above the form
    pub success: Option<String>,
}
