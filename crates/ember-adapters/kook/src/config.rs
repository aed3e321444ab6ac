//! Configuration for one KOOK bot account.
//!
//! # Example Configuration
//!
//! ```toml
//! [[bots]]
//! id = "1234567890"
//! adapter = "kook"
//! token = "your-bot-token"
//! ```

use serde::{Deserialize, Serialize};

/// Default KOOK HTTP API root.
pub const DEFAULT_BASE_URL: &str = "https://www.kookapp.cn/api/v3";

/// Credentials and endpoint of one KOOK bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KookConfig {
    /// Configured account id, replaced by the id reported by `/user/me`.
    pub id: String,

    /// Bot token, sent as `Authorization: Bot <token>`.
    pub token: String,

    /// HTTP API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl KookConfig {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
            base_url: default_base_url(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
