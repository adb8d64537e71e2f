use thiserror::Error;

pub type Result<T> = std::result::Result<T, TelegramError>;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {description}")]
    Api { status: u16, description: String },
}

impl TelegramError {
    /// Unauthorized / forbidden responses mean the bot token or chat
    /// membership is wrong, not a transient failure.
    pub fn is_auth(&self) -> bool {
        matches!(self, TelegramError::Api { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Network(err.to_string())
    }
}
