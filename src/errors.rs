use thiserror::Error;

/// Coarse classification of API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// 401 / 403
    Authentication,
    /// 429
    RateLimit,
    /// 5xx
    Server,
    /// Other 4xx, or a body that could not be decoded.
    Client,
    /// Connection and transport failures.
    Network,
    /// Bad client setup (URL, key).
    Config,
}

/// Errors raised by the REST client and the remote data service.
///
/// Nothing is retried: every variant propagates to the caller as-is.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::RateLimit(_) => ApiErrorCategory::RateLimit,
            Self::Server(_) => ApiErrorCategory::Server,
            Self::Client(_) => ApiErrorCategory::Client,
            Self::Network(_) => ApiErrorCategory::Network,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// Maps a non-success HTTP status to an error.
    pub fn from_status(status: reqwest::StatusCode, url: &str, body: String) -> Self {
        let message = if body.is_empty() {
            format!("{} returned status {}", url, status)
        } else {
            format!("{} returned status {}: {}", url, status, body)
        };

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            Self::Auth(message)
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimit(message)
        } else if status.is_server_error() {
            Self::Server(message)
        } else if status.is_client_error() {
            Self::Client(message)
        } else {
            Self::Network(message)
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Config(err.to_string())
        } else if err.is_decode() {
            Self::Client(format!("Failed to parse response: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    /// A form-level rule blocked the action. The message is user facing.
    #[error("{0}")]
    Validation(String),

    #[error("Not logged in. Run `timesheet login --email <address>` first.")]
    NotLoggedIn,

    #[error("{0} not found")]
    NotFound(String),

    /// One step of the two-step cell save failed. When the time entry step
    /// fails the allocation already exists server-side under `scheduled_id`.
    #[error("{stage} write failed{}: {source}", kept_note(.scheduled_id))]
    SaveFailed {
        stage: SaveStage,
        scheduled_id: Option<String>,
        #[source]
        source: ApiError,
    },
}

fn kept_note(scheduled_id: &Option<String>) -> String {
    scheduled_id.as_ref().map(|id| format!(" (allocation {} kept)", id)).unwrap_or_default()
}

/// Steps of the timesheet cell save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    Allocation,
    TimeEntry,
}

impl std::fmt::Display for SaveStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allocation => write!(f, "Allocation"),
            Self::TimeEntry => write!(f, "Time entry"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
