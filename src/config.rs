//! Client configuration.  Defaults match the dashboard's development
//! backend; `ClientConfig::from_env` lets a `.env` file or the
//! environment override them.
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TOKEN_KEY: &str = "access_token";
pub const DEFAULT_ENTRY_PAGE: &str = "index.html";

/// Wording used when the server gives no `detail`.  The admin pages
/// and the dashboard script phrased these differently.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessages {
    pub unauthorized: String,
    pub login_failed: String,
    pub no_token: String,
    pub request_failed: String,
    pub upload_failed: String,
}

impl ErrorMessages {
    pub fn standard() -> Self {
        Self {
            unauthorized: "Unauthorized".to_string(),
            login_failed: "Login failed".to_string(),
            no_token: "No access token".to_string(),
            request_failed: "HTTP error!".to_string(),
            upload_failed: "HTTP error!".to_string(),
        }
    }

    pub fn dashboard() -> Self {
        Self {
            unauthorized: "Authentication expired".to_string(),
            login_failed: "Login failed".to_string(),
            no_token: "No access token".to_string(),
            request_failed: "API call failed".to_string(),
            upload_failed: "Upload failed".to_string(),
        }
    }
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug)]
pub struct ErrorMessagesParseErr;

impl FromStr for ErrorMessages {
    type Err = ErrorMessagesParseErr;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(ErrorMessages::standard()),
            "dashboard" => Ok(ErrorMessages::dashboard()),
            _ => Err(ErrorMessagesParseErr),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Everything before the resource path.  No trailing `/`
    pub base_url: String,

    /// Key the token is persisted under
    pub token_key: String,

    /// Where an expired session sends the user
    pub entry_page: String,

    /// `None` leaves the transport default in place
    pub timeout: Option<Duration>,

    /// Token file.  `None` means the per-user default location
    pub token_file: Option<PathBuf>,

    pub messages: ErrorMessages,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            entry_page: DEFAULT_ENTRY_PAGE.to_string(),
            timeout: None,
            token_file: None,
            messages: ErrorMessages::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Read a `.env` file, if there is one, then the `EDU_*`
    /// environment variables.  Unset or unparsable values keep their
    /// defaults.
    pub fn from_env() -> Self {
        // A missing .env file is normal
        if let Err(err) = dotenv::dotenv() {
            log::debug!("No .env loaded: {err}");
        }
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("EDU_API_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = lookup("EDU_TOKEN_KEY") {
            config.token_key = key;
        }
        if let Some(page) = lookup("EDU_ENTRY_PAGE") {
            config.entry_page = page;
        }
        if let Some(secs) = lookup("EDU_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(secs) => config.timeout = Some(Duration::from_secs(secs)),
                Err(err) => log::warn!("EDU_TIMEOUT_SECS={secs}: {err}"),
            }
        }
        if let Some(file) = lookup("EDU_TOKEN_FILE") {
            config.token_file = Some(PathBuf::from(file));
        }
        if let Some(wording) = lookup("EDU_ERROR_WORDING") {
            match ErrorMessages::from_str(wording.as_str()) {
                Ok(messages) => config.messages = messages,
                Err(_) => log::warn!("EDU_ERROR_WORDING={wording} is not standard or dashboard"),
            }
        }
        config
    }
}
