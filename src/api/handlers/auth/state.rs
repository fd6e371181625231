//! Auth configuration and shared request state.

use secrecy::SecretString;

const DEFAULT_TOKEN_TTL_SECONDS: u64 = 24 * 60 * 60;
const DEFAULT_VERIFY_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";

#[derive(Clone)]
pub struct AuthConfig {
    jwt_secret: SecretString,
    token_ttl_seconds: u64,
    verify_token_ttl_seconds: i64,
    reset_token_ttl_seconds: i64,
    app_base_url: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self {
            jwt_secret,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            verify_token_ttl_seconds: DEFAULT_VERIFY_TOKEN_TTL_SECONDS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            app_base_url: DEFAULT_APP_BASE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: u64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_verify_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verify_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_app_base_url(mut self, url: String) -> Self {
        self.app_base_url = url;
        self
    }

    #[must_use]
    pub fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> u64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn verify_token_ttl_seconds(&self) -> i64 {
        self.verify_token_ttl_seconds
    }

    #[must_use]
    pub fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    #[must_use]
    pub fn app_base_url(&self) -> &str {
        &self.app_base_url
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"***")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("verify_token_ttl_seconds", &self.verify_token_ttl_seconds)
            .field("reset_token_ttl_seconds", &self.reset_token_ttl_seconds)
            .field("app_base_url", &self.app_base_url)
            .finish()
    }
}

#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}
