//! Microservice API configuration.

/// Configuration for the mining/topic microservice API.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the microservice, without a trailing slash.
    pub api_base: String,
    /// Value for the `service-login` request header.
    pub login: String,
    /// Value for the `service-pwd` request header.
    pub password: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SERVICE_API_BASE` is not set, signalling that the
    /// microservice integration is not configured.
    ///
    /// | Variable           | Required | Default |
    /// |--------------------|----------|---------|
    /// | `SERVICE_API_BASE` | yes      | (none)  |
    /// | `SERVICE_LOGIN`    | no       | empty   |
    /// | `SERVICE_PASSWORD` | no       | empty   |
    pub fn from_env() -> Option<Self> {
        let api_base = std::env::var("SERVICE_API_BASE").ok()?;
        Some(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            login: std::env::var("SERVICE_LOGIN").unwrap_or_default(),
            password: std::env::var("SERVICE_PASSWORD").unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ServiceConfig {
            api_base: "http://svc.local/api/".trim_end_matches('/').to_string(),
            login: String::new(),
            password: String::new(),
        };
        assert_eq!(config.api_base, "http://svc.local/api");
    }
}
