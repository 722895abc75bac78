//! Outbound integrations: the mining/topic microservice HTTP API and SMTP
//! notification delivery.

pub mod config;
pub mod email;
pub mod http;

pub use config::ServiceConfig;
pub use email::{EmailConfig, NullNotifier, SmtpNotifier};
pub use http::ServiceApiClient;
