//! External-world adapters: HTTP, robots compliance, persistence, logging,
//! LLM access and content extraction.

pub mod config;
pub mod database_connection;
pub mod extraction;
pub mod http_client;
pub mod llm;
pub mod logging;
pub mod release_repository;
pub mod robots;

pub use database_connection::DatabaseConnection;
pub use http_client::{FetchError, HttpClient, HttpClientConfig};
pub use llm::{LlmClient, LlmClientConfig};
pub use release_repository::ReleaseRepository;
pub use robots::ComplianceGate;
