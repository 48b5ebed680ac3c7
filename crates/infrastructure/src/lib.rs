//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod file_credential_store;
mod http_auth_api;
mod in_memory_credential_store;
mod tracing_notifier;

pub use file_credential_store::FileCredentialStore;
pub use http_auth_api::HttpAuthApi;
pub use in_memory_credential_store::InMemoryCredentialStore;
pub use tracing_notifier::TracingNotifier;
