//! Service layer: cache, registry lookups, uploads and notifications.

pub mod cache;
pub mod external_api;
pub mod notificacoes;
pub mod storage;

pub use cache::Cache;
pub use external_api::ExternalApiClient;
pub use storage::Storage;
