pub mod cache_store;
pub mod error;
pub mod run_store;
pub mod subscription_store;

#[cfg(test)]
mod tests;

pub use cache_store::CacheStore;
pub use error::{Result, StorageError};
pub use run_store::RunStore;
pub use subscription_store::{subscriber_key, SubscriptionStore};
