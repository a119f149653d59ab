pub mod cache;
pub mod client;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod suffix;
pub mod validator;

pub use cache::{CacheOptions, ExpiryCache};
pub use error::ResolutionError;
pub use pipeline::DomainChecker;
pub use resolver::{WhoisInfo, WhoisLookup, WhoisResolver};
pub use suffix::SuffixList;
pub use validator::DomainValidator;
