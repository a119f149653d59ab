pub mod checker;
pub mod discovery;
pub mod fetcher;

pub use checker::CertificateChecker;
pub use discovery::HostDiscovery;
pub use fetcher::{CertFetchError, PeerCertFetcher, PeerCertificate, TlsPeerFetcher};
