//! Airwave Core Library
//!
//! Domain types shared by the Airwave gateway:
//! - Identity providers and the stable failure codes of the sign-in flow
//! - Provider payloads and their normalization into one identity shape
//! - Redirect targets handed back to the calling application
//! - Directory upstream candidates discovered through DNS SRV records

pub mod error;
pub mod identity;
pub mod provider;
pub mod redirect;
pub mod upstream;

pub use error::Error;
pub use identity::{GithubEmail, GithubUser, GoogleUserInfo, NormalizedIdentity, TokenResponse};
pub use provider::{FailureReason, Provider};
pub use redirect::ReturnSource;
pub use upstream::{HostFilter, SrvTarget};

/// Result type for airwave-core operations
pub type Result<T> = std::result::Result<T, Error>;
