//! Error types for Fluxgate Core

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// No snapshot has been published yet.
    #[error("router configuration is empty")]
    ConfigurationEmpty,

    /// The request matched neither a header-only rule nor a trie route.
    #[error("no route matched")]
    NoRouteMatched,
}

pub type Result<T> = std::result::Result<T, Error>;
