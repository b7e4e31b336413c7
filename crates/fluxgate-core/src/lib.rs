//! Fluxgate Core Types
//!
//! This crate provides the fundamental types shared across Fluxgate:
//! - Route rule schema (rules, matchers, actions)
//! - The request view consumed by the router
//! - Core error types

pub mod error;
pub mod request;
pub mod route;

pub use error::{Error, Result};
pub use request::RouteRequest;
pub use route::{
    DEFAULT_METHODS, HeaderMatcher, RouteAction, RouteConfig, RouteMatch, RouteRule,
};
