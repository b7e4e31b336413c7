//! The request view consumed by the router
//!
//! Hosts embed the router behind their own HTTP stack, so the router only
//! needs a narrow window onto the request: method, path, and header
//! lookup.

use std::collections::HashMap;

/// A routable request.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: String,
    path: String,
    /// Keys are stored lowercased; lookup is case-insensitive.
    headers: HashMap<String, String>,
}

impl RouteRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a header (builder style).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request path, possibly still carrying a query string; the
    /// matcher strips everything from `?` on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = RouteRequest::new("GET", "/api/v1/users").with_header("X-Env", "prod");

        assert_eq!(req.header("X-Env"), Some("prod"));
        assert_eq!(req.header("x-env"), Some("prod"));
        assert_eq!(req.header("X-ENV"), Some("prod"));
        assert_eq!(req.header("X-Other"), None);
    }

    #[test]
    fn test_header_values_keep_case() {
        let req = RouteRequest::new("GET", "/").with_header("X-Env", "Prod");
        assert_eq!(req.header("x-env"), Some("Prod"));
    }
}
