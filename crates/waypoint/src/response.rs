// Copyright 2024-2026 Waypoint contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP response abstraction produced through the router.
//!
//! The router core never serializes responses; this type is the mutable
//! sink that filters and handlers write into. An adapter turns the final
//! state into its platform-specific response after
//! [`App::handle`](crate::App::handle) returns.

use std::collections::HashMap;

/// A platform-agnostic HTTP response under construction.
///
/// # Example
///
/// ```rust
/// use waypoint::Response;
///
/// let mut response = Response::new();
/// response.set_status(404).write("not here");
/// assert_eq!(response.status(), 404);
/// assert_eq!(response.body(), "not here");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: String,
}

impl Response {
    /// Creates an empty 200 response.
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets a header.
    pub fn header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Returns all headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Appends text to the body.
    pub fn write(&mut self, output: impl AsRef<str>) -> &mut Self {
        self.body.push_str(output.as_ref());
        self
    }

    /// Returns the body accumulated so far.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the reason phrase for the current status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self.status {
            200 => "OK",
            302 => "Found",
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "",
        }
    }

    /// Returns true for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
