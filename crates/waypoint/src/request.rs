// Copyright 2024-2026 Waypoint contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP request abstraction consumed by the router.
//!
//! This is a platform-agnostic request type: adapters (HTTP servers,
//! test harnesses) build one per inbound request and hand it to
//! [`App::handle`](crate::App::handle). The router core only consults
//! [`method`](Request::method), [`url`](Request::url) and
//! [`is_ajax`](Request::is_ajax); the remaining accessors exist for
//! filters and handlers.

use std::collections::HashMap;

/// A platform-agnostic HTTP request.
///
/// # Example
///
/// ```rust
/// use waypoint::Request;
///
/// let request = Request::new("/users/42?page=1", "GET");
/// assert_eq!(request.url(), "/users/42");
/// assert_eq!(request.param("page"), Some("1"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    /// The full request URI, query string included.
    uri: String,
    /// The path component only, query stripped.
    url: String,
    /// The effective HTTP method (after any `_method` override).
    method: String,
    /// HTTP headers.
    headers: HashMap<String, String>,
    /// Request parameters decoded from the query string (and an
    /// urlencoded form body, when one is attached).
    params: HashMap<String, String>,
    /// Raw request body, if any.
    body: Option<Vec<u8>>,
}

impl Request {
    /// Creates a request from a URI and method.
    ///
    /// The query string is stripped from the URI to form the match URL
    /// and decoded into [`params`](Request::params). A `_method`
    /// parameter overrides the verb (uppercased), mirroring the common
    /// HTML-form workaround for PUT/DELETE.
    pub fn new(uri: impl Into<String>, method: impl Into<String>) -> Self {
        let uri = uri.into();
        let (url, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), query),
            None => (uri.clone(), ""),
        };
        let params: HashMap<String, String> = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut request = Self {
            uri,
            url,
            method: method.into(),
            headers: HashMap::new(),
            params,
            body: None,
        };
        request.apply_method_override();
        request
    }

    /// Adds headers to the request.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Adds a single header to the request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attaches a body.
    ///
    /// When the headers already identify an urlencoded form submission,
    /// the form fields are merged into [`params`](Request::params), so
    /// set headers before the body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        if self.is_form_submission() {
            let fields = form_urlencoded::parse(&body)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect::<Vec<_>>();
            self.params.extend(fields);
            self.apply_method_override();
        }
        self.body = Some(body);
        self
    }

    /// Returns the effective HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the request path with the query string stripped.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the full request URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns true for requests carrying the
    /// `X-Requested-With: XMLHttpRequest` convention header.
    pub fn is_ajax(&self) -> bool {
        self.header("X-Requested-With")
            .map(|v| v == "XMLHttpRequest")
            .unwrap_or(false)
    }

    /// Looks up a header value, case-insensitively by key.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns all decoded request parameters.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Looks up a single request parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the body as a string, if present and valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Returns the body parsed as JSON, if present and valid.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        self.body_str().and_then(|s| serde_json::from_str(s).ok())
    }

    /// Returns the Content-Type header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Checks if this is an urlencoded form submission.
    fn is_form_submission(&self) -> bool {
        self.method.eq_ignore_ascii_case("POST")
            && self
                .content_type()
                .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
                .unwrap_or(false)
    }

    /// Applies the `_method` parameter override, uppercased.
    fn apply_method_override(&mut self) {
        if let Some(method) = self.params.get("_method") {
            self.method = method.to_uppercase();
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new("/", "GET")
    }
}
