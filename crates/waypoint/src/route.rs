// Copyright 2024-2026 Waypoint contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Routes and per-request match bindings.
//!
//! A [`Route`] binds a [`PathPattern`] to a handler under a unique name,
//! gated by HTTP method and ajax constraints. Routes are configured during
//! registration and are immutable once serving begins; matching never
//! mutates the route. Every successful match produces a freshly allocated
//! [`RouteBinding`] so that one route instance can serve concurrent
//! requests safely.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::pattern::PathPattern;
use crate::response::Response;

/// A route handler.
///
/// Invoked with the matched path parameter values in first-occurrence
/// order of their placeholders, plus the response sink. The router core
/// treats handlers as opaque; anything they raise propagates to the
/// caller.
pub type Handler = Arc<dyn Fn(&[&str], &mut Response) + Send + Sync>;

/// A named, method/ajax-constrained binding of a path template to a
/// handler.
pub struct Route {
    /// The owned path pattern.
    pattern: PathPattern,
    /// The unique route name (explicit alias or generated ordinal).
    name: String,
    /// The application handler.
    handler: Handler,
    /// Accepted HTTP verbs; `*` accepts every verb.
    methods: Vec<String>,
    /// Whether the route requires an ajax request. Compared by exact
    /// equality against the request's ajax flag; defaults to `false`.
    ajax: bool,
}

impl Route {
    /// Creates a route. Used by the router during registration.
    pub(crate) fn new(pattern: PathPattern, name: String, handler: Handler) -> Self {
        Self {
            pattern,
            name,
            handler,
            methods: vec!["*".to_string()],
            ajax: false,
        }
    }

    /// Returns the route name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path pattern.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns the accepted HTTP verbs.
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Returns the handler.
    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Restricts the route to the given `|`-separated HTTP verbs.
    ///
    /// ```rust,ignore
    /// app.route("/save", handler)?.method("POST|PUT");
    /// ```
    pub fn method(&mut self, methods: &str) -> &mut Self {
        self.methods = methods.split('|').map(|m| m.to_string()).collect();
        self
    }

    /// Constrains placeholders with regex fragments.
    ///
    /// Replaces the pattern's condition set; the matcher is recompiled
    /// from the new conditions on the next match.
    pub fn conditions(&mut self, conditions: HashMap<String, String>) -> &mut Self {
        self.pattern.set_conditions(conditions);
        self
    }

    /// Requires (or forbids) an ajax request.
    pub fn ajax(&mut self, ajax: bool) -> &mut Self {
        self.ajax = ajax;
        self
    }

    /// Attempts to match a request against this route.
    ///
    /// The method and ajax gates run first; when either fails, the path
    /// is not evaluated at all. On a full match, returns a fresh
    /// [`RouteBinding`] — the route itself is never mutated.
    pub fn matches(
        &self,
        method: &str,
        is_ajax: bool,
        url: &str,
    ) -> Result<Option<RouteBinding>> {
        let method_ok = self.methods.iter().any(|m| m == method || m == "*");
        if !method_ok || self.ajax != is_ajax {
            return Ok(None);
        }
        let Some(params) = self.pattern.match_url(url)? else {
            return Ok(None);
        };
        Ok(Some(RouteBinding {
            name: self.name.clone(),
            pattern: self.pattern.raw().to_string(),
            url: url.to_string(),
            params,
        }))
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("pattern", &self.pattern.raw())
            .field("methods", &self.methods)
            .field("ajax", &self.ajax)
            .finish_non_exhaustive()
    }
}

/// The request-scoped result of a successful route match.
///
/// This is the "current route" value that filters receive: the route
/// name, its raw pattern, the matched URL, and the bound parameters in
/// first-occurrence order of their placeholders. Each match allocates a
/// new binding; nothing here is shared between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    name: String,
    pattern: String,
    url: String,
    params: Vec<(String, String)>,
}

impl RouteBinding {
    /// Returns the matched route's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the matched route's raw pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the URL that matched.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the bound parameters in placeholder order.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Looks up a single bound parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the positional parameter values, in placeholder order.
    pub fn param_values(&self) -> Vec<&str> {
        self.params.iter().map(|(_, v)| v.as_str()).collect()
    }
}
