// Copyright 2024-2026 Waypoint contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Route table: registration, group scoping, and request selection.
//!
//! The [`Router`] keeps routes in insertion order and selects the first
//! one whose gates and path match an incoming request — no priorities, no
//! best-match heuristics. A transient [`GroupConfig`] scopes a path prefix
//! and inherited filters over the routes registered while it is active.
//!
//! # Phases
//!
//! Registration is single-threaded and happens-before serving. The first
//! call to [`Router::select`] transitions the table into the serving
//! phase; any registration after that fails fast with
//! [`RegistrationClosed`](crate::WaypointError::RegistrationClosed).
//! During serving the table is read-only and needs no locking.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::dispatch::FilterSpec;
use crate::error::{Result, WaypointError};
use crate::pattern::PathPattern;
use crate::request::Request;
use crate::route::{Handler, Route, RouteBinding};

/// A registration-time scope applied to the routes registered while it
/// is active: a path prefix plus inherited before/after filters.
///
/// A later group fully replaces the active one (flat-replace semantics,
/// no nesting).
#[derive(Debug, Clone, Default)]
pub struct GroupConfig {
    /// Path prefix prepended to every route pattern in the group.
    pub prefix: Option<String>,
    /// Filter applied as a before-filter to every route in the group.
    pub before: Option<FilterSpec>,
    /// Filter applied as an after-filter to every route in the group.
    pub after: Option<FilterSpec>,
}

impl GroupConfig {
    /// Creates an empty group configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the path prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Sets the inherited before-filter.
    pub fn before(mut self, filter: impl Into<FilterSpec>) -> Self {
        self.before = Some(filter.into());
        self
    }

    /// Sets the inherited after-filter.
    pub fn after(mut self, filter: impl Into<FilterSpec>) -> Self {
        self.after = Some(filter.into());
        self
    }
}

/// An insertion-ordered table of routes with first-match-wins selection.
#[derive(Debug, Default)]
pub struct Router {
    /// Routes in registration order.
    routes: Vec<Route>,
    /// Route name to index, for uniqueness enforcement and lookup.
    names: HashMap<String, usize>,
    /// The active registration-time group, if any.
    group: Option<GroupConfig>,
    /// Set once the first request has been selected.
    serving: AtomicBool,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route.
    ///
    /// `spec` is the path template, optionally aliased with
    /// `"pattern as name"`; without an alias the route is named
    /// `route-<index>`. If a group is active its prefix is prepended (a
    /// bare `/` collapses to the empty string first, so `/` inside
    /// `prefix: "/admin"` yields `/admin`).
    ///
    /// Returns the route for fluent configuration.
    ///
    /// # Errors
    ///
    /// Fails on duplicate names, duplicate placeholders in the template,
    /// or registration after serving has begun.
    pub fn add_route(&mut self, spec: &str, handler: Handler) -> Result<&mut Route> {
        if self.serving.load(Ordering::Acquire) {
            return Err(WaypointError::RegistrationClosed);
        }

        let trimmed = spec.trim();
        let (mut pattern, name) = match trimmed.split_once(" as ") {
            Some((raw, alias)) => (raw.trim().to_string(), alias.trim().to_string()),
            None => (
                trimmed.to_string(),
                format!("route-{}", self.routes.len()),
            ),
        };

        if let Some(prefix) = self.group.as_ref().and_then(|g| g.prefix.as_deref()) {
            let tail = if pattern == "/" { "" } else { pattern.as_str() };
            pattern = format!("{}{}", prefix, tail);
        }

        if self.names.contains_key(&name) {
            return Err(WaypointError::DuplicateRouteName(name));
        }

        let compiled = PathPattern::new(pattern.trim())?;
        tracing::debug!(name = %name, pattern = %compiled.raw(), "registering route");

        let index = self.routes.len();
        self.routes.push(Route::new(compiled, name.clone(), handler));
        self.names.insert(name, index);
        Ok(&mut self.routes[index])
    }

    /// Replaces the active group context (flat replace, no stacking).
    pub fn set_group(&mut self, group: Option<GroupConfig>) {
        self.group = group;
    }

    /// Returns the active group context, if any.
    pub fn group(&self) -> Option<&GroupConfig> {
        self.group.as_ref()
    }

    /// Returns all registered routes in insertion order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Looks up a route by name.
    pub fn route(&self, name: &str) -> Option<&Route> {
        self.names.get(name).map(|&index| &self.routes[index])
    }

    /// Looks up a route by name for fluent configuration during
    /// registration. Routes are read-only once serving begins, so this
    /// stays crate-internal.
    pub(crate) fn route_mut(&mut self, name: &str) -> Option<&mut Route> {
        let index = *self.names.get(name)?;
        Some(&mut self.routes[index])
    }

    /// Selects the first route matching the request, in insertion order.
    ///
    /// Returns the route together with a fresh, request-scoped
    /// [`RouteBinding`]; `None` when no route matches. The first call
    /// closes registration.
    pub fn select(&self, request: &Request) -> Result<Option<(&Route, RouteBinding)>> {
        if !self.serving.swap(true, Ordering::AcqRel) {
            tracing::debug!(routes = self.routes.len(), "route table now serving");
        }
        for route in &self.routes {
            let matched = route.matches(request.method(), request.is_ajax(), request.url())?;
            if let Some(binding) = matched {
                tracing::trace!(route = binding.name(), url = binding.url(), "route selected");
                return Ok(Some((route, binding)));
            }
        }
        Ok(None)
    }
}
