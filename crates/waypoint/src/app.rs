// Copyright 2024-2026 Waypoint contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The application context tying the route table and the dispatcher
//! together.
//!
//! [`App`] replaces a process-wide framework singleton with an
//! explicitly constructed value: build one at startup, register routes
//! and filters on it (single-threaded), then share it immutably across
//! request-serving tasks. Group-inherited filters are wired into the
//! dispatcher against each new route's name at registration time.

use std::sync::Arc;

use crate::dispatch::{CancelToken, Dispatcher, DispatchOutcome, FilterKind, FilterSpec};
use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;
use crate::router::{GroupConfig, Router};

/// The result of handling one request end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A route matched and its handler ran.
    Handled,
    /// A route matched but a before-filter vetoed the dispatch. The
    /// caller decides the resulting response (typically forbidden).
    Rejected,
    /// No route satisfied the method/ajax/path gates. The caller maps
    /// this to a not-found response.
    NotFound,
    /// The cancel token fired before the chain completed.
    Cancelled,
}

/// An HTTP router application: a route table plus a filter dispatcher.
///
/// # Example
///
/// ```rust
/// use waypoint::{App, Request, Response};
///
/// let mut app = App::new();
/// app.get("/users/{id}", |params, response| {
///     response.write(format!("user {}", params[0]));
/// }).unwrap();
///
/// let mut response = Response::new();
/// app.handle(&Request::new("/users/42", "GET"), &mut response, None).unwrap();
/// assert_eq!(response.body(), "user 42");
/// ```
#[derive(Debug, Default)]
pub struct App {
    router: Router,
    dispatcher: Dispatcher,
}

impl App {
    /// Creates an empty application.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route accepting every HTTP verb.
    ///
    /// `spec` is a path template, optionally aliased with
    /// `"pattern as name"`. The returned route can be configured
    /// fluently (`method`, `conditions`, `ajax`). If a group is active,
    /// its prefix and inherited filters apply.
    pub fn route<F>(&mut self, spec: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&[&str], &mut Response) + Send + Sync + 'static,
    {
        let (group_before, group_after) = match self.router.group() {
            Some(group) => (group.before.clone(), group.after.clone()),
            None => (None, None),
        };

        let name = self
            .router
            .add_route(spec, Arc::new(handler))?
            .name()
            .to_string();

        if let Some(filter) = group_before {
            self.dispatcher
                .apply_filter(FilterKind::Before, &name, filter)?;
        }
        if let Some(filter) = group_after {
            self.dispatcher
                .apply_filter(FilterKind::After, &name, filter)?;
        }

        Ok(self
            .router
            .route_mut(&name)
            .expect("route registered above"))
    }

    /// Registers a GET route.
    pub fn get<F>(&mut self, spec: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&[&str], &mut Response) + Send + Sync + 'static,
    {
        Ok(self.route(spec, handler)?.method("GET"))
    }

    /// Registers a POST route.
    pub fn post<F>(&mut self, spec: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&[&str], &mut Response) + Send + Sync + 'static,
    {
        Ok(self.route(spec, handler)?.method("POST"))
    }

    /// Registers a PUT route.
    pub fn put<F>(&mut self, spec: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&[&str], &mut Response) + Send + Sync + 'static,
    {
        Ok(self.route(spec, handler)?.method("PUT"))
    }

    /// Registers a DELETE route.
    pub fn delete<F>(&mut self, spec: &str, handler: F) -> Result<&mut Route>
    where
        F: Fn(&[&str], &mut Response) + Send + Sync + 'static,
    {
        Ok(self.route(spec, handler)?.method("DELETE"))
    }

    /// Runs `body` with the given group active, then clears it.
    ///
    /// Groups use flat-replace semantics: a nested `group` call inside
    /// `body` replaces the context entirely rather than stacking
    /// prefixes or filters, and the context is cleared when `body`
    /// returns.
    pub fn group<F>(&mut self, group: GroupConfig, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.router.set_group(Some(group));
        let result = body(self);
        self.router.set_group(None);
        result
    }

    /// Registers a named filter.
    ///
    /// Like route registration, filter registration closes once the
    /// first request has been handled.
    pub fn filter<F>(&mut self, name: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&crate::RouteBinding, &Request, &mut Response) -> bool + Send + Sync + 'static,
    {
        self.dispatcher.add_filter(name, handler)
    }

    /// Applies a before-filter to `|`-separated route names or URL
    /// patterns.
    pub fn before(&mut self, targets: &str, filter: impl Into<FilterSpec>) -> Result<()> {
        self.dispatcher
            .apply_filter(FilterKind::Before, targets, filter)
    }

    /// Applies an after-filter to `|`-separated route names or URL
    /// patterns.
    pub fn after(&mut self, targets: &str, filter: impl Into<FilterSpec>) -> Result<()> {
        self.dispatcher
            .apply_filter(FilterKind::After, targets, filter)
    }

    /// Alias of [`before`](App::before).
    pub fn when(&mut self, targets: &str, filter: impl Into<FilterSpec>) -> Result<()> {
        self.before(targets, filter)
    }

    /// Returns the route table.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Returns the filter dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handles one request: selects a route, dispatches its filter
    /// chain and handler, and reports the outcome.
    ///
    /// No-match and filter rejection are ordinary [`Outcome`] values.
    /// Panics raised by handlers or filters propagate to the caller's
    /// error boundary.
    pub fn handle(
        &self,
        request: &Request,
        response: &mut Response,
        cancel: Option<&CancelToken>,
    ) -> Result<Outcome> {
        let Some((route, binding)) = self.router.select(request)? else {
            tracing::debug!(url = request.url(), method = request.method(), "no route matched");
            return Ok(Outcome::NotFound);
        };
        let outcome = self
            .dispatcher
            .dispatch(route, &binding, request, response, cancel)?;
        Ok(match outcome {
            DispatchOutcome::Handled => Outcome::Handled,
            DispatchOutcome::Rejected => Outcome::Rejected,
            DispatchOutcome::Cancelled => Outcome::Cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_matched_route() {
        let mut app = App::new();
        app.get("/hello/{name}", |params, response| {
            response.write(format!("hi {}", params[0]));
        })
        .unwrap();

        let mut response = Response::new();
        let outcome = app
            .handle(&Request::new("/hello/ada", "GET"), &mut response, None)
            .unwrap();
        assert_eq!(outcome, Outcome::Handled);
        assert_eq!(response.body(), "hi ada");
    }

    #[test]
    fn test_handle_not_found() {
        let mut app = App::new();
        app.get("/only", |_, _| {}).unwrap();

        let mut response = Response::new();
        let outcome = app
            .handle(&Request::new("/missing", "GET"), &mut response, None)
            .unwrap();
        assert_eq!(outcome, Outcome::NotFound);
    }

    #[test]
    fn test_verb_shorthand_gates_method() {
        let mut app = App::new();
        app.post("/save", |_, response| {
            response.write("saved");
        })
        .unwrap();

        let mut response = Response::new();
        let outcome = app
            .handle(&Request::new("/save", "GET"), &mut response, None)
            .unwrap();
        assert_eq!(outcome, Outcome::NotFound);

        let outcome = app
            .handle(&Request::new("/save", "POST"), &mut response, None)
            .unwrap();
        assert_eq!(outcome, Outcome::Handled);
    }

    #[test]
    fn test_rejected_outcome() {
        let mut app = App::new();
        app.get("/secret as secret", |_, response| {
            response.write("classified");
        })
        .unwrap();
        app.filter("deny", |_, _, response| {
            response.set_status(403);
            false
        })
        .unwrap();
        app.before("secret", "deny").unwrap();

        let mut response = Response::new();
        let outcome = app
            .handle(&Request::new("/secret", "GET"), &mut response, None)
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(response.status(), 403);
        assert_eq!(response.body(), "");
    }

    #[test]
    fn test_filter_registration_closed_after_serving() {
        use crate::WaypointError;

        let mut app = App::new();
        app.get("/home as home", |_, _| {}).unwrap();
        app.filter("noop", |_, _, _| true).unwrap();

        let mut response = Response::new();
        app.handle(&Request::new("/home", "GET"), &mut response, None)
            .unwrap();

        let err = app.filter("late", |_, _, _| true).unwrap_err();
        assert!(matches!(err, WaypointError::RegistrationClosed));
        let err = app.before("home", "noop").unwrap_err();
        assert!(matches!(err, WaypointError::RegistrationClosed));
        let err = app.after("home", "noop").unwrap_err();
        assert!(matches!(err, WaypointError::RegistrationClosed));
    }
}
