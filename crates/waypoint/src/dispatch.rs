// Copyright 2024-2026 Waypoint contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Filter registration and the per-request dispatch pipeline.
//!
//! The [`Dispatcher`] owns the named filter registry plus two applied-
//! filter indices: one keyed by exact route name, one keyed by URL
//! pattern (targets containing `/`, with `*` rewritten to a lazy `.*?`).
//! At dispatch time the effective before/after chains are computed fresh
//! for the request: every pattern entry whose regex matches the bound URL
//! contributes its lists ahead of the route's own name-keyed lists, in
//! the order the pattern entries were registered.
//!
//! Before-filters run sequentially; the first one returning `false`
//! stops the chain — the handler and the after-filters are skipped and
//! the dispatch reports [`DispatchOutcome::Rejected`]. After-filters run
//! once the handler has produced its output; their return values are
//! ignored. A [`CancelToken`] is consulted between invocations and
//! surfaces [`DispatchOutcome::Cancelled`], distinct from a rejection.
//!
//! The indices are mutated during registration only and treated as
//! read-only while serving; dispatch never writes back merged lists. The
//! first dispatch closes registration: later [`add_filter`] and
//! [`apply_filter`] calls fail with
//! [`RegistrationClosed`](crate::WaypointError::RegistrationClosed),
//! mirroring the route table's phase transition.
//!
//! [`add_filter`]: Dispatcher::add_filter
//! [`apply_filter`]: Dispatcher::apply_filter

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use regex::Regex;

use crate::error::{Result, WaypointError};
use crate::request::Request;
use crate::response::Response;
use crate::route::{Route, RouteBinding};

/// A filter handler.
///
/// Invoked with a fresh argument triple per call: the request-scoped
/// route binding, the request, and the response sink. Returning `false`
/// from a before-filter vetoes the dispatch.
pub type FilterFn = Arc<dyn Fn(&RouteBinding, &Request, &mut Response) -> bool + Send + Sync>;

/// A filter reference: either the name of a registered filter (possibly
/// a `|`-separated list of names) or an inline handler that is
/// auto-registered under a synthetic `filter-<count>` name.
#[derive(Clone)]
pub enum FilterSpec {
    /// One or more registered filter names, `|`-separated.
    Named(String),
    /// An inline handler.
    Inline(FilterFn),
}

impl FilterSpec {
    /// References one or more registered filters by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Wraps an inline filter handler.
    pub fn inline<F>(handler: F) -> Self
    where
        F: Fn(&RouteBinding, &Request, &mut Response) -> bool + Send + Sync + 'static,
    {
        Self::Inline(Arc::new(handler))
    }
}

impl From<&str> for FilterSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for FilterSpec {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl std::fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Inline(_) => f.debug_tuple("Inline").field(&"<handler>").finish(),
        }
    }
}

/// Which side of the handler a filter runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Runs before the handler and may veto the dispatch.
    Before,
    /// Runs after the handler; its return value is ignored.
    After,
}

/// The result of dispatching a matched route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// All before-filters passed and the handler ran.
    Handled,
    /// A before-filter returned `false`; the handler was not invoked.
    Rejected,
    /// The cancel token fired between invocations.
    Cancelled,
}

/// Ordered before/after filter name lists for one target.
#[derive(Debug, Clone, Default)]
struct FilterLists {
    before: Vec<String>,
    after: Vec<String>,
}

impl FilterLists {
    fn list_mut(&mut self, kind: FilterKind) -> &mut Vec<String> {
        match kind {
            FilterKind::Before => &mut self.before,
            FilterKind::After => &mut self.after,
        }
    }
}

/// One pattern-keyed index entry: the rewritten source, its compiled
/// anchored regex, and the filter lists applied through it.
#[derive(Debug)]
struct PatternEntry {
    source: String,
    regex: Regex,
    lists: FilterLists,
}

/// A clonable cancellation flag checked between filter invocations.
///
/// Cancellation is cooperative: a running filter or handler is never
/// interrupted, but the chain stops before the next invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The filter registry and dispatch engine.
#[derive(Default)]
pub struct Dispatcher {
    /// Filter name to handler.
    filters: HashMap<String, FilterFn>,
    /// Applied filters keyed by exact route name.
    by_name: HashMap<String, FilterLists>,
    /// Applied filters keyed by URL pattern, in registration order.
    by_pattern: Vec<PatternEntry>,
    /// Counter for synthetic inline-filter names.
    inline_count: usize,
    /// Set once the first dispatch has run.
    serving: AtomicBool,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a named filter.
    ///
    /// # Errors
    ///
    /// Fails with [`WaypointError::RegistrationClosed`] once serving has
    /// begun.
    pub fn add_filter<F>(&mut self, name: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(&RouteBinding, &Request, &mut Response) -> bool + Send + Sync + 'static,
    {
        if self.serving.load(Ordering::Acquire) {
            return Err(WaypointError::RegistrationClosed);
        }
        self.filters.insert(name.into(), Arc::new(handler));
        Ok(())
    }

    /// Applies a filter to one or more targets.
    ///
    /// `targets` is a `|`-separated list. A target containing `/` is
    /// pattern-keyed: its `*` characters are rewritten to `.*?` and the
    /// result is compiled as an anchored regex matched against the bound
    /// URL at dispatch time. Any other target is an exact route name.
    ///
    /// A [`FilterSpec::Named`] value may itself be a `|`-separated list
    /// of names; a [`FilterSpec::Inline`] handler is registered under a
    /// synthetic `filter-<count>` name first, skipping over counts whose
    /// name the application registered itself. Names are appended to the
    /// targets' lists in call order, without deduplication.
    ///
    /// # Errors
    ///
    /// Fails with [`WaypointError::RegistrationClosed`] once serving has
    /// begun, or [`WaypointError::InvalidFilterPattern`] when a rewritten
    /// pattern target does not compile.
    pub fn apply_filter(
        &mut self,
        kind: FilterKind,
        targets: &str,
        filter: impl Into<FilterSpec>,
    ) -> Result<()> {
        if self.serving.load(Ordering::Acquire) {
            return Err(WaypointError::RegistrationClosed);
        }
        let names: Vec<String> = match filter.into() {
            FilterSpec::Named(spec) => spec.split('|').map(|n| n.to_string()).collect(),
            FilterSpec::Inline(handler) => {
                let name = loop {
                    let candidate = format!("filter-{}", self.inline_count);
                    self.inline_count += 1;
                    if !self.filters.contains_key(&candidate) {
                        break candidate;
                    }
                };
                self.filters.insert(name.clone(), handler);
                vec![name]
            }
        };

        for target in targets.split('|') {
            if target.contains('/') {
                let source = target.replace('*', ".*?");
                let index = match self.by_pattern.iter().position(|e| e.source == source) {
                    Some(index) => index,
                    None => {
                        let regex = Regex::new(&format!("^{}$", source)).map_err(|err| {
                            WaypointError::InvalidFilterPattern {
                                pattern: source.clone(),
                                source: err,
                            }
                        })?;
                        self.by_pattern.push(PatternEntry {
                            source,
                            regex,
                            lists: FilterLists::default(),
                        });
                        self.by_pattern.len() - 1
                    }
                };
                self.by_pattern[index]
                    .lists
                    .list_mut(kind)
                    .extend(names.iter().cloned());
            } else {
                let lists = self.by_name.entry(target.to_string()).or_default();
                lists.list_mut(kind).extend(names.iter().cloned());
            }
        }
        Ok(())
    }

    /// Returns true when a filter with this name has been registered.
    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Dispatches a matched route through its effective filter chain.
    ///
    /// Runs the before-filters, then the handler with the positional
    /// parameter values, then the after-filters. Every filter receives a
    /// fresh `(binding, request, response)` argument triple. See the
    /// module docs for the merge and short-circuit rules.
    ///
    /// # Errors
    ///
    /// Fails with [`WaypointError::UnknownFilter`] when a chain entry
    /// names a filter that was never registered. Panics raised inside
    /// filters or the handler are not caught.
    ///
    /// The first call closes filter registration.
    pub fn dispatch(
        &self,
        route: &Route,
        binding: &RouteBinding,
        request: &Request,
        response: &mut Response,
        cancel: Option<&CancelToken>,
    ) -> Result<DispatchOutcome> {
        if !self.serving.swap(true, Ordering::AcqRel) {
            tracing::debug!(filters = self.filters.len(), "filter indices now serving");
        }
        let (before, after) = self.effective_lists(binding);

        for name in &before {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Ok(DispatchOutcome::Cancelled);
            }
            let filter = self.resolve(name)?;
            if !filter(binding, request, response) {
                tracing::debug!(
                    filter = name.as_str(),
                    route = binding.name(),
                    "before-filter rejected dispatch"
                );
                return Ok(DispatchOutcome::Rejected);
            }
        }

        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Ok(DispatchOutcome::Cancelled);
        }
        let values = binding.param_values();
        (route.handler())(&values, response);

        for name in &after {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Ok(DispatchOutcome::Cancelled);
            }
            // After-filters cannot veto; their result is discarded.
            let filter = self.resolve(name)?;
            let _ = filter(binding, request, response);
        }
        Ok(DispatchOutcome::Handled)
    }

    /// Computes the effective before/after chains for one dispatch.
    ///
    /// Matching pattern entries contribute first, in registration order,
    /// followed by the route's name-keyed lists. The indices themselves
    /// are left untouched.
    fn effective_lists(&self, binding: &RouteBinding) -> (Vec<String>, Vec<String>) {
        let mut before = Vec::new();
        let mut after = Vec::new();
        for entry in &self.by_pattern {
            if entry.regex.is_match(binding.url()) {
                before.extend(entry.lists.before.iter().cloned());
                after.extend(entry.lists.after.iter().cloned());
            }
        }
        if let Some(own) = self.by_name.get(binding.name()) {
            before.extend(own.before.iter().cloned());
            after.extend(own.after.iter().cloned());
        }
        (before, after)
    }

    fn resolve(&self, name: &str) -> Result<&FilterFn> {
        self.filters.get(name).ok_or_else(|| {
            tracing::warn!(filter = name, "dispatch references unregistered filter");
            WaypointError::UnknownFilter(name.to_string())
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("by_name", &self.by_name)
            .field("by_pattern", &self.by_pattern)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::PathPattern;
    use crate::route::Handler;
    use std::sync::Mutex;

    /// A shared call log for asserting invocation order.
    type Log = Arc<Mutex<Vec<String>>>;

    fn logging_handler(log: &Log, tag: &str) -> Handler {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        Arc::new(move |_, _| log.lock().unwrap().push(tag.clone()))
    }

    fn make_route(pattern: &str, name: &str, log: &Log) -> Route {
        Route::new(
            PathPattern::new(pattern).unwrap(),
            name.to_string(),
            logging_handler(log, "handler"),
        )
    }

    fn add_logging_filter(dispatcher: &mut Dispatcher, log: &Log, name: &str, pass: bool) {
        let log = Arc::clone(log);
        let tag = name.to_string();
        dispatcher
            .add_filter(name, move |_, _, _| {
                log.lock().unwrap().push(tag.clone());
                pass
            })
            .unwrap();
    }

    fn run(
        dispatcher: &Dispatcher,
        route: &Route,
        url: &str,
    ) -> DispatchOutcome {
        let request = Request::new(url, "GET");
        let mut response = Response::new();
        let binding = route.matches("GET", false, url).unwrap().unwrap();
        dispatcher
            .dispatch(route, &binding, &request, &mut response, None)
            .unwrap()
    }

    #[test]
    fn test_dispatch_without_filters_runs_handler() {
        let log: Log = Log::default();
        let route = make_route("/home", "home", &log);
        let dispatcher = Dispatcher::new();
        assert_eq!(run(&dispatcher, &route, "/home"), DispatchOutcome::Handled);
        assert_eq!(*log.lock().unwrap(), vec!["handler"]);
    }

    #[test]
    fn test_before_filters_run_in_call_order() {
        let log: Log = Log::default();
        let route = make_route("/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        add_logging_filter(&mut dispatcher, &log, "f1", true);
        add_logging_filter(&mut dispatcher, &log, "f2", true);
        dispatcher.apply_filter(FilterKind::Before, "home", "f1").unwrap();
        dispatcher.apply_filter(FilterKind::Before, "home", "f2").unwrap();
        assert_eq!(run(&dispatcher, &route, "/home"), DispatchOutcome::Handled);
        assert_eq!(*log.lock().unwrap(), vec!["f1", "f2", "handler"]);
    }

    #[test]
    fn test_rejection_short_circuits() {
        let log: Log = Log::default();
        let route = make_route("/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        add_logging_filter(&mut dispatcher, &log, "f1", false);
        add_logging_filter(&mut dispatcher, &log, "f2", true);
        add_logging_filter(&mut dispatcher, &log, "cleanup", true);
        dispatcher.apply_filter(FilterKind::Before, "home", "f1|f2").unwrap();
        dispatcher.apply_filter(FilterKind::After, "home", "cleanup").unwrap();
        assert_eq!(run(&dispatcher, &route, "/home"), DispatchOutcome::Rejected);
        // f2, the handler, and the after-filter never ran.
        assert_eq!(*log.lock().unwrap(), vec!["f1"]);
    }

    #[test]
    fn test_after_filters_cannot_veto() {
        let log: Log = Log::default();
        let route = make_route("/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        add_logging_filter(&mut dispatcher, &log, "audit", false);
        dispatcher.apply_filter(FilterKind::After, "home", "audit").unwrap();
        assert_eq!(run(&dispatcher, &route, "/home"), DispatchOutcome::Handled);
        assert_eq!(*log.lock().unwrap(), vec!["handler", "audit"]);
    }

    #[test]
    fn test_pattern_filters_run_before_name_filters() {
        let log: Log = Log::default();
        let route = make_route("/admin/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        add_logging_filter(&mut dispatcher, &log, "log", true);
        add_logging_filter(&mut dispatcher, &log, "auth", true);
        // Name-keyed applied first; the pattern entry still runs ahead.
        dispatcher.apply_filter(FilterKind::Before, "home", "log").unwrap();
        dispatcher.apply_filter(FilterKind::Before, "/admin/*", "auth").unwrap();
        assert_eq!(run(&dispatcher, &route, "/admin/home"), DispatchOutcome::Handled);
        assert_eq!(*log.lock().unwrap(), vec!["auth", "log", "handler"]);
    }

    #[test]
    fn test_multiple_pattern_entries_in_registration_order() {
        let log: Log = Log::default();
        let route = make_route("/admin/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        add_logging_filter(&mut dispatcher, &log, "p1", true);
        add_logging_filter(&mut dispatcher, &log, "p2", true);
        dispatcher.apply_filter(FilterKind::Before, "/admin/*", "p1").unwrap();
        dispatcher.apply_filter(FilterKind::Before, "/*", "p2").unwrap();
        run(&dispatcher, &route, "/admin/home");
        assert_eq!(*log.lock().unwrap(), vec!["p1", "p2", "handler"]);
    }

    #[test]
    fn test_dispatch_does_not_mutate_indices() {
        let log: Log = Log::default();
        let route = make_route("/admin/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        add_logging_filter(&mut dispatcher, &log, "auth", true);
        dispatcher.apply_filter(FilterKind::Before, "/admin/*", "auth").unwrap();
        run(&dispatcher, &route, "/admin/home");
        log.lock().unwrap().clear();
        // A second dispatch sees the same chain, not an accumulated one.
        run(&dispatcher, &route, "/admin/home");
        assert_eq!(*log.lock().unwrap(), vec!["auth", "handler"]);
    }

    #[test]
    fn test_inline_filter_gets_synthetic_name() {
        let log: Log = Log::default();
        let route = make_route("/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        let inline_log = Arc::clone(&log);
        dispatcher
            .apply_filter(
                FilterKind::Before,
                "home",
                FilterSpec::inline(move |_, _, _| {
                    inline_log.lock().unwrap().push("inline".to_string());
                    true
                }),
            )
            .unwrap();
        assert!(dispatcher.has_filter("filter-0"));
        assert_eq!(run(&dispatcher, &route, "/home"), DispatchOutcome::Handled);
        assert_eq!(*log.lock().unwrap(), vec!["inline", "handler"]);
    }

    #[test]
    fn test_multiple_targets_share_one_filter() {
        let log: Log = Log::default();
        let home = make_route("/home", "home", &log);
        let about = make_route("/about", "about", &log);
        let mut dispatcher = Dispatcher::new();
        add_logging_filter(&mut dispatcher, &log, "auth", true);
        dispatcher.apply_filter(FilterKind::Before, "home|about", "auth").unwrap();
        run(&dispatcher, &home, "/home");
        run(&dispatcher, &about, "/about");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["auth", "handler", "auth", "handler"]
        );
    }

    #[test]
    fn test_unknown_filter_fails_dispatch() {
        let log: Log = Log::default();
        let route = make_route("/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        dispatcher.apply_filter(FilterKind::Before, "home", "ghost").unwrap();
        let request = Request::new("/home", "GET");
        let mut response = Response::new();
        let binding = route.matches("GET", false, "/home").unwrap().unwrap();
        let err = dispatcher
            .dispatch(&route, &binding, &request, &mut response, None)
            .unwrap_err();
        assert!(matches!(err, WaypointError::UnknownFilter(ref n) if n == "ghost"));
    }

    #[test]
    fn test_handler_receives_positional_params() {
        let log: Log = Log::default();
        let seen = Arc::clone(&log);
        let route = Route::new(
            PathPattern::new("/users/{id}/{action}").unwrap(),
            "user".to_string(),
            Arc::new(move |params: &[&str], _resp: &mut Response| {
                seen.lock().unwrap().push(params.join(","));
            }),
        );
        let dispatcher = Dispatcher::new();
        run(&dispatcher, &route, "/users/42/edit");
        assert_eq!(*log.lock().unwrap(), vec!["42,edit"]);
    }

    #[test]
    fn test_registration_closed_after_first_dispatch() {
        let log: Log = Log::default();
        let route = make_route("/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        add_logging_filter(&mut dispatcher, &log, "auth", true);
        dispatcher.apply_filter(FilterKind::Before, "home", "auth").unwrap();
        run(&dispatcher, &route, "/home");

        let err = dispatcher.add_filter("late", |_, _, _| true).unwrap_err();
        assert!(matches!(err, WaypointError::RegistrationClosed));
        let err = dispatcher
            .apply_filter(FilterKind::Before, "home", "auth")
            .unwrap_err();
        assert!(matches!(err, WaypointError::RegistrationClosed));
    }

    #[test]
    fn test_inline_name_skips_registered_names() {
        let log: Log = Log::default();
        let route = make_route("/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        add_logging_filter(&mut dispatcher, &log, "filter-0", true);
        dispatcher.apply_filter(FilterKind::Before, "home", "filter-0").unwrap();
        let inline_log = Arc::clone(&log);
        dispatcher
            .apply_filter(
                FilterKind::Before,
                "home",
                FilterSpec::inline(move |_, _, _| {
                    inline_log.lock().unwrap().push("inline".to_string());
                    true
                }),
            )
            .unwrap();
        // The explicitly registered filter keeps its slot; the inline
        // handler lands on the next free synthetic name.
        assert!(dispatcher.has_filter("filter-1"));
        assert_eq!(run(&dispatcher, &route, "/home"), DispatchOutcome::Handled);
        assert_eq!(*log.lock().unwrap(), vec!["filter-0", "inline", "handler"]);
    }

    #[test]
    fn test_cancel_token_stops_chain() {
        let log: Log = Log::default();
        let route = make_route("/home", "home", &log);
        let mut dispatcher = Dispatcher::new();
        let token = CancelToken::new();
        let trip = token.clone();
        let filter_log = Arc::clone(&log);
        dispatcher
            .add_filter("first", move |_, _, _| {
                filter_log.lock().unwrap().push("first".to_string());
                trip.cancel();
                true
            })
            .unwrap();
        add_logging_filter(&mut dispatcher, &log, "second", true);
        dispatcher.apply_filter(FilterKind::Before, "home", "first|second").unwrap();

        let request = Request::new("/home", "GET");
        let mut response = Response::new();
        let binding = route.matches("GET", false, "/home").unwrap().unwrap();
        let outcome = dispatcher
            .dispatch(&route, &binding, &request, &mut response, Some(&token))
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Cancelled);
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }
}
