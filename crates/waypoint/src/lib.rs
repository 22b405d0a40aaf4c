// Copyright 2024-2026 Waypoint contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # Waypoint
//!
//! Minimal HTTP request router with a named/pattern-scoped before/after
//! filter pipeline.
//!
//! Waypoint selects exactly one registered route per request (or reports
//! no match), binds its path parameters, and runs a deterministic chain
//! of filters around the route's handler with short-circuit semantics on
//! rejection. It is transport-agnostic: adapters feed it a [`Request`]
//! and read back a [`Response`].
//!
//! ## Features
//!
//! - Path templates with `{name}` placeholders, per-placeholder regex
//!   conditions, and a `*` catch-all
//! - `"pattern as name"` route aliases, first-match-wins selection
//! - Route groups scoping a prefix plus inherited filters
//! - Named and inline filters, applied by route name or URL pattern,
//!   merged deterministically per dispatch
//! - Immutable routes with freshly allocated per-request bindings, safe
//!   for concurrent serving
//!
//! ## Quick Start
//!
//! ```rust
//! use waypoint::{App, Outcome, Request, Response};
//!
//! let mut app = App::new();
//! app.filter("auth", |_route, request, response| {
//!     let ok = request.header("Authorization").is_some();
//!     if !ok {
//!         response.set_status(403);
//!     }
//!     ok
//! }).unwrap();
//! app.before("/admin/*", "auth").unwrap();
//! app.get("/admin/users/{id} as adminUser", |params, response| {
//!     response.write(format!("user {}", params[0]));
//! }).unwrap();
//!
//! let mut response = Response::new();
//! let outcome = app
//!     .handle(&Request::new("/admin/users/7", "GET"), &mut response, None)
//!     .unwrap();
//! assert_eq!(outcome, Outcome::Rejected);
//! ```

/// Application context: route table plus dispatcher.
pub mod app;
/// Filter registration and the dispatch pipeline.
pub mod dispatch;
/// Error types and reporting.
pub mod error;
/// Path template compilation and matching.
pub mod pattern;
/// HTTP request abstraction.
pub mod request;
/// HTTP response abstraction.
pub mod response;
/// Routes and per-request match bindings.
pub mod route;
/// Route table and group scoping.
pub mod router;

pub use app::{App, Outcome};
pub use dispatch::{CancelToken, Dispatcher, DispatchOutcome, FilterFn, FilterKind, FilterSpec};
pub use error::{Result, WaypointError};
pub use pattern::PathPattern;
pub use request::Request;
pub use response::Response;
pub use route::{Handler, Route, RouteBinding};
pub use router::{GroupConfig, Router};
