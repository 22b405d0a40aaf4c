// Copyright 2024-2026 Waypoint contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the waypoint router.
//!
//! This module defines [`WaypointError`], the main error enum returned by
//! registration and dispatch operations.
//!
//! # Error Categories
//!
//! - **Registration errors**: Duplicate route names, duplicate placeholders,
//!   registration attempted after serving has begun
//! - **Compilation errors**: A condition fragment or filter pattern that does
//!   not form a valid regular expression
//! - **Dispatch errors**: A filter chain referencing a name that was never
//!   registered
//!
//! Two outcomes are deliberately *not* errors: a request matching no route,
//! and a before-filter vetoing a dispatch. Both are ordinary control-flow
//! results surfaced through [`Outcome`](crate::app::Outcome) and
//! [`DispatchOutcome`](crate::dispatch::DispatchOutcome). Panics raised by
//! application handlers or filters are never caught by the core; they
//! propagate to the caller's error boundary.

use thiserror::Error;

/// The main error type for waypoint operations.
///
/// All fallible waypoint functions return `Result<T, WaypointError>`.
#[derive(Error, Debug)]
pub enum WaypointError {
    /// A route was registered under an explicit alias that is already taken.
    #[error("Duplicate route name: {0:?}")]
    DuplicateRouteName(String),

    /// A path template used the same placeholder name more than once.
    ///
    /// The original behavior for repeated names is regex-engine dependent,
    /// so waypoint rejects such templates at registration time.
    #[error("Duplicate placeholder {{{name}}} in pattern {pattern:?}")]
    DuplicatePlaceholder {
        /// The repeated placeholder name.
        name: String,
        /// The offending path template.
        pattern: String,
    },

    /// A path template (or one of its condition fragments) did not compile
    /// to a valid regular expression.
    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The path template that failed to compile.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// A pattern-keyed filter target did not compile to a valid regular
    /// expression after wildcard rewriting.
    #[error("Invalid filter pattern {pattern:?}: {source}")]
    InvalidFilterPattern {
        /// The rewritten filter target.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// A dispatch chain referenced a filter name that was never registered.
    #[error("Unknown filter: {0:?}")]
    UnknownFilter(String),

    /// Route or filter registration was attempted after the first request
    /// had already been dispatched.
    #[error("Registration is closed once serving has begun")]
    RegistrationClosed,
}

/// Convenience type alias for Results with [`WaypointError`].
pub type Result<T> = std::result::Result<T, WaypointError>;
