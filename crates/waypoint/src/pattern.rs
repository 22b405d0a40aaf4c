// Copyright 2024-2026 Waypoint contributors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Path template compilation and matching.
//!
//! A [`PathPattern`] wraps a raw route template such as `/users/{id}` and
//! compiles it into one of three matchers:
//!
//! - the `*` template matches any URL unconditionally;
//! - a template without placeholders matches by exact string equality
//!   against the request path (query already stripped);
//! - a template with `{name}` placeholders compiles to an anchored,
//!   case-insensitive regex with one named capture group per placeholder,
//!   tolerating a single optional trailing slash.
//!
//! Compilation is a pure function of `(raw, conditions)`: it is built
//! lazily on first use, cached, and never produces side effects. Static
//! text between placeholders is inserted into the regex verbatim.

use std::collections::HashMap;
use std::sync::OnceLock;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, WaypointError};

/// The capture fragment used for a placeholder without an explicit
/// condition: one or more characters excluding `/` and `?`.
const DEFAULT_FRAGMENT: &str = "[^/?]+";

lazy_static! {
    /// Scanner for `{name}` placeholders in a raw template.
    static ref PLACEHOLDER: Regex = Regex::new(r"\{(\w+)\}").unwrap();
}

/// A compiled route path template.
///
/// # Example
///
/// ```rust
/// use waypoint::PathPattern;
///
/// let pattern = PathPattern::new("/users/{id}").unwrap();
/// let params = pattern.match_url("/users/42").unwrap().unwrap();
/// assert_eq!(params, vec![("id".to_string(), "42".to_string())]);
/// ```
#[derive(Debug)]
pub struct PathPattern {
    /// The raw template string.
    raw: String,
    /// Placeholder names in first-occurrence order.
    param_names: Vec<String>,
    /// Placeholder name to regex fragment constraints.
    conditions: HashMap<String, String>,
    /// The lazily built matcher.
    compiled: OnceLock<Matcher>,
}

/// The matcher derived from a raw template.
#[derive(Debug)]
enum Matcher {
    /// The `*` template: matches every URL.
    Any,
    /// A template without placeholders: exact equality.
    Literal(String),
    /// A template with placeholders: anchored capture regex.
    Captures(Regex),
}

impl PathPattern {
    /// Creates a pattern from a raw template.
    ///
    /// Placeholder names are extracted in first-occurrence order. A name
    /// appearing twice is rejected with
    /// [`WaypointError::DuplicatePlaceholder`].
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let mut param_names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&raw) {
            let name = &caps[1];
            if param_names.iter().any(|n| n == name) {
                return Err(WaypointError::DuplicatePlaceholder {
                    name: name.to_string(),
                    pattern: raw.clone(),
                });
            }
            param_names.push(name.to_string());
        }
        Ok(Self {
            raw,
            param_names,
            conditions: HashMap::new(),
            compiled: OnceLock::new(),
        })
    }

    /// Returns the raw template string.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the placeholder names in first-occurrence order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Replaces the per-placeholder condition fragments.
    ///
    /// Resets the cached matcher; the next match recompiles from the new
    /// `(raw, conditions)` pair. Intended for the registration phase only.
    pub fn set_conditions(&mut self, conditions: HashMap<String, String>) {
        self.conditions = conditions;
        self.compiled = OnceLock::new();
    }

    /// Matches a URL path against this pattern.
    ///
    /// On success returns the captured parameters in first-occurrence
    /// order of their placeholders (empty for literal and wildcard
    /// templates); on mismatch returns `None`.
    pub fn match_url(&self, url: &str) -> Result<Option<Vec<(String, String)>>> {
        match self.matcher()? {
            Matcher::Any => Ok(Some(Vec::new())),
            Matcher::Literal(literal) => {
                if literal == url {
                    Ok(Some(Vec::new()))
                } else {
                    Ok(None)
                }
            }
            Matcher::Captures(regex) => {
                let Some(caps) = regex.captures(url) else {
                    return Ok(None);
                };
                let params = self
                    .param_names
                    .iter()
                    .filter_map(|name| {
                        caps.name(name)
                            .map(|m| (name.clone(), m.as_str().to_string()))
                    })
                    .collect();
                Ok(Some(params))
            }
        }
    }

    /// Returns the cached matcher, building it on first use.
    fn matcher(&self) -> Result<&Matcher> {
        if let Some(matcher) = self.compiled.get() {
            return Ok(matcher);
        }
        let built = self.build_matcher()?;
        Ok(self.compiled.get_or_init(|| built))
    }

    /// Compiles the raw template into a matcher.
    fn build_matcher(&self) -> Result<Matcher> {
        if self.raw == "*" {
            return Ok(Matcher::Any);
        }
        if self.param_names.is_empty() {
            return Ok(Matcher::Literal(self.raw.clone()));
        }

        let mut source = String::from("(?i)^");
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(&self.raw) {
            let Some(whole) = caps.get(0) else { continue };
            let name = &caps[1];
            source.push_str(&self.raw[last..whole.start()]);
            let fragment = self
                .conditions
                .get(name)
                .map(String::as_str)
                .unwrap_or(DEFAULT_FRAGMENT);
            source.push_str(&format!("(?P<{}>{})", name, fragment));
            last = whole.end();
        }
        source.push_str(&self.raw[last..]);
        source.push_str("/?$");

        Regex::new(&source)
            .map(Matcher::Captures)
            .map_err(|source| WaypointError::InvalidPattern {
                pattern: self.raw.clone(),
                source,
            })
    }
}
