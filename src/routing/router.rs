//! Route table and lookup.
//!
//! # Responsibilities
//! - Compile and store routes at startup (`RouterBuilder`)
//! - Resolve a request verb and path to a route plus its bindings
//! - Tell "no such path" apart from "path exists under other verbs"
//!
//! # Design Decisions
//! - Immutable after `build()` (thread-safe without locks)
//! - Routes are tried in registration order; first structural match wins
//! - Same verb + same template shape registered twice is a startup error
//! - The request path is tokenized once, not once per route

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use tracing::debug;

use crate::binding::ParamBinder;
use crate::error::GatewayError;
use crate::gateway::handler::{BindingRules, UnaryHandler};
use crate::routing::matcher::{CompiledMatcher, PathTokens, RequestBindings};

/// One (verb, template) binding of a handler.
pub struct RouteEntry {
    verb: Method,
    matcher: CompiledMatcher,
    binder: ParamBinder,
    rules: BindingRules,
    handler: Arc<dyn UnaryHandler>,
}

impl RouteEntry {
    pub fn verb(&self) -> &Method {
        &self.verb
    }

    pub fn pattern(&self) -> &str {
        self.matcher.template().pattern()
    }

    pub fn matcher(&self) -> &CompiledMatcher {
        &self.matcher
    }

    pub fn binder(&self) -> &ParamBinder {
        &self.binder
    }

    pub fn rules(&self) -> &BindingRules {
        &self.rules
    }

    pub fn handler(&self) -> &Arc<dyn UnaryHandler> {
        &self.handler
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("verb", &self.verb)
            .field("pattern", &self.pattern())
            .field("method", &self.handler.method().to_string())
            .field("rules", &self.rules)
            .finish()
    }
}

/// A resolved route and the path bindings it produced.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a RouteEntry,
    pub bindings: RequestBindings,
}

/// Collects routes before the table is frozen.
#[derive(Debug, Default)]
pub struct RouterBuilder {
    routes: Vec<RouteEntry>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and add a route for `handler`.
    ///
    /// Fails with `MalformedPattern` if the template does not compile or
    /// names fields the request message lacks, and with `DuplicateRoute` if
    /// the same verb and template shape are already registered.
    pub fn register_route(
        &mut self,
        verb: Method,
        pattern: &str,
        rules: BindingRules,
        handler: Arc<dyn UnaryHandler>,
    ) -> Result<(), GatewayError> {
        let matcher = CompiledMatcher::compile(pattern)?;

        let shape = matcher.template().shape();
        if self
            .routes
            .iter()
            .any(|r| r.verb == verb && r.matcher.template().shape() == shape)
        {
            return Err(GatewayError::DuplicateRoute {
                verb,
                pattern: pattern.to_string(),
            });
        }

        let binder = ParamBinder::new(
            pattern,
            matcher.capture_names(),
            handler.schema(),
            rules.body.clone(),
        )?;

        debug!(
            verb = %verb,
            pattern = %pattern,
            method = %handler.method(),
            "Registered route"
        );

        self.routes.push(RouteEntry {
            verb,
            matcher,
            binder,
            rules,
            handler,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze the table.
    pub fn build(self) -> Router {
        Router {
            routes: self.routes,
        }
    }
}

/// Immutable route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Find the first route matching `verb` and `path`.
    pub fn resolve(&self, verb: &Method, path: &str) -> Result<RouteMatch<'_>, GatewayError> {
        let tokens = PathTokens::parse(path).ok_or(GatewayError::NotFound)?;
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(bindings) = route.matcher.match_tokens(&tokens) else {
                continue;
            };
            if route.verb == *verb {
                return Ok(RouteMatch { route, bindings });
            }
            if !allowed.contains(&route.verb) {
                allowed.push(route.verb.clone());
            }
        }

        if allowed.is_empty() {
            Err(GatewayError::NotFound)
        } else {
            Err(GatewayError::MethodNotAllowed { allowed })
        }
    }

    /// Routes in registration order.
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
