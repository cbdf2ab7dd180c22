use ahash::AHashMap;
use http::Method;
use std::sync::Arc;

use super::pattern::{split_segments, Pattern};
use crate::error::Result;
use crate::http::Handler;

/// A registered route: method, compiled pattern, handler.
pub(crate) struct CompiledRoute {
    pub(crate) pattern: Pattern,
    pub(crate) handler: Arc<dyn Handler>,
    /// Label for the per-route meter, e.g. "GET /users/{id}".
    pub(crate) name: String,
}

/// Route registration accumulator.
///
/// Mutable until the server binds; `compile` turns it into the immutable
/// table the orchestrator publishes. Because binding consumes the builder,
/// routes cannot be added once serving has begun.
#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<(Method, CompiledRoute)>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Within a method, patterns match in registration
    /// order and the first match wins.
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<&mut Self> {
        let pattern = Pattern::parse(pattern)?;
        let name = format!("{} {}", method, pattern.as_str());
        self.routes.push((method, CompiledRoute { pattern, handler: Arc::new(handler), name }));
        Ok(self)
    }

    pub fn get(&mut self, pattern: &str, handler: impl Handler) -> Result<&mut Self> {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: impl Handler) -> Result<&mut Self> {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: impl Handler) -> Result<&mut Self> {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: impl Handler) -> Result<&mut Self> {
        self.route(Method::DELETE, pattern, handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub(crate) fn compile(self) -> RouteTable {
        let mut by_method: AHashMap<Method, Vec<CompiledRoute>> = AHashMap::new();
        for (method, route) in self.routes {
            by_method.entry(method).or_default().push(route);
        }
        RouteTable { by_method }
    }
}

/// Result of a route lookup.
pub(crate) enum RouteMatch<'a> {
    Found {
        route: &'a CompiledRoute,
        params: AHashMap<String, String>,
    },
    /// The path exists under other methods; carries the Allow set.
    MethodNotAllowed { allow: Vec<Method> },
    NotFound,
}

/// The compiled, immutable route table.
///
/// Published once at bind time and then read by every worker without
/// synchronization.
pub struct RouteTable {
    by_method: AHashMap<Method, Vec<CompiledRoute>>,
}

impl RouteTable {
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let segments = split_segments(path);

        if let Some(routes) = self.by_method.get(method) {
            for route in routes {
                if let Some(params) = route.pattern.matches(&segments) {
                    return RouteMatch::Found { route, params };
                }
            }
        }

        let mut allow: Vec<Method> = Vec::new();
        for (other, routes) in &self.by_method {
            if other == method {
                continue;
            }
            if routes.iter().any(|route| route.pattern.matches(&segments).is_some()) {
                allow.push(other.clone());
            }
        }
        if allow.is_empty() {
            RouteMatch::NotFound
        } else {
            allow.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            RouteMatch::MethodNotAllowed { allow }
        }
    }

    pub(crate) fn route_count(&self) -> usize {
        self.by_method.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{RequestContext, Response};

    async fn noop(_ctx: RequestContext) -> std::result::Result<Response, crate::http::BoxError> {
        Ok(Response::ok())
    }

    fn table(routes: &[(Method, &str)]) -> RouteTable {
        let mut builder = RouteTableBuilder::new();
        for (method, pattern) in routes {
            builder
                .route(method.clone(), pattern, noop)
                .unwrap_or_else(|e| panic!("route '{pattern}' should register: {e}"));
        }
        builder.compile()
    }

    #[test]
    fn test_lookup_matches_and_captures() {
        let table = table(&[(Method::GET, "/users/{id}")]);
        match table.lookup(&Method::GET, "/users/42") {
            RouteMatch::Found { route, params } => {
                assert_eq!(route.name, "GET /users/{id}");
                assert_eq!(params.get("id").map(String::as_str), Some("42"));
            }
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn test_first_registered_pattern_wins() {
        let table = table(&[(Method::GET, "/users/{id}"), (Method::GET, "/users/me")]);
        // "/users/me" also matches the earlier parameter pattern; insertion
        // order decides.
        match table.lookup(&Method::GET, "/users/me") {
            RouteMatch::Found { route, params } => {
                assert_eq!(route.name, "GET /users/{id}");
                assert_eq!(params.get("id").map(String::as_str), Some("me"));
            }
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        let table = table(&[(Method::GET, "/users/{id}")]);
        assert!(matches!(
            table.lookup(&Method::GET, "/orders/7"),
            RouteMatch::NotFound
        ));
    }

    #[test]
    fn test_known_path_wrong_method_lists_allowed() {
        let table = table(&[
            (Method::GET, "/x"),
            (Method::DELETE, "/x"),
            (Method::GET, "/y"),
        ]);
        match table.lookup(&Method::POST, "/x") {
            RouteMatch::MethodNotAllowed { allow } => {
                assert_eq!(allow, vec![Method::DELETE, Method::GET]);
            }
            _ => panic!("expected 405"),
        }
    }

    #[test]
    fn test_trailing_slash_matches() {
        let table = table(&[(Method::GET, "/users/{id}")]);
        assert!(matches!(
            table.lookup(&Method::GET, "/users/42/"),
            RouteMatch::Found { .. }
        ));
    }

    #[test]
    fn test_segment_count_must_match() {
        let table = table(&[(Method::GET, "/users/{id}")]);
        assert!(matches!(table.lookup(&Method::GET, "/users"), RouteMatch::NotFound));
        assert!(matches!(
            table.lookup(&Method::GET, "/users/42/orders"),
            RouteMatch::NotFound
        ));
    }
}
