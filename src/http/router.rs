//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Routes are registered
//! explicitly as typed handler values. Each route keeps its pipeline composed
//! with the interceptors the router's [`Registry`] gives its key, so a
//! request only clones an `Arc`. Adding a global interceptor recomposes every
//! route.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::bridge::{execute_composed, Registry};
use crate::chain::Pipeline;
use crate::handler::Handler;
use crate::interceptor::{Interceptor, SharedInterceptor};
use crate::interceptors::CancelGuard;

use super::meta::HttpMeta;
use super::response::{IntoResponse, Response};
use super::HttpBridge;

/// Interceptor type for HTTP pipelines.
pub type HttpInterceptor = SharedInterceptor<HttpMeta, Response>;

struct Route {
    key: String,
    terminal: Pipeline<HttpMeta, Response>,
    composed: Pipeline<HttpMeta, Response>,
    /// `composed` with a [`CancelGuard`] outermost, used when requests carry
    /// a deadline.
    guarded: Pipeline<HttpMeta, Response>,
}

impl Route {
    fn new(key: String, terminal: Pipeline<HttpMeta, Response>, registry: &Registry<HttpMeta, Response>) -> Self {
        let mut route = Self { key, composed: terminal.clone(), guarded: terminal.clone(), terminal };
        route.recompose(registry);
        route
    }

    fn recompose(&mut self, registry: &Registry<HttpMeta, Response>) {
        let guard: HttpInterceptor = Arc::new(CancelGuard);
        self.composed = self.terminal.clone().layer(registry.for_key(&self.key));
        self.guarded = self.composed.clone().layer([guard]);
    }
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](super::Server::serve).
/// Each registration returns `self` so calls chain naturally.
///
/// ```rust
/// use http::Method;
/// use interpose::http::{HttpMeta, Response, Router};
/// use interpose::interceptors::Trace;
/// use interpose::{Context, Result};
///
/// async fn get_user(ctx: Context<HttpMeta>) -> Result<Response> {
///     let id = ctx.meta().param("id").unwrap_or("unknown");
///     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#)))
/// }
///
/// let app = Router::new()
///     .intercept(Trace::new())
///     .on(Method::GET, "/users/{id}", get_user);
/// ```
pub struct Router {
    trees: HashMap<Method, MatchitRouter<usize>>,
    routes: Vec<Route>,
    registry: Registry<HttpMeta, Response>,
}

impl Router {
    pub fn new() -> Self {
        Self { trees: HashMap::new(), routes: Vec::new(), registry: Registry::new() }
    }

    /// Adds an interceptor around every route, outside any route-scoped
    /// ones. Global interceptors run in the order they are added.
    pub fn intercept(mut self, interceptor: impl Interceptor<HttpMeta, Response>) -> Self {
        self.registry.push_global(Arc::new(interceptor));
        for route in &mut self.routes {
            route.recompose(&self.registry);
        }
        self
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `ctx.meta().param("name")`
    /// retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if the path is invalid or conflicts with a registered route.
    pub fn on(self, method: Method, path: &str, handler: impl Handler<HttpMeta, Response>) -> Self {
        self.on_with(method, path, handler, [])
    }

    /// Like [`on`](Router::on), with interceptors that apply to this route
    /// only. They run inside the global ones, in the given order.
    pub fn on_with(
        mut self,
        method: Method,
        path: &str,
        handler: impl Handler<HttpMeta, Response>,
        interceptors: impl IntoIterator<Item = HttpInterceptor>,
    ) -> Self {
        let key = format!("{method} {path}");

        self.trees
            .entry(method)
            .or_default()
            .insert(path, self.routes.len())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.registry.extend_scoped(key.clone(), interceptors);

        let route = Route::new(key, Pipeline::new(handler), &self.registry);
        self.routes.push(route);
        self
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        let tree = self.trees.get(method)?;
        let matched = tree.at(path).ok()?;
        let route = self.routes.get(*matched.value)?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((route, params))
    }

    /// Routes one request and produces one response.
    ///
    /// Unknown routes answer 404. When `bridge` sets a request timeout the
    /// route runs behind an outermost [`CancelGuard`], so an expired call
    /// answers 504 whatever interceptors the route has. Pipeline errors are
    /// mapped through [`IntoResponse`] for [`Error`](crate::Error).
    pub async fn handle(&self, bridge: &HttpBridge, mut meta: HttpMeta) -> Response {
        let Some((route, params)) = self.lookup(&meta.method, &meta.path) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        meta.params = params;
        meta.route = route.key.clone();

        let pipeline = match bridge.request_timeout() {
            Some(_) => &route.guarded,
            None => &route.composed,
        };

        match execute_composed(bridge, &meta, pipeline).await {
            Ok(response) => response,
            Err(err) => (&err).into_response(),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use http::header::AUTHORIZATION;
    use http::HeaderValue;

    use super::*;
    use crate::context::Context;
    use crate::error::{Error, Result};
    use crate::http::HttpError;
    use crate::interceptor::{from_fn, Next};
    use tokio_util::sync::CancellationToken;

    async fn get_user(ctx: Context<HttpMeta>) -> Result<Response> {
        let id = ctx.meta().param("id").unwrap_or_default();
        Ok(Response::text(format!("user {id} via {}", ctx.method())))
    }

    async fn slow(_ctx: Context<HttpMeta>) -> Result<Response> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(Response::text("late"))
    }

    fn tag(name: &'static str) -> HttpInterceptor {
        Arc::new(from_fn(name, move |ctx: Context<HttpMeta>, next: Next<HttpMeta, Response>| async move {
            let res = next.run(ctx).await?;
            let trail = match res.header("x-trail") {
                Some(prev) => format!("{prev},{name}"),
                None => name.to_owned(),
            };
            let mut res = res;
            res.headers.retain(|(k, _)| k != "x-trail");
            res.headers.push(("x-trail".to_owned(), trail));
            Ok::<_, Error>(res)
        }))
    }

    fn require_token() -> HttpInterceptor {
        Arc::new(from_fn("auth", |ctx: Context<HttpMeta>, next: Next<HttpMeta, Response>| async move {
            if ctx.meta().header("authorization").is_none() {
                return Err(Error::interceptor("auth", HttpError::unauthorized("missing token").into()));
            }
            next.run(ctx).await
        }))
    }

    fn bridge() -> HttpBridge {
        HttpBridge::default()
    }

    #[tokio::test]
    async fn routes_with_params() {
        let router = Router::new().on(Method::GET, "/users/{id}", get_user);
        let res = router.handle(&bridge(), HttpMeta::new(Method::GET, "/users/42")).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"user 42 via GET /users/{id}");
    }

    #[tokio::test]
    async fn unknown_route_or_method_is_404() {
        let router = Router::new().on(Method::GET, "/users/{id}", get_user);

        let missing = router.handle(&bridge(), HttpMeta::new(Method::GET, "/orders/1")).await;
        let wrong_method = router.handle(&bridge(), HttpMeta::new(Method::DELETE, "/users/1")).await;

        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(wrong_method.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scoped_interceptors_run_inside_global() {
        let router = Router::new()
            .intercept(from_fn("global", |ctx: Context<HttpMeta>, next: Next<HttpMeta, Response>| async move {
                let mut res = next.run(ctx).await?;
                res.headers.push(("x-global".to_owned(), "1".to_owned()));
                Ok::<_, Error>(res)
            }))
            .on_with(Method::GET, "/users/{id}", get_user, [tag("a"), tag("b")])
            .on(Method::GET, "/plain/{id}", get_user);

        let scoped = router.handle(&bridge(), HttpMeta::new(Method::GET, "/users/1")).await;
        assert_eq!(scoped.header("x-trail"), Some("b,a"));
        assert_eq!(scoped.header("x-global"), Some("1"));

        let plain = router.handle(&bridge(), HttpMeta::new(Method::GET, "/plain/1")).await;
        assert_eq!(plain.header("x-trail"), None);
        assert_eq!(plain.header("x-global"), Some("1"));
    }

    #[tokio::test]
    async fn rejection_maps_to_its_status() {
        let router = Router::new().on_with(Method::GET, "/me/{id}", get_user, [require_token()]);

        let denied = router.handle(&bridge(), HttpMeta::new(Method::GET, "/me/1")).await;
        assert_eq!(denied.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(denied.body().as_ref(), b"missing token");

        let allowed = router
            .handle(
                &bridge(),
                HttpMeta::new(Method::GET, "/me/1")
                    .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer t")),
            )
            .await;
        assert_eq!(allowed.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn global_added_after_routes_applies_to_them() {
        let router = Router::new()
            .on_with(Method::GET, "/users/{id}", get_user, [tag("a")])
            .intercept(from_fn("late", |ctx: Context<HttpMeta>, next: Next<HttpMeta, Response>| async move {
                let mut res = next.run(ctx).await?;
                res.headers.push(("x-late".to_owned(), "1".to_owned()));
                Ok::<_, Error>(res)
            }));
        assert_eq!(router.routes[0].composed.depth(), 2);
        assert_eq!(router.routes[0].guarded.depth(), 3);

        let res = router.handle(&bridge(), HttpMeta::new(Method::GET, "/users/1")).await;
        assert_eq!(res.header("x-trail"), Some("a"));
        assert_eq!(res.header("x-late"), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn request_timeout_is_enforced_without_a_guard() {
        let router = Router::new().on(Method::GET, "/slow", slow);
        let bridge = HttpBridge::new(Some(Duration::from_millis(100)));

        let started = tokio::time::Instant::now();
        let res = router.handle(&bridge, HttpMeta::new(Method::GET, "/slow")).await;

        assert_eq!(res.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn no_timeout_leaves_route_unguarded() {
        let router = Router::new().on(Method::GET, "/users/{id}", get_user);
        let res = router.handle(&bridge(), HttpMeta::new(Method::GET, "/users/5")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_answers_503_for_guarded_calls() {
        let shutdown = CancellationToken::new();
        let bridge = HttpBridge::new(Some(Duration::from_secs(30))).with_shutdown(shutdown.clone());
        let router = Router::new().on(Method::GET, "/slow", slow);

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let res = router.handle(&bridge, HttpMeta::new(Method::GET, "/slow")).await;
        assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_route_panics() {
        let _ = Router::new()
            .on(Method::GET, "/users/{id}", get_user)
            .on(Method::GET, "/users/{name}", get_user);
    }
}
