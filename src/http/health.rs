//! Built-in Kubernetes health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on your router like any other handler:
//!
//! ```rust
//! use http::Method;
//! use interpose::http::{health, Router};
//!
//! let app = Router::new()
//!     .on(Method::GET, "/healthz", health::liveness)
//!     .on(Method::GET, "/readyz", health::readiness);
//! ```
//!
//! Replace `readiness` with your own handler to gate on dependency health.

use super::{HttpMeta, Response};
use crate::context::Context;
use crate::error::Result;

/// Always `200 OK` with body `"ok"`.
pub async fn liveness(_ctx: Context<HttpMeta>) -> Result<Response> {
    Ok(Response::text("ok"))
}

/// `200 OK` with body `"ready"`.
pub async fn readiness(_ctx: Context<HttpMeta>) -> Result<Response> {
    Ok(Response::text("ready"))
}
