//! API-key middleware for Actix Web.
//!
//! The operator console endpoints under `/admin` are guarded by a shared key supplied in the `X-APG-Admin-Key`
//! header. The key is configured via `APG_ADMIN_API_KEY`; when it is unset the middleware denies every request
//! rather than silently opening the console.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorForbidden,
    Error,
};
use apg_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};

pub const ADMIN_KEY_HEADER: &str = "X-APG-Admin-Key";

pub struct ApiKeyMiddlewareFactory {
    key: Secret<String>,
}

impl ApiKeyMiddlewareFactory {
    pub fn new(key: Secret<String>) -> Self {
        ApiKeyMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiKeyMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyMiddlewareService { key: self.key.clone(), service: Rc::new(service) }))
    }
}

pub struct ApiKeyMiddlewareService<S> {
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let key = self.key.reveal().clone();
        Box::pin(async move {
            trace!("🔐️ Checking admin key for request");
            if key.is_empty() {
                warn!("🔐️ No admin API key is configured. Denying access.");
                return Err(ErrorForbidden("Admin access is not configured."));
            }
            let supplied = req.headers().get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok());
            match supplied {
                Some(supplied) if supplied == key => {
                    trace!("🔐️ Admin key check for request ✅️");
                    service.call(req).await
                },
                Some(_) => {
                    warn!("🔐️ Invalid admin key supplied. Denying access.");
                    Err(ErrorForbidden("Invalid admin key."))
                },
                None => {
                    warn!("🔐️ No admin key supplied. Denying access.");
                    Err(ErrorForbidden("No admin key supplied."))
                },
            }
        })
    }
}
