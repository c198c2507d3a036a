//! HTTP middleware utilities.
//!
//! Credential verification and token minting happen upstream of this
//! service: `AuthMiddleware` extracts the caller/tenant identity from two
//! trusted headers set by the gateway in front of it and attaches them to
//! the request via `FromRequest` so handlers can pull an `AuthContext`
//! directly from their argument list.
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{error::ErrorUnauthorized, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::time::Instant;
use uuid::Uuid;

pub const CALLER_ID_HEADER: &str = "X-Caller-Id";
pub const TENANT_ID_HEADER: &str = "X-Tenant-Id";

#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub caller_id: Uuid,
    pub tenant_id: Uuid,
}

pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let caller_id = header_uuid(&req, CALLER_ID_HEADER)
                .ok_or_else(|| ErrorUnauthorized("Missing or invalid X-Caller-Id header"))?;
            let tenant_id = header_uuid(&req, TENANT_ID_HEADER)
                .ok_or_else(|| ErrorUnauthorized("Missing or invalid X-Tenant-Id header"))?;

            req.extensions_mut().insert(AuthContext { caller_id, tenant_id });

            service.call(req).await
        })
    }
}

fn header_uuid(req: &ServiceRequest, name: &str) -> Option<Uuid> {
    req.headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
}

impl FromRequest for AuthContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthContext>()
                .copied()
                .ok_or_else(|| ErrorUnauthorized("Auth context missing")),
        )
    }
}

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let path = req.path().to_string();
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let res = service.call(req).await;
            let elapsed = start.elapsed().as_millis();
            tracing::debug!(%method, %path, %elapsed, "request completed");
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn header_uuid_parses_valid_header() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((CALLER_ID_HEADER, id.to_string()))
            .to_srv_request();
        assert_eq!(header_uuid(&req, CALLER_ID_HEADER), Some(id));
    }

    #[test]
    fn header_uuid_rejects_malformed_header() {
        let req = TestRequest::default()
            .insert_header((CALLER_ID_HEADER, "not-a-uuid"))
            .to_srv_request();
        assert_eq!(header_uuid(&req, CALLER_ID_HEADER), None);
    }

    #[test]
    fn header_uuid_is_none_when_absent() {
        let req = TestRequest::default().to_srv_request();
        assert_eq!(header_uuid(&req, TENANT_ID_HEADER), None);
    }
}
