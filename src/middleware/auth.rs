//! 认证中间件
//!
//! `/v1/*` 统一 Bearer 令牌认证。令牌比较走 SHA-256 摘要 + 常数时间
//! 比较，耗时与呈现令牌的内容和长度无关。

use crate::errors::AppError;
use crate::security::ApiTokenVerifier;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;

/// Bearer 令牌认证中间件
#[derive(Clone)]
pub struct BearerAuth {
    verifier: ApiTokenVerifier,
}

impl BearerAuth {
    pub fn new(verifier: ApiTokenVerifier) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = BearerAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(BearerAuthMiddleware {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
        })
    }
}

pub struct BearerAuthMiddleware<S> {
    service: Rc<S>,
    verifier: ApiTokenVerifier,
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddleware<S>
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
        let verifier = self.verifier.clone();

        Box::pin(async move {
            let auth_header = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok());

            let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
                Some(token) if !token.is_empty() => token,
                _ => {
                    return Err(AppError::Unauthorized(
                        "Missing or invalid Authorization header".to_string(),
                    )
                    .into());
                }
            };

            if !verifier.verify(token) {
                return Err(AppError::Unauthorized(
                    "Invalid authentication token".to_string(),
                )
                .into());
            }

            service.call(req).await
        })
    }
}
