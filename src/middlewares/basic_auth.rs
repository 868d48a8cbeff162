use crate::config::AdminConfig;
use crate::error::AppError;
use crate::utils::verify_admin_credentials;
use actix_web::http::Method;
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::sync::Arc;

// 只有 /admin 需要认证，短信回调与公开看板不需要
fn is_protected(path: &str) -> bool {
    path == "/admin" || path.starts_with("/admin/")
}

/// Decode an `Authorization: Basic ...` header into (username, password).
pub fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = BASE64.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

pub struct AdminAuthMiddleware {
    admin: Arc<AdminConfig>,
}

impl AdminAuthMiddleware {
    pub fn new(admin: AdminConfig) -> Self {
        Self {
            admin: Arc::new(admin),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthMiddlewareService {
            service,
            admin: self.admin.clone(),
        }))
    }
}

pub struct AdminAuthMiddlewareService<S> {
    service: S,
    admin: Arc<AdminConfig>,
}

impl<S, B> Service<ServiceRequest> for AdminAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行 CORS 预检与公开路径
        if req.method() == Method::OPTIONS || !is_protected(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        let credentials = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_basic_credentials);

        match credentials {
            Some((username, password))
                if verify_admin_credentials(&self.admin, &username, &password) =>
            {
                let fut = self.service.call(req);
                Box::pin(fut)
            }
            Some((username, _)) => {
                log::warn!("Rejected admin login for {username}");
                let error = AppError::AuthError("Invalid credentials".to_string());
                Box::pin(async move { Err(error.into()) })
            }
            None => {
                let error = AppError::AuthError("Missing credentials".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}
