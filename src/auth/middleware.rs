//! Route protection middleware.
//!
//! Three layers compose in front of protected handlers:
//!
//! * [`Protect`] — extracts the bearer token, verifies signature and expiry,
//!   re-resolves the user (joined with role) from the store, rejects
//!   missing or inactive accounts, and attaches an [`Identity`] to request
//!   extensions. Every failure renders the same generic 401 body; the
//!   branches differ only in what gets logged.
//! * [`RequireRole`] — allows the request only when the attached identity's
//!   role is in a fixed allow-list bound at route registration.
//! * [`RequirePermission`] — looks up the (role, module) capability row and
//!   checks the boolean matching the bound action.
//!
//! Both authorizers expect to run after [`Protect`]; a missing identity is a
//! wiring mistake and is answered with 403 rather than a panic.

use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use log::{debug, error, warn};
use serde_json::json;

use crate::auth::authorization::{Action, role_allowed};
use crate::auth::token::TokenManager;
use crate::store::{UserStatus, UserStore};

/// The identity resolved by [`Protect`], available to downstream middleware
/// and handlers via request extensions.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub username: String,
    pub role_id: u64,
    pub role: String,
    pub status: UserStatus,
}

/// Fetches the identity attached by [`Protect`], if any.
pub fn identity(req: &actix_web::HttpRequest) -> Option<Identity> {
    req.extensions().get::<Identity>().cloned()
}

fn unauthenticated_response() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "success": false,
        "message": "Not authorized to access this resource",
    }))
}

fn forbidden_response(message: &str) -> HttpResponse {
    HttpResponse::Forbidden().json(json!({
        "success": false,
        "message": message,
    }))
}

fn server_error_response() -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({
        "success": false,
        "message": "Internal server error",
    }))
}

/// Token verifier middleware factory.
pub struct Protect {
    store: Arc<dyn UserStore>,
    tokens: Arc<TokenManager>,
}

impl Protect {
    pub fn new(store: Arc<dyn UserStore>, tokens: Arc<TokenManager>) -> Self {
        Self { store, tokens }
    }

    /// Extracts the token from an `Authorization: Bearer <token>` header.
    fn extract_token(req: &ServiceRequest) -> Option<String> {
        req.headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.to_string())
    }
}

impl<S, B> Transform<S, ServiceRequest> for Protect
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ProtectMiddleware<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(ProtectMiddleware {
            service: Rc::new(service),
            store: self.store.clone(),
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct ProtectMiddleware<S> {
    service: Rc<S>,
    store: Arc<dyn UserStore>,
    tokens: Arc<TokenManager>,
}

impl<S, B> Service<ServiceRequest> for ProtectMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let store = self.store.clone();
        let tokens = self.tokens.clone();

        Box::pin(async move {
            let path = req.path().to_string();

            let token = match Protect::extract_token(&req) {
                Some(token) => token,
                None => {
                    warn!("rejected {}: missing bearer token", path);
                    return Ok(req
                        .into_response(unauthenticated_response())
                        .map_into_right_body());
                }
            };

            let claims = match tokens.verify(&token) {
                Ok(claims) => claims,
                Err(e) => {
                    warn!("rejected {}: token verification failed: {}", path, e);
                    return Ok(req
                        .into_response(unauthenticated_response())
                        .map_into_right_body());
                }
            };

            let user_id: u64 = match claims.sub.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!("rejected {}: malformed subject claim {:?}", path, claims.sub);
                    return Ok(req
                        .into_response(unauthenticated_response())
                        .map_into_right_body());
                }
            };

            // Re-resolve the user on every request: a deleted or deactivated
            // account must be locked out even while its token is unexpired.
            let user = match store.find_by_id(user_id) {
                Ok(Some(user)) => user,
                Ok(None) => {
                    warn!("rejected {}: token for deleted user {}", path, user_id);
                    return Ok(req
                        .into_response(unauthenticated_response())
                        .map_into_right_body());
                }
                Err(e) => {
                    error!("store lookup failed while verifying {}: {}", path, e);
                    return Ok(req
                        .into_response(server_error_response())
                        .map_into_right_body());
                }
            };

            if user.status != UserStatus::Active {
                warn!("rejected {}: user {} is inactive", path, user.id);
                return Ok(req
                    .into_response(unauthenticated_response())
                    .map_into_right_body());
            }

            debug!("request to {} authenticated as user {} ({})", path, user.id, user.role);
            req.extensions_mut().insert(Identity {
                id: user.id,
                name: user.name,
                email: user.email,
                username: user.username,
                role_id: user.role_id,
                role: user.role,
                status: user.status,
            });

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Role allow-list authorizer factory.
pub struct RequireRole {
    allowed: Rc<Vec<String>>,
}

impl RequireRole {
    pub fn new<I, T>(roles: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            allowed: Rc::new(roles.into_iter().map(Into::into).collect()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRoleMiddleware<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequireRoleMiddleware {
            service: Rc::new(service),
            allowed: self.allowed.clone(),
        }))
    }
}

pub struct RequireRoleMiddleware<S> {
    service: Rc<S>,
    allowed: Rc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for RequireRoleMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let allowed = self.allowed.clone();

        Box::pin(async move {
            let path = req.path().to_string();
            let caller = { req.extensions().get::<Identity>().cloned() };

            let caller = match caller {
                Some(caller) => caller,
                None => {
                    // Authorizer wired without the verifier in front of it.
                    error!("role check on {} found no identity; check middleware order", path);
                    return Ok(req
                        .into_response(forbidden_response("Access denied"))
                        .map_into_right_body());
                }
            };

            if !role_allowed(&caller.role, &allowed) {
                warn!("user {} ({}) denied on {}", caller.id, caller.role, path);
                let message =
                    format!("Role '{}' is not allowed to access {}", caller.role, path);
                return Ok(req
                    .into_response(forbidden_response(&message))
                    .map_into_right_body());
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Permission-table authorizer factory: `(module, action)` is fixed at route
/// registration, the caller's role comes from the attached identity.
pub struct RequirePermission {
    module: String,
    action: Action,
    store: Arc<dyn UserStore>,
}

impl RequirePermission {
    pub fn new(module: impl Into<String>, action: Action, store: Arc<dyn UserStore>) -> Self {
        Self {
            module: module.into(),
            action,
            store,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequirePermission
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequirePermissionMiddleware<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequirePermissionMiddleware {
            service: Rc::new(service),
            module: self.module.clone(),
            action: self.action,
            store: self.store.clone(),
        }))
    }
}

pub struct RequirePermissionMiddleware<S> {
    service: Rc<S>,
    module: String,
    action: Action,
    store: Arc<dyn UserStore>,
}

impl<S, B> Service<ServiceRequest> for RequirePermissionMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let store = self.store.clone();
        let module = self.module.clone();
        let action = self.action;

        Box::pin(async move {
            let path = req.path().to_string();
            let caller = { req.extensions().get::<Identity>().cloned() };

            let caller = match caller {
                Some(caller) => caller,
                None => {
                    error!(
                        "permission check on {} found no identity; check middleware order",
                        path
                    );
                    return Ok(req
                        .into_response(forbidden_response("Access denied"))
                        .map_into_right_body());
                }
            };

            let permission = match store.permission_for(caller.role_id, &module) {
                Ok(permission) => permission,
                Err(e) => {
                    error!("permission lookup failed for {}: {}", path, e);
                    return Ok(req
                        .into_response(server_error_response())
                        .map_into_right_body());
                }
            };

            let allowed = match permission {
                Some(ref permission) => permission.allows(action),
                None => false,
            };

            if !allowed {
                warn!(
                    "user {} ({}) denied {} on module {}",
                    caller.id, caller.role, action, module
                );
                let message = if permission.is_none() {
                    format!("No permission configured for module '{}'", module)
                } else {
                    format!(
                        "Role '{}' may not {} in module '{}'",
                        caller.role, action, module
                    )
                };
                return Ok(req
                    .into_response(forbidden_response(&message))
                    .map_into_right_body());
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authorization::RolePermission;
    use crate::auth::password;
    use crate::store::{MemoryStore, NewUser, UserStatus};
    use actix_web::{App, HttpRequest, test, web};
    use std::time::Duration;

    fn store_with_user(username: &str, role_id: u64, status: UserStatus) -> (Arc<MemoryStore>, u64) {
        let store = Arc::new(MemoryStore::new());
        let id = store
            .insert_user(NewUser {
                name: format!("{} name", username),
                email: format!("{}@school.test", username),
                username: username.to_string(),
                password_hash: Some(password::hash_password_with_cost("pw", 4).unwrap()),
                role_id,
                status,
                profile: None,
            })
            .unwrap()
            .id;
        (store, id)
    }

    fn token_manager() -> Arc<TokenManager> {
        Arc::new(TokenManager::new(
            b"middleware-test-secret",
            Duration::from_secs(3600),
            "campus-auth-test",
        ))
    }

    async fn whoami(req: HttpRequest) -> HttpResponse {
        match identity(&req) {
            Some(id) => HttpResponse::Ok().json(json!({"success": true, "role": id.role})),
            None => HttpResponse::Ok().json(json!({"success": true, "role": null})),
        }
    }

    #[actix_rt::test]
    async fn protect_rejects_missing_token() {
        let (store, _) = store_with_user("a", 1, UserStatus::Active);
        let app = test::init_service(
            App::new()
                .wrap(Protect::new(store, token_manager()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn protect_rejects_invalid_token() {
        let (store, _) = store_with_user("a", 1, UserStatus::Active);
        let app = test::init_service(
            App::new()
                .wrap(Protect::new(store, token_manager()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", "Bearer not-a-token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn protect_attaches_identity_for_valid_token() {
        let (store, user_id) = store_with_user("a", 2, UserStatus::Active);
        let tokens = token_manager();
        let token = tokens.issue(user_id, "teacher").unwrap();

        let app = test::init_service(
            App::new()
                .wrap(Protect::new(store, tokens))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["role"], "teacher");
    }

    #[actix_rt::test]
    async fn protect_rejects_inactive_user_with_live_token() {
        let (store, user_id) = store_with_user("a", 2, UserStatus::Active);
        let tokens = token_manager();
        let token = tokens.issue(user_id, "teacher").unwrap();
        store.set_status(user_id, UserStatus::Inactive).unwrap();

        let app = test::init_service(
            App::new()
                .wrap(Protect::new(store, tokens))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn require_role_denies_roles_off_the_list() {
        let (store, user_id) = store_with_user("t", 2, UserStatus::Active);
        let tokens = token_manager();
        let token = tokens.issue(user_id, "teacher").unwrap();

        let app = test::init_service(
            App::new()
                .wrap(RequireRole::new(["admin"]))
                .wrap(Protect::new(store, tokens))
                .route("/admin-only", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/admin-only")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("teacher"), "message should name the role: {message}");
        assert!(message.contains("/admin-only"), "message should name the route: {message}");
    }

    #[actix_rt::test]
    async fn require_role_without_identity_is_forbidden_not_a_crash() {
        let app = test::init_service(
            App::new()
                .wrap(RequireRole::new(["admin"]))
                .route("/misconfigured", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/misconfigured").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
    }

    #[actix_rt::test]
    async fn require_permission_fails_closed_without_a_row() {
        let (store, user_id) = store_with_user("t", 2, UserStatus::Active);
        let tokens = token_manager();
        let token = tokens.issue(user_id, "teacher").unwrap();

        let app = test::init_service(
            App::new()
                .wrap(RequirePermission::new("students", Action::Read, store.clone()))
                .wrap(Protect::new(store, tokens))
                .route("/students", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/students")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("students"));
    }

    #[actix_rt::test]
    async fn require_permission_honors_the_action_boolean() {
        let (store, user_id) = store_with_user("t", 2, UserStatus::Active);
        store
            .grant_permission(RolePermission::read_only(2, "students"))
            .unwrap();
        let tokens = token_manager();
        let token = tokens.issue(user_id, "teacher").unwrap();

        let read_app = test::init_service(
            App::new()
                .wrap(RequirePermission::new("students", Action::Read, store.clone()))
                .wrap(Protect::new(store.clone(), tokens.clone()))
                .route("/students", web::get().to(whoami)),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/students")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&read_app, req).await;
        assert!(resp.status().is_success());

        let delete_app = test::init_service(
            App::new()
                .wrap(RequirePermission::new("students", Action::Delete, store.clone()))
                .wrap(Protect::new(store, tokens))
                .route("/students", web::delete().to(whoami)),
        )
        .await;
        let req = test::TestRequest::delete()
            .uri("/students")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&delete_app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
    }
}
