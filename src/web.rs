//! HTTP surface.
//!
//! Route map:
//!
//! | Method | Path                          | Guard                                    |
//! |--------|-------------------------------|------------------------------------------|
//! | POST   | `/auth/login`                 | none                                     |
//! | GET    | `/auth/me`                    | `Protect`                                |
//! | POST   | `/accounts/{collection}`      | `Protect` + `RequireRole(["admin"])`     |
//! | DELETE | `/accounts/{collection}/{id}` | `Protect` + `RequireRole(["admin"])`     |
//! | PUT    | `/users/{id}/password`        | `Protect` (self or admin)                |
//! | GET    | `/students`                   | `Protect` + `RequirePermission(read)`    |
//! | DELETE | `/students/{id}`              | `Protect` + `RequirePermission(delete)`  |
//!
//! `{collection}` is one of `teachers`, `students`, `parents`. Guards are
//! bound at registration; handlers never re-check tokens. The students routes
//! stand in for the profile modules that live outside this service — they
//! exist to carry the permission-table guard.

use std::sync::Arc;

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::accounts::{AccountService, ProvisionRequest};
use crate::auth::authentication::{Authenticator, LoginRequest, SanitizedUser};
use crate::auth::authorization::Action;
use crate::auth::middleware::{Protect, RequirePermission, RequireRole, identity};
use crate::auth::token::TokenManager;
use crate::config::Config;
use crate::error::AuthError;
use crate::store::{ProfileKind, UserStore};

/// Shared handles threaded through every worker.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub tokens: Arc<TokenManager>,
    pub authenticator: Arc<Authenticator>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    pub fn new(store: Arc<dyn UserStore>, tokens: Arc<TokenManager>, accounts: AccountService) -> Self {
        let authenticator = Arc::new(Authenticator::new(store.clone(), tokens.clone()));
        Self {
            store,
            tokens,
            authenticator,
            accounts: Arc::new(accounts),
        }
    }
}

fn collection_kind(collection: &str) -> Option<ProfileKind> {
    match collection {
        "teachers" => Some(ProfileKind::Teacher),
        "students" => Some(ProfileKind::Student),
        "parents" => Some(ProfileKind::Parent),
        _ => None,
    }
}

async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AuthError> {
    let response = state.authenticator.login(&body.identifier, &body.password)?;
    Ok(HttpResponse::Ok().json(response))
}

async fn me(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AuthError> {
    let caller = identity(&req).ok_or(AuthError::Unauthenticated)?;
    let user = state
        .store
        .find_by_id(caller.id)?
        .ok_or(AuthError::Unauthenticated)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": SanitizedUser::from(&user),
    })))
}

async fn create_account(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ProvisionRequest>,
) -> Result<HttpResponse, AuthError> {
    let collection = path.into_inner();
    let kind = match collection_kind(&collection) {
        Some(kind) => kind,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "success": false,
                "message": format!("Unknown account collection '{}'", collection),
            })));
        }
    };

    let account = state.accounts.provision(kind, body.into_inner())?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "user": account.user,
        "password": account.password,
    })))
}

async fn delete_account(
    state: web::Data<AppState>,
    path: web::Path<(String, u64)>,
) -> Result<HttpResponse, AuthError> {
    let (collection, profile_id) = path.into_inner();
    let kind = match collection_kind(&collection) {
        Some(kind) => kind,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "success": false,
                "message": format!("Unknown account collection '{}'", collection),
            })));
        }
    };

    if state.accounts.remove_profile(kind, profile_id)? {
        Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Account removed",
        })))
    } else {
        Ok(HttpResponse::NotFound().json(json!({
            "success": false,
            "message": "No account for that profile",
        })))
    }
}

#[derive(Debug, Deserialize)]
struct ChangePasswordRequest {
    password: String,
}

async fn change_password(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<u64>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, AuthError> {
    let caller = identity(&req).ok_or(AuthError::Unauthenticated)?;
    let target = path.into_inner();

    // Users change their own password; only admins change someone else's.
    if caller.id != target && caller.role != "admin" {
        return Err(AuthError::Forbidden(
            "Only admins may change another user's password".to_string(),
        ));
    }

    state.accounts.change_password(target, &body.password)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password updated",
    })))
}

// Placeholder for the student module proper; real data lives in another
// service. The interesting part is the permission guard in front of it.
async fn list_students() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "students": [],
    }))
}

async fn delete_student(path: web::Path<u64>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Student {} removed", path.into_inner()),
    }))
}

/// Registers every route with its guards. Shared between the real server and
/// the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    let store = state.store.clone();
    let tokens = state.tokens.clone();

    cfg.app_data(web::Data::new(state.clone()))
        .service(web::resource("/auth/login").route(web::post().to(login)))
        .service(
            web::resource("/auth/me")
                .wrap(Protect::new(store.clone(), tokens.clone()))
                .route(web::get().to(me)),
        )
        .service(
            // Later-wrapped middleware runs first, so Protect is outermost.
            web::scope("/accounts")
                .wrap(RequireRole::new(["admin"]))
                .wrap(Protect::new(store.clone(), tokens.clone()))
                .service(web::resource("/{collection}").route(web::post().to(create_account)))
                .service(
                    web::resource("/{collection}/{profile_id}")
                        .route(web::delete().to(delete_account)),
                ),
        )
        .service(
            web::resource("/users/{id}/password")
                .wrap(Protect::new(store.clone(), tokens.clone()))
                .route(web::put().to(change_password)),
        )
        .service(
            web::resource("/students")
                .wrap(RequirePermission::new("students", Action::Read, store.clone()))
                .wrap(Protect::new(store.clone(), tokens.clone()))
                .route(web::get().to(list_students)),
        )
        .service(
            web::resource("/students/{id}")
                .wrap(RequirePermission::new("students", Action::Delete, store.clone()))
                .wrap(Protect::new(store, tokens))
                .route(web::delete().to(delete_student)),
        );
}

/// Binds and runs the HTTP server until shutdown.
pub async fn run_server(config: &Config, state: AppState) -> std::io::Result<()> {
    let bind = (config.bind_addr.as_str(), config.bind_port);
    info!("listening on {}:{}", config.bind_addr, config.bind_port);

    HttpServer::new(move || {
        let state = state.clone();
        App::new().configure(move |cfg| configure(cfg, &state))
    })
    .bind(bind)?
    .run()
    .await
}
