use std::sync::Arc;

use log::{info, warn};
use simplelog::{ColorChoice, Config as LogConfig, TermLogger, TerminalMode};

use campus_auth::accounts::AccountService;
use campus_auth::auth::authorization::RolePermission;
use campus_auth::auth::password;
use campus_auth::auth::token::TokenManager;
use campus_auth::config::Config;
use campus_auth::error::AuthError;
use campus_auth::store::{MemoryStore, NewUser, UserStatus, UserStore};
use campus_auth::web::{AppState, run_server};

/// Seeds the bootstrap admin account and the demo permission rows.
fn seed(store: &MemoryStore) -> Result<(), AuthError> {
    let admin_password = match std::env::var("ADMIN_PASSWORD") {
        Ok(p) if !p.is_empty() => p,
        _ => {
            warn!("ADMIN_PASSWORD not set; using the default bootstrap password");
            "admin123".to_string()
        }
    };

    let admin_role = store
        .role_by_name("admin")?
        .ok_or_else(|| AuthError::Server("admin role is not seeded".to_string()))?;
    let teacher_role = store
        .role_by_name("teacher")?
        .ok_or_else(|| AuthError::Server("teacher role is not seeded".to_string()))?;

    let admin = store.insert_user(NewUser {
        name: "Administrator".to_string(),
        email: "admin@school.local".to_string(),
        username: "admin".to_string(),
        password_hash: Some(password::hash_password(&admin_password)?),
        role_id: admin_role.id,
        status: UserStatus::Active,
        profile: None,
    })?;
    info!("seeded admin account {}", admin.id);

    store.grant_permission(RolePermission::full(admin_role.id, "students"))?;
    store.grant_permission(RolePermission::read_only(teacher_role.id, "students"))?;

    Ok(())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let _ = TermLogger::init(
        campus_auth::log_level_from_env(),
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(MemoryStore::new());
    if let Err(e) = seed(&store) {
        eprintln!("seeding failed: {}", e);
        std::process::exit(1);
    }

    let tokens = Arc::new(TokenManager::new(
        config.jwt_secret.as_bytes(),
        config.token_ttl,
        config.issuer.clone(),
    ));
    let accounts = AccountService::new(store.clone(), config.generated_password_len);
    let state = AppState::new(store, tokens, accounts);

    run_server(&config, state).await
}
