//! Basic authenticated request example
//!
//! Usage:
//!   AUTHFLOW_BASE_URL=http://localhost:8080 AUTHFLOW_EMAIL=me@example.com \
//!   AUTHFLOW_PASSWORD=secret cargo run --example basic_request

use std::sync::Arc;

use authflow_rs_client::{
    ApiError, ClientConfig, FileStorage, HttpClient, LoginRequest, RequestOptions, SystemClock, TokenStore,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configuration
    let base_url = std::env::var("AUTHFLOW_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let email = std::env::var("AUTHFLOW_EMAIL").unwrap_or_else(|_| "demo@example.com".to_string());
    let password = std::env::var("AUTHFLOW_PASSWORD").unwrap_or_else(|_| "demo".to_string());
    let store_path = std::env::var("AUTHFLOW_TOKEN_FILE").unwrap_or_else(|_| "authflow-tokens.json".to_string());

    println!("=== Authflow Rust Client Example ===");
    println!("Base URL: {}", base_url);
    println!("Token file: {}", store_path);
    println!();

    let tokens = TokenStore::new(Arc::new(FileStorage::new(&store_path)), Arc::new(SystemClock));
    let migrated = tokens.migrate_legacy();
    if migrated > 0 {
        println!("✓ Migrated {} legacy credential keys", migrated);
    }

    let client = HttpClient::new(ClientConfig::new(base_url), tokens)?;
    client.on_session_expired(|| println!("! Session expired, please log in again"));
    println!("✓ Client created");
    println!();

    if !client.is_authenticated() {
        println!("Logging in as {}...", email);
        client.login(&LoginRequest::new(email, password)).await?;
        println!("✓ Logged in");
        println!();
    }

    // Authenticated request; a 401 is refreshed and replayed transparently
    println!("Fetching current user...");
    match client.request_with_metadata::<Value>("/api/users/me", RequestOptions::get()).await {
        Ok(payload) => {
            println!("✓ Profile: {}", payload.data);
            if let Some(metadata) = payload.metadata {
                println!("  Metadata: {}", metadata);
            }
        }
        Err(ApiError::Validation { field_errors, .. }) => {
            println!("! Validation failed: {:?}", field_errors);
        }
        Err(e) => {
            println!("! Request failed [{}]: {}", e.code().unwrap_or("?"), e);
        }
    }
    println!();

    client.logout().await;
    println!("✓ Logged out, credentials cleared");

    Ok(())
}
