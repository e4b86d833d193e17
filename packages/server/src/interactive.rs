//! Interactive mode for the server.
//!
//! Prompts for the bind address, port, store, and (when unset) the JWT
//! secret before starting.

use dialoguer::{Confirm, Input, Select};

use crate::{DEFAULT_BIND_ADDR, DEFAULT_PORT, StartupError};

const STORES: &[&str] = &["memory", "dynamodb"];

/// Runs the server in interactive mode, prompting for configuration.
///
/// Sets `BIND_ADDR`, `PORT`, `BUS_STORE`, and `JWT_SECRET` from the answers and
/// delegates to [`super::run_server`].
///
/// # Errors
///
/// Returns [`StartupError`] if the server fails to start.
#[allow(clippy::future_not_send)]
pub async fn run() -> Result<(), StartupError> {
    println!("Bus Directory Server");
    println!();

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default(DEFAULT_BIND_ADDR.to_string())
        .interact_text()
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(DEFAULT_PORT)
        .interact_text()
        .unwrap_or(DEFAULT_PORT);

    let default_store = usize::from(std::env::var("BUS_TABLE_NAME").is_ok());
    let store = Select::new()
        .with_prompt("Store")
        .items(STORES)
        .default(default_store)
        .interact()
        .map_or(STORES[default_store], |i| STORES[i]);

    let needs_secret = std::env::var("JWT_SECRET").is_err()
        && std::env::var("TRUST_UPSTREAM_AUTH").is_err();
    let jwt_secret: Option<String> = needs_secret
        .then(|| {
            Input::<String>::new()
                .with_prompt("JWT secret")
                .allow_empty(true)
                .interact_text()
                .ok()
        })
        .flatten()
        .filter(|s| !s.trim().is_empty());

    // SAFETY: called before the server starts any worker threads; the
    // variables are read once while building the state.
    unsafe {
        std::env::set_var("BIND_ADDR", &bind_addr);
        std::env::set_var("PORT", port.to_string());
        std::env::set_var("BUS_STORE", store);
        if let Some(secret) = &jwt_secret {
            std::env::set_var("JWT_SECRET", secret);
        }
    }

    if !Confirm::new()
        .with_prompt(format!("Start server on {bind_addr}:{port} ({store})?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server().await
}
