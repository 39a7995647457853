//! Subcommand handlers. Each one opens the session, does its work through
//! the core library, and tears the session down again.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use pneumocare_core::auth::gate;
use pneumocare_core::{
    Admission, ApiClient, Config, RequestAuthorizer, Route, SessionManager, SessionState,
};

use crate::Command;

/// Maximum length for username input
const MAX_USERNAME_LENGTH: usize = 150;

pub async fn run(command: Command, config: Config) -> Result<()> {
    let api = ApiClient::new(config.api_base_url(), config.request_timeout())?;
    let store = config.token_store()?;
    debug!(base_url = api.base_url(), "Opening session");
    let manager =
        SessionManager::init(config.session_settings(), Arc::new(api.clone()), store).await;

    let result = match command {
        Command::Login { username } => login(&manager, &config, username, false).await,
        Command::Register { username } => login(&manager, &config, username, true).await,
        Command::Logout => {
            manager.logout().await;
            println!("Logged out");
            Ok(())
        }
        Command::Status { json } => status(&manager.snapshot(), json),
        Command::Predict { image } => predict(&manager, &api, &image).await,
        Command::Ask { query } => ask(&manager, &api, &query.join(" ")).await,
        Command::Watch => watch(&manager).await,
    };

    manager.teardown().await;
    result
}

/// Check the gate for `route` against the current session
fn enter(route: Route, manager: &SessionManager) -> Result<()> {
    match gate::check(route, &manager.snapshot()) {
        Admission::Allow => Ok(()),
        Admission::Redirect(Route::Login) => bail!("Not logged in. Run `pneumocare login` first."),
        Admission::Redirect(other) => bail!("Redirected to {}", other.path()),
    }
}

async fn login(
    manager: &SessionManager,
    config: &Config,
    username: Option<String>,
    register: bool,
) -> Result<()> {
    let username = match username
        .or_else(|| std::env::var("PNEUMOCARE_USERNAME").ok())
        .or_else(|| config.last_username.clone())
    {
        Some(name) => name,
        None => prompt_username()?,
    };
    let password = match std::env::var("PNEUMOCARE_PASSWORD") {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    if username.is_empty() || password.is_empty() {
        bail!("Username and password required");
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        bail!("Username is too long");
    }

    let outcome = if register {
        manager.register(&username, &password).await
    } else {
        manager.login(&username, &password).await
    };
    let claims = match outcome {
        Ok(claims) => claims,
        Err(e) => bail!(e.user_message()),
    };

    if let Err(e) = Config::remember_username(&username) {
        warn!(error = %e, "Failed to save config");
    }

    println!("Logged in as {}", claims.display_name());
    Ok(())
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}

fn status(state: &SessionState, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "state": state.label(),
            "claims": state.claims(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match state.claims() {
        Some(claims) => {
            println!("Logged in as {}", claims.display_name());
            if claims.is_expired() {
                println!("Access token expired at {}", claims.expires_at);
            } else {
                println!(
                    "Access token expires in {} min ({})",
                    claims.minutes_until_expiry(),
                    claims.expires_at
                );
            }
        }
        None => println!("Not logged in"),
    }
    Ok(())
}

async fn predict(manager: &SessionManager, api: &ApiClient, image: &Path) -> Result<()> {
    enter(Route::Predict, manager)?;

    let bytes = std::fs::read(image)
        .with_context(|| format!("Failed to read image {}", image.display()))?;
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let authorizer = RequestAuthorizer::new(manager.subscribe());
    match api.predict(&authorizer, &file_name, bytes).await {
        Ok(prediction) => {
            println!("Prediction: {}", prediction.prediction);
            println!("Confidence: {}", prediction.display_confidence());
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

async fn ask(manager: &SessionManager, api: &ApiClient, query: &str) -> Result<()> {
    enter(Route::Chat, manager)?;

    let query = query.trim();
    if query.is_empty() {
        bail!("Question is empty");
    }

    let authorizer = RequestAuthorizer::new(manager.subscribe());
    match api.rag_query(&authorizer, query).await {
        Ok(answer) => {
            println!("Answer:\n{}", answer.answer);
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

async fn watch(manager: &SessionManager) -> Result<()> {
    enter(Route::Chat, manager)?;
    status(&manager.snapshot(), false)?;
    println!("Keeping session alive; press Ctrl+C to stop");

    let mut session = manager.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = session.changed() => match changed {
                Some(SessionState::Unauthenticated) | None => {
                    println!("Session ended");
                    break;
                }
                Some(state) => status(&state, false)?,
            },
        }
    }
    Ok(())
}
