//! Subcommand handlers.
//!
//! Every user-scoped command goes through [`resolve_session`]: restore the
//! stored session (renewing it if it expired), or walk the user through
//! linking when nothing usable is stored.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use hhlink_core::auth::CredentialStore;
use hhlink_core::link::{self, LinkError};
use hhlink_core::{web, AppConfig, AppCredential, JsonFileStore, UserSession};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;

use crate::cli::{Cli, Command, SecretAction};

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load()?;
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }

    // These run without a client secret, so they come before validation.
    match &cli.command {
        Command::Init => {
            config.save()?;
            println!("Settings saved; store the secret with `hhlink secret set`");
            return Ok(());
        }
        Command::Secret { action } => return handle_secret(&config, *action),
        _ => {}
    }

    config.validate()?;
    let store = JsonFileStore::new(config.store_path()?);
    let app_token = config.app_token.clone();
    let app = AppCredential::initialize(config, app_token)
        .await
        .context("Failed to obtain application token")?;

    match cli.command {
        Command::AppInfo => print_json(&app.fetch_app_info().await?)?,
        Command::AuthUrl { state } => println!("{}", app.build_authorization_url(state.as_deref())),
        Command::Link { user, code } => {
            let session = link_interactive(&app, &store, &user.email, code).await?;
            print_json(&session.fetch_profile().await?)?;
        }
        Command::Me { user } => {
            let session = resolve_session(&app, &store, &user.email).await?;
            print_json(&session.fetch_profile().await?)?;
        }
        Command::Resumes { user } => {
            let session = resolve_session(&app, &store, &user.email).await?;
            print_json(&session.fetch_resumes().await?)?;
        }
        Command::Similar {
            user,
            resume,
            params,
        } => {
            let session = resolve_session(&app, &store, &user.email).await?;
            let resume_id = match resume {
                Some(id) => id,
                None => first_resume_id(&session).await?,
            };
            print_json(&session.search_similar_vacancies(&resume_id, &params).await?)?;
        }
        Command::Apply {
            user,
            resume,
            vacancy,
            message,
        } => {
            let session = resolve_session(&app, &store, &user.email).await?;
            session
                .apply_to_vacancy(&resume, &vacancy, &message)
                .await?
                .into_result()
                .with_context(|| format!("Application to vacancy {} was refused", vacancy))?;
            println!("Applied to vacancy {}", vacancy);
        }
        Command::Negotiations { user, params } => {
            let session = resolve_session(&app, &store, &user.email).await?;
            print_json(&session.fetch_negotiations(&params).await?)?;
        }
        Command::Messages {
            user,
            negotiation,
            text_only,
        } => {
            let session = resolve_session(&app, &store, &user.email).await?;
            print_json(
                &session
                    .fetch_negotiation_messages(&negotiation, text_only)
                    .await?,
            )?;
        }
        Command::Logout { user } => {
            let session = link::restore_session(&app, &store, &user.email).await?;
            link::unlink(session, &store, &user.email).await?;
            println!("Logged out {}", user.email);
        }
        Command::Serve { bind, .. } => serve(app, store, bind).await?,
        Command::Init | Command::Secret { .. } => {
            unreachable!("handled before the application token is fetched")
        }
    }

    Ok(())
}

/// Restore the stored session for `email`, linking a new one if none is usable.
async fn resolve_session<'a>(
    app: &'a AppCredential,
    store: &JsonFileStore,
    email: &str,
) -> Result<UserSession<'a>> {
    match link::restore_session(app, store, email).await {
        Ok(session) => Ok(session),
        Err(e) if e.needs_authorization() => {
            eprintln!("{}", e);
            link_interactive(app, store, email, None).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn link_interactive<'a>(
    app: &'a AppCredential,
    store: &JsonFileStore,
    email: &str,
    code: Option<String>,
) -> Result<UserSession<'a>> {
    let code = match code {
        Some(code) => code,
        None => prompt_code(&app.build_authorization_url(Some(email)))?,
    };

    link::link_with_code(app, store, email, code.trim())
        .await
        .map_err(|e| {
            let rejected = matches!(&e, LinkError::Api(api) if api.is_auth());
            let err = anyhow::Error::new(e);
            if rejected {
                err.context("The authorization code was rejected; request a new one")
            } else {
                err
            }
        })
}

fn prompt_code(url: &str) -> Result<String> {
    eprintln!("Open this URL, allow access, then paste the `code` parameter of the page you land on:");
    eprintln!("  {}", url);
    eprint!("Code: ");
    io::stderr().flush()?;

    let mut code = String::new();
    io::stdin().read_line(&mut code)?;
    let code = code.trim().to_string();
    if code.is_empty() {
        bail!("No authorization code entered");
    }
    Ok(code)
}

async fn first_resume_id(session: &UserSession<'_>) -> Result<String> {
    let resumes = session.fetch_resumes().await?;
    resumes["items"][0]["id"]
        .as_str()
        .map(str::to_string)
        .context("The account has no resumes")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_secret(config: &AppConfig, action: SecretAction) -> Result<()> {
    if config.client_id.is_empty() {
        bail!("client_id is not configured (set HH_CLIENT_ID)");
    }
    match action {
        SecretAction::Set => {
            let secret = rpassword::prompt_password("Client secret: ")?;
            if secret.trim().is_empty() {
                bail!("Client secret must not be empty");
            }
            CredentialStore::store_client_secret(&config.client_id, secret.trim())?;
            println!("Client secret stored for {}", config.client_id);
        }
        SecretAction::Delete => {
            CredentialStore::delete_client_secret(&config.client_id)?;
            println!("Client secret removed for {}", config.client_id);
        }
        SecretAction::Status => {
            if CredentialStore::has_client_secret(&config.client_id) {
                println!("Client secret stored for {}", config.client_id);
            } else {
                println!("No client secret stored for {}", config.client_id);
            }
        }
    }
    Ok(())
}

async fn serve(app: AppCredential, store: JsonFileStore, bind: SocketAddr) -> Result<()> {
    info!(store = %store.path().display(), "Using user store");
    let router = web::callback_routes(Arc::new(app), Arc::new(store));
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    info!(%bind, "Callback server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("Callback server stopped");
    Ok(())
}
