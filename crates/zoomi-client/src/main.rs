//! `zoomi`: command-line client for Zoomi family accounts.
//!
//! # Usage
//!
//! ```
//! zoomi --url http://localhost:8080 sign-in <token>
//! zoomi add-child Tomi
//! zoomi code <child-id>          # on the parent's device
//! zoomi link 482917              # on the child's device
//! zoomi status
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use zoomi_client::{
  ApiClient, ApiConfig, ClientError, SessionManager, SessionState,
  auth::TokenAuth,
  storage::FileStore,
};
use zoomi_core::{
  child::{Child, SubscriptionStatus},
  family::NewProfile,
};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "zoomi", about = "Command-line client for Zoomi family accounts")]
struct Args {
  /// Path to a TOML config file (url, state).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the Zoomi server (default: http://localhost:8080).
  #[arg(long, env = "ZOOMI_URL")]
  url: Option<String>,

  /// Where this device keeps its session (default: ~/.config/zoomi/state.json).
  #[arg(long, env = "ZOOMI_STATE", value_name = "FILE")]
  state: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show who is using this device.
  Status,
  /// Link this device to a child with a code from a parent.
  Link { code: String },
  /// Sign in as a parent with an auth-provider token.
  SignIn {
    token: String,
    /// Register a profile under this name if none exists yet, then finish
    /// onboarding by creating a family.
    #[arg(long, num_args = 2, value_names = ["FIRST", "LAST"])]
    register: Option<Vec<String>>,
  },
  /// Clear the session on this device.
  SignOut,
  /// List the family's children.
  Children,
  /// Add a child to the family.
  AddChild { name: String },
  /// Issue a linking code for a child.
  Code { child_id: Uuid },
  /// Release the device bound to a child.
  Unlink { child_id: Uuid },
  /// Set a child's subscription status.
  Subscription { child_id: Uuid, status: SubscriptionStatus },
  /// Delete a child.
  RemoveChild { child_id: Uuid },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:   String,
  #[serde(default)]
  state: Option<PathBuf>,
}

fn default_state_path() -> PathBuf {
  match std::env::var("HOME") {
    Ok(home) => PathBuf::from(home).join(".config/zoomi/state.json"),
    Err(_) => PathBuf::from("zoomi-state.json"),
  }
}

type Session = SessionManager<ApiClient, TokenAuth<Arc<FileStore>>, Arc<FileStore>>;

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags and env override config file, which overrides defaults.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:8080".to_string());
  let state_path = args
    .state
    .or(file_cfg.state)
    .unwrap_or_else(default_state_path);

  let store = Arc::new(
    FileStore::open(&state_path)
      .with_context(|| format!("opening session state {}", state_path.display()))?,
  );
  let client = ApiClient::new(ApiConfig { base_url })?;
  let auth = TokenAuth::new(client.clone(), store.clone());
  let mut session: Session = SessionManager::new(client, auth, store);

  if let Err(e) = run(&mut session, args.command).await {
    match e.downcast_ref::<ClientError>() {
      Some(ce) => bail!("{}", ce.user_message()),
      None => return Err(e),
    }
  }
  Ok(())
}

async fn run(session: &mut Session, command: Command) -> Result<()> {
  match command {
    Command::SignIn { token, register } => {
      let profile = match register {
        Some(names) => register_parent(session, &token, &names).await?,
        None => session.auth().sign_in(&token).await?,
      };
      println!("Signed in as {}", profile.full_name());
      return Ok(());
    }
    Command::SignOut => {
      // A failed lookup must not block signing out.
      let _ = session.resolve().await;
      session.sign_out()?;
      println!("Signed out");
      return Ok(());
    }
    _ => {}
  }

  session.resolve().await?;

  match command {
    Command::Status => {
      print_status(session)?;
      if session.parent().is_some() {
        let token = session.parent_token()?;
        let family = session.backend().my_family(&token).await?;
        println!("Family: {}", family.name.as_deref().unwrap_or("(unnamed)"));
      }
    }
    Command::Link { code } => {
      let child = session.link_child_with_code(&code).await?;
      println!("This device is now linked to {}", child.name);
    }
    Command::Children => {
      let token = session.parent_token()?;
      let children = session.backend().list_children(&token).await?;
      if children.is_empty() {
        println!("No children yet. Add one with `zoomi add-child <name>`.");
      }
      let now = Utc::now();
      for child in children {
        println!(
          "{}  {:<20} {:<9} {}",
          child.id,
          child.name,
          child.subscription_status.as_str(),
          link_label(&child, now)
        );
      }
    }
    Command::AddChild { name } => {
      let token = session.parent_token()?;
      let child = session.backend().create_child(&token, &name).await?;
      println!("Added {} ({})", child.name, child.id);
    }
    Command::Code { child_id } => {
      let code = session.generate_linking_code(child_id).await?;
      let minutes = code.remaining(Utc::now()).num_minutes();
      println!("{}", code.code);
      println!("Enter this code on the child's device within {minutes} minutes.");
    }
    Command::Unlink { child_id } => {
      let child = session.unlink_child(child_id).await?;
      println!("{} is no longer linked to a device", child.name);
    }
    Command::Subscription { child_id, status } => {
      let token = session.parent_token()?;
      let child = session
        .backend()
        .set_subscription(&token, child_id, status)
        .await?;
      println!("{}: {}", child.name, child.subscription_status.as_str());
    }
    Command::RemoveChild { child_id } => {
      let token = session.parent_token()?;
      session.backend().delete_child(&token, child_id).await?;
      println!("Removed {child_id}");
    }
    Command::SignIn { .. } | Command::SignOut => {}
  }
  Ok(())
}

/// First sign-in: create the profile under the provider's user id, then the
/// family.
async fn register_parent(
  session: &Session,
  token: &str,
  names: &[String],
) -> Result<zoomi_core::family::Profile> {
  let id = Uuid::parse_str(token.trim()).context("auth token is not a user id")?;
  let [first, last] = names else {
    bail!("--register takes a first and last name");
  };
  let client = session.backend();
  client
    .register_profile(&NewProfile {
      id,
      first_name: first.clone(),
      last_name: last.clone(),
      email: None,
    })
    .await?;
  client.create_family(token, None).await?;
  Ok(session.auth().sign_in(token).await?)
}

fn link_label(child: &Child, now: DateTime<Utc>) -> &'static str {
  match (child.is_linked(), child.has_outstanding_code(now)) {
    (true, _) => "linked",
    (false, true) => "code pending",
    (false, false) => "not linked",
  }
}

fn print_status(session: &Session) -> Result<()> {
  match session.state() {
    SessionState::ParentActive(p) => println!("Parent: {}", p.full_name()),
    SessionState::ChildActive(c) => println!(
      "Child: {} (subscription {})",
      c.name,
      c.subscription_status.as_str()
    ),
    SessionState::Unauthenticated => println!("Nobody is signed in on this device"),
    other => println!("Session unresolved: {other:?}"),
  }
  println!("Device: {}", session.device_id()?);
  Ok(())
}
