//! `sipra`: terminal console for SIPRA field operations.
//!
//! # Usage
//!
//! ```
//! sipra --url https://xyz.supabase.co --anon-key eyJ...
//! sipra --config ~/.config/sipra/sipra.toml
//! sipra --local sipra.db
//! sipra --local sipra.db --add-user ana@example.com --role operador --area-role operador
//! ```
//!
//! Settings come from the config file, then `SIPRA_*` environment
//! variables, then flags, each overriding the one before.

mod app;
mod form;
mod kinds;
mod ui;

use std::{
  fs::OpenOptions,
  io,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::Duration,
};

use anyhow::{Context, Result, bail};
use app::App;
use clap::Parser;
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use serde_json::json;
use sipra_console::{ContextConfig, Route};
use sipra_core::{
  area::{AREA_COLUMNS, AREAS_TABLE, Area, DEFAULT_AREA_CODE},
  auth::AuthService,
  data::{DataService, fetch_maybe_single, to_row},
  query::Select,
};
use sipra_store_sqlite::SqliteBackend;
use sipra_supabase::{SupabaseClient, SupabaseConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sipra", version, about = "Terminal console for SIPRA field operations")]
struct Args {
  /// Path to a TOML config file. Missing files are ignored.
  #[arg(short, long, value_name = "FILE", env = "SIPRA_CONFIG", default_value = "sipra.toml")]
  config: PathBuf,

  /// Base URL of the Supabase project.
  #[arg(long)]
  url: Option<String>,

  /// Public anon key of the Supabase project.
  #[arg(long)]
  anon_key: Option<String>,

  /// Code of the area the console works in.
  #[arg(long)]
  area_code: Option<String>,

  /// Where the remote session is kept between runs.
  #[arg(long, value_name = "FILE")]
  session_file: Option<PathBuf>,

  /// Request timeout in seconds.
  #[arg(long)]
  timeout_secs: Option<u64>,

  /// Log file. The terminal belongs to the UI, so logs never go there.
  #[arg(long, value_name = "FILE")]
  log_file: Option<PathBuf>,

  /// Use a local SQLite database instead of the remote service.
  #[arg(long, value_name = "DB")]
  local: Option<PathBuf>,

  /// Screen to open, e.g. `/events`.
  #[arg(long, default_value = "/")]
  open: String,

  /// Create a user in the local database (password read from stdin) and exit.
  #[arg(long, value_name = "EMAIL", requires = "local")]
  add_user: Option<String>,

  /// Profile role for `--add-user`.
  #[arg(long, requires = "add_user")]
  role: Option<String>,

  /// Role in the configured area for `--add-user`. Creates the area if needed.
  #[arg(long, requires = "add_user")]
  area_role: Option<String>,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Settings read from the config file and the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
  url:          Option<String>,
  anon_key:     Option<String>,
  area_code:    Option<String>,
  session_file: Option<PathBuf>,
  timeout_secs: Option<u64>,
  log_file:     Option<PathBuf>,
  local:        Option<PathBuf>,
}

impl Settings {
  fn load(path: &Path) -> Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("SIPRA"))
      .build()
      .context("failed to read config")?
      .try_deserialize()
      .context("failed to deserialise config")
  }

  /// Flags win over everything read from file or environment.
  fn merge(self, args: &Args) -> Self {
    Self {
      url:          args.url.clone().or(self.url),
      anon_key:     args.anon_key.clone().or(self.anon_key),
      area_code:    args.area_code.clone().or(self.area_code),
      session_file: args.session_file.clone().or(self.session_file),
      timeout_secs: args.timeout_secs.or(self.timeout_secs),
      log_file:     args.log_file.clone().or(self.log_file),
      local:        args.local.clone().or(self.local),
    }
  }
}

fn config_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config").join("sipra"))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let settings = Settings::load(&expand_tilde(&args.config))?.merge(&args);

  init_tracing(&settings)?;

  let area_code = settings
    .area_code
    .clone()
    .unwrap_or_else(|| DEFAULT_AREA_CODE.to_owned());

  if let Some(email) = &args.add_user {
    let Some(db) = &settings.local else {
      bail!("--add-user needs --local");
    };
    let backend = SqliteBackend::open(expand_tilde(db))
      .await
      .with_context(|| format!("failed to open {}", db.display()))?;
    return add_user(&backend, email, &args, &area_code).await;
  }

  let config = ContextConfig { area_code };
  let start = Route::from_path(&args.open);

  if let Some(db) = &settings.local {
    let path = expand_tilde(db);
    let backend = SqliteBackend::open(&path)
      .await
      .with_context(|| format!("failed to open {}", path.display()))?;
    tracing::info!(db = %path.display(), "using local backend");
    return run(Arc::new(backend), config, start).await;
  }

  let (Some(url), Some(anon_key)) = (&settings.url, &settings.anon_key) else {
    bail!("set url and anon_key (flags, SIPRA_URL / SIPRA_ANON_KEY, or the config file), or use --local");
  };
  let mut remote = SupabaseConfig::new(url.as_str(), anon_key.as_str());
  if let Some(secs) = settings.timeout_secs {
    remote = remote.with_timeout(Duration::from_secs(secs));
  }
  let session_file = settings
    .session_file
    .as_deref()
    .map(expand_tilde)
    .or_else(|| config_dir().map(|dir| dir.join("session.json")));
  if let Some(path) = session_file {
    remote = remote.with_session_file(path);
  }
  let client = SupabaseClient::new(remote).context("failed to build HTTP client")?;
  tracing::info!(%url, "using remote backend");
  run(Arc::new(client), config, start).await
}

/// Log to a file, filtered by `RUST_LOG` (default `info`).
fn init_tracing(settings: &Settings) -> Result<()> {
  let path = settings
    .log_file
    .as_deref()
    .map(expand_tilde)
    .or_else(|| config_dir().map(|dir| dir.join("sipra.log")))
    .unwrap_or_else(|| PathBuf::from("sipra.log"));
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(&path)
    .with_context(|| format!("failed to open log file {}", path.display()))?;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(Mutex::new(file))
    .with_ansi(false)
    .init();
  Ok(())
}

// ─── Provisioning ─────────────────────────────────────────────────────────────

/// Read a password from stdin.
fn read_password() -> Result<String> {
  use std::io::{BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']).to_owned();
  if password.is_empty() {
    bail!("empty password");
  }
  Ok(password)
}

async fn add_user(db: &SqliteBackend, email: &str, args: &Args, area_code: &str) -> Result<()> {
  let password = read_password()?;
  let user = db.create_user(email, &password).await?;
  println!("created {email} ({})", user.id);

  if let Some(role) = &args.role {
    let profile = json!({ "id": user.id, "full_name": email, "role": role });
    db.seed("profiles", to_row(&profile)?).await?;
    println!("profile role: {role}");
  }

  if let Some(role) = &args.area_role {
    let query = Select::from(AREAS_TABLE)
      .columns(AREA_COLUMNS)
      .eq("codigo", area_code);
    let area_id = match fetch_maybe_single::<_, Area>(db, &query).await? {
      Some(area) => area.id,
      None => {
        let row = json!({ "id": uuid::Uuid::new_v4(), "nombre": area_code, "codigo": area_code });
        let row = db.seed(AREAS_TABLE, to_row(&row)?).await?;
        let id = row.get("id").and_then(|v| v.as_str()).unwrap_or_default();
        uuid::Uuid::parse_str(id).context("seeded area has no id")?
      }
    };
    let grant = json!({ "user_id": user.id, "area_id": area_id, "rol": role });
    db.seed("roles_area", to_row(&grant)?).await?;
    println!("role in {area_code}: {role}");
  }
  Ok(())
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run<B: AuthService + DataService + 'static>(
  backend: Arc<B>,
  config: ContextConfig,
  start: Route,
) -> Result<()> {
  let mut app = App::new(backend, config, start);

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  let result = run_event_loop(&mut terminal, &mut app).await;

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  app.shutdown().await;
  result
}

async fn run_event_loop<B: AuthService + DataService + 'static>(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App<B>,
) -> Result<()> {
  loop {
    app.tick().await;
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event
      && !app.handle_key(key).await?
    {
      break;
    }
  }

  Ok(())
}
