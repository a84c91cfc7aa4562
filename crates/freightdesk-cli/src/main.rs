use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use freightdesk_core::diff::{diff, Record};
use freightdesk_core::format::{format_plate, title_case, truncate};
use freightdesk_core::paths::{data_dir, session_path, settings_path};
use freightdesk_core::resources::{ResourceClient, ResourceKind};
use freightdesk_core::settings::ClientSettings;
use freightdesk_core::sort::{sort_records, SortOrder};
use freightdesk_core::{FileStore, HttpAuthApi, LoginResult, Navigator, SessionManager};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "freightdesk")]
#[command(author, version, about = "Freightdesk logistics client", long_about = None)]
struct Cli {
    /// Directory holding settings.json and session.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(long)]
        identifier: Option<String>,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Show or change settings.json
    Config {
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        timeout: Option<u64>,
        /// Where to send the user after the session ends
        #[arg(long)]
        login_route: Option<String>,
    },

    /// Print the partial update between two JSON records
    Diff {
        #[arg(long)]
        original: Option<PathBuf>,
        #[arg(long)]
        edited: PathBuf,
    },

    /// List records of a resource
    List {
        kind: ResourceKind,
        /// Field to sort by
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        /// One line per record instead of JSON
        #[arg(long)]
        summary: bool,
    },

    /// Fetch one record
    Get { kind: ResourceKind, id: String },

    /// Create a record from a JSON file
    Create {
        kind: ResourceKind,
        #[arg(long)]
        file: PathBuf,
    },

    /// Send the fields of a JSON file that differ from the stored record
    Update {
        kind: ResourceKind,
        id: String,
        #[arg(long)]
        edited: PathBuf,
        /// Compare against this file instead of fetching the current record
        #[arg(long)]
        original: Option<PathBuf>,
    },

    /// Delete a record
    Delete { kind: ResourceKind, id: String },
}

struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, path: &str) {
        info!(path, "redirecting");
        eprintln!("Session ended. Run `freightdesk login` to sign in again.");
    }
}

struct App {
    settings: ClientSettings,
    session: SessionManager,
}

impl App {
    fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("create data dir {}", data_dir.display()))?;
        let settings = ClientSettings::load(&settings_path(data_dir))?;
        let store = FileStore::open(session_path(data_dir))?;
        let api = HttpAuthApi::new(&settings)?;
        let session = SessionManager::new(Arc::new(api), Arc::new(store), Arc::new(TerminalNavigator))
            .with_login_route(settings.login_route.clone());
        session.initialize();
        Ok(Self { settings, session })
    }

    fn resources(&self) -> Result<ResourceClient> {
        Ok(ResourceClient::new(&self.settings)?)
    }

    fn token(&self) -> Result<String> {
        if !self.session.is_authenticated() {
            return Err(anyhow!("not logged in"));
        }
        self.session
            .access_token()
            .ok_or_else(|| anyhow!("no access token stored; log in again"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    if let Commands::Diff { original, edited } = &cli.command {
        return diff_command(original.as_deref(), edited);
    }

    let data = match cli.data_dir {
        Some(dir) => dir,
        None => data_dir()?,
    };
    if let Commands::Config {
        api_url,
        timeout,
        login_route,
    } = &cli.command
    {
        return config_command(&data, api_url.clone(), *timeout, login_route.clone());
    }
    let app = App::open(&data)?;

    match cli.command {
        Commands::Login {
            identifier,
            password,
        } => login_command(&app, identifier, password).await,
        Commands::Logout => {
            app.session.logout();
            Ok(())
        }
        Commands::Whoami => {
            match app.session.current_user() {
                Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                None => println!("not logged in"),
            }
            Ok(())
        }
        Commands::Diff { .. } | Commands::Config { .. } => unreachable!("handled above"),
        Commands::List {
            kind,
            sort,
            desc,
            summary,
        } => {
            let token = app.token()?;
            let mut records = app
                .session
                .expire_on_unauthorized(app.resources()?.list(kind, Some(&token)).await)?;
            if let Some(key) = sort {
                let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
                sort_records(&mut records, &key, order);
            }
            if summary {
                for record in &records {
                    println!("{}", summary_line(record));
                }
                return Ok(());
            }
            print_json(&Value::Array(records))
        }
        Commands::Get { kind, id } => {
            let token = app.token()?;
            let record = app
                .session
                .expire_on_unauthorized(app.resources()?.get(kind, &id, Some(&token)).await)?;
            print_json(&record)
        }
        Commands::Create { kind, file } => {
            let token = app.token()?;
            let record = read_record(&file)?;
            let created = app
                .session
                .expire_on_unauthorized(app.resources()?.create(kind, &record, Some(&token)).await)?;
            print_json(&created)
        }
        Commands::Update {
            kind,
            id,
            edited,
            original,
        } => {
            let token = app.token()?;
            let client = app.resources()?;
            let edited = read_record(&edited)?;
            let original = match original {
                Some(path) => read_record(&path)?,
                None => {
                    let current = app
                        .session
                        .expire_on_unauthorized(client.get(kind, &id, Some(&token)).await)?;
                    into_record(current).context("stored record is not an object")?
                }
            };
            let updated = app.session.expire_on_unauthorized(
                client.update(kind, &id, &original, &edited, Some(&token)).await,
            )?;
            match updated {
                Some(record) => print_json(&record),
                None => {
                    println!("nothing to update");
                    Ok(())
                }
            }
        }
        Commands::Delete { kind, id } => {
            let token = app.token()?;
            app.session
                .expire_on_unauthorized(app.resources()?.delete(kind, &id, Some(&token)).await)?;
            println!("deleted {kind} {id}");
            Ok(())
        }
    }
}

async fn login_command(app: &App, identifier: Option<String>, password: Option<String>) -> Result<()> {
    let identifier = match identifier {
        Some(id) => id,
        None => prompt_line("Email or username: ")?,
    };
    let password = match password {
        Some(pw) => pw,
        None => rpassword::prompt_password("Password: ")?,
    };
    match app.session.login(identifier.trim(), &password).await {
        LoginResult::Success(payload) => {
            println!("logged in as {}", payload.user.display_name());
            Ok(())
        }
        LoginResult::Failure { status, message } => Err(anyhow!("{message} ({status})")),
    }
}

fn config_command(
    data_dir: &Path,
    api_url: Option<String>,
    timeout: Option<u64>,
    login_route: Option<String>,
) -> Result<()> {
    let path = settings_path(data_dir);
    let mut settings = ClientSettings::load_file(&path)?;
    let changed = api_url.is_some() || timeout.is_some() || login_route.is_some();
    if let Some(url) = api_url {
        settings.api_base_url = url.trim().to_string();
    }
    if let Some(secs) = timeout {
        settings.request_timeout_secs = secs;
    }
    if let Some(route) = login_route {
        settings.login_route = route;
    }
    if changed {
        settings.save(&path)?;
        info!(path = %path.display(), "settings saved");
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

const SUMMARY_WIDTH: usize = 72;

/// `#id  Name  PLATE  status`, skipping fields the record lacks.
fn summary_line(record: &Value) -> String {
    let text = |key: &str| record.get(key).and_then(Value::as_str).map(str::trim);
    let mut parts = Vec::new();
    match record.get("id") {
        Some(Value::String(id)) => parts.push(format!("#{id}")),
        Some(Value::Number(id)) => parts.push(format!("#{id}")),
        _ => {}
    }
    if let Some(name) = text("name").filter(|s| !s.is_empty()) {
        parts.push(title_case(name));
    }
    if let Some(plate) = text("plate").filter(|s| !s.is_empty()) {
        parts.push(format_plate(plate));
    }
    if let Some(status) = text("status").filter(|s| !s.is_empty()) {
        parts.push(status.to_string());
    }
    truncate(&parts.join("  "), SUMMARY_WIDTH)
}

fn diff_command(original: Option<&Path>, edited: &Path) -> Result<()> {
    let edited = read_record(edited)?;
    let original = original.map(read_record).transpose()?;
    print_json(&Value::Object(diff(original.as_ref(), &edited)))
}

fn read_record(path: &Path) -> Result<Record> {
    let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let value: Value =
        serde_json::from_slice(&data).with_context(|| format!("parse {}", path.display()))?;
    into_record(value).with_context(|| format!("{} is not a JSON object", path.display()))
}

fn into_record(value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(anyhow!("expected a JSON object")),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    use std::io::Write;
    eprint!("{prompt}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
