use aspire_dashboard::app::{AppContext, View};
use aspire_dashboard::auth::{AllowListVerifier, CredentialCheck, Credentials};
use aspire_dashboard::config::DashboardConfig;
use aspire_dashboard::mirror;
use aspire_dashboard::session::{Access, AutoConfirm, Confirm, Route, SessionStore};
use aspire_dashboard::types::Role;
use aspire_dashboard::whitelist::AllowList;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "aspire", about = "ASPIRE TRADE dashboard client")]
struct Cli {
    /// Load config from a specific .env file
    #[arg(long, global = true)]
    config_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check credentials and store the session
    Login {
        /// Pocket Option ID (or demo account ID)
        #[arg(long)]
        id: String,
        /// Password, required by the demo credential map
        #[arg(long)]
        secret: Option<String>,
        /// Account type being claimed
        #[arg(long, default_value = "user")]
        role: Role,
    },
    /// Clear the stored session
    Logout {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the stored session and its landing page
    Whoami,
    /// Poll and render a dashboard until Ctrl+C
    Watch {
        /// Dashboard to open (defaults to the one for the session's role)
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
        /// Render one tick and exit
        #[arg(long)]
        once: bool,
    },
    /// Allow-list administration (admin session required)
    Users {
        #[command(subcommand)]
        action: UsersCommand,
    },
    /// Mirror the bot's latest_full.json into the static dashboard files
    Mirror {
        /// Output directory for system_status.json, last_signal.json, last_result.json
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum UsersCommand {
    /// Print the current allow-list
    List,
    /// Show allow-list counters
    Stats,
    /// Add a user and export the edited list
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "user")]
        role: Role,
        #[arg(long)]
        telegram_id: Option<i64>,
        /// Export path (defaults to EXPORT_PATH)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Remove a user and export the edited list
    Remove {
        #[arg(long)]
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export the list unchanged
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Trader,
    Admin,
}

impl From<ViewArg> for View {
    fn from(v: ViewArg) -> Self {
        match v {
            ViewArg::Trader => View::Trader,
            ViewArg::Admin => View::Admin,
        }
    }
}

/// Reads y/n from the terminal.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> bool {
        print!("{question} [y/N] ");
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = DashboardConfig::from_env_file(cli.config_file.as_deref())?;
    let sessions = SessionStore::open(&cfg.session_db)?;

    match cli.command {
        Command::Login { id, secret, role } => login(cfg, &sessions, &id, secret.as_deref(), role).await,
        Command::Logout { yes } => {
            let confirm: Box<dyn Confirm> = if yes { Box::new(AutoConfirm(true)) } else { Box::new(StdinConfirm) };
            match sessions.logout(confirm.as_ref())? {
                Some(route) => println!("Logged out -> {route}"),
                None => println!("Still logged in"),
            }
            Ok(())
        }
        Command::Whoami => {
            match sessions.current()? {
                Some(s) => println!(
                    "{} ({}) role={} -> {}",
                    s.pocket_id,
                    if s.name.is_empty() { "-" } else { s.name.as_str() },
                    s.role,
                    Route::for_role(s.role)
                ),
                None => println!("Not logged in -> {}", Route::Login),
            }
            Ok(())
        }
        Command::Watch { view, once } => watch(cfg, &sessions, view.map(View::from), once).await,
        Command::Users { action } => users(cfg, &sessions, action).await,
        Command::Mirror { out } => {
            let ctx = AppContext::create(cfg)?;
            mirror::run(ctx.fetcher(), &ctx.config().bot_api_url, &out).await?;
            Ok(())
        }
    }
}

async fn login(
    cfg: DashboardConfig,
    sessions: &SessionStore,
    id: &str,
    secret: Option<&str>,
    role: Role,
) -> Result<()> {
    let ctx = AppContext::create(cfg)?;
    let check = CredentialCheck::from_config(ctx.config(), ctx.fetcher());

    match check.check(&Credentials::new(id, secret, role)).await {
        Ok(identity) => {
            let route = sessions.login(&identity)?;
            println!("Welcome, {} -> {route}", identity.name);
            Ok(())
        }
        Err(e) => {
            // Only the message reaches the user; no session is written.
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}

async fn watch(
    cfg: DashboardConfig,
    sessions: &SessionStore,
    requested: Option<View>,
    once: bool,
) -> Result<()> {
    let view = match requested {
        Some(v) => v,
        None => match View::for_route(sessions.entry_route()?) {
            Some(v) => v,
            None => {
                println!("Not logged in -> {}", Route::Login);
                return Ok(());
            }
        },
    };

    let session = match sessions.require_session(Some(view.required_role()))? {
        Access::Granted(s) => s,
        Access::Redirect(route) => {
            println!("Access denied -> {route}");
            return Ok(());
        }
    };

    let refresh = cfg.poll_interval();
    let settle = cfg.fetch_timeout() + Duration::from_secs(1);
    let mut ctx = AppContext::create(cfg)?;
    if let Err(route) = ctx.start(view, &session).await {
        println!("Access denied -> {route}");
        return Ok(());
    }

    if once {
        wait_for_sections(&ctx, view, settle).await;
        println!("{}", ctx.page().render_text().await);
        ctx.dispose().await;
        return Ok(());
    }

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("STOP SIGNAL (Ctrl+C)");
        shutdown_tx.send(true).ok();
    });

    wait_for_sections(&ctx, view, settle).await;
    loop {
        println!("═══════ {} dashboard | {} ═══════", view, chrono::Local::now().format("%H:%M:%S"));
        println!("{}", ctx.page().render_text().await);

        tokio::select! {
            _ = tokio::time::sleep(refresh) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    ctx.dispose().await;
    Ok(())
}

/// Give the first tick a chance to paint every section before printing.
async fn wait_for_sections(ctx: &AppContext, view: View, limit: Duration) {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if ctx.page().snapshot().await.len() >= view.sections().len() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    warn!("Some sections did not render within {}s", limit.as_secs());
}

async fn users(cfg: DashboardConfig, sessions: &SessionStore, action: UsersCommand) -> Result<()> {
    match sessions.require_session(Some(Role::Admin))? {
        Access::Granted(_) => {}
        Access::Redirect(route) => bail!("Admin session required -> {route}"),
    }

    let export_default = PathBuf::from(&cfg.export_path);
    let ctx = AppContext::create(cfg)?;
    let verifier = AllowListVerifier::remote(ctx.fetcher().clone(), &ctx.config().users_url());
    let mut list: AllowList = verifier
        .load()
        .await
        .context("Load the served allow-list before editing it")?;

    match action {
        UsersCommand::List => {
            for e in list.iter() {
                println!(
                    "{:<12} {:<20} {:<6} {:<8} {}",
                    e.id,
                    e.name,
                    e.role,
                    e.status,
                    e.registered_at.as_deref().unwrap_or("-")
                );
            }
        }
        UsersCommand::Stats => {
            let s = list.stats();
            println!(
                "Users: {} total | {} admin(s) | {} active | {} regular",
                s.total_users, s.admins, s.active_users, s.users
            );
        }
        UsersCommand::Add { id, name, role, telegram_id, out } => {
            if let Err(e) = list.add(&id, &name, role, telegram_id) {
                error!("{e}");
                bail!("{e}");
            }
            list.export(out.unwrap_or(export_default))?;
        }
        UsersCommand::Remove { id, out } => {
            if let Err(e) = list.remove(&id) {
                error!("{e}");
                bail!("{e}");
            }
            list.export(out.unwrap_or(export_default))?;
        }
        UsersCommand::Export { out } => {
            list.export(out.unwrap_or(export_default))?;
        }
    }
    Ok(())
}
