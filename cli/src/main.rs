mod render;

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use wolvadmin::supabase::ConfigError;
use wolvadmin::{AuthOutcome, ProviderError, ScopeError, SupabaseClient, SupabaseConfig, provide, use_auth};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// Provider messages are shown exactly as the provider wrote them.
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("timed out after {0}s waiting for the session")]
    Timeout(u64),
    #[error("failed to listen for ctrl-c: {0}")]
    Signal(#[from] std::io::Error),
    #[error("no password given; set WOLVADMIN_PASSWORD or pipe it on stdin")]
    MissingPassword,
    #[error("failed to read password from stdin: {0}")]
    PasswordInput(std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "wolvadmin", about = "Wolvinvest admin sign-in CLI")]
struct Cli {
    /// Persist the session here between runs.
    #[arg(long, global = true, env = "WOLVADMIN_SESSION_FILE")]
    session_file: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show who is signed in.
    Status,
    SignIn(CredentialArgs),
    SignUp(CredentialArgs),
    SignOut,
    /// Print every auth phase change until Ctrl-C.
    Watch,
}

#[derive(Args, Debug)]
struct CredentialArgs {
    #[arg(long)]
    email: String,

    /// Read from `WOLVADMIN_PASSWORD`, else the first line of stdin.
    /// The flag works too but is visible in process listings.
    #[arg(long, env = "WOLVADMIN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// How long to wait for the pushed session and its profile.
    #[arg(long, default_value_t = 10)]
    wait_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN })
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = SupabaseConfig::from_env()?;
    if let Some(path) = cli.session_file {
        config.session_file = Some(path);
    }

    let store = SupabaseClient::from_config(&config)?.into_store();
    let guard = store.mount();
    let result = provide(store, dispatch(cli.command)).await;
    guard.unmount().await;
    result
}

async fn dispatch(command: Command) -> Result<(), CliError> {
    match command {
        Command::Status => run_status().await,
        Command::SignIn(args) => run_sign_in(args).await,
        Command::SignUp(args) => run_sign_up(args).await,
        Command::SignOut => run_sign_out().await,
        Command::Watch => run_watch().await,
    }
}

async fn run_status() -> Result<(), CliError> {
    let auth = use_auth()?;
    let snapshot = auth.settled().await;
    println!("{}", render::status(&snapshot));
    Ok(())
}

async fn run_sign_in(args: CredentialArgs) -> Result<(), CliError> {
    let auth = use_auth()?;
    let password = resolve_password(args.password, std::io::stdin().lock())?;
    let outcome = auth.sign_in(&args.email, &password).await?;
    print_outcome(outcome, args.wait_secs).await
}

async fn run_sign_up(args: CredentialArgs) -> Result<(), CliError> {
    let auth = use_auth()?;
    let password = resolve_password(args.password, std::io::stdin().lock())?;
    let outcome = auth.sign_up(&args.email, &password).await?;
    print_outcome(outcome, args.wait_secs).await
}

fn resolve_password(given: Option<String>, mut input: impl BufRead) -> Result<String, CliError> {
    if let Some(password) = given.filter(|p| !p.is_empty()) {
        return Ok(password);
    }
    let mut line = String::new();
    input.read_line(&mut line).map_err(CliError::PasswordInput)?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(CliError::MissingPassword);
    }
    Ok(password.to_owned())
}

/// Wait for the store to apply the pushed session, then show the summary.
async fn print_outcome(outcome: AuthOutcome, wait_secs: u64) -> Result<(), CliError> {
    let Some(session) = outcome.session else {
        println!("{}", render::VERIFY_EMAIL);
        return Ok(());
    };

    let auth = use_auth()?;
    let expected = session.user.id;
    let snapshot = tokio::time::timeout(
        Duration::from_secs(wait_secs),
        auth.wait_for(|s| s.is_settled() && s.session.as_ref().is_some_and(|current| current.user.id == expected)),
    )
    .await
    .map_err(|_| CliError::Timeout(wait_secs))?;

    println!("{}", render::status(&snapshot));
    Ok(())
}

async fn run_sign_out() -> Result<(), CliError> {
    let auth = use_auth()?;
    auth.sign_out().await;
    println!("{}", render::SIGNED_OUT);
    Ok(())
}

async fn run_watch() -> Result<(), CliError> {
    let auth = use_auth()?;
    let mut rx = auth.subscribe();
    let mut last = None;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let snapshot = rx.borrow_and_update().clone();
        if !snapshot.loading {
            let line = render::phase_line(&snapshot);
            if last.as_ref() != Some(&line) {
                println!("{line}");
                last = Some(line);
            }
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            signal = &mut ctrl_c => {
                signal?;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
