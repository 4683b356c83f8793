//! RedDot CLI - list server objects, run raw RQL, wait for async processes

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reddot::{Guid, IoDataFormat, PasswordAuthentication, ServerLogin, Session};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "reddot")]
#[command(author, version, about = "Inspect a RedDot / OpenText Management Server over RQL")]
struct Cli {
    /// Base URL of the server, e.g. http://cms.example.com/cms/
    #[arg(long, env = "REDDOT_URL")]
    url: String,

    #[arg(long, env = "REDDOT_USER")]
    user: String,

    #[arg(long, env = "REDDOT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Log RQL traffic (passwords are masked)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the server version
    Version,

    /// List all projects
    Projects,

    /// List all users
    Users,

    /// List all user groups
    Groups,

    /// List the system locales
    Locales,

    /// List the installed modules
    Modules,

    /// Show the asynchronous process queue
    Processes,

    /// Send a raw RQL query and print the reply
    Rql {
        query: String,

        /// Envelope: plain, logon-guid-only, session-key-and-logon-guid, ...
        #[arg(short, long, default_value = "logon-guid-only")]
        format: IoDataFormat,

        /// Select this project first
        #[arg(short, long)]
        project: Option<Guid>,
    },

    /// Wait until a process whose name contains NAME has run
    WaitProcess {
        name: String,

        #[arg(long, default_value = "600")]
        max_wait_secs: u64,

        #[arg(long, default_value = "1000")]
        retry_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("reddot={level},reddot_rql={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let login = ServerLogin::new(
        cli.url.clone(),
        cli.url.clone(),
        PasswordAuthentication::new(cli.user.clone(), cli.password.clone()),
    );
    let session =
        Session::login(login).with_context(|| format!("Failed to log in to '{}'", cli.url))?;

    let result = run(&session, cli.command);
    session.logout();
    result
}

fn run(session: &Session, command: Commands) -> Result<()> {
    match command {
        Commands::Version => {
            println!("{}", session.server_version()?);
        }
        Commands::Projects => list_projects(session)?,
        Commands::Users => list_users(session)?,
        Commands::Groups => {
            for group in session.groups().get()?.iter() {
                println!("{}\t{}\t{}", group.guid(), group.name()?, group.email()?);
            }
        }
        Commands::Locales => {
            for locale in session.locales().get()?.iter() {
                let standard = if locale.is_standard { "*" } else { "" };
                println!(
                    "{}\t{}\t{}{}",
                    locale.lcid, locale.abbreviation, locale.name, standard
                );
            }
        }
        Commands::Modules => {
            for module in session.modules().get()?.iter() {
                println!("{}\t{}\t{}", module.guid, module.module_type, module.name);
            }
        }
        Commands::Processes => {
            for process in session.async_processes().get()?.iter() {
                println!(
                    "{}\t{}\t{}\t{}",
                    process.guid,
                    process.status.map(|s| s.to_string()).unwrap_or_default(),
                    process.user_name,
                    process.name
                );
            }
        }
        Commands::Rql {
            query,
            format,
            project,
        } => {
            if let Some(project) = project {
                session
                    .select_project(project)
                    .with_context(|| format!("Failed to select project {project}"))?;
            }
            let reply = session
                .execute_rql(&query, format)
                .context("Query failed")?;
            println!("{reply}");
        }
        Commands::WaitProcess {
            name,
            max_wait_secs,
            retry_ms,
        } => {
            session
                .wait_for_async_process_with_retry(
                    Duration::from_secs(max_wait_secs),
                    Duration::from_millis(retry_ms),
                    |process| process.name.contains(&name),
                )
                .with_context(|| format!("Process '{name}' did not finish"))?;
            eprintln!("Process '{name}' finished");
        }
    }
    Ok(())
}

fn list_projects(session: &Session) -> Result<()> {
    let projects = session.projects().get().context("Failed to list projects")?;
    for project in projects.iter() {
        let locked = match project.locked_level()? {
            Some(level) if level > 0 => "locked",
            _ => "",
        };
        println!("{}\t{}\t{}", project.guid(), project.name()?, locked);
    }
    Ok(())
}

fn list_users(session: &Session) -> Result<()> {
    let users = session.users().get().context("Failed to list users")?;
    for user in users.iter() {
        println!(
            "{}\t{}\t{}\t{}",
            user.guid(),
            user.name()?,
            user.full_name()?,
            user.email()?
        );
    }
    Ok(())
}
