use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use vl_remote::{HttpTransport, Session, StaticSession};
use vl_store::{
    Commit, LedgerError, LedgerStore, LedgerWarning, NewComponent, NewSetup, NewTest, NewVersion,
    TestFilter, Warned,
};
use vl_types::{TestResult, Version};

use crate::cli::*;
use crate::config::{LedgerConfig, LocationOverrides};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = LedgerConfig::load(cli.config.as_deref())?;
    let store = open_store(&config, &cli)?;
    let format = cli.format;

    match cli.command {
        Command::Init => cmd_init(&store, &format).await,
        Command::Fetch => cmd_fetch(&store, &format).await,
        Command::Whoami => cmd_whoami(&store, &format).await,
        Command::AddComponent(args) => {
            store.fetch().await?;
            let commit = store.add_component(NewComponent { id: args.id, name: args.name }).await?;
            report_commit(&commit, &format)
        }
        Command::AddSetup(args) => {
            store.fetch().await?;
            let setup = NewSetup { id: args.id, name: args.name, component_ids: args.components };
            let commit = store.add_setup(setup).await?;
            report_commit(&commit, &format)
        }
        Command::AddVersion(args) => {
            store.fetch().await?;
            let version = NewVersion { component_id: args.component, tag: args.tag };
            let commit = store.add_version(version).await?;
            report_commit(&commit, &format)
        }
        Command::AddTest(args) => {
            store.fetch().await?;
            let test = NewTest {
                setup_id: args.setup,
                status: args.status,
                description: args.description,
                component_version_map: args.versions.into_iter().collect(),
            };
            let commit = store.add_test(test).await?;
            report_commit(&commit, &format)
        }
        Command::Latest(args) => {
            store.fetch().await?;
            let latest = store.latest_versions(args.setup.as_deref())?;
            print_versions(&latest, &format)
        }
        Command::SetupComponents(args) => {
            store.fetch().await?;
            let found = store.setup_components(&args.setup)?;
            if format == OutputFormat::Json {
                return print_json(&json!({
                    "components": found.value,
                    "warnings": warning_texts(&found.warnings),
                }));
            }
            for component in &found.value {
                println!("{}  {}", component.id.yellow(), component.name);
            }
            print_warnings(&found.warnings);
            Ok(())
        }
        Command::SetupTests(args) => {
            store.fetch().await?;
            let tests = store.setup_tests(&args.setup)?;
            print_tests(&tests, &format)
        }
        Command::Versions(args) => {
            store.fetch().await?;
            if args.components.is_empty() {
                return print_versions(&store.release_history()?, &format);
            }
            let catalog = store.component_versions(&args.components)?;
            if format == OutputFormat::Json {
                return print_json(&catalog);
            }
            for (component, tags) in &catalog {
                let listed = if tags.is_empty() { "(none)".dimmed().to_string() } else { tags.join(", ") };
                println!("{}  {}", component.yellow(), listed);
            }
            Ok(())
        }
        Command::Tests(args) => {
            store.fetch().await?;
            let filter = TestFilter {
                setup_id: args.setup,
                status: args.status,
                component_id: args.component,
                newest_first: args.newest_first,
            };
            print_tests(&store.tests(&filter)?, &format)
        }
    }
}

const EXIT_FAILURE: u8 = 1;
/// The remote ledger may not hold what this client last wrote or read.
const EXIT_FATAL: u8 = 2;

fn failure_code(err: &anyhow::Error) -> u8 {
    let fatal = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<LedgerError>())
        .any(LedgerError::is_fatal);
    if fatal { EXIT_FATAL } else { EXIT_FAILURE }
}

pub fn report_failure(err: &anyhow::Error) -> ExitCode {
    let code = failure_code(err);
    if code == EXIT_FATAL {
        eprintln!("{}", "!!! LEDGER INTEGRITY FAULT !!!".red().bold().reversed());
        eprintln!("{} {err:#}", "fatal:".red().bold());
        eprintln!("Re-fetch the ledger and check the latest change before writing again.");
    } else {
        eprintln!("{} {err:#}", "error:".red().bold());
    }
    ExitCode::from(code)
}

fn open_store(config: &LedgerConfig, cli: &Cli) -> anyhow::Result<LedgerStore> {
    let location = config.location(&LocationOverrides {
        owner: cli.owner.clone(),
        repo: cli.repo.clone(),
        path: cli.path.clone(),
    })?;
    let session: Arc<dyn Session> = match config.token() {
        Some(token) => Arc::new(StaticSession::with_token(token)),
        None => {
            tracing::debug!(env = %config.token_env, "no access token in environment");
            Arc::new(StaticSession::new())
        }
    };
    let transport = Arc::new(HttpTransport::new(&config.remote)?);
    Ok(LedgerStore::new(location, session, transport))
}

async fn cmd_init(store: &LedgerStore, format: &OutputFormat) -> anyhow::Result<()> {
    let created = store.initialize().await?;
    let sha = store.sha().unwrap_or_default();
    if *format == OutputFormat::Json {
        return print_json(&json!({ "created": created, "sha": sha }));
    }
    let location = store.location();
    if created {
        println!("{} Created {} in {}/{}", "✓".green().bold(), location.path.bold(), location.owner, location.name);
    } else {
        println!("Ledger {} already exists in {}/{}", location.path.bold(), location.owner, location.name);
    }
    println!("  Sha: {}", short(&sha).yellow());
    Ok(())
}

async fn cmd_fetch(store: &LedgerStore, format: &OutputFormat) -> anyhow::Result<()> {
    let document = store.fetch().await?;
    let sha = store.sha().unwrap_or_default();
    if *format == OutputFormat::Json {
        return print_json(&json!({ "sha": sha, "document": &*document }));
    }
    let location = store.location();
    println!("{} Fetched {}/{}/{} at {}", "✓".green().bold(), location.owner, location.name, location.path, short(&sha).yellow());
    println!("  Components: {}", document.components.len().to_string().bold());
    println!("  Versions:   {}", document.versions.len().to_string().bold());
    println!("  Setups:     {}", document.setups.len().to_string().bold());
    println!("  Tests:      {}", document.tests.len().to_string().bold());
    Ok(())
}

async fn cmd_whoami(store: &LedgerStore, format: &OutputFormat) -> anyhow::Result<()> {
    let user = store.current_user().await?;
    if *format == OutputFormat::Json {
        return print_json(&json!({ "login": user.login, "name": user.name }));
    }
    match &user.name {
        Some(name) => println!("{} ({})", user.login.bold(), name),
        None => println!("{}", user.login.bold()),
    }
    Ok(())
}

fn report_commit(commit: &Warned<Commit>, format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        return print_json(&json!({
            "collection": commit.value.collection.as_str(),
            "sha": commit.value.sha,
            "warnings": warning_texts(&commit.warnings),
        }));
    }
    println!("{} Updated {} ({})", "✓".green().bold(), commit.value.collection.as_str().cyan(), short(&commit.value.sha).yellow());
    print_warnings(&commit.warnings);
    Ok(())
}

fn print_versions(versions: &[Version], format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        return print_json(&versions);
    }
    if versions.is_empty() {
        println!("No versions recorded.");
    }
    for version in versions {
        println!("{}  {}  {}", version.component_id.yellow(), version.tag.bold(), timestamp(version.date).dimmed());
    }
    Ok(())
}

fn print_tests(tests: &[TestResult], format: &OutputFormat) -> anyhow::Result<()> {
    if *format == OutputFormat::Json {
        return print_json(&tests);
    }
    if tests.is_empty() {
        println!("No test results.");
    }
    for test in tests {
        let status = match test.status.to_ascii_lowercase().as_str() {
            "passed" | "pass" | "ok" | "success" => test.status.green(),
            "failed" | "fail" | "error" => test.status.red(),
            _ => test.status.normal(),
        };
        let pins: Vec<String> = test
            .component_version_map
            .iter()
            .map(|(component, tag)| format!("{component}:{tag}"))
            .collect();
        println!("{}  {}  {}  {}", timestamp(test.date).dimmed(), test.setup_id.yellow(), status.bold(), pins.join(", "));
        if let Some(description) = &test.description {
            println!("    {}", description);
        }
    }
    Ok(())
}

fn print_warnings(warnings: &[LedgerWarning]) {
    for warning in warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
}

fn warning_texts(warnings: &[LedgerWarning]) -> Vec<String> {
    warnings.iter().map(ToString::to_string).collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn timestamp(date: chrono::DateTime<chrono::Utc>) -> String {
    date.format("%d/%m/%y %H:%M:%S").to_string()
}

fn short(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}
