use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vl",
    about = "Version Ledger: track components, releases, setups and test results",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (defaults to ./vl.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Repository owner, overriding the configuration
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Repository name, overriding the configuration
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// Ledger file path inside the repository
    #[arg(long, global = true)]
    pub path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty ledger file if none exists
    Init,
    /// Load the ledger and print a summary
    Fetch,
    /// Show the account the access token belongs to
    Whoami,
    /// Register a component
    AddComponent(AddComponentArgs),
    /// Register a setup made of existing components
    AddSetup(AddSetupArgs),
    /// Record a released version of a component
    AddVersion(AddVersionArgs),
    /// Record a test result against a setup
    AddTest(AddTestArgs),
    /// Show the latest version of each component
    Latest(LatestArgs),
    /// List the components of a setup
    SetupComponents(SetupArgs),
    /// List the test results recorded for a setup
    SetupTests(SetupArgs),
    /// Show release history, or the known tags of specific components
    Versions(VersionsArgs),
    /// List test results matching a filter
    Tests(TestsArgs),
}

#[derive(Args)]
pub struct AddComponentArgs {
    pub id: String,
    pub name: String,
}

#[derive(Args)]
pub struct AddSetupArgs {
    pub id: String,
    pub name: String,
    /// Component ids, in any order
    #[arg(required = true)]
    pub components: Vec<String>,
}

#[derive(Args)]
pub struct AddVersionArgs {
    pub component: String,
    pub tag: String,
}

#[derive(Args)]
pub struct AddTestArgs {
    pub setup: String,
    pub status: String,
    /// Component version under test, as `component=tag`
    #[arg(short = 'p', long = "pin", value_parser = parse_pin)]
    pub versions: Vec<(String, String)>,
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct LatestArgs {
    /// Restrict to one setup's components
    #[arg(long)]
    pub setup: Option<String>,
}

#[derive(Args)]
pub struct SetupArgs {
    pub setup: String,
}

#[derive(Args)]
pub struct VersionsArgs {
    pub components: Vec<String>,
}

#[derive(Args)]
pub struct TestsArgs {
    #[arg(long)]
    pub setup: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub component: Option<String>,
    #[arg(long)]
    pub newest_first: bool,
}

fn parse_pin(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((component, tag)) if !component.is_empty() && !tag.is_empty() => {
            Ok((component.to_string(), tag.to_string()))
        }
        _ => Err(format!("expected component=tag, got {raw:?}")),
    }
}
