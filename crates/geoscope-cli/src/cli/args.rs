use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "geoscope",
    version,
    about = "Audit how often AI assistants mention a business, and how they talk about it"
)]
pub struct Cli {
    /// Log filter, e.g. `info` or `geoscope_core=debug`
    #[arg(long, global = true, env = "GEOSCOPE_LOG", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample geoscope.yaml and data directory
    Init(InitArgs),
    /// Expand the clients file into a prompt bank
    Generate(GenerateArgs),
    /// Query the assistant with a client's prompts and store the summaries
    Run(RunArgs),
    /// Print stored results for a client
    Show(ShowArgs),
    /// Write a client's stored results as CSV
    Export(ExportArgs),
    /// Upsert results from a CSV export
    Import(ImportArgs),
    /// Manage the client registry
    Clients(ClientsArgs),
    Version,
}

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[arg(long, default_value = "geoscope.yaml")]
    pub config: PathBuf,

    /// Overrides `db` from the config
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Reject unknown config keys instead of warning
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Clone, Debug)]
pub struct InitArgs {
    #[arg(long, default_value = "geoscope.yaml")]
    pub config: PathBuf,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Clone, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub cfg: ConfigArgs,

    /// Clients file to expand (defaults to `clients_file`)
    #[arg(long)]
    pub clients: Option<PathBuf>,

    /// Where to write the bank (defaults to `prompt_bank`)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub cfg: ConfigArgs,

    #[arg(long)]
    pub client: String,

    /// Queries per prompt
    #[arg(long)]
    pub runs: Option<u32>,

    /// Cap on prompts for this invocation
    #[arg(long, conflicts_with = "all_prompts")]
    pub max_prompts: Option<usize>,

    /// Lift the configured prompt cap
    #[arg(long)]
    pub all_prompts: bool,

    #[arg(long)]
    pub no_progress: bool,

    /// Output format: text | json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Args, Clone, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub cfg: ConfigArgs,

    #[arg(long)]
    pub client: String,

    /// Only prompts containing this text
    #[arg(long)]
    pub search: Option<String>,

    /// Also print the stored response texts
    #[arg(long)]
    pub responses: bool,

    /// Output format: text | json
    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(Args, Clone, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub cfg: ConfigArgs,

    #[arg(long)]
    pub client: String,

    /// Output file (stdout when omitted)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct ImportArgs {
    #[command(flatten)]
    pub cfg: ConfigArgs,

    #[arg(long)]
    pub input: PathBuf,
}

#[derive(Args, Clone, Debug)]
pub struct ClientsArgs {
    #[command(flatten)]
    pub cfg: ConfigArgs,

    #[command(subcommand)]
    pub cmd: ClientsSub,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ClientsSub {
    /// Registered clients plus every client with stored results
    List,
    /// Register a client name (no-op when already present)
    Add { name: String },
}
