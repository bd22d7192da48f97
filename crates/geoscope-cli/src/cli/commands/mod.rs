use crate::cli::args::{Cli, Command, ConfigArgs};
use anyhow::Context;
use geoscope_core::config::load_config;
use geoscope_core::errors::ConfigError;
use geoscope_core::model::GeoConfig;
use geoscope_core::registry::{canonical_name, ClientRegistry};
use geoscope_core::storage::Store;
use std::path::Path;

pub mod clients;
pub mod export;
pub mod generate;
pub mod init;
pub mod run;
pub mod show;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const RUN_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Init(args) => init::cmd_init(args),
        Command::Generate(args) => generate::cmd_generate(args),
        Command::Run(args) => run::cmd_run(args).await,
        Command::Show(args) => show::cmd_show(args),
        Command::Export(args) => export::cmd_export(args),
        Command::Import(args) => export::cmd_import(args),
        Command::Clients(args) => clients::cmd_clients(args),
        Command::Version => {
            println!("geoscope {}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

/// Loads the config and applies the `--db` override.
pub(crate) fn load(args: &ConfigArgs) -> Result<GeoConfig, ConfigError> {
    let mut cfg = load_config(&args.config, args.strict)?;
    if let Some(db) = &args.db {
        cfg.db = db.to_string_lossy().to_string();
    }
    Ok(cfg)
}

pub(crate) fn config_error(e: &ConfigError) -> i32 {
    eprintln!("config error: {}", e);
    exit_codes::CONFIG_ERROR
}

pub(crate) fn open_store(cfg: &GeoConfig) -> anyhow::Result<Store> {
    let store = if cfg.db == ":memory:" {
        Store::memory()?
    } else {
        let path = Path::new(&cfg.db);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Store::open(path)?
    };
    store.init_schema()?;
    Ok(store)
}

pub(crate) fn registry(cfg: &GeoConfig) -> Option<ClientRegistry> {
    cfg.clients_file.as_deref().map(ClientRegistry::new)
}

/// The stored spelling of `input`, or `input` trimmed when nobody knows it.
pub(crate) fn resolve_client(
    cfg: &GeoConfig,
    store: &Store,
    input: &str,
) -> anyhow::Result<String> {
    let known = match registry(cfg) {
        Some(reg) => reg.known_clients(Some(store))?,
        None => store.list_known_clients()?,
    };
    Ok(canonical_name(&known, input).unwrap_or_else(|| input.trim().to_string()))
}
