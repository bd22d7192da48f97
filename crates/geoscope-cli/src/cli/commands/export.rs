use super::{config_error, exit_codes, load, open_store, resolve_client};
use crate::cli::args::{ExportArgs, ImportArgs};
use anyhow::Context;
use geoscope_core::export::{read_summaries, write_summaries};

pub fn cmd_export(args: ExportArgs) -> anyhow::Result<i32> {
    let cfg = match load(&args.cfg) {
        Ok(cfg) => cfg,
        Err(e) => return Ok(config_error(&e)),
    };
    let store = open_store(&cfg)?;
    let client = resolve_client(&cfg, &store, &args.client)?;
    let rows = store.query_by_client(&client)?;

    match &args.out {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let n = write_summaries(file, &rows)?;
            eprintln!("Exported {} rows for '{}' to {}", n, client, path.display());
        }
        None => {
            write_summaries(std::io::stdout().lock(), &rows)?;
        }
    }
    Ok(exit_codes::OK)
}

pub fn cmd_import(args: ImportArgs) -> anyhow::Result<i32> {
    let cfg = match load(&args.cfg) {
        Ok(cfg) => cfg,
        Err(e) => return Ok(config_error(&e)),
    };
    let file = std::fs::File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let rows = read_summaries(file)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let store = open_store(&cfg)?;
    let written = store.upsert(&rows)?;
    tracing::info!(
        event = "geoscope.import.done",
        file = %args.input.display(),
        rows = rows.len(),
        written
    );
    eprintln!(
        "Imported {} of {} rows ({} kept newer stored results)",
        written,
        rows.len(),
        rows.len() - written
    );
    Ok(exit_codes::OK)
}
