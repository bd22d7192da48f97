use super::exit_codes;
use crate::cli::args::InitArgs;
use std::path::Path;

pub fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    let base = args
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    write_sample_config(&args.config, args.force)?;
    write_file_if_missing(&base.join("data/clients.csv"), crate::templates::CLIENTS_CSV)?;
    write_file_if_missing(
        &base.join("data/responses.jsonl"),
        crate::templates::RESPONSES_JSONL,
    )?;
    write_file_if_missing(&base.join(".gitignore"), crate::templates::GITIGNORE)?;

    eprintln!("\nNext: `geoscope generate`, then `geoscope run --client \"Acme Dental\"`");
    Ok(exit_codes::OK)
}

fn write_file_if_missing(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::write(path, content)?;
        eprintln!("created {}", path.display());
    } else {
        eprintln!("note: {} already exists (skipped)", path.display());
    }
    Ok(())
}

fn write_sample_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        eprintln!("note: {} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    geoscope_core::config::write_sample_config(path)?;
    eprintln!("created {}", path.display());
    Ok(())
}
