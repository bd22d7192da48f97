use super::{config_error, exit_codes, load};
use crate::cli::args::GenerateArgs;
use anyhow::Context;
use geoscope_core::bank::{generate_prompts, read_client_profiles, write_generated};
use geoscope_core::errors::ConfigError;
use std::path::PathBuf;

pub fn cmd_generate(args: GenerateArgs) -> anyhow::Result<i32> {
    // The config is only needed for whatever the flags leave open.
    let (clients, out) = match (args.clients, args.out) {
        (Some(c), Some(o)) => (c, o),
        (clients, out) => {
            let cfg = match load(&args.cfg) {
                Ok(cfg) => cfg,
                Err(e) => return Ok(config_error(&e)),
            };
            let clients = match clients.or_else(|| cfg.clients_file.clone().map(PathBuf::from)) {
                Some(c) => c,
                None => {
                    return Ok(config_error(&ConfigError(
                        "no clients file: pass --clients or set `clients_file`".into(),
                    )))
                }
            };
            (clients, out.unwrap_or_else(|| PathBuf::from(&cfg.prompt_bank)))
        }
    };

    let profiles = match read_client_profiles(&clients) {
        Ok(p) => p,
        Err(e) => return Ok(config_error(&e)),
    };
    let prompts = generate_prompts(&profiles);

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(&out)
        .with_context(|| format!("failed to create {}", out.display()))?;
    write_generated(file, &prompts)?;

    tracing::info!(
        event = "geoscope.generate.done",
        clients = profiles.len(),
        prompts = prompts.len(),
        out = %out.display()
    );
    eprintln!(
        "Generated {} prompts for {} clients into {}",
        prompts.len(),
        profiles.len(),
        out.display()
    );
    Ok(exit_codes::OK)
}
