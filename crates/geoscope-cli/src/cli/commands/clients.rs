use super::{config_error, exit_codes, load, open_store, registry};
use crate::cli::args::{ClientsArgs, ClientsSub};
use geoscope_core::errors::ConfigError;

pub fn cmd_clients(args: ClientsArgs) -> anyhow::Result<i32> {
    let cfg = match load(&args.cfg) {
        Ok(cfg) => cfg,
        Err(e) => return Ok(config_error(&e)),
    };

    match args.cmd {
        ClientsSub::List => {
            let store = open_store(&cfg)?;
            let known = match registry(&cfg) {
                Some(reg) => reg.known_clients(Some(&store))?,
                None => store.list_known_clients()?,
            };
            for name in known {
                println!("{}", name);
            }
            Ok(exit_codes::OK)
        }
        ClientsSub::Add { name } => {
            let Some(reg) = registry(&cfg) else {
                return Ok(config_error(&ConfigError(
                    "`clients_file` is not set in the config".into(),
                )));
            };
            if reg.add(&name)? {
                eprintln!("Added '{}' to {}", name.trim(), reg.path().display());
            } else {
                eprintln!("'{}' is already registered", name.trim());
            }
            Ok(exit_codes::OK)
        }
    }
}
