use super::{config_error, exit_codes, load, open_store, resolve_client};
use crate::cli::args::ShowArgs;
use geoscope_core::report::console;

pub fn cmd_show(args: ShowArgs) -> anyhow::Result<i32> {
    let cfg = match load(&args.cfg) {
        Ok(cfg) => cfg,
        Err(e) => return Ok(config_error(&e)),
    };
    let store = open_store(&cfg)?;
    let client = resolve_client(&cfg, &store, &args.client)?;
    let rows = store.query_by_client(&client)?;
    let shown = console::filter_rows(&rows, args.search.as_deref());

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(exit_codes::OK);
    }

    console::print_summary(&client, &shown);
    if args.responses {
        for row in &shown {
            console::print_responses(row);
        }
    }
    Ok(exit_codes::OK)
}
