use super::{config_error, exit_codes, load, open_store};
use crate::cli::args::RunArgs;
use geoscope_core::bank::{load_prompt_bank, select_prompts};
use geoscope_core::config::build_scorer;
use geoscope_core::engine::{Aggregator, ProgressSink, RunPolicy};
use geoscope_core::errors::RunError;
use geoscope_core::model::RunStatus;
use geoscope_core::providers::build_adapter;
use geoscope_core::report::console;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(total: usize, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} prompts {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn on_prompt_done(&self, done: usize, total: usize, prompt_id: i64) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
        self.bar.set_message(format!("(#{} done)", prompt_id));
    }
}

pub async fn cmd_run(args: RunArgs) -> anyhow::Result<i32> {
    let mut cfg = match load(&args.cfg) {
        Ok(cfg) => cfg,
        Err(e) => return Ok(config_error(&e)),
    };

    if let Some(runs) = args.runs {
        cfg.settings.runs_per_prompt = Some(runs);
    }
    if args.all_prompts {
        cfg.settings.max_prompts = None;
    } else if let Some(max) = args.max_prompts {
        cfg.settings.max_prompts = Some(max);
    }

    let policy = RunPolicy::from_settings(&cfg.settings);
    if let Err(e) = policy.validate() {
        return Ok(config_error(&e));
    }
    let bank = match load_prompt_bank(Path::new(&cfg.prompt_bank)) {
        Ok(bank) => bank,
        Err(e) => return Ok(config_error(&e)),
    };
    let adapter = match build_adapter(&cfg.provider) {
        Ok(a) => a,
        Err(e) => return Ok(config_error(&e)),
    };
    let scorer = match build_scorer(&cfg.sentiment) {
        Ok(s) => s,
        Err(e) => return Ok(config_error(&e)),
    };
    let store = open_store(&cfg)?;

    let json = args.format == "json";
    let planned = select_prompts(&bank, &args.client, policy.max_prompts).len();
    let progress = Arc::new(BarProgress::new(planned, json || args.no_progress));

    if let Some(cap) = policy.max_prompts {
        eprintln!(
            "Restricted-quota mode: at most {} prompts (use --all-prompts for a full audit)",
            cap
        );
    }

    let aggregator =
        Aggregator::new(store, adapter, scorer, policy).with_progress(progress.clone());
    let result = aggregator.run_client(&bank, &args.client).await;
    progress.bar.finish_and_clear();

    match result {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            match &report.status {
                RunStatus::Completed => {
                    if !json {
                        let rows: Vec<_> = report.summaries.iter().collect();
                        console::print_summary(&report.client_name, &rows);
                        eprintln!("\nSaved {} summaries to {}", report.summaries.len(), cfg.db);
                    }
                }
                RunStatus::NoPrompts { suggestion } => {
                    eprintln!("No prompts found for '{}' in the prompt bank.", report.client_name);
                    if let Some(s) = suggestion {
                        eprintln!("Did you mean '{}'?", s);
                    }
                    eprintln!("Add the client to the clients file and run `geoscope generate`.");
                }
            }
            Ok(exit_codes::OK)
        }
        Err(RunError::Config(e)) => Ok(config_error(&e)),
        Err(e @ RunError::RateLimited { .. }) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&rate_limit_report(&args.client, &e))?);
            }
            eprintln!("❌ {}", e);
            eprintln!("Partial results were saved. Wait for the quota to reset and run again.");
            Ok(exit_codes::RUN_FAILED)
        }
        Err(RunError::Store(e)) => {
            eprintln!("❌ failed to store results: {:#}", e);
            Ok(exit_codes::RUN_FAILED)
        }
    }
}

/// JSON counterpart of a rate-limited run, so `--format json` always prints one object.
fn rate_limit_report(client: &str, e: &RunError) -> serde_json::Value {
    match e {
        RunError::RateLimited {
            prompt_id,
            persisted,
            selected,
            message,
        } => serde_json::json!({
            "client_name": client.trim(),
            "selected": selected,
            "status": "rate_limited",
            "prompt_id": prompt_id,
            "persisted": persisted,
            "message": message,
        }),
        other => serde_json::json!({ "status": "failed", "message": other.to_string() }),
    }
}
