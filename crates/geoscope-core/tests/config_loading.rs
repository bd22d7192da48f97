use geoscope_core::config::{build_scorer, load_config};
use geoscope_core::engine::RunPolicy;
use geoscope_core::model::{ProviderKind, SentimentKind};
use geoscope_core::providers::build_adapter;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn relative_paths_resolve_against_the_config_directory() -> anyhow::Result<()> {
    let dir = tempdir()?;
    std::fs::create_dir_all(dir.path().join("data"))?;
    std::fs::write(
        dir.path().join("data/responses.jsonl"),
        r#"{"prompt": "best dentist", "response": "Acme Dental"}"#,
    )?;
    let cfg_path = dir.path().join("geoscope.yaml");
    std::fs::write(
        &cfg_path,
        r#"
configVersion: 1
prompt_bank: data/bank.csv
db: ":memory:"
provider:
  kind: replay
  path: data/responses.jsonl
settings:
  runs_per_prompt: 3
  timeout_seconds: 5
  retry:
    delay_ms: 10
sentiment:
  kind: neutral
x-notes: ignored on purpose
"#,
    )?;

    let cfg = load_config(&cfg_path, true)?;
    assert_eq!(cfg.db, ":memory:");
    assert_eq!(
        cfg.prompt_bank,
        dir.path().join("data/bank.csv").to_string_lossy()
    );
    assert_eq!(cfg.provider.kind, ProviderKind::Replay);
    assert_eq!(cfg.sentiment.kind, SentimentKind::Neutral);

    let policy = RunPolicy::from_settings(&cfg.settings);
    assert_eq!(policy.runs_per_prompt, 3);
    assert_eq!(policy.max_retries, 2);
    assert_eq!(policy.retry_delay, Duration::from_millis(10));
    assert_eq!(policy.timeout, Duration::from_secs(5));

    let adapter = build_adapter(&cfg.provider)?;
    assert_eq!(adapter.provider_name(), "replay");
    assert_eq!(adapter.generate("best dentist").await?, "Acme Dental");

    let scorer = build_scorer(&cfg.sentiment)?;
    assert_eq!(scorer.name(), "neutral");
    Ok(())
}

#[test]
fn missing_replay_file_is_a_config_error() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let cfg_path = dir.path().join("geoscope.yaml");
    std::fs::write(
        &cfg_path,
        "version: 1\nprompt_bank: bank.csv\nprovider:\n  kind: replay\n  path: nope.jsonl\n",
    )?;
    let cfg = load_config(&cfg_path, false)?;
    let err = build_adapter(&cfg.provider).err().unwrap();
    assert!(err.to_string().contains("nope.jsonl"));
    Ok(())
}

#[test]
fn invalid_yaml_is_reported() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let cfg_path = dir.path().join("geoscope.yaml");
    std::fs::write(&cfg_path, "version: [1\n")?;
    let err = load_config(&cfg_path, false).unwrap_err();
    assert!(err.to_string().contains("failed to parse YAML"));
    Ok(())
}
