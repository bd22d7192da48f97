pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS geo_results (
  client_name TEXT NOT NULL,
  prompt_id INTEGER NOT NULL,
  prompt_text TEXT NOT NULL,
  appearances INTEGER NOT NULL,
  appearance_percent REAL NOT NULL,
  avg_position REAL,
  avg_sentiment REAL NOT NULL,
  raw_responses TEXT NOT NULL,
  timestamp TEXT NOT NULL,
  runs_requested INTEGER,
  runs_completed INTEGER
);
"#;
