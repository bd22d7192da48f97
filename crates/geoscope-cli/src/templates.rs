pub const GITIGNORE: &str = "data/geo_results.db\ndata/geo_results.db-journal\n";

pub const CLIENTS_CSV: &str = "client_name,city,services_offered,demographic_focus,has_payment_plans
Acme Dental,Austin,braces,families,yes
";

/// Recorded answers for the first five prompts `geoscope generate` derives
/// from CLIENTS_CSV.
pub const RESPONSES_JSONL: &str = r#"{"schema_version": 1, "prompt": "Who is the best braces provider in Austin?", "response": "Popular choices include Acme Dental, known for excellent, friendly care, and Lone Star Ortho."}
{"schema_version": 1, "prompt": "Where can I find braces for families in Austin?", "response": "Several Austin clinics treat whole families. Lone Star Ortho offers flexible hours."}
{"schema_version": 1, "prompt": "Affordable braces in Austin for someone with payment plans.", "response": "Acme Dental offers monthly payment plans and is highly recommended."}
{"schema_version": 1, "prompt": "Looking for braces options in Austin that are with payment plans.", "response": "Most orthodontists offer financing; ask about interest-free plans."}
{"schema_version": 1, "prompt": "What are the top-rated braces options in Austin?", "response": "Top-rated options are Lone Star Ortho and Acme Dental."}
"#;
