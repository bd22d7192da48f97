//! The prompt bank: reading it, selecting a client's prompts, and expanding
//! a clients table into it.

use crate::errors::ConfigError;
use crate::model::{normalize_client, PromptRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const TEMPLATES: [&str; 5] = [
    "Who is the best {service} provider in {city}?",
    "Where can I find {service} for {demographic} in {city}?",
    "Affordable {service} in {city} for someone {intent}.",
    "Looking for {service} options in {city} that are {intent}.",
    "What are the top-rated {service} options in {city}?",
];

const DEFAULT_CITY: &str = "my area";

pub fn load_prompt_bank(path: &Path) -> Result<Vec<PromptRecord>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError(format!(
            "prompt bank not found: {} (generate it with `geoscope generate`)",
            path.display()
        )));
    }
    let file = std::fs::File::open(path)
        .map_err(|e| ConfigError(format!("failed to open prompt bank {}: {}", path.display(), e)))?;
    read_prompt_bank(file)
        .map_err(|e| ConfigError(format!("failed to read prompt bank {}: {}", path.display(), e)))
}

pub fn read_prompt_bank<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<PromptRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for (i, rec) in rdr.deserialize::<PromptRecord>().enumerate() {
        let rec = rec.map_err(|e| anyhow::anyhow!("row {}: {}", i + 1, e))?;
        out.push(rec);
    }
    Ok(out)
}

/// The client's prompts in bank order, cut to `max_prompts` when set.
pub fn select_prompts(
    bank: &[PromptRecord],
    client_name: &str,
    max_prompts: Option<usize>,
) -> Vec<PromptRecord> {
    let limit = max_prompts.unwrap_or(usize::MAX);
    bank.iter()
        .filter(|r| r.belongs_to(client_name))
        .take(limit)
        .cloned()
        .collect()
}

/// Closest client name in the bank, for "did you mean" hints.
pub fn suggest_client(bank: &[PromptRecord], client_name: &str) -> Option<String> {
    let wanted = normalize_client(client_name);
    let names: BTreeSet<String> = bank.iter().map(|r| r.client_name.trim().to_string()).collect();
    names
        .into_iter()
        .map(|n| {
            let score = strsim::normalized_levenshtein(&normalize_client(&n), &wanted);
            (n, score)
        })
        .filter(|(_, score)| *score >= 0.6)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(n, _)| n)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientProfile {
    pub client_name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub services_offered: Option<String>,
    #[serde(default)]
    pub demographic_focus: Option<String>,
    #[serde(default)]
    pub has_payment_plans: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPrompt {
    pub prompt_id: i64,
    pub prompt_text: String,
    pub client_name: String,
    pub city: String,
    pub service: String,
    pub demographic: String,
    pub intent: String,
}

fn split_list(cell: Option<&str>) -> Vec<String> {
    cell.unwrap_or_default()
        .split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expands each profile over services × demographics × intents × templates.
/// Ids are sequential across all clients, starting at 1.
pub fn generate_prompts(profiles: &[ClientProfile]) -> Vec<GeneratedPrompt> {
    let mut out = Vec::new();
    let mut next_id = 1i64;

    for p in profiles {
        let client = p.client_name.trim().to_string();
        if client.is_empty() {
            continue;
        }
        let city = p
            .city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CITY)
            .to_string();
        let services = split_list(p.services_offered.as_deref());
        let mut demographics = split_list(p.demographic_focus.as_deref());
        if demographics.is_empty() {
            demographics.push(String::new());
        }
        let has_payment = p
            .has_payment_plans
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("yes"));
        let mut intents = vec![if has_payment {
            "with payment plans"
        } else {
            "without insurance"
        }];
        intents.extend(["affordable", "available this month"]);

        for service in &services {
            for demographic in &demographics {
                for intent in &intents {
                    for template in TEMPLATES {
                        let text = template
                            .replace("{service}", service)
                            .replace("{city}", &city)
                            .replace("{demographic}", demographic)
                            .replace("{intent}", intent)
                            .replace("  ", " ")
                            .trim()
                            .to_string();
                        out.push(GeneratedPrompt {
                            prompt_id: next_id,
                            prompt_text: text,
                            client_name: client.clone(),
                            city: city.clone(),
                            service: service.clone(),
                            demographic: demographic.clone(),
                            intent: intent.to_string(),
                        });
                        next_id += 1;
                    }
                }
            }
        }
    }
    out
}

pub fn read_client_profiles(path: &Path) -> Result<Vec<ClientProfile>, ConfigError> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|e| ConfigError(format!("failed to open clients file {}: {}", path.display(), e)))?;
    rdr.deserialize::<ClientProfile>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError(format!("failed to read clients file {}: {}", path.display(), e)))
}

pub fn write_generated<W: std::io::Write>(
    writer: W,
    prompts: &[GeneratedPrompt],
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for p in prompts {
        wtr.serialize(p)?;
    }
    wtr.flush()?;
    Ok(())
}
