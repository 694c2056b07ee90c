use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

use memoria_core::QuestId;

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse completed quest ids given either as a JSON array or comma-separated.
pub fn parse_completed(text: &str) -> Result<HashSet<QuestId>> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        let ids: Vec<QuestId> =
            serde_json::from_str(trimmed).context("completed ids are not a JSON array of numbers")?;
        return Ok(ids.into_iter().collect());
    }
    split_csv(&trimmed.replace(['\n', '\r'], ","))
        .iter()
        .map(|token| {
            token
                .parse::<QuestId>()
                .with_context(|| format!("invalid quest id `{token}`"))
        })
        .collect()
}

pub fn load_completed(path: &Path) -> Result<HashSet<QuestId>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read completed ids from {}", path.display()))?;
    parse_completed(&text)
}
