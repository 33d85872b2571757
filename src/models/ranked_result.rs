//! Presentation-ready matches derived from raw service output

use serde::Serialize;

use super::search_match::{Episode, RawMatch};
use crate::config::defaults::{MAX_RANKED_RESULTS, MIN_RANKED_SIMILARITY};
use crate::utils::human_format::{format_time_range, similarity_percent};

/// A raw match that passed the similarity floor, with display fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    /// 1-based position after sorting
    pub rank: usize,
    /// Similarity as a percentage with one decimal (e.g. `95.0`)
    pub similarity_percent: f64,
    pub title: Option<String>,
    pub episode_label: Option<String>,
    pub timestamp_label: Option<String>,
    pub raw: RawMatch,
}

impl RankedResult {
    /// Keep matches above the similarity floor, best first, at most ten
    pub fn rank(matches: &[RawMatch]) -> Vec<RankedResult> {
        let mut kept: Vec<&RawMatch> = matches
            .iter()
            .filter(|m| m.similarity > MIN_RANKED_SIMILARITY)
            .collect();

        // Stable sort keeps service order for equal scores
        kept.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        kept.into_iter()
            .take(MAX_RANKED_RESULTS)
            .enumerate()
            .map(|(index, raw)| Self::from_raw(index + 1, raw.clone()))
            .collect()
    }

    fn from_raw(rank: usize, raw: RawMatch) -> Self {
        let title = raw
            .anilist
            .as_ref()
            .and_then(|anilist| anilist.title())
            .and_then(|title| title.preferred())
            .map(str::to_string)
            .or_else(|| raw.filename.clone());

        let timestamp_label = match (raw.from, raw.to) {
            (Some(from), Some(to)) => Some(format_time_range(from, to)),
            _ => None,
        };

        Self {
            rank,
            similarity_percent: similarity_percent(raw.similarity),
            title,
            episode_label: raw.episode.as_ref().and_then(episode_label),
            timestamp_label,
            raw,
        }
    }
}

/// Render the episode identifier for display
pub fn episode_label(episode: &Episode) -> Option<String> {
    match episode {
        Episode::Number(number) => Some(format!("Episode {}", format_number(*number))),
        Episode::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            match text.split_once('|') {
                Some((current, total)) if !current.trim().is_empty() && !total.trim().is_empty() => {
                    Some(format!("Episode {} of {}", current.trim(), total.trim()))
                }
                Some((current, _)) if !current.trim().is_empty() => {
                    Some(format!("Episode {}", current.trim()))
                }
                Some(_) => None,
                None => Some(format!("Episode {text}")),
            }
        }
        Episode::List(values) => {
            let parts: Vec<String> = values
                .iter()
                .filter_map(|value| match value {
                    serde_json::Value::Number(n) => n.as_f64().map(format_number),
                    serde_json::Value::String(s) if !s.trim().is_empty() => {
                        Some(s.trim().to_string())
                    }
                    _ => None,
                })
                .collect();
            match parts.len() {
                0 => None,
                1 => Some(format!("Episode {}", parts[0])),
                _ => Some(format!("Episodes {}", parts.join(", "))),
            }
        }
    }
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 {
        format!("{}", number as i64)
    } else {
        format!("{number}")
    }
}
