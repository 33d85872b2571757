//! Wire shapes returned by the recognition service

use serde::{Deserialize, Serialize};

/// Response envelope: either an `error` string or a `result` list
///
/// The service sends `"error": ""` alongside successful results, so an empty
/// string is not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<Vec<RawMatch>>,
    #[serde(default, rename = "frameCount", skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u64>,
}

impl SearchResponse {
    /// Service-reported error, ignoring blank values
    pub fn service_error(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}

/// One candidate scene, kept exactly as received
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMatch {
    /// Similarity score in `[0, 1]`
    pub similarity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<Episode>,
    /// Scene start within the source video, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,
    /// Scene end within the source video, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Preview image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Preview clip URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anilist: Option<AnilistRef>,
}

/// Episode identifier, which the service encodes in several ways
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Episode {
    Number(f64),
    /// Plain (`"3"`) or "episode of total" (`"3|12"`)
    Text(String),
    /// Scene spanning several episodes
    List(Vec<serde_json::Value>),
}

/// AniList reference: a bare id or an inlined media object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnilistRef {
    Id(u64),
    IdText(String),
    Info(AnilistInfo),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnilistInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, rename = "idMal", skip_serializing_if = "Option::is_none")]
    pub id_mal: Option<u64>,
    #[serde(default)]
    pub title: AnilistTitle,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(default, rename = "isAdult", skip_serializing_if = "Option::is_none")]
    pub is_adult: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnilistTitle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub romaji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<String>,
}

impl AnilistTitle {
    /// English, then romaji, then native; blank strings are skipped
    pub fn preferred(&self) -> Option<&str> {
        [&self.english, &self.romaji, &self.native]
            .into_iter()
            .filter_map(|title| title.as_deref())
            .map(str::trim)
            .find(|title| !title.is_empty())
    }
}

impl AnilistRef {
    pub fn id(&self) -> Option<String> {
        match self {
            Self::Id(id) => Some(id.to_string()),
            Self::IdText(id) => Some(id.clone()),
            Self::Info(info) => info.id.map(|id| id.to_string()),
        }
    }

    pub fn title(&self) -> Option<&AnilistTitle> {
        match self {
            Self::Info(info) => Some(&info.title),
            _ => None,
        }
    }
}
