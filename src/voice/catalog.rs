//! Voice catalog loaded from the voice input directory.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the optional metadata file inside the input directory.
pub const METADATA_FILE: &str = "voices.json";

const DEFAULT_TEMPERATURE: f32 = 0.9;
const DEFAULT_TOPK: u32 = 50;
const DEFAULT_STYLE: &str = "standard";

/// Errors that can occur while loading or querying the catalog.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Voice not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid voice metadata: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Gender tag used by clients to group voices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl Gender {
    fn from_speaker_id(speaker_id: u32) -> Self {
        if speaker_id % 2 == 0 {
            Gender::Female
        } else {
            Gender::Male
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unspecified => "unspecified",
        })
    }
}

/// A voice sample that can condition synthesis.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoiceReference {
    pub filename: String,
    pub file_path: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub speaker_id: u32,
    pub style: String,
    pub gender: Gender,
    pub temperature: f32,
    pub topk: u32,
    pub character_name: String,
    pub character_role: String,
    pub character_description: String,
}

/// Optional per-voice metadata from `voices.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceOverride {
    pub filename: String,
    pub speaker_id: Option<u32>,
    pub style: Option<String>,
    pub gender: Option<Gender>,
    pub temperature: Option<f32>,
    pub topk: Option<u32>,
    pub character_name: Option<String>,
    pub character_role: Option<String>,
    pub character_description: Option<String>,
}

/// Fields encoded in a `speaker_{id}_temp_{t}_topk_{k}_{style}` file stem.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    pub speaker_id: u32,
    pub temperature: f32,
    pub topk: u32,
    pub style: String,
}

/// Parse a voice file stem; `None` if it does not follow the naming scheme.
pub fn parse_voice_filename(stem: &str) -> Option<ParsedName> {
    let rest = stem.strip_prefix("speaker_")?;
    let (speaker_id, rest) = rest.split_once("_temp_")?;
    let (temperature, rest) = rest.split_once("_topk_")?;
    let (topk, style) = rest.split_once('_')?;

    if style.is_empty() {
        return None;
    }

    Some(ParsedName {
        speaker_id: speaker_id.parse().ok()?,
        temperature: temperature.parse().ok()?,
        topk: topk.parse().ok()?,
        style: style.replace('_', " "),
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl VoiceReference {
    fn from_file(path: PathBuf, stem: &str, file_name: &str, meta: Option<&VoiceOverride>) -> Self {
        let parsed = parse_voice_filename(stem);

        let speaker_id = meta
            .and_then(|m| m.speaker_id)
            .or(parsed.as_ref().map(|p| p.speaker_id))
            .unwrap_or(0);
        let style = meta
            .and_then(|m| m.style.clone())
            .or(parsed.as_ref().map(|p| p.style.clone()))
            .unwrap_or_else(|| DEFAULT_STYLE.to_string());
        let gender = meta.and_then(|m| m.gender).unwrap_or_else(|| match &parsed {
            Some(p) => Gender::from_speaker_id(p.speaker_id),
            None => Gender::Unspecified,
        });
        let temperature = meta
            .and_then(|m| m.temperature)
            .or(parsed.as_ref().map(|p| p.temperature))
            .unwrap_or(DEFAULT_TEMPERATURE);
        let topk = meta
            .and_then(|m| m.topk)
            .or(parsed.as_ref().map(|p| p.topk))
            .unwrap_or(DEFAULT_TOPK);

        let character_name = meta
            .and_then(|m| m.character_name.clone())
            .unwrap_or_else(|| format!("Speaker {speaker_id}"));
        let character_role = meta
            .and_then(|m| m.character_role.clone())
            .unwrap_or_else(|| format!("{} Voice Artist", capitalize(&gender.to_string())));
        let character_description = meta
            .and_then(|m| m.character_description.clone())
            .unwrap_or_else(|| {
                format!(
                    "A professionally trained {gender} voice actor with expertise in {style} performances."
                )
            });

        Self {
            filename: stem.to_string(),
            file_path: format!("input/{file_name}"),
            path,
            speaker_id,
            style,
            gender,
            temperature,
            topk,
            character_name,
            character_role,
            character_description,
        }
    }
}

/// Read-only set of voices available for generation.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    input_dir: PathBuf,
    voices: Vec<VoiceReference>,
}

impl VoiceCatalog {
    /// Scan `input_dir` for `.wav` samples, creating the directory if needed.
    pub fn load(input_dir: &Path) -> Result<Self, VoiceError> {
        std::fs::create_dir_all(input_dir)?;

        let overrides = Self::load_overrides(input_dir)?;
        let mut voices = Vec::new();

        for entry in std::fs::read_dir(input_dir)? {
            let path = entry?.path();

            if !path.is_file() || !path.extension().is_some_and(|ext| ext == "wav") {
                continue;
            }
            let (Some(stem), Some(file_name)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.file_name().and_then(|s| s.to_str()),
            ) else {
                tracing::warn!(path = %path.display(), "skipping voice with non UTF-8 name");
                continue;
            };

            let stem = stem.to_string();
            let file_name = file_name.to_string();
            voices.push(VoiceReference::from_file(
                path,
                &stem,
                &file_name,
                overrides.get(&stem),
            ));
        }

        voices.sort_by(|a, b| a.filename.cmp(&b.filename));
        tracing::info!(count = voices.len(), dir = %input_dir.display(), "loaded voice catalog");

        Ok(Self {
            input_dir: input_dir.to_path_buf(),
            voices,
        })
    }

    fn load_overrides(input_dir: &Path) -> Result<HashMap<String, VoiceOverride>, VoiceError> {
        let path = input_dir.join(METADATA_FILE);
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let json = std::fs::read_to_string(path)?;
        let entries: Vec<VoiceOverride> = serde_json::from_str(&json)?;

        Ok(entries
            .into_iter()
            .map(|entry| (entry.filename.clone(), entry))
            .collect())
    }

    /// Resolve a client voice reference.
    ///
    /// Accepts the catalog `file_path`, the file name, or the bare stem.
    pub fn validate(&self, voice: &str) -> Result<&VoiceReference, VoiceError> {
        let voice = voice.trim();
        let stem = voice.strip_suffix(".wav").unwrap_or(voice);

        self.voices
            .iter()
            .find(|v| v.file_path == voice || v.filename == stem)
            .ok_or_else(|| VoiceError::NotFound(voice.to_string()))
    }

    pub fn list(&self) -> &[VoiceReference] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }
}
