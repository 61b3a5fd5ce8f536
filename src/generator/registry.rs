//! Model registry client.
//!
//! Fetches the mapping of model identifiers to descriptive metadata:
//! supported instruments, model kind, and rule flags that tell the caller
//! which request knobs a model honors.

use crate::error::EngineError;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use tracing::info;

/// Model training lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ModelKind {
    /// Generates freely; does not need a prompt MIDI.
    #[serde(rename = "pretrained")]
    Pretrained,
    /// Fine-tuned for prompted tasks; conditions on user material.
    #[serde(rename = "sft")]
    Finetuned,
}

/// Descriptive tags attached to a model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTag {
    /// Instrument(s) the model understands. The registry sends either a
    /// single string or a list.
    #[serde(
        default,
        alias = "instrument",
        deserialize_with = "one_or_many"
    )]
    pub instruments: Vec<String>,

    /// Training lineage, when declared.
    #[serde(default)]
    pub model: Option<ModelKind>,

    /// Model family name.
    #[serde(rename = "type", default)]
    pub family: Option<String>,

    /// Family version string.
    #[serde(default)]
    pub version: Option<String>,
}

/// Rule flags: which request parameters a model actually honors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelRules {
    /// False when the model cannot take a prompt MIDI at all.
    #[serde(default)]
    pub input_midi: Option<bool>,

    /// False when the generation count is fixed by the model.
    #[serde(default)]
    pub number_of_generation: Option<bool>,
}

/// One registry entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tag: ModelTag,

    #[serde(default)]
    pub rule: Option<ModelRules>,
}

impl ModelInfo {
    /// Returns true for models that generate without prompt material,
    /// the ones eligible for continuous-mode openings.
    pub fn is_pretrained(&self) -> bool {
        self.tag.model == Some(ModelKind::Pretrained)
    }

    /// Returns true when the model accepts a prompt MIDI.
    pub fn accepts_prompt(&self) -> bool {
        self.rule
            .as_ref()
            .and_then(|r| r.input_midi)
            .unwrap_or(true)
    }
}

/// Accepts `"sax"` or `["sax", "piano"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

/// Client for the registry endpoint.
pub struct ModelRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl ModelRegistry {
    /// Creates a client for the registry at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetches all known models, in registry order.
    pub async fn fetch(&self) -> Result<Vec<ModelInfo>, EngineError> {
        let response = self
            .client
            .post(format!("{}/model_info", self.base_url))
            .send()
            .await
            .map_err(|e| EngineError::Registry(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::Registry(response.status().to_string()));
        }

        // The endpoint returns an index-keyed object, not an array.
        let map: BTreeMap<String, ModelInfo> = response
            .json()
            .await
            .map_err(|e| EngineError::Registry(e.to_string()))?;

        let models: Vec<ModelInfo> = map.into_values().collect();
        info!(count = models.len(), "fetched model registry");
        Ok(models)
    }
}
