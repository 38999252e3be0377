use crate::application::engine::EngineConfig;
use crate::domain::identity::{Identity, UserId};
use crate::domain::sequence::{SequenceId, SequenceTemplate};
use crate::error::Result;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Sequence template as written in the directory file.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub min_approval_percentage: u16,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub enforce_sequential_order: bool,
    /// Approvers in step order.
    pub approvers: Vec<UserId>,
}

impl From<TemplateConfig> for SequenceTemplate {
    fn from(config: TemplateConfig) -> Self {
        let template = SequenceTemplate::new(
            SequenceId(config.id),
            config.name,
            config.min_approval_percentage,
            config.approvers,
        )
        .sequential(config.enforce_sequential_order)
        .active(config.active);
        match config.description {
            Some(description) => template.with_description(description),
            None => template,
        }
    }
}

/// Users, sequence templates and engine rules loaded from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Directory {
    #[serde(default)]
    pub users: Vec<Identity>,
    #[serde(default)]
    pub sequences: Vec<TemplateConfig>,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl Directory {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    pub fn templates(&self) -> impl Iterator<Item = SequenceTemplate> + '_ {
        self.sequences.iter().cloned().map(SequenceTemplate::from)
    }
}
