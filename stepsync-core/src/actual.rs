//! Actual-state model, mirroring the desired-state records.
//!
//! Built by the reader in `stepsync-remote`; each entry carries the remote id
//! alongside the same comparable fields as its desired counterpart.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::keys::{ImageKey, StepKey};
use crate::types::{ImageType, Mode, RemoteId, Stage};

/// Everything currently registered for one assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualState {
    pub assembly_name: String,
    /// `None` when the assembly is not registered remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly_id: Option<RemoteId>,
    #[serde(default)]
    pub plugin_types: Vec<ActualPluginType>,
    #[serde(default)]
    pub steps: Vec<ActualStep>,
    /// Sub-resources that could not be read; their contents count as empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ReadWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualPluginType {
    pub id: RemoteId,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualStep {
    pub id: RemoteId,
    pub plugin_type_id: RemoteId,
    pub type_name: String,
    pub message: String,
    pub primary_entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_entity: Option<String>,
    pub stage: Stage,
    pub mode: Mode,
    pub execution_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtering_attributes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    #[serde(default)]
    pub images: Vec<ActualImage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualImage {
    pub id: RemoteId,
    pub name: String,
    pub image_type: ImageType,
    pub entity_alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
}

/// A sub-resource read that failed and was treated as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWarning {
    pub scope: ReadScope,
    pub reason: String,
}

/// Which part of the actual state a failed read left unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadScope {
    /// Plugin types of the assembly (and so every step below them).
    PluginTypes,
    /// Steps of one plugin type.
    Steps { type_name: String },
    /// Images of one step.
    Images { step: StepKey },
}

impl fmt::Display for ReadScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadScope::PluginTypes => write!(f, "plugin types"),
            ReadScope::Steps { type_name } => write!(f, "steps of {type_name}"),
            ReadScope::Images { step } => write!(f, "images of {step}"),
        }
    }
}

impl ActualState {
    /// State of an assembly that is not registered yet.
    pub fn empty(assembly_name: impl Into<String>) -> Self {
        Self {
            assembly_name: assembly_name.into(),
            ..Self::default()
        }
    }

    pub fn exists(&self) -> bool {
        self.assembly_id.is_some()
    }

    /// Remote id of a registered plugin type.
    pub fn plugin_type_id(&self, type_name: &str) -> Option<&RemoteId> {
        self.plugin_types
            .iter()
            .find(|pt| pt.type_name == type_name)
            .map(|pt| &pt.id)
    }

    /// Whether the steps of `type_name` could not be read.
    pub fn steps_unknown(&self, type_name: &str) -> bool {
        self.warnings.iter().any(|w| match &w.scope {
            ReadScope::PluginTypes => true,
            ReadScope::Steps { type_name: t } => t == type_name,
            ReadScope::Images { .. } => false,
        })
    }

    /// Whether the images of `step` could not be read.
    pub fn images_unknown(&self, step: &StepKey) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(&w.scope, ReadScope::Images { step: s } if s == step))
    }

    pub fn image_count(&self) -> usize {
        self.steps.iter().map(|s| s.images.len()).sum()
    }
}

impl ActualStep {
    pub fn key(&self) -> StepKey {
        StepKey::new(
            &self.type_name,
            &self.message,
            &self.primary_entity,
            self.secondary_entity.as_deref(),
            self.stage,
        )
    }
}

impl ActualImage {
    pub fn key(&self, step: &StepKey) -> ImageKey {
        ImageKey::new(step, &self.name)
    }
}
