//! Desired-state model: assemblies → plugin types → steps → images.
//!
//! Records are produced by the metadata extractor (loaded from a manifest,
//! see [`crate::manifest`]) and are treated as immutable for the duration of
//! a run. All types are serializable via serde + serde_yaml.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::error::ModelError;
use crate::keys::{ImageKey, StepKey};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque identifier assigned by the remote system on create.
///
/// Only used to target update/delete calls; never used for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteId(pub String);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RemoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Coded enums
// ---------------------------------------------------------------------------

/// A closed enum with an explicit two-way table between variants, the
/// integer codes the remote API uses, and display names.
pub trait Coded: Copy + PartialEq + 'static {
    /// Human-readable kind, used in error messages.
    const KIND: &'static str;
    /// `(variant, remote code, name)` for every variant.
    const TABLE: &'static [(Self, i32, &'static str)];

    fn code(self) -> i32 {
        Self::TABLE
            .iter()
            .find(|(v, _, _)| *v == self)
            .map_or(-1, |(_, code, _)| *code)
    }

    fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(v, _, _)| *v == self)
            .map_or("", |(_, _, name)| name)
    }

    fn from_code(code: i32) -> Result<Self, ModelError> {
        Self::TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(v, _, _)| *v)
            .ok_or(ModelError::UnknownCode {
                kind: Self::KIND,
                code,
            })
    }

    /// Case-insensitive lookup by name.
    fn from_name(name: &str) -> Result<Self, ModelError> {
        Self::TABLE
            .iter()
            .find(|(_, _, n)| n.eq_ignore_ascii_case(name))
            .map(|(v, _, _)| *v)
            .ok_or_else(|| ModelError::UnknownName {
                kind: Self::KIND,
                name: name.to_owned(),
            })
    }
}

/// Pipeline stage a step runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Stage {
    PreValidation,
    PreOperation,
    PostOperation,
}

impl Coded for Stage {
    const KIND: &'static str = "stage";
    const TABLE: &'static [(Self, i32, &'static str)] = &[
        (Stage::PreValidation, 10, "PreValidation"),
        (Stage::PreOperation, 20, "PreOperation"),
        (Stage::PostOperation, 40, "PostOperation"),
    ];
}

/// Execution mode of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Mode {
    #[default]
    Synchronous,
    Asynchronous,
}

impl Coded for Mode {
    const KIND: &'static str = "mode";
    const TABLE: &'static [(Self, i32, &'static str)] = &[
        (Mode::Synchronous, 0, "Synchronous"),
        (Mode::Asynchronous, 1, "Asynchronous"),
    ];
}

/// Snapshot kind of an image. Immutable once created remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImageType {
    PreImage,
    PostImage,
    Both,
}

impl Coded for ImageType {
    const KIND: &'static str = "image type";
    const TABLE: &'static [(Self, i32, &'static str)] = &[
        (ImageType::PreImage, 0, "PreImage"),
        (ImageType::PostImage, 1, "PostImage"),
        (ImageType::Both, 2, "Both"),
    ];
}

/// How an assembly is shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum AssemblyKind {
    #[default]
    NativeBinary,
    Package,
}

impl Coded for AssemblyKind {
    const KIND: &'static str = "assembly kind";
    const TABLE: &'static [(Self, i32, &'static str)] = &[
        (AssemblyKind::NativeBinary, 0, "NativeBinary"),
        (AssemblyKind::Package, 1, "Package"),
    ];
}

// Names deserialize through `FromStr`, so manifests may spell them in any case.
macro_rules! coded_display_from_str {
    ($($ty:ty),+ $(,)?) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$ty as Coded>::from_name(s.trim())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                name.parse().map_err(de::Error::custom)
            }
        }
    )+};
}

coded_display_from_str!(Stage, Mode, ImageType, AssemblyKind);

// ---------------------------------------------------------------------------
// Desired-state records
// ---------------------------------------------------------------------------

/// One deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyRegistration {
    pub name: String,
    #[serde(default)]
    pub kind: AssemblyKind,
    /// Solution the package is registered into. Required for `Package`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_container: Option<String>,
    #[serde(default)]
    pub plugin_types: Vec<PluginTypeRegistration>,
}

/// One registrable class within an assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginTypeRegistration {
    pub full_type_name: String,
    #[serde(default)]
    pub steps: Vec<StepRegistration>,
}

/// One event-handler registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRegistration {
    pub message: String,
    pub primary_entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_entity: Option<String>,
    pub stage: Stage,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_execution_order")]
    pub execution_order: u32,
    /// Comma-separated attribute names; order is not significant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtering_attributes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
    /// Display name sent on create. Defaults to [`StepRegistration::display_name`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageRegistration>,
}

fn default_execution_order() -> u32 {
    1
}

/// A before/after entity snapshot attached to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRegistration {
    pub name: String,
    pub image_type: ImageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_alias: Option<String>,
    /// Comma-separated attribute names; absent means all attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
}

impl AssemblyRegistration {
    /// Every step of the assembly paired with its plugin type, in declaration
    /// order.
    pub fn steps(&self) -> impl Iterator<Item = (&PluginTypeRegistration, &StepRegistration)> {
        self.plugin_types
            .iter()
            .flat_map(|pt| pt.steps.iter().map(move |step| (pt, step)))
    }

    /// Check the model invariants for this assembly and everything under it.
    pub fn validate(&self) -> Result<(), ModelError> {
        require_non_empty(&self.name, "assembly", "name")?;
        if self.kind == AssemblyKind::Package
            && self
                .target_container
                .as_deref()
                .map_or(true, |c| c.trim().is_empty())
        {
            return Err(ModelError::MissingTargetContainer {
                assembly: self.name.clone(),
            });
        }

        let mut seen = HashSet::new();
        for plugin_type in &self.plugin_types {
            require_non_empty(
                &plugin_type.full_type_name,
                &format!("assembly '{}'", self.name),
                "full_type_name",
            )?;
            for step in &plugin_type.steps {
                let key = step.key(&plugin_type.full_type_name);
                step.validate(&key)?;
                if !seen.insert(key.clone()) {
                    return Err(ModelError::DuplicateStep {
                        assembly: self.name.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl StepRegistration {
    /// Identity key of this step under the plugin type `type_name`.
    pub fn key(&self, type_name: &str) -> StepKey {
        StepKey::new(
            type_name,
            &self.message,
            &self.primary_entity,
            self.secondary_entity.as_deref(),
            self.stage,
        )
    }

    /// Name sent to the remote system when the step is created.
    pub fn display_name(&self, type_name: &str) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("{type_name}: {} of {}", self.message, self.primary_entity),
        }
    }

    fn validate(&self, key: &StepKey) -> Result<(), ModelError> {
        let context = format!("step {key}");
        require_non_empty(&self.message, &context, "message")?;
        require_non_empty(&self.primary_entity, &context, "primary_entity")?;
        if self.execution_order < 1 {
            return Err(ModelError::InvalidExecutionOrder {
                key: key.to_string(),
            });
        }
        let mut names = HashSet::new();
        for image in &self.images {
            require_non_empty(&image.name, &context, "image name")?;
            if !names.insert(image.name.as_str()) {
                return Err(ModelError::DuplicateImage {
                    step: key.to_string(),
                    image: image.name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl ImageRegistration {
    /// Alias the image is exposed under; defaults to the image name.
    pub fn entity_alias(&self) -> &str {
        match self.entity_alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }

    /// Identity key of this image under `step`.
    pub fn key(&self, step: &StepKey) -> ImageKey {
        ImageKey::new(step, &self.name)
    }
}

fn require_non_empty(value: &str, context: &str, field: &'static str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        return Err(ModelError::EmptyField {
            context: context.to_owned(),
            field,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
