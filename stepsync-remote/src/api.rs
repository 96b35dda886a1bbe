//! The remote administrative API consumed by the reader and the reconciler.
//!
//! Reads take `&self`; writes take `&mut self`. Calls are blocking and are
//! issued one at a time by a single caller.

use serde::{Deserialize, Serialize};

use stepsync_core::{ImageType, Mode, RemoteId, Stage};

use crate::error::ApiError;

// ---------------------------------------------------------------------------
// Read-side records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyRef {
    pub id: RemoteId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginTypeRef {
    pub id: RemoteId,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRef {
    pub id: RemoteId,
    pub plugin_type_id: RemoteId,
    pub message: String,
    pub primary_entity: String,
    pub secondary_entity: Option<String>,
    pub stage: Stage,
    pub mode: Mode,
    pub execution_order: u32,
    pub filtering_attributes: Option<String>,
    pub configuration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: RemoteId,
    pub step_id: RemoteId,
    pub name: String,
    pub image_type: ImageType,
    pub entity_alias: String,
    pub attributes: Option<String>,
}

/// Message + entity binding a step must be created against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRef {
    pub message_id: RemoteId,
    pub filter_id: RemoteId,
}

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

/// Everything needed to register a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStep {
    pub plugin_type_id: RemoteId,
    pub filter: FilterRef,
    pub message: String,
    pub primary_entity: String,
    pub secondary_entity: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub stage: Stage,
    pub mode: Mode,
    pub execution_order: u32,
    pub filtering_attributes: Option<String>,
    pub configuration: Option<String>,
    /// Solution the new record is added to.
    pub solution: Option<String>,
}

/// Mutable fields of a step. Plugin type, message and entity bindings are
/// fixed at creation and are never resent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepUpdate {
    pub mode: Mode,
    pub execution_order: u32,
    pub filtering_attributes: Option<String>,
    pub configuration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub step_id: RemoteId,
    pub name: String,
    pub image_type: ImageType,
    pub entity_alias: String,
    pub attributes: Option<String>,
    pub message_property_name: String,
    pub solution: Option<String>,
}

/// Mutable fields of an image. The image type is not among them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpdate {
    pub entity_alias: String,
    pub attributes: Option<String>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// CRUD operations over plugin registrations.
///
/// Lookups that find nothing return `Ok(None)` / an empty `Vec`; `Err` is
/// reserved for calls that failed.
pub trait RegistrationApi {
    fn find_assembly(&self, name: &str) -> Result<Option<AssemblyRef>, ApiError>;

    fn find_plugin_types_for_assembly(
        &self,
        assembly_id: &RemoteId,
    ) -> Result<Vec<PluginTypeRef>, ApiError>;

    fn find_steps_for_type(&self, plugin_type_id: &RemoteId) -> Result<Vec<StepRef>, ApiError>;

    fn find_images_for_step(&self, step_id: &RemoteId) -> Result<Vec<ImageRef>, ApiError>;

    fn resolve_message_filter(
        &self,
        message: &str,
        primary_entity: &str,
        secondary_entity: Option<&str>,
    ) -> Result<Option<FilterRef>, ApiError>;

    fn create_step(&mut self, step: &NewStep) -> Result<RemoteId, ApiError>;

    fn update_step(&mut self, id: &RemoteId, update: &StepUpdate) -> Result<(), ApiError>;

    fn delete_step(&mut self, id: &RemoteId) -> Result<(), ApiError>;

    fn create_image(&mut self, image: &NewImage) -> Result<RemoteId, ApiError>;

    fn update_image(&mut self, id: &RemoteId, update: &ImageUpdate) -> Result<(), ApiError>;

    fn delete_image(&mut self, id: &RemoteId) -> Result<(), ApiError>;
}

/// Request property the platform stores an image under for `message`.
pub fn message_property_name(message: &str) -> &'static str {
    if message.eq_ignore_ascii_case("Create") {
        "Id"
    } else if message.eq_ignore_ascii_case("SetState")
        || message.eq_ignore_ascii_case("SetStateDynamicEntity")
    {
        "EntityMoniker"
    } else {
        "Target"
    }
}
