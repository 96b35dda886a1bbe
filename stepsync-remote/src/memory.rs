//! In-memory [`RegistrationApi`].
//!
//! Backs offline runs against an exported snapshot and every reconciler
//! test. Write calls are logged in order so callers can assert exactly what
//! would have reached the remote side; reads and writes can be made to fail.

use std::collections::HashSet;

use stepsync_core::{ActualState, RemoteId};

use crate::api::{
    AssemblyRef, FilterRef, ImageRef, ImageUpdate, NewImage, NewStep, PluginTypeRef,
    RegistrationApi, StepRef, StepUpdate,
};
use crate::error::ApiError;

/// One write issued against the in-memory API, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    CreateStep { name: String },
    UpdateStep { id: RemoteId },
    DeleteStep { id: RemoteId },
    CreateImage { step_id: RemoteId, name: String },
    UpdateImage { id: RemoteId },
    DeleteImage { id: RemoteId },
}

/// Per-operation write tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub step_creates: usize,
    pub step_updates: usize,
    pub step_deletes: usize,
    pub image_creates: usize,
    pub image_updates: usize,
    pub image_deletes: usize,
}

impl CallCounts {
    pub fn writes(&self) -> usize {
        self.step_creates
            + self.step_updates
            + self.step_deletes
            + self.image_creates
            + self.image_updates
            + self.image_deletes
    }
}

#[derive(Debug, Default)]
pub struct InMemoryApi {
    assemblies: Vec<AssemblyRef>,
    plugin_types: Vec<(RemoteId, PluginTypeRef)>,
    steps: Vec<StepRef>,
    images: Vec<ImageRef>,
    missing_filters: HashSet<(String, String)>,
    failing_reads: HashSet<RemoteId>,
    rejected_writes: HashSet<String>,
    calls: Vec<WriteCall>,
    next_id: u64,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a previously read (or exported) actual state.
    pub fn from_state(state: &ActualState) -> Self {
        let mut api = Self::new();
        api.load_state(state);
        api
    }

    /// Add the contents of `state` to the store.
    pub fn load_state(&mut self, state: &ActualState) {
        let Some(assembly_id) = state.assembly_id.clone() else {
            return;
        };
        self.assemblies.push(AssemblyRef {
            id: assembly_id.clone(),
            name: state.assembly_name.clone(),
        });
        for pt in &state.plugin_types {
            self.plugin_types.push((
                assembly_id.clone(),
                PluginTypeRef {
                    id: pt.id.clone(),
                    type_name: pt.type_name.clone(),
                },
            ));
        }
        for step in &state.steps {
            if !self.plugin_types.iter().any(|(_, pt)| pt.id == step.plugin_type_id) {
                self.plugin_types.push((
                    assembly_id.clone(),
                    PluginTypeRef {
                        id: step.plugin_type_id.clone(),
                        type_name: step.type_name.clone(),
                    },
                ));
            }
            self.steps.push(StepRef {
                id: step.id.clone(),
                plugin_type_id: step.plugin_type_id.clone(),
                message: step.message.clone(),
                primary_entity: step.primary_entity.clone(),
                secondary_entity: step.secondary_entity.clone(),
                stage: step.stage,
                mode: step.mode,
                execution_order: step.execution_order,
                filtering_attributes: step.filtering_attributes.clone(),
                configuration: step.configuration.clone(),
            });
            for image in &step.images {
                self.images.push(ImageRef {
                    id: image.id.clone(),
                    step_id: step.id.clone(),
                    name: image.name.clone(),
                    image_type: image.image_type,
                    entity_alias: image.entity_alias.clone(),
                    attributes: image.attributes.clone(),
                });
            }
        }
    }

    /// Register an assembly with no plugin types.
    pub fn register_assembly(&mut self, name: &str) -> RemoteId {
        let id = self.mint("assembly");
        self.assemblies.push(AssemblyRef {
            id: id.clone(),
            name: name.to_owned(),
        });
        id
    }

    /// Register a plugin type under an existing assembly.
    pub fn register_plugin_type(&mut self, assembly_id: &RemoteId, type_name: &str) -> RemoteId {
        let id = self.mint("type");
        self.plugin_types.push((
            assembly_id.clone(),
            PluginTypeRef {
                id: id.clone(),
                type_name: type_name.to_owned(),
            },
        ));
        id
    }

    /// Make `resolve_message_filter` find nothing for this binding.
    pub fn without_filter(&mut self, message: &str, primary_entity: &str) {
        self.missing_filters
            .insert((message.to_ascii_lowercase(), primary_entity.to_ascii_lowercase()));
    }

    /// Make reads of the children of `parent` (a plugin type or step) fail.
    pub fn fail_reads_under(&mut self, parent: &RemoteId) {
        self.failing_reads.insert(parent.clone());
    }

    /// Reject writes targeting this remote id, step display name or image name.
    pub fn reject_writes_to(&mut self, target: impl Into<String>) {
        self.rejected_writes.insert(target.into());
    }

    pub fn calls(&self) -> &[WriteCall] {
        &self.calls
    }

    pub fn counts(&self) -> CallCounts {
        let mut counts = CallCounts::default();
        for call in &self.calls {
            match call {
                WriteCall::CreateStep { .. } => counts.step_creates += 1,
                WriteCall::UpdateStep { .. } => counts.step_updates += 1,
                WriteCall::DeleteStep { .. } => counts.step_deletes += 1,
                WriteCall::CreateImage { .. } => counts.image_creates += 1,
                WriteCall::UpdateImage { .. } => counts.image_updates += 1,
                WriteCall::DeleteImage { .. } => counts.image_deletes += 1,
            }
        }
        counts
    }

    /// Forget the call log, keeping the stored records.
    pub fn reset_calls(&mut self) {
        self.calls.clear();
    }

    fn mint(&mut self, prefix: &str) -> RemoteId {
        self.next_id += 1;
        RemoteId(format!("{prefix}-{:04}", self.next_id))
    }

    fn check_read(&self, parent: &RemoteId) -> Result<(), ApiError> {
        if self.failing_reads.contains(parent) {
            return Err(ApiError::Status {
                method: "GET",
                url: format!("memory://{parent}"),
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn check_write(&self, targets: &[&str]) -> Result<(), ApiError> {
        match targets.iter().find(|t| self.rejected_writes.contains(**t)) {
            Some(target) => Err(ApiError::Rejected(format!("'{target}' is locked"))),
            None => Ok(()),
        }
    }
}

impl RegistrationApi for InMemoryApi {
    fn find_assembly(&self, name: &str) -> Result<Option<AssemblyRef>, ApiError> {
        Ok(self.assemblies.iter().find(|a| a.name == name).cloned())
    }

    fn find_plugin_types_for_assembly(
        &self,
        assembly_id: &RemoteId,
    ) -> Result<Vec<PluginTypeRef>, ApiError> {
        self.check_read(assembly_id)?;
        Ok(self
            .plugin_types
            .iter()
            .filter(|(owner, _)| owner == assembly_id)
            .map(|(_, pt)| pt.clone())
            .collect())
    }

    fn find_steps_for_type(&self, plugin_type_id: &RemoteId) -> Result<Vec<StepRef>, ApiError> {
        self.check_read(plugin_type_id)?;
        Ok(self
            .steps
            .iter()
            .filter(|s| &s.plugin_type_id == plugin_type_id)
            .cloned()
            .collect())
    }

    fn find_images_for_step(&self, step_id: &RemoteId) -> Result<Vec<ImageRef>, ApiError> {
        self.check_read(step_id)?;
        Ok(self
            .images
            .iter()
            .filter(|i| &i.step_id == step_id)
            .cloned()
            .collect())
    }

    fn resolve_message_filter(
        &self,
        message: &str,
        primary_entity: &str,
        secondary_entity: Option<&str>,
    ) -> Result<Option<FilterRef>, ApiError> {
        let binding = (message.to_ascii_lowercase(), primary_entity.to_ascii_lowercase());
        if self.missing_filters.contains(&binding) {
            return Ok(None);
        }
        Ok(Some(FilterRef {
            message_id: RemoteId(format!("message-{}", binding.0)),
            filter_id: RemoteId(format!(
                "filter-{}-{}-{}",
                binding.0,
                binding.1,
                secondary_entity.unwrap_or("none")
            )),
        }))
    }

    fn create_step(&mut self, step: &NewStep) -> Result<RemoteId, ApiError> {
        self.calls.push(WriteCall::CreateStep {
            name: step.name.clone(),
        });
        self.check_write(&[step.name.as_str()])?;
        if !self.plugin_types.iter().any(|(_, pt)| pt.id == step.plugin_type_id) {
            return Err(ApiError::NotFound {
                resource: "plugin type",
                id: step.plugin_type_id.to_string(),
            });
        }
        let id = self.mint("step");
        self.steps.push(StepRef {
            id: id.clone(),
            plugin_type_id: step.plugin_type_id.clone(),
            message: step.message.clone(),
            primary_entity: step.primary_entity.clone(),
            secondary_entity: step.secondary_entity.clone(),
            stage: step.stage,
            mode: step.mode,
            execution_order: step.execution_order,
            filtering_attributes: step.filtering_attributes.clone(),
            configuration: step.configuration.clone(),
        });
        Ok(id)
    }

    fn update_step(&mut self, id: &RemoteId, update: &StepUpdate) -> Result<(), ApiError> {
        self.calls.push(WriteCall::UpdateStep { id: id.clone() });
        self.check_write(&[id.0.as_str()])?;
        let step = self
            .steps
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| ApiError::NotFound {
                resource: "step",
                id: id.to_string(),
            })?;
        step.mode = update.mode;
        step.execution_order = update.execution_order;
        step.filtering_attributes = update.filtering_attributes.clone();
        step.configuration = update.configuration.clone();
        Ok(())
    }

    fn delete_step(&mut self, id: &RemoteId) -> Result<(), ApiError> {
        self.calls.push(WriteCall::DeleteStep { id: id.clone() });
        self.check_write(&[id.0.as_str()])?;
        let before = self.steps.len();
        self.steps.retain(|s| &s.id != id);
        if self.steps.len() == before {
            return Err(ApiError::NotFound {
                resource: "step",
                id: id.to_string(),
            });
        }
        // Images go with their step.
        self.images.retain(|i| &i.step_id != id);
        Ok(())
    }

    fn create_image(&mut self, image: &NewImage) -> Result<RemoteId, ApiError> {
        self.calls.push(WriteCall::CreateImage {
            step_id: image.step_id.clone(),
            name: image.name.clone(),
        });
        self.check_write(&[image.name.as_str(), image.step_id.0.as_str()])?;
        if !self.steps.iter().any(|s| s.id == image.step_id) {
            return Err(ApiError::NotFound {
                resource: "step",
                id: image.step_id.to_string(),
            });
        }
        let id = self.mint("image");
        self.images.push(ImageRef {
            id: id.clone(),
            step_id: image.step_id.clone(),
            name: image.name.clone(),
            image_type: image.image_type,
            entity_alias: image.entity_alias.clone(),
            attributes: image.attributes.clone(),
        });
        Ok(id)
    }

    fn update_image(&mut self, id: &RemoteId, update: &ImageUpdate) -> Result<(), ApiError> {
        self.calls.push(WriteCall::UpdateImage { id: id.clone() });
        self.check_write(&[id.0.as_str()])?;
        let image = self
            .images
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| ApiError::NotFound {
                resource: "image",
                id: id.to_string(),
            })?;
        image.entity_alias = update.entity_alias.clone();
        image.attributes = update.attributes.clone();
        Ok(())
    }

    fn delete_image(&mut self, id: &RemoteId) -> Result<(), ApiError> {
        self.calls.push(WriteCall::DeleteImage { id: id.clone() });
        self.check_write(&[id.0.as_str()])?;
        let before = self.images.len();
        self.images.retain(|i| &i.id != id);
        if self.images.len() == before {
            return Err(ApiError::NotFound {
                resource: "image",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
