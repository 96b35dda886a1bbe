//! Actual-state reader.
//!
//! Walks assembly → plugin types → steps → images. A missing assembly is an
//! empty state, not an error. A failed read below the assembly is recorded
//! as a [`ReadWarning`] and its contents are treated as empty; only the
//! assembly lookup itself can fail the read.

use stepsync_core::{
    ActualImage, ActualPluginType, ActualState, ActualStep, ReadScope, ReadWarning,
};

use crate::api::{ImageRef, PluginTypeRef, RegistrationApi, StepRef};
use crate::error::ApiError;

/// Read everything registered for `assembly_name`.
pub fn read_actual<A>(api: &A, assembly_name: &str) -> Result<ActualState, ApiError>
where
    A: RegistrationApi + ?Sized,
{
    let Some(assembly) = api.find_assembly(assembly_name)? else {
        tracing::info!(assembly = assembly_name, "assembly not registered; actual state is empty");
        return Ok(ActualState::empty(assembly_name));
    };

    let mut state = ActualState {
        assembly_name: assembly.name.clone(),
        assembly_id: Some(assembly.id.clone()),
        ..ActualState::default()
    };

    let plugin_types = match api.find_plugin_types_for_assembly(&assembly.id) {
        Ok(types) => types,
        Err(err) => {
            degrade(&mut state, ReadScope::PluginTypes, &err);
            return Ok(state);
        }
    };

    for plugin_type in plugin_types {
        read_type(api, &plugin_type, &mut state);
        state.plugin_types.push(ActualPluginType {
            id: plugin_type.id,
            type_name: plugin_type.type_name,
        });
    }

    tracing::debug!(
        assembly = assembly_name,
        types = state.plugin_types.len(),
        steps = state.steps.len(),
        images = state.image_count(),
        "read actual state"
    );
    Ok(state)
}

fn read_type<A>(api: &A, plugin_type: &PluginTypeRef, state: &mut ActualState)
where
    A: RegistrationApi + ?Sized,
{
    let steps = match api.find_steps_for_type(&plugin_type.id) {
        Ok(steps) => steps,
        Err(err) => {
            let scope = ReadScope::Steps {
                type_name: plugin_type.type_name.clone(),
            };
            degrade(state, scope, &err);
            return;
        }
    };

    for step in steps {
        let mut actual = to_actual_step(step, &plugin_type.type_name);
        let key = actual.key();
        match api.find_images_for_step(&actual.id) {
            Ok(images) => actual.images = images.into_iter().map(to_actual_image).collect(),
            Err(err) => degrade(state, ReadScope::Images { step: key }, &err),
        }
        state.steps.push(actual);
    }
}

fn degrade(state: &mut ActualState, scope: ReadScope, err: &ApiError) {
    tracing::warn!(assembly = %state.assembly_name, %scope, error = %err, "read failed; treating as empty");
    state.warnings.push(ReadWarning {
        scope,
        reason: err.to_string(),
    });
}

fn to_actual_step(step: StepRef, type_name: &str) -> ActualStep {
    ActualStep {
        id: step.id,
        plugin_type_id: step.plugin_type_id,
        type_name: type_name.to_owned(),
        message: step.message,
        primary_entity: step.primary_entity,
        secondary_entity: step.secondary_entity.filter(|s| !s.is_empty()),
        stage: step.stage,
        mode: step.mode,
        execution_order: step.execution_order,
        filtering_attributes: step.filtering_attributes,
        configuration: step.configuration,
        images: Vec::new(),
    }
}

fn to_actual_image(image: ImageRef) -> ActualImage {
    ActualImage {
        id: image.id,
        name: image.name,
        image_type: image.image_type,
        entity_alias: image.entity_alias,
        attributes: image.attributes,
    }
}

