//! Reconciler: converge the remote registrations toward the desired state.
//!
//! ## Per desired step (declaration order)
//!
//! 1. Key matches an actual step → update it if any comparable field
//!    differs, otherwise leave it alone.
//! 2. No match → resolve plugin type + message filter, then create it.
//! 3. Reconcile its images the same way, except that an image whose type
//!    changed is deleted and recreated (image type is immutable remotely).
//!
//! ## Orphans
//!
//! Actual entries without a desired counterpart are reported and left in
//! place unless `force_delete_orphans` is set. Each delete is independent.
//!
//! ## Failures
//!
//! Every failure is per entry: it is logged with the identity key, recorded
//! in [`ReconcileOutcome::failures`], and processing moves on. Nothing here
//! returns an error.
//!
//! In dry-run mode lookups run as usual but every write is replaced by a
//! `[dry-run] would ...` log line; counters move exactly as in a live run.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use stepsync_core::{
    ActualState, ActualStep, AssemblyRegistration, RemoteId, StepKey, StepRegistration,
};
use stepsync_remote::{
    message_property_name, ApiError, ImageUpdate, NewImage, NewStep, RegistrationApi, StepUpdate,
};

use crate::compare::{image_differences, step_differences, Field};
use crate::drift::{ImageIndex, StepIndex};

// ---------------------------------------------------------------------------
// Options & outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Log planned writes instead of issuing them.
    pub dry_run: bool,
    /// Delete orphaned steps and images instead of only reporting them.
    pub force_delete_orphans: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Step,
    Image,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Step => "step",
            EntityKind::Image => "image",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// Per-kind counters.
///
/// `created`/`updated`/`deleted` count successful (or, in dry-run, planned)
/// writes; `failed` counts entries whose write or prerequisite failed.
/// `orphaned` counts orphans left in place. Serialized with the derived
/// `attempted` total alongside the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(into = "TallyRecord")]
pub struct Tally {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub orphaned: usize,
    pub failed: usize,
}

impl Tally {
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Writes attempted, successful or not.
    pub fn attempted(&self) -> usize {
        self.changes() + self.failed
    }
}

#[derive(Serialize)]
struct TallyRecord {
    created: usize,
    updated: usize,
    deleted: usize,
    unchanged: usize,
    orphaned: usize,
    failed: usize,
    attempted: usize,
}

impl From<Tally> for TallyRecord {
    fn from(tally: Tally) -> Self {
        Self {
            created: tally.created,
            updated: tally.updated,
            deleted: tally.deleted,
            unchanged: tally.unchanged,
            orphaned: tally.orphaned,
            failed: tally.failed,
            attempted: tally.attempted(),
        }
    }
}

/// A write that was applied, or planned in dry-run mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub kind: EntityKind,
    pub operation: Operation,
    pub key: String,
    /// `false` when only planned.
    pub applied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    pub kind: EntityKind,
    pub operation: Operation,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub dry_run: bool,
    pub steps: Tally,
    pub images: Tally,
    /// Writes in the order they were issued (or planned).
    pub actions: Vec<Action>,
    pub failures: Vec<EntryFailure>,
    /// Keys of orphans left in place.
    pub orphans: Vec<String>,
}

impl ReconcileOutcome {
    pub fn changes(&self) -> usize {
        self.steps.changes() + self.images.changes()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn tally(&mut self, kind: EntityKind) -> &mut Tally {
        match kind {
            EntityKind::Step => &mut self.steps,
            EntityKind::Image => &mut self.images,
        }
    }

    fn record(&mut self, kind: EntityKind, operation: Operation, key: &str, applied: bool) {
        let tally = self.tally(kind);
        match operation {
            Operation::Create => tally.created += 1,
            Operation::Update => tally.updated += 1,
            Operation::Delete => tally.deleted += 1,
        }
        self.actions.push(Action {
            kind,
            operation,
            key: key.to_owned(),
            applied,
        });
    }

    fn fail(&mut self, kind: EntityKind, operation: Operation, key: &str, reason: String) {
        tracing::error!(%kind, %operation, key, %reason, "registration failed");
        self.tally(kind).failed += 1;
        self.failures.push(EntryFailure {
            kind,
            operation,
            key: key.to_owned(),
            reason,
        });
    }

    fn leave_orphan(&mut self, kind: EntityKind, key: &str) {
        tracing::warn!(%kind, key, "orphan left in place (use force to delete)");
        self.tally(kind).orphaned += 1;
        self.orphans.push(key.to_owned());
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

enum Applied<T> {
    Done(T),
    Planned,
    Failed,
}

/// Where a desired step's images go.
enum StepTarget<'a> {
    /// The step exists remotely (matched or just created).
    Existing {
        id: RemoteId,
        actual: Option<&'a ActualStep>,
    },
    /// Dry-run create: no id yet.
    Planned,
    /// The step could not be registered.
    Unavailable,
}

pub struct Reconciler<'a, A: RegistrationApi + ?Sized> {
    api: &'a mut A,
    options: ReconcileOptions,
}

impl<'a, A: RegistrationApi + ?Sized> Reconciler<'a, A> {
    pub fn new(api: &'a mut A, options: ReconcileOptions) -> Self {
        Self { api, options }
    }

    /// Converge `actual` toward `desired`.
    pub fn reconcile(
        &mut self,
        desired: &AssemblyRegistration,
        actual: &ActualState,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome {
            dry_run: self.options.dry_run,
            ..ReconcileOutcome::default()
        };
        let index = StepIndex::new(&actual.steps);
        let mut desired_keys = HashSet::new();
        let solution = desired.target_container.as_deref();

        for (plugin_type, step) in desired.steps() {
            let type_name = plugin_type.full_type_name.as_str();
            let key = step.key(type_name);
            let target = match index.get(&key) {
                Some(actual_step) => self.converge_step(step, &key, actual_step, &mut outcome),
                None => self.create_step(step, type_name, &key, actual, solution, &mut outcome),
            };
            self.reconcile_images(step, &key, &target, actual, solution, &mut outcome);
            desired_keys.insert(key);
        }

        for orphan in index.orphans(&desired_keys) {
            let key = orphan.key().to_string();
            if self.options.force_delete_orphans {
                let id = orphan.id.clone();
                self.apply(&mut outcome, EntityKind::Step, Operation::Delete, &key, |api| {
                    api.delete_step(&id)
                });
            } else {
                outcome.leave_orphan(EntityKind::Step, &key);
            }
        }

        tracing::info!(
            assembly = %desired.name,
            dry_run = self.options.dry_run,
            step_changes = outcome.steps.changes(),
            image_changes = outcome.images.changes(),
            failures = outcome.failures.len(),
            orphans = outcome.orphans.len(),
            "reconciled"
        );
        outcome
    }

    fn converge_step<'s>(
        &mut self,
        step: &StepRegistration,
        key: &StepKey,
        actual_step: &'s ActualStep,
        outcome: &mut ReconcileOutcome,
    ) -> StepTarget<'s> {
        let differences = step_differences(step, actual_step);
        if differences.is_empty() {
            tracing::debug!(key = %key, "step unchanged");
            outcome.steps.unchanged += 1;
        } else {
            let fields: Vec<String> = differences.iter().map(|d| d.field.to_string()).collect();
            tracing::debug!(key = %key, fields = %fields.join(","), "step differs");
            let update = StepUpdate {
                mode: step.mode,
                execution_order: step.execution_order,
                filtering_attributes: step.filtering_attributes.clone(),
                configuration: step.configuration.clone(),
            };
            let id = actual_step.id.clone();
            self.apply(
                outcome,
                EntityKind::Step,
                Operation::Update,
                key.as_str(),
                |api| api.update_step(&id, &update),
            );
        }
        StepTarget::Existing {
            id: actual_step.id.clone(),
            actual: Some(actual_step),
        }
    }

    fn create_step<'s>(
        &mut self,
        step: &StepRegistration,
        type_name: &str,
        key: &StepKey,
        actual: &ActualState,
        solution: Option<&str>,
        outcome: &mut ReconcileOutcome,
    ) -> StepTarget<'s> {
        let fail = |outcome: &mut ReconcileOutcome, reason: String| {
            outcome.fail(EntityKind::Step, Operation::Create, key.as_str(), reason);
            StepTarget::Unavailable
        };

        if actual.steps_unknown(type_name) {
            return fail(
                outcome,
                format!("registered steps of {type_name} could not be read"),
            );
        }
        let Some(plugin_type_id) = actual.plugin_type_id(type_name) else {
            return fail(outcome, format!("plugin type {type_name} is not registered"));
        };
        let filter = match self.api.resolve_message_filter(
            &step.message,
            &step.primary_entity,
            step.secondary_entity.as_deref(),
        ) {
            Ok(Some(filter)) => filter,
            Ok(None) => {
                return fail(
                    outcome,
                    format!(
                        "no message filter for {} on {}",
                        step.message, step.primary_entity
                    ),
                )
            }
            Err(err) => return fail(outcome, format!("message filter lookup failed: {err}")),
        };

        let new_step = NewStep {
            plugin_type_id: plugin_type_id.clone(),
            filter,
            message: step.message.clone(),
            primary_entity: step.primary_entity.clone(),
            secondary_entity: step.secondary_entity.clone(),
            name: step.display_name(type_name),
            description: step.description.clone(),
            stage: step.stage,
            mode: step.mode,
            execution_order: step.execution_order,
            filtering_attributes: step.filtering_attributes.clone(),
            configuration: step.configuration.clone(),
            solution: solution.map(str::to_owned),
        };
        match self.apply(
            outcome,
            EntityKind::Step,
            Operation::Create,
            key.as_str(),
            |api| api.create_step(&new_step),
        ) {
            Applied::Done(id) => StepTarget::Existing { id, actual: None },
            Applied::Planned => StepTarget::Planned,
            Applied::Failed => StepTarget::Unavailable,
        }
    }

    fn reconcile_images(
        &mut self,
        step: &StepRegistration,
        step_key: &StepKey,
        target: &StepTarget<'_>,
        actual: &ActualState,
        solution: Option<&str>,
        outcome: &mut ReconcileOutcome,
    ) {
        let (step_id, actual_step) = match target {
            StepTarget::Existing { id, actual: found } => (Some(id), *found),
            StepTarget::Planned => (None, None),
            StepTarget::Unavailable => {
                for image in &step.images {
                    outcome.fail(
                        EntityKind::Image,
                        Operation::Create,
                        image.key(step_key).as_str(),
                        format!("step {step_key} is not registered"),
                    );
                }
                return;
            }
        };

        if actual_step.is_some() && actual.images_unknown(step_key) {
            for image in &step.images {
                outcome.fail(
                    EntityKind::Image,
                    Operation::Create,
                    image.key(step_key).as_str(),
                    format!("registered images of {step_key} could not be read"),
                );
            }
            return;
        }

        let existing = actual_step.map(|s| s.images.as_slice()).unwrap_or_default();
        let index = ImageIndex::new(existing);
        let mut desired_names = HashSet::new();

        for image in &step.images {
            desired_names.insert(image.name.as_str());
            let key = image.key(step_key).to_string();
            let new_image = NewImage {
                step_id: step_id.cloned().unwrap_or_else(|| RemoteId(String::new())),
                name: image.name.clone(),
                image_type: image.image_type,
                entity_alias: image.entity_alias().to_owned(),
                attributes: image.attributes.clone(),
                message_property_name: message_property_name(&step.message).to_owned(),
                solution: solution.map(str::to_owned),
            };

            let Some(actual_image) = index.get(&image.name) else {
                self.apply(outcome, EntityKind::Image, Operation::Create, &key, |api| {
                    api.create_image(&new_image)
                });
                continue;
            };

            let differences = image_differences(image, actual_image);
            if differences.is_empty() {
                tracing::debug!(key = %key, "image unchanged");
                outcome.images.unchanged += 1;
            } else if differences.iter().any(|d| d.field == Field::ImageType) {
                tracing::info!(
                    key = %key,
                    from = %actual_image.image_type,
                    to = %image.image_type,
                    "image type changed; replacing"
                );
                let id = actual_image.id.clone();
                let deleted = self.apply(outcome, EntityKind::Image, Operation::Delete, &key, |api| {
                    api.delete_image(&id)
                });
                if !matches!(deleted, Applied::Failed) {
                    self.apply(outcome, EntityKind::Image, Operation::Create, &key, |api| {
                        api.create_image(&new_image)
                    });
                }
            } else {
                let update = ImageUpdate {
                    entity_alias: new_image.entity_alias.clone(),
                    attributes: new_image.attributes.clone(),
                };
                let id = actual_image.id.clone();
                self.apply(outcome, EntityKind::Image, Operation::Update, &key, |api| {
                    api.update_image(&id, &update)
                });
            }
        }

        for orphan in index.orphans(&desired_names) {
            let key = orphan.key(step_key).to_string();
            if self.options.force_delete_orphans {
                let id = orphan.id.clone();
                self.apply(outcome, EntityKind::Image, Operation::Delete, &key, |api| {
                    api.delete_image(&id)
                });
            } else {
                outcome.leave_orphan(EntityKind::Image, &key);
            }
        }
    }

    /// Issue one write, or only log it in dry-run mode, and record the result.
    fn apply<T>(
        &mut self,
        outcome: &mut ReconcileOutcome,
        kind: EntityKind,
        operation: Operation,
        key: &str,
        call: impl FnOnce(&mut A) -> Result<T, ApiError>,
    ) -> Applied<T> {
        if self.options.dry_run {
            tracing::info!(key, "[dry-run] would {operation} {kind}");
            outcome.record(kind, operation, key, false);
            return Applied::Planned;
        }
        match call(&mut *self.api) {
            Ok(value) => {
                tracing::info!(key, "{operation}d {kind}");
                outcome.record(kind, operation, key, true);
                Applied::Done(value)
            }
            Err(err) => {
                outcome.fail(kind, operation, key, err.to_string());
                Applied::Failed
            }
        }
    }
}

/// Reconcile `desired` against `actual` through `api`.
pub fn reconcile<A>(
    api: &mut A,
    desired: &AssemblyRegistration,
    actual: &ActualState,
    options: ReconcileOptions,
) -> ReconcileOutcome
where
    A: RegistrationApi + ?Sized,
{
    Reconciler::new(api, options).reconcile(desired, actual)
}
