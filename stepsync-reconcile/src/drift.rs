//! Drift engine: desired vs actual, classified by identity key.
//!
//! Steps and images are matched by key only. Each side is walked in its own
//! order (desired: declaration order, actual: read order), so the same
//! inputs always give the same report. Images are only compared under steps
//! present on both sides.
//!
//! When the remote side holds several records with one key, the first read
//! is the match and the rest are reported as orphans.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use stepsync_core::{
    ActualImage, ActualState, ActualStep, AssemblyRegistration, RemoteId, StepKey,
    StepRegistration,
};

use crate::compare::{image_differences, step_differences, FieldDifference};

/// An entry present on one side only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftEntry {
    pub key: String,
    /// Remote id, for orphans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RemoteId>,
}

/// An entry present on both sides with differing fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModifiedEntry {
    pub key: String,
    pub id: RemoteId,
    pub differences: Vec<FieldDifference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub orphaned_steps: Vec<DriftEntry>,
    pub missing_steps: Vec<DriftEntry>,
    pub modified_steps: Vec<ModifiedEntry>,
    pub orphaned_images: Vec<DriftEntry>,
    pub missing_images: Vec<DriftEntry>,
    pub modified_images: Vec<ModifiedEntry>,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        self.total() > 0
    }

    pub fn total(&self) -> usize {
        self.orphaned_steps.len()
            + self.missing_steps.len()
            + self.modified_steps.len()
            + self.orphaned_images.len()
            + self.missing_images.len()
            + self.modified_images.len()
    }
}

/// Classify every step and image of `desired` against `actual`.
pub fn diff(desired: &AssemblyRegistration, actual: &ActualState) -> DriftReport {
    let mut report = DriftReport::default();
    let index = StepIndex::new(&actual.steps);
    let mut desired_keys = HashSet::new();

    for (plugin_type, step) in desired.steps() {
        let key = step.key(&plugin_type.full_type_name);
        match index.get(&key) {
            None => report.missing_steps.push(DriftEntry {
                key: key.to_string(),
                id: None,
            }),
            Some(actual_step) => {
                let differences = step_differences(step, actual_step);
                if !differences.is_empty() {
                    report.modified_steps.push(ModifiedEntry {
                        key: key.to_string(),
                        id: actual_step.id.clone(),
                        differences,
                    });
                }
                diff_images(step, &key, actual_step, &mut report);
            }
        }
        desired_keys.insert(key);
    }

    for orphan in index.orphans(&desired_keys) {
        report.orphaned_steps.push(DriftEntry {
            key: orphan.key().to_string(),
            id: Some(orphan.id.clone()),
        });
    }
    report
}

fn diff_images(
    step: &StepRegistration,
    step_key: &StepKey,
    actual_step: &ActualStep,
    report: &mut DriftReport,
) {
    let index = ImageIndex::new(&actual_step.images);
    let mut desired_names = HashSet::new();

    for image in &step.images {
        let key = image.key(step_key).to_string();
        match index.get(&image.name) {
            None => report.missing_images.push(DriftEntry { key, id: None }),
            Some(actual_image) => {
                let differences = image_differences(image, actual_image);
                if !differences.is_empty() {
                    report.modified_images.push(ModifiedEntry {
                        key,
                        id: actual_image.id.clone(),
                        differences,
                    });
                }
            }
        }
        desired_names.insert(image.name.as_str());
    }

    for orphan in index.orphans(&desired_names) {
        report.orphaned_images.push(DriftEntry {
            key: orphan.key(step_key).to_string(),
            id: Some(orphan.id.clone()),
        });
    }
}

// ---------------------------------------------------------------------------
// Key indexes
// ---------------------------------------------------------------------------

/// Actual steps by identity key; the first step read wins a key.
pub(crate) struct StepIndex<'a> {
    steps: &'a [ActualStep],
    first: HashMap<StepKey, usize>,
}

impl<'a> StepIndex<'a> {
    pub(crate) fn new(steps: &'a [ActualStep]) -> Self {
        let mut first = HashMap::new();
        for (i, step) in steps.iter().enumerate() {
            first.entry(step.key()).or_insert(i);
        }
        Self { steps, first }
    }

    pub(crate) fn get(&self, key: &StepKey) -> Option<&'a ActualStep> {
        self.first.get(key).and_then(|&i| self.steps.get(i))
    }

    /// Steps not claimed by `desired`, plus duplicates, in read order.
    pub(crate) fn orphans<'s>(
        &'s self,
        desired: &'s HashSet<StepKey>,
    ) -> impl Iterator<Item = &'a ActualStep> + 's {
        self.steps.iter().enumerate().filter_map(move |(i, step)| {
            let key = step.key();
            let is_match = desired.contains(&key) && self.first.get(&key) == Some(&i);
            (!is_match).then_some(step)
        })
    }
}

/// Actual images of one step by name; the first image read wins a name.
pub(crate) struct ImageIndex<'a> {
    images: &'a [ActualImage],
    first: HashMap<&'a str, usize>,
}

impl<'a> ImageIndex<'a> {
    pub(crate) fn new(images: &'a [ActualImage]) -> Self {
        let mut first = HashMap::new();
        for (i, image) in images.iter().enumerate() {
            first.entry(image.name.as_str()).or_insert(i);
        }
        Self { images, first }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&'a ActualImage> {
        self.first.get(name).and_then(|&i| self.images.get(i))
    }

    pub(crate) fn orphans<'s>(
        &'s self,
        desired: &'s HashSet<&'s str>,
    ) -> impl Iterator<Item = &'a ActualImage> + 's {
        self.images.iter().enumerate().filter_map(move |(i, image)| {
            let name = image.name.as_str();
            let is_match = desired.contains(name) && self.first.get(name) == Some(&i);
            (!is_match).then_some(image)
        })
    }
}
