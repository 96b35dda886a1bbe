//! Field comparison rules shared by drift detection and reconciliation.
//!
//! - stage / mode / image type: enum equality
//! - execution order: numeric
//! - filtering attributes / image attributes: order-insensitive,
//!   case-insensitive set; absent and empty are equal
//! - configuration: exact string; absent and empty are equal
//! - entity alias: exact string

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use stepsync_core::{ActualImage, ActualStep, ImageRegistration, StepRegistration};

/// A comparable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Stage,
    Mode,
    ExecutionOrder,
    FilteringAttributes,
    Configuration,
    ImageType,
    EntityAlias,
    Attributes,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Stage => "stage",
            Field::Mode => "mode",
            Field::ExecutionOrder => "execution_order",
            Field::FilteringAttributes => "filtering_attributes",
            Field::Configuration => "configuration",
            Field::ImageType => "image_type",
            Field::EntityAlias => "entity_alias",
            Field::Attributes => "attributes",
        })
    }
}

/// One field whose desired and actual values differ, both rendered for
/// display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDifference {
    pub field: Field,
    pub desired: String,
    pub actual: String,
}

impl FieldDifference {
    fn new(field: Field, desired: impl ToString, actual: impl ToString) -> Self {
        Self {
            field,
            desired: desired.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Differences between a desired step and the actual step with the same key.
pub fn step_differences(desired: &StepRegistration, actual: &ActualStep) -> Vec<FieldDifference> {
    let mut diffs = Vec::new();
    if desired.stage != actual.stage {
        diffs.push(FieldDifference::new(Field::Stage, desired.stage, actual.stage));
    }
    if desired.mode != actual.mode {
        diffs.push(FieldDifference::new(Field::Mode, desired.mode, actual.mode));
    }
    if desired.execution_order != actual.execution_order {
        diffs.push(FieldDifference::new(
            Field::ExecutionOrder,
            desired.execution_order,
            actual.execution_order,
        ));
    }
    let (want, have) = (
        desired.filtering_attributes.as_deref(),
        actual.filtering_attributes.as_deref(),
    );
    if !same_attributes(want, have) {
        diffs.push(FieldDifference::new(
            Field::FilteringAttributes,
            render_set(want),
            render_set(have),
        ));
    }
    let (want, have) = (
        desired.configuration.as_deref(),
        actual.configuration.as_deref(),
    );
    if !same_blob(want, have) {
        diffs.push(FieldDifference::new(
            Field::Configuration,
            want.unwrap_or_default(),
            have.unwrap_or_default(),
        ));
    }
    diffs
}

/// Differences between a desired image and the actual image with the same
/// key. A [`Field::ImageType`] entry means the image must be replaced.
pub fn image_differences(
    desired: &ImageRegistration,
    actual: &ActualImage,
) -> Vec<FieldDifference> {
    let mut diffs = Vec::new();
    if desired.image_type != actual.image_type {
        diffs.push(FieldDifference::new(
            Field::ImageType,
            desired.image_type,
            actual.image_type,
        ));
    }
    if desired.entity_alias() != actual.entity_alias {
        diffs.push(FieldDifference::new(
            Field::EntityAlias,
            desired.entity_alias(),
            &actual.entity_alias,
        ));
    }
    let (want, have) = (desired.attributes.as_deref(), actual.attributes.as_deref());
    if !same_attributes(want, have) {
        diffs.push(FieldDifference::new(
            Field::Attributes,
            render_set(want),
            render_set(have),
        ));
    }
    diffs
}

/// Normalized attribute set: trimmed, lowercased, empties dropped.
pub fn attribute_set(value: Option<&str>) -> BTreeSet<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|a| a.trim().to_ascii_lowercase())
        .filter(|a| !a.is_empty())
        .collect()
}

pub fn same_attributes(a: Option<&str>, b: Option<&str>) -> bool {
    attribute_set(a) == attribute_set(b)
}

/// Opaque blob equality with absent == empty.
pub fn same_blob(a: Option<&str>, b: Option<&str>) -> bool {
    a.unwrap_or_default() == b.unwrap_or_default()
}

fn render_set(value: Option<&str>) -> String {
    attribute_set(value).into_iter().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use stepsync_core::{ImageType, Mode, RemoteId, Stage};

    use super::*;

    #[rstest]
    #[case(None, None, true)]
    #[case(Some(""), None, true)]
    #[case(Some("name,accountnumber"), Some("accountnumber, name"), true)]
    #[case(Some("Name"), Some("name"), true)]
    #[case(Some("name,"), Some("name"), true)]
    #[case(Some("name"), Some("name,telephone1"), false)]
    #[case(Some("name"), None, false)]
    fn attribute_sets(#[case] a: Option<&str>, #[case] b: Option<&str>, #[case] same: bool) {
        assert_eq!(same_attributes(a, b), same);
    }

    #[rstest]
    #[case(None, Some(""), true)]
    #[case(Some("{\"a\":1}"), Some("{\"a\":1}"), true)]
    #[case(Some("{\"a\":1}"), Some("{ \"a\": 1 }"), false)]
    #[case(Some("x"), None, false)]
    fn blobs(#[case] a: Option<&str>, #[case] b: Option<&str>, #[case] same: bool) {
        assert_eq!(same_blob(a, b), same);
    }

    fn desired_step() -> StepRegistration {
        StepRegistration {
            message: "Update".to_string(),
            primary_entity: "account".to_string(),
            secondary_entity: None,
            stage: Stage::PreOperation,
            mode: Mode::Synchronous,
            execution_order: 1,
            filtering_attributes: Some("name,telephone1".to_string()),
            configuration: None,
            name: None,
            description: None,
            images: vec![],
        }
    }

    fn actual_step() -> ActualStep {
        ActualStep {
            id: RemoteId::from("s1"),
            plugin_type_id: RemoteId::from("t1"),
            type_name: "T".to_string(),
            message: "Update".to_string(),
            primary_entity: "account".to_string(),
            secondary_entity: None,
            stage: Stage::PreOperation,
            mode: Mode::Synchronous,
            execution_order: 1,
            filtering_attributes: Some("telephone1,name".to_string()),
            configuration: Some(String::new()),
            images: vec![],
        }
    }

    #[test]
    fn equivalent_steps_have_no_differences() {
        assert!(step_differences(&desired_step(), &actual_step()).is_empty());
    }

    #[test]
    fn every_changed_field_is_reported() {
        let mut actual = actual_step();
        actual.mode = Mode::Asynchronous;
        actual.execution_order = 5;
        actual.configuration = Some("cfg".to_string());
        let diffs = step_differences(&desired_step(), &actual);
        let fields: Vec<_> = diffs.iter().map(|d| d.field).collect();
        assert_eq!(
            fields,
            [Field::Mode, Field::ExecutionOrder, Field::Configuration]
        );
        assert_eq!(diffs[1].desired, "1");
        assert_eq!(diffs[1].actual, "5");
    }

    #[test]
    fn image_type_change_is_reported_first() {
        let desired = ImageRegistration {
            name: "Image".to_string(),
            image_type: ImageType::PostImage,
            entity_alias: None,
            attributes: None,
        };
        let actual = ActualImage {
            id: RemoteId::from("i1"),
            name: "Image".to_string(),
            image_type: ImageType::PreImage,
            entity_alias: "Image".to_string(),
            attributes: Some("name".to_string()),
        };
        let diffs = image_differences(&desired, &actual);
        assert_eq!(diffs[0].field, Field::ImageType);
        assert_eq!(diffs[0].desired, "PostImage");
        assert_eq!(diffs[1].field, Field::Attributes);
        assert_eq!(diffs.len(), 2);
    }
}
