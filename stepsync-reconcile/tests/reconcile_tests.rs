//! Reconciler and pipeline behaviour against the call-counting in-memory API.

use stepsync_core::{
    ActualImage, ActualPluginType, ActualState, ActualStep, AssemblyKind, AssemblyRegistration,
    ImageRegistration, ImageType, Mode, PluginTypeRegistration, RemoteId, Stage,
    StepRegistration,
};
use stepsync_reconcile::{
    diff, reconcile, run, run_all, EntityKind, Field, Operation, ReconcileOptions, RunOptions,
    RunStatus, SyncError,
};
use stepsync_remote::{read_actual, InMemoryApi, WriteCall};

const ASSEMBLY: &str = "Contoso.Plugins";
const TYPE: &str = "Contoso.Plugins.AccountHandler";

fn step(message: &str) -> StepRegistration {
    StepRegistration {
        message: message.to_string(),
        primary_entity: "account".to_string(),
        secondary_entity: None,
        stage: Stage::PreOperation,
        mode: Mode::Synchronous,
        execution_order: 1,
        filtering_attributes: None,
        configuration: None,
        name: None,
        description: None,
        images: vec![],
    }
}

fn image(name: &str, image_type: ImageType) -> ImageRegistration {
    ImageRegistration {
        name: name.to_string(),
        image_type,
        entity_alias: None,
        attributes: None,
    }
}

fn desired(steps: Vec<StepRegistration>) -> AssemblyRegistration {
    AssemblyRegistration {
        name: ASSEMBLY.to_string(),
        kind: AssemblyKind::NativeBinary,
        target_container: None,
        plugin_types: vec![PluginTypeRegistration {
            full_type_name: TYPE.to_string(),
            steps,
        }],
    }
}

fn actual_step(id: &str, message: &str) -> ActualStep {
    ActualStep {
        id: RemoteId::from(id),
        plugin_type_id: RemoteId::from("t1"),
        type_name: TYPE.to_string(),
        message: message.to_string(),
        primary_entity: "account".to_string(),
        secondary_entity: None,
        stage: Stage::PreOperation,
        mode: Mode::Synchronous,
        execution_order: 1,
        filtering_attributes: None,
        configuration: None,
        images: vec![],
    }
}

fn actual_image(id: &str, name: &str, image_type: ImageType) -> ActualImage {
    ActualImage {
        id: RemoteId::from(id),
        name: name.to_string(),
        image_type,
        entity_alias: name.to_string(),
        attributes: None,
    }
}

fn seeded(steps: Vec<ActualStep>) -> InMemoryApi {
    InMemoryApi::from_state(&ActualState {
        assembly_name: ASSEMBLY.to_string(),
        assembly_id: Some(RemoteId::from("asm-1")),
        plugin_types: vec![ActualPluginType {
            id: RemoteId::from("t1"),
            type_name: TYPE.to_string(),
        }],
        steps,
        warnings: vec![],
    })
}

fn live(force: bool) -> RunOptions {
    RunOptions::reconcile(false, force)
}

#[test]
fn new_step_is_created_before_its_images() {
    let mut wanted = step("Update");
    wanted.images = vec![
        image("PreImage", ImageType::PreImage),
        image("PostImage", ImageType::PostImage),
    ];
    let mut api = seeded(vec![]);

    let result = run(&mut api, &desired(vec![wanted]), &live(false)).expect("run");

    let counts = api.counts();
    assert_eq!(counts.step_creates, 1);
    assert_eq!(counts.image_creates, 2);
    assert_eq!(counts.writes(), 3);
    let WriteCall::CreateStep { name } = &api.calls()[0] else {
        panic!("first call must create the step: {:?}", api.calls());
    };
    assert_eq!(name, "Contoso.Plugins.AccountHandler: Update of account");
    let step_ids: Vec<_> = api.calls()[1..]
        .iter()
        .map(|call| match call {
            WriteCall::CreateImage { step_id, .. } => step_id.clone(),
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(step_ids[0], step_ids[1]);

    let outcome = result.outcome.expect("outcome");
    assert_eq!(outcome.steps.created, 1);
    assert_eq!(outcome.images.created, 2);
    assert_eq!(result.status, RunStatus::Converged);
}

#[test]
fn second_run_issues_no_writes() {
    let mut wanted = step("Update");
    wanted.filtering_attributes = Some("name,telephone1".to_string());
    wanted.configuration = Some("{\"mode\":\"strict\"}".to_string());
    wanted.images = vec![image("PreImage", ImageType::PreImage)];
    let desired = desired(vec![wanted, step("Create")]);
    let mut api = seeded(vec![]);

    run(&mut api, &desired, &live(false)).expect("first run");
    api.reset_calls();
    let second = run(&mut api, &desired, &live(false)).expect("second run");

    assert_eq!(api.counts().writes(), 0, "calls: {:?}", api.calls());
    let outcome = second.outcome.expect("outcome");
    assert_eq!(outcome.steps.unchanged, 2);
    assert_eq!(outcome.images.unchanged, 1);
    assert_eq!(second.status, RunStatus::Converged);
}

#[test]
fn changed_execution_order_is_a_single_update() {
    let mut have = actual_step("s1", "Create");
    have.execution_order = 5;
    let mut api = seeded(vec![have]);

    let result = run(&mut api, &desired(vec![step("Create")]), &live(false)).expect("run");

    assert_eq!(api.calls(), [WriteCall::UpdateStep { id: RemoteId::from("s1") }]);
    assert_eq!(api.counts().step_creates, 0);
    let outcome = result.outcome.expect("outcome");
    assert_eq!(outcome.steps.updated, 1);
    assert_eq!(outcome.actions[0].key, "Contoso.Plugins.AccountHandler|Create|account||PreOperation");
}

#[test]
fn image_type_change_replaces_the_image() {
    let mut have = actual_step("s1", "Update");
    have.images = vec![actual_image("i1", "Image", ImageType::PreImage)];
    let mut wanted = step("Update");
    wanted.images = vec![image("Image", ImageType::PostImage)];
    let mut api = seeded(vec![have]);

    let result = run(&mut api, &desired(vec![wanted]), &live(false)).expect("run");

    assert_eq!(
        api.calls(),
        [
            WriteCall::DeleteImage { id: RemoteId::from("i1") },
            WriteCall::CreateImage {
                step_id: RemoteId::from("s1"),
                name: "Image".to_string(),
            },
        ]
    );
    let outcome = result.outcome.expect("outcome");
    assert_eq!(outcome.images.deleted, 1);
    assert_eq!(outcome.images.created, 1);
    assert_eq!(outcome.images.updated, 0);
}

#[test]
fn changed_image_attributes_are_updated_in_place() {
    let mut have = actual_step("s1", "Update");
    have.images = vec![actual_image("i1", "Image", ImageType::PreImage)];
    let mut wanted = step("Update");
    let mut wanted_image = image("Image", ImageType::PreImage);
    wanted_image.attributes = Some("name".to_string());
    wanted.images = vec![wanted_image];
    let mut api = seeded(vec![have]);

    run(&mut api, &desired(vec![wanted]), &live(false)).expect("run");

    assert_eq!(api.calls(), [WriteCall::UpdateImage { id: RemoteId::from("i1") }]);
}

#[test]
fn dry_run_counts_match_live_run_without_writes() {
    let mut wanted = step("Update");
    wanted.images = vec![image("PreImage", ImageType::PreImage)];
    let mut stale = actual_step("s1", "Create");
    stale.mode = Mode::Asynchronous;
    let desired = desired(vec![step("Create"), wanted]);

    let mut dry_api = seeded(vec![stale.clone()]);
    let dry = run(&mut dry_api, &desired, &RunOptions::reconcile(true, false)).expect("dry");
    let mut live_api = seeded(vec![stale]);
    let real = run(&mut live_api, &desired, &live(false)).expect("live");

    assert_eq!(dry_api.counts().writes(), 0);
    assert_eq!(live_api.counts().writes(), 3);
    let (dry, real) = (dry.outcome.expect("dry"), real.outcome.expect("live"));
    assert_eq!(dry.steps, real.steps);
    assert_eq!(dry.images, real.images);
    assert!(dry.actions.iter().all(|a| !a.applied));
    assert!(real.actions.iter().all(|a| a.applied));
}

#[test]
fn dry_run_with_planned_changes_leaves_drift_remaining() {
    let mut api = seeded(vec![]);
    let result = run(
        &mut api,
        &desired(vec![step("Create")]),
        &RunOptions::reconcile(true, false),
    )
    .expect("run");
    assert_eq!(result.status, RunStatus::DriftRemaining);
    assert_eq!(result.status.exit_code(), 2);
}

#[test]
fn dry_run_result_itemizes_the_drift_it_plans_to_close() {
    let mut stale = actual_step("s1", "Create");
    stale.execution_order = 4;
    let mut api = seeded(vec![stale]);

    let result = run(
        &mut api,
        &desired(vec![step("Create"), step("Update")]),
        &RunOptions::reconcile(true, false),
    )
    .expect("run");

    assert_eq!(api.counts().writes(), 0);
    let drift = result.drift.expect("dry run carries a drift report");
    assert_eq!(
        drift.missing_steps[0].key,
        "Contoso.Plugins.AccountHandler|Update|account||PreOperation"
    );
    assert_eq!(drift.modified_steps[0].id, RemoteId::from("s1"));
    assert_eq!(drift.modified_steps[0].differences[0].field, Field::ExecutionOrder);
    assert!(result.outcome.is_some());

    let live_result = run(&mut seeded(vec![]), &desired(vec![step("Create")]), &live(false))
        .expect("live");
    assert!(live_result.drift.is_none());
}

#[test]
fn orphans_are_reported_unless_forced() {
    let mut orphan = actual_step("s9", "Delete");
    orphan.images = vec![actual_image("i9", "PreImage", ImageType::PreImage)];
    let desired = desired(vec![]);

    let mut api = seeded(vec![orphan.clone()]);
    let kept = run(&mut api, &desired, &live(false)).expect("unforced");
    assert_eq!(api.counts().step_deletes, 0);
    let outcome = kept.outcome.expect("outcome");
    assert_eq!(outcome.steps.orphaned, 1);
    assert_eq!(
        outcome.orphans,
        ["Contoso.Plugins.AccountHandler|Delete|account||PreOperation"]
    );
    assert_eq!(kept.status, RunStatus::DriftRemaining);

    let mut api = seeded(vec![orphan]);
    let forced = run(&mut api, &desired, &live(true)).expect("forced");
    assert_eq!(api.calls(), [WriteCall::DeleteStep { id: RemoteId::from("s9") }]);
    assert_eq!(forced.outcome.expect("outcome").steps.deleted, 1);
    assert_eq!(forced.status, RunStatus::Converged);
}

#[test]
fn orphan_images_under_desired_step_follow_force_flag() {
    let mut have = actual_step("s1", "Update");
    have.images = vec![actual_image("i1", "Legacy", ImageType::PreImage)];

    let mut api = seeded(vec![have.clone()]);
    let kept = run(&mut api, &desired(vec![step("Update")]), &live(false)).expect("run");
    assert_eq!(api.counts().writes(), 0);
    assert_eq!(kept.outcome.expect("outcome").images.orphaned, 1);

    let mut api = seeded(vec![have]);
    run(&mut api, &desired(vec![step("Update")]), &live(true)).expect("run");
    assert_eq!(api.calls(), [WriteCall::DeleteImage { id: RemoteId::from("i1") }]);
}

#[test]
fn failed_orphan_delete_does_not_block_the_next() {
    let mut api = seeded(vec![actual_step("s8", "Assign"), actual_step("s9", "Delete")]);
    api.reject_writes_to("s8");

    let result = run(&mut api, &desired(vec![]), &live(true)).expect("run");

    assert_eq!(api.counts().step_deletes, 2);
    let outcome = result.outcome.expect("outcome");
    assert_eq!(outcome.steps.deleted, 1);
    assert_eq!(outcome.steps.failed, 1);
    assert_eq!(outcome.failures[0].operation, Operation::Delete);
    assert_eq!(result.status, RunStatus::Failed);
}

#[test]
fn missing_message_filter_fails_only_that_step() {
    let mut broken = step("Create");
    broken.images = vec![image("PostImage", ImageType::PostImage)];
    let mut api = seeded(vec![]);
    api.without_filter("Create", "account");

    let result = run(&mut api, &desired(vec![broken, step("Update")]), &live(false)).expect("run");

    assert_eq!(api.counts().step_creates, 1, "only Update reaches the API");
    assert_eq!(api.counts().image_creates, 0);
    let outcome = result.outcome.expect("outcome");
    assert_eq!(outcome.steps.created, 1);
    assert_eq!(outcome.steps.failed, 1);
    assert_eq!(outcome.images.failed, 1);
    let step_failure = &outcome.failures[0];
    assert_eq!(step_failure.kind, EntityKind::Step);
    assert_eq!(
        step_failure.key,
        "Contoso.Plugins.AccountHandler|Create|account||PreOperation"
    );
    assert!(step_failure.reason.contains("no message filter"));
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.status.exit_code(), 1);
}

#[test]
fn rejected_write_is_recorded_and_the_run_continues() {
    let mut api = seeded(vec![]);
    api.reject_writes_to("Contoso.Plugins.AccountHandler: Create of account");

    let result = run(&mut api, &desired(vec![step("Create"), step("Update")]), &live(false))
        .expect("run");

    assert_eq!(api.counts().step_creates, 2);
    let outcome = result.outcome.expect("outcome");
    assert_eq!(outcome.steps.created, 1);
    assert_eq!(outcome.steps.failed, 1);
    assert!(outcome.failures[0].reason.contains("locked"));
}

#[test]
fn unregistered_plugin_type_fails_its_steps() {
    let mut api = InMemoryApi::new();
    let assembly_id = api.register_assembly(ASSEMBLY);
    api.register_plugin_type(&assembly_id, "Contoso.Plugins.ContactHandler");

    let result = run(&mut api, &desired(vec![step("Create")]), &live(false)).expect("run");

    assert_eq!(api.counts().writes(), 0);
    let outcome = result.outcome.expect("outcome");
    assert!(outcome.failures[0].reason.contains("not registered"));

    api.register_plugin_type(&assembly_id, TYPE);
    let retried = run(&mut api, &desired(vec![step("Create")]), &live(false)).expect("retry");
    assert_eq!(api.counts().step_creates, 1);
    assert_eq!(retried.status, RunStatus::Converged);
}

#[test]
fn unreadable_steps_are_never_recreated() {
    let mut api = seeded(vec![actual_step("s1", "Create")]);
    api.fail_reads_under(&RemoteId::from("t1"));

    let result = run(&mut api, &desired(vec![step("Create")]), &live(false)).expect("run");

    assert_eq!(api.counts().writes(), 0);
    assert_eq!(result.read_warnings.len(), 1);
    assert_eq!(result.status, RunStatus::Failed);
}

#[test]
fn unreadable_images_are_never_recreated() {
    let mut have = actual_step("s1", "Update");
    have.images = vec![actual_image("i1", "PreImage", ImageType::PreImage)];
    let mut wanted = step("Update");
    wanted.images = vec![image("PreImage", ImageType::PreImage)];
    let mut api = seeded(vec![have]);
    api.fail_reads_under(&RemoteId::from("s1"));

    let result = run(&mut api, &desired(vec![wanted]), &live(false)).expect("run");

    assert_eq!(api.counts().image_creates, 0);
    let outcome = result.outcome.expect("outcome");
    assert_eq!(outcome.steps.unchanged, 1);
    assert_eq!(outcome.images.failed, 1);
}

#[test]
fn drift_only_run_never_writes() {
    let mut have = actual_step("s1", "Create");
    have.execution_order = 5;
    let mut api = seeded(vec![have]);

    let result = run(&mut api, &desired(vec![step("Create")]), &RunOptions::drift_only())
        .expect("run");

    assert_eq!(api.counts().writes(), 0);
    assert!(result.outcome.is_none());
    assert_eq!(result.drift.expect("drift").modified_steps.len(), 1);
    assert_eq!(result.status, RunStatus::DriftRemaining);
}

#[test]
fn invalid_desired_state_aborts_before_reading() {
    let mut bad = desired(vec![step("Create")]);
    bad.kind = AssemblyKind::Package;
    let mut api = seeded(vec![]);

    let err = run(&mut api, &bad, &live(false)).expect_err("must fail");
    assert!(matches!(err, SyncError::InvalidDesired { .. }));
    assert_eq!(err.assembly(), ASSEMBLY);
}

#[test]
fn run_all_continues_past_an_aborted_assembly() {
    let mut bad = desired(vec![step("Create")]);
    bad.name = "Broken.Plugins".to_string();
    bad.kind = AssemblyKind::Package;
    let good = desired(vec![step("Create")]);
    let mut api = seeded(vec![]);

    let results = run_all(&mut api, &[bad, good], &live(false));

    assert!(results[0].is_err());
    let good = results[1].as_ref().expect("second assembly runs");
    assert_eq!(good.status, RunStatus::Converged);
    assert_eq!(api.counts().step_creates, 1);
}

#[test]
fn package_steps_are_created_into_the_target_container() {
    let mut packaged = desired(vec![step("Create")]);
    packaged.kind = AssemblyKind::Package;
    packaged.target_container = Some("ContosoCore".to_string());
    let mut api = seeded(vec![]);
    let actual = read_actual(&api, ASSEMBLY).expect("read");

    let outcome = reconcile(&mut api, &packaged, &actual, ReconcileOptions::default());

    assert_eq!(outcome.steps.created, 1);
    assert!(diff(&packaged, &read_actual(&api, ASSEMBLY).expect("reread"))
        .missing_steps
        .is_empty());
}

mod properties {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use proptest::sample::subsequence;

    use super::*;

    const MESSAGES: [&str; 6] = ["Create", "Update", "Delete", "Assign", "Merge", "SetState"];
    const IMAGE_NAMES: [&str; 3] = ["PreImage", "PostImage", "Snapshot"];
    const COLUMNS: [&str; 4] = ["name", "telephone1", "revenue", "ownerid"];

    type Settings = (Mode, u32, Option<String>, Option<String>);
    type Shape = (&'static str, Settings, Vec<ImageRegistration>);

    fn key(message: &str) -> String {
        format!("{TYPE}|{message}|account||PreOperation")
    }

    fn columns() -> impl Strategy<Value = Option<String>> {
        subsequence(COLUMNS.to_vec(), 0..=COLUMNS.len())
            .prop_map(|cols| (!cols.is_empty()).then(|| cols.join(",")))
    }

    fn settings() -> impl Strategy<Value = Settings> {
        (
            prop_oneof![Just(Mode::Synchronous), Just(Mode::Asynchronous)],
            1..10u32,
            columns(),
            prop::option::of(prop_oneof![
                Just("{\"strict\":true}".to_string()),
                Just("{\"strict\":false}".to_string()),
            ]),
        )
    }

    fn images() -> impl Strategy<Value = Vec<ImageRegistration>> {
        subsequence(IMAGE_NAMES.to_vec(), 0..=IMAGE_NAMES.len()).prop_flat_map(|names| {
            let shapes = prop::collection::vec(
                (
                    prop_oneof![
                        Just(ImageType::PreImage),
                        Just(ImageType::PostImage),
                        Just(ImageType::Both),
                    ],
                    prop::option::of("[a-z]{1,6}"),
                    columns(),
                ),
                names.len(),
            );
            shapes.prop_map(move |shapes| {
                names
                    .iter()
                    .zip(shapes)
                    .map(|(name, (image_type, entity_alias, attributes))| ImageRegistration {
                        name: name.to_string(),
                        image_type,
                        entity_alias,
                        attributes,
                    })
                    .collect()
            })
        })
    }

    /// Steps keyed by a subset of `MESSAGES`, each with random settings and images.
    fn shaped_steps() -> impl Strategy<Value = Vec<Shape>> {
        subsequence(MESSAGES.to_vec(), 0..=MESSAGES.len()).prop_flat_map(|messages| {
            prop::collection::vec((settings(), images()), messages.len()).prop_map(move |shapes| {
                messages
                    .iter()
                    .zip(shapes)
                    .map(|(message, (settings, images))| (*message, settings, images))
                    .collect()
            })
        })
    }

    fn desired_steps() -> impl Strategy<Value = Vec<StepRegistration>> {
        shaped_steps().prop_map(|shapes| {
            shapes
                .into_iter()
                .map(|(message, (mode, order, filter, configuration), images)| StepRegistration {
                    mode,
                    execution_order: order,
                    filtering_attributes: filter,
                    configuration,
                    images,
                    ..step(message)
                })
                .collect()
        })
    }

    fn registered_steps() -> impl Strategy<Value = Vec<ActualStep>> {
        shaped_steps().prop_map(|shapes| {
            shapes
                .into_iter()
                .enumerate()
                .map(|(i, (message, (mode, order, filter, configuration), images))| {
                    let images = images
                        .into_iter()
                        .map(|image| ActualImage {
                            id: RemoteId(format!("i{i}-{}", image.name)),
                            entity_alias: image.entity_alias().to_string(),
                            name: image.name,
                            image_type: image.image_type,
                            attributes: image.attributes,
                        })
                        .collect();
                    ActualStep {
                        mode,
                        execution_order: order,
                        filtering_attributes: filter,
                        configuration,
                        images,
                        ..actual_step(&format!("s{i}"), message)
                    }
                })
                .collect()
        })
    }

    fn positions_of(calls: &[WriteCall], wanted: &WriteCall) -> Vec<usize> {
        calls
            .iter()
            .enumerate()
            .filter(|(_, call)| *call == wanted)
            .map(|(i, _)| i)
            .collect()
    }

    proptest! {
        #[test]
        fn drift_is_the_symmetric_difference_and_sync_closes_it(
            wanted in desired_steps(),
            present in registered_steps(),
        ) {
            let desired = desired(wanted);
            let mut api = seeded(present.clone());

            let report = diff(&desired, &read_actual(&api, ASSEMBLY).expect("read"));
            let wanted_keys: BTreeSet<_> = desired.plugin_types[0]
                .steps
                .iter()
                .map(|s| key(&s.message))
                .collect();
            let present_keys: BTreeSet<_> = present.iter().map(|s| key(&s.message)).collect();
            let missing: BTreeSet<_> = report.missing_steps.iter().map(|e| e.key.clone()).collect();
            let orphaned: BTreeSet<_> = report.orphaned_steps.iter().map(|e| e.key.clone()).collect();
            prop_assert_eq!(missing, wanted_keys.difference(&present_keys).cloned().collect::<BTreeSet<_>>());
            prop_assert_eq!(orphaned, present_keys.difference(&wanted_keys).cloned().collect::<BTreeSet<_>>());
            for entry in &report.modified_steps {
                prop_assert!(wanted_keys.contains(&entry.key) && present_keys.contains(&entry.key));
            }

            let mut dry_api = seeded(present.clone());
            let planned = run(&mut dry_api, &desired, &RunOptions::reconcile(true, true)).expect("dry");
            prop_assert_eq!(dry_api.counts().writes(), 0);

            let result = run(&mut api, &desired, &live(true)).expect("run");
            prop_assert_eq!(result.status, RunStatus::Converged);
            let (planned, applied) = (planned.outcome.expect("dry"), result.outcome.expect("live"));
            prop_assert_eq!(planned.steps, applied.steps);
            prop_assert_eq!(planned.images, applied.images);
            prop_assert_eq!(planned.actions.len(), applied.actions.len());
            prop_assert!(applied.failures.is_empty());

            let calls = api.calls().to_vec();
            for wanted_step in &desired.plugin_types[0].steps {
                let Some(have) = present.iter().find(|s| s.message == wanted_step.message) else {
                    continue;
                };
                for image in &wanted_step.images {
                    let Some(old) = have.images.iter().find(|i| i.name == image.name) else {
                        continue;
                    };
                    let delete = WriteCall::DeleteImage { id: old.id.clone() };
                    let create = WriteCall::CreateImage {
                        step_id: have.id.clone(),
                        name: image.name.clone(),
                    };
                    let deletes = positions_of(&calls, &delete);
                    if old.image_type == image.image_type {
                        prop_assert!(deletes.is_empty());
                        prop_assert!(positions_of(&calls, &create).is_empty());
                        continue;
                    }
                    prop_assert_eq!(deletes.len(), 1);
                    prop_assert_eq!(calls.get(deletes[0] + 1), Some(&create));
                    prop_assert_eq!(positions_of(&calls, &create).len(), 1);
                    let update_old = WriteCall::UpdateImage { id: old.id.clone() };
                    prop_assert!(!calls.contains(&update_old));
                }
            }

            let after = diff(&desired, &read_actual(&api, ASSEMBLY).expect("reread"));
            prop_assert!(!after.has_drift());
            api.reset_calls();
            let again = run(&mut api, &desired, &live(true)).expect("rerun");
            prop_assert_eq!(api.counts().writes(), 0);
            prop_assert_eq!(again.status, RunStatus::Converged);
        }
    }
}
