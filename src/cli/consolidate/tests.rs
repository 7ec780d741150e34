// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{collections::BTreeMap, path::Path};

use tempfile::TempDir;

use super::*;
use crate::{
    constants::{MANIFEST_FILE, SUBMS_DIR},
    exec::write_results,
    tests::{spw_tables, FakeDataset, FakeStore},
    DatasetStore, JobListBuilder, PartitionRequest, SelectionExpr, SelectionResolver,
    SeparationAxis, Transform,
};

/// Plan 3 scan partitions, write the plan, and create the outputs of the
/// given partitions.
fn setup(tmp: &TempDir, created: &[usize]) -> (PathBuf, PartitionPlan) {
    let store = FakeStore::new();
    let input = tmp.path().join("input.ms");
    let dataset = FakeDataset::grid(&[1, 2, 3], 2, &[], 1);
    store.create(&input, &dataset, &spw_tables(&dataset.dd_spws));

    let request = PartitionRequest {
        input,
        output: tmp.path().join("output.mms"),
        task: "split".to_string(),
        selection: SelectionExpr::default(),
        axis: SeparationAxis::Scan,
        num_partitions: 3,
        per_spw_param: None,
        params: BTreeMap::new(),
        overwrite: false,
        transform: Transform::default(),
    };
    let plan = JobListBuilder::new(&SelectionResolver::new(&store))
        .build(&request)
        .unwrap();
    plan.create_staging_dir().unwrap();
    let plan_file = tmp.path().join("output.plan.json");
    plan.write(&plan_file).unwrap();

    for &i in created {
        let part = FakeDataset::grid(&[i as u32 + 1], 2, &[], 1);
        store.create(&plan.partitions[i].output, &part, &spw_tables(&[0, 1]));
    }
    (plan_file, plan)
}

#[test]
fn test_consolidate_from_existing_outputs() {
    let tmp = TempDir::new().unwrap();
    let (plan_file, plan) = setup(&tmp, &[0, 2]);

    let args = ConsolidateArgs {
        plan: Some(plan_file),
        ..Default::default()
    };
    args.run(false).unwrap();

    assert!(plan.output.join(MANIFEST_FILE).is_file());
    let manifest = MsStore.read_manifest(&plan.output).unwrap().unwrap();
    assert_eq!(manifest.axis, SeparationAxis::Scan);
    assert_eq!(
        manifest.members,
        vec![
            Path::new(SUBMS_DIR).join("output.0000.mms"),
            Path::new(SUBMS_DIR).join("output.0001.mms"),
        ]
    );
    assert!(!plan.staging_dir.exists());
}

#[test]
fn test_consolidate_with_results_file() {
    let tmp = TempDir::new().unwrap();
    let (plan_file, plan) = setup(&tmp, &[0, 1, 2]);

    // The executor says the middle job failed, even though it left output
    // behind.
    let results: JobResults = plan
        .partitions
        .iter()
        .map(|p| (p.output.clone(), p.index != 1))
        .collect();
    let results_file = tmp.path().join("results.json");
    write_results(&results_file, &results).unwrap();

    let args = ConsolidateArgs {
        plan: Some(plan_file),
        results: Some(results_file),
        ..Default::default()
    };
    args.clone().run(true).unwrap();
    assert!(!plan.output.exists());

    args.run(false).unwrap();
    let manifest = MsStore.read_manifest(&plan.output).unwrap().unwrap();
    assert_eq!(manifest.members.len(), 2);
    assert!(!plan.partitions[1].output.exists());
}

#[test]
fn test_consolidate_needs_a_plan() {
    assert!(matches!(
        ConsolidateArgs::default().run(true),
        Err(MultiMsError::Args(_))
    ));
}
