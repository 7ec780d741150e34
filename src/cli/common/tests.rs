// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests against command-line interfaces that aren't big enough to go in their
//! own modules.

use std::collections::BTreeMap;

use hifitime::Duration;
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::{
    constants::SUBMS_DIR,
    exec::JobResults,
    plan::Job,
    tests::{spw_tables, FakeDataset, FakeStore},
};

fn partition_args(tmp: &TempDir) -> PartitionArgs {
    PartitionArgs {
        input: Some(tmp.path().join("input.ms")),
        output: Some(tmp.path().join("output.ms")),
        ..Default::default()
    }
}

#[test]
fn test_partition_args_defaults() {
    let tmp = TempDir::new().unwrap();
    let request = partition_args(&tmp)
        .parse(TransformArgs::default())
        .unwrap();
    assert_eq!(request.axis, SeparationAxis::ScanSpw);
    assert_eq!(request.num_partitions, DEFAULT_NUM_PARTITIONS);
    assert_eq!(request.task, DEFAULT_TASK);
    assert!(request.selection.scan.is_all());
    assert!(request.params.is_empty());
    assert!(request.per_spw_param.is_none());
    assert_eq!(request.transform, Transform::default());
}

#[test]
fn test_partition_args_are_parsed() {
    let tmp = TempDir::new().unwrap();
    let args = PartitionArgs {
        axis: Some("SPW".to_string()),
        num_partitions: Some(3),
        task: Some("split".to_string()),
        task_params: Some(vec![
            "datacolumn=corrected".to_string(),
            "keepflags=false".to_string(),
            "width = 4".to_string(),
        ]),
        per_spw_param_name: Some("chanbin".to_string()),
        per_spw_param_values: Some(vec!["1".to_string(), "2".to_string()]),
        scan: Some("1~3".to_string()),
        spw: Some("0:5~10,1".to_string()),
        antenna: Some("!ANT1".to_string()),
        intent: Some("*TARGET*".to_string()),
        observation: Some("1".to_string()),
        ..partition_args(&tmp)
    };
    let request = args.parse(TransformArgs::default()).unwrap();
    assert_eq!(request.axis, SeparationAxis::Spw);
    assert_eq!(request.num_partitions, 3);
    assert_eq!(request.task, "split");
    assert_eq!(request.params["datacolumn"], json!("corrected"));
    assert_eq!(request.params["keepflags"], json!(false));
    assert_eq!(request.params["width"], json!(4));
    let per_spw = request.per_spw_param.unwrap();
    assert_eq!(per_spw.name, "chanbin");
    assert_eq!(per_spw.values, vec![json!(1), json!(2)]);
    assert_eq!(request.selection.scan.to_string(), "1~3");
    assert_eq!(request.selection.spw.to_string(), "0:5~10,1");
    assert_eq!(request.selection.passthrough["antenna"], "!ANT1");
    assert_eq!(request.selection.passthrough["intent"], "*TARGET*");
    assert_eq!(request.selection.passthrough["observation"], "1");
    assert_eq!(request.selection.passthrough.len(), 3);
}

#[test]
fn test_bad_partition_args() {
    let tmp = TempDir::new().unwrap();

    let args = PartitionArgs {
        input: None,
        ..partition_args(&tmp)
    };
    assert!(matches!(
        args.parse(TransformArgs::default()),
        Err(MultiMsError::Args(_))
    ));

    let args = PartitionArgs {
        axis: Some("baseline".to_string()),
        ..partition_args(&tmp)
    };
    assert!(matches!(
        args.parse(TransformArgs::default()),
        Err(MultiMsError::Args(_))
    ));

    let args = PartitionArgs {
        task_params: Some(vec!["=5".to_string()]),
        ..partition_args(&tmp)
    };
    assert!(matches!(
        args.parse(TransformArgs::default()),
        Err(MultiMsError::Args(_))
    ));

    let args = PartitionArgs {
        per_spw_param_values: Some(vec!["1".to_string()]),
        ..partition_args(&tmp)
    };
    assert!(matches!(
        args.parse(TransformArgs::default()),
        Err(MultiMsError::Args(_))
    ));

    let args = PartitionArgs {
        spw: Some("zero".to_string()),
        ..partition_args(&tmp)
    };
    assert!(matches!(
        args.parse(TransformArgs::default()),
        Err(MultiMsError::Selection(_))
    ));
}

#[test]
fn test_transform_args() {
    let (transform, params) = TransformArgs {
        combine_spws: true,
        nspw: None,
        time_bin: Some("1.5min".to_string()),
        time_span_scans: true,
    }
    .parse()
    .unwrap();
    assert!(transform.combine_spws);
    assert_eq!(transform.nspw, 1);
    assert_eq!(
        transform.time_average,
        Some(TimeAverage {
            bin: Duration::from_seconds(90.0),
            span_scans: true
        })
    );
    assert_eq!(params[PARAM_COMBINE_SPWS], json!(true));
    assert_eq!(params[PARAM_TIME_AVERAGE], json!(true));
    assert_eq!(params[PARAM_TIME_BIN], json!("1.5min"));
    assert_eq!(params[PARAM_TIME_SPAN], json!("scan"));
    assert!(!params.contains_key(PARAM_NSPW));

    let (transform, params) = TransformArgs {
        nspw: Some(4),
        ..Default::default()
    }
    .parse()
    .unwrap();
    assert!(transform.redistributes_spws());
    assert!(transform.time_average.is_none());
    assert_eq!(params[PARAM_NSPW], json!(4));

    let result = TransformArgs {
        nspw: Some(0),
        ..Default::default()
    }
    .parse();
    assert!(matches!(result, Err(MultiMsError::Args(_))));

    let result = TransformArgs {
        time_bin: Some("-3s".to_string()),
        ..Default::default()
    }
    .parse();
    assert!(matches!(result, Err(MultiMsError::Args(_))));
}

/// A multi-part input made of the given datasets.
fn create_multi_part(
    tmp: &TempDir,
    store: &FakeStore,
    axis: SeparationAxis,
    parts: &[FakeDataset],
) -> PathBuf {
    let input = tmp.path().join("input.mms");
    let members: Vec<PathBuf> = (0..parts.len())
        .map(|i| PathBuf::from(SUBMS_DIR).join(format!("input.{i:04}.ms")))
        .collect();
    for (member, part) in members.iter().zip(parts) {
        store.create(&input.join(member), part, &spw_tables(&part.dd_spws));
    }
    store
        .write_manifest(&input, &Manifest { axis, members })
        .unwrap();
    input
}

fn request(input: PathBuf, tmp: &TempDir, transform: Transform) -> PartitionRequest {
    PartitionRequest {
        input,
        output: tmp.path().join("output.ms"),
        task: DEFAULT_TASK.to_string(),
        selection: SelectionExpr::default(),
        axis: SeparationAxis::ScanSpw,
        num_partitions: 4,
        per_spw_param: None,
        params: BTreeMap::new(),
        overwrite: false,
        transform,
    }
}

/// Parts separated by spw; each holds one of two spws for scans 1 to 4.
fn spw_parts() -> Vec<FakeDataset> {
    let scans = [1, 2, 3, 4];
    vec![
        FakeDataset::grid(&scans, 2, &[(1, 1), (2, 1), (3, 1), (4, 1)], 1),
        FakeDataset::grid(&scans, 2, &[(1, 0), (2, 0), (3, 0), (4, 0)], 1),
    ]
}

#[test]
fn test_plain_input_is_partitioned() {
    let tmp = TempDir::new().unwrap();
    let store = FakeStore::new();
    let input = tmp.path().join("input.ms");
    let dataset = FakeDataset::grid(&[1, 2], 2, &[], 1);
    store.create(&input, &dataset, &spw_tables(&dataset.dd_spws));

    let plan = plan_partitions(&store, request(input, &tmp, Transform::default())).unwrap();
    assert_eq!(plan.axis, SeparationAxis::ScanSpw);
    assert_eq!(plan.partitions.len(), 4);
}

#[test]
fn test_parts_are_used_when_independent() {
    let tmp = TempDir::new().unwrap();
    let store = FakeStore::new();
    let input = create_multi_part(&tmp, &store, SeparationAxis::Spw, &spw_parts());

    // Time averaging that doesn't span scans can be done on any part.
    let transform = Transform {
        time_average: Some(TimeAverage {
            bin: Duration::from_seconds(30.0),
            span_scans: false,
        }),
        ..Default::default()
    };
    let plan = plan_partitions(&store, request(input.clone(), &tmp, transform)).unwrap();
    assert_eq!(plan.axis, SeparationAxis::Spw);
    assert_eq!(plan.partitions.len(), 2);
    assert!(!plan.merge_spw_tables);
    assert_eq!(
        plan.partitions[1].input,
        input.join(SUBMS_DIR).join("input.0001.ms")
    );
}

#[test]
fn test_combining_spws_falls_back_to_scan() {
    let tmp = TempDir::new().unwrap();
    let store = FakeStore::new();
    let input = create_multi_part(&tmp, &store, SeparationAxis::Spw, &spw_parts());

    let transform = Transform {
        combine_spws: true,
        ..Default::default()
    };
    let plan = plan_partitions(&store, request(input.clone(), &tmp, transform)).unwrap();
    assert_eq!(plan.axis, SeparationAxis::Scan);
    assert_eq!(plan.partitions.len(), 4);
    // The whole input is partitioned, not its parts.
    assert!(plan.partitions.iter().all(|p| p.input == input));
}

#[test]
fn test_both_checks_failing_gives_one_partition() {
    let tmp = TempDir::new().unwrap();
    let store = FakeStore::new();
    // One scan and one spw per part.
    let parts: Vec<FakeDataset> = [(1, 0), (1, 1), (2, 0), (2, 1)]
        .iter()
        .map(|&(scan, spw)| FakeDataset::grid(&[scan], 2, &[(scan, 1 - spw)], 1))
        .collect();
    let input = create_multi_part(&tmp, &store, SeparationAxis::ScanSpw, &parts);

    let transform = Transform {
        combine_spws: true,
        nspw: 1,
        time_average: Some(TimeAverage {
            bin: Duration::from_seconds(100.0),
            span_scans: true,
        }),
    };
    let plan = plan_partitions(&store, request(input, &tmp, transform)).unwrap();
    assert_eq!(plan.partitions.len(), 1);
    assert_eq!(plan.axis, SeparationAxis::Scan);
}

#[test]
fn test_spw_fallback_with_combined_spws_gives_one_partition() {
    let tmp = TempDir::new().unwrap();
    let store = FakeStore::new();
    // Every part holds both spws, but only one scan.
    let parts = vec![
        FakeDataset::grid(&[1], 2, &[], 1),
        FakeDataset::grid(&[2], 2, &[], 1),
    ];
    let input = create_multi_part(&tmp, &store, SeparationAxis::Scan, &parts);

    let transform = Transform {
        combine_spws: true,
        nspw: 1,
        time_average: Some(TimeAverage {
            bin: Duration::from_seconds(100.0),
            span_scans: true,
        }),
    };
    let (axis, part_paths) = read_parts(&store, &input).unwrap().unwrap();
    let resolver = SelectionResolver::new(&store);
    assert_eq!(
        decide_axis(
            &resolver,
            &input,
            axis,
            &part_paths,
            &SelectionExpr::default(),
            &transform
        )
        .unwrap(),
        AxisDecision::FallBackAxis(SeparationAxis::Spw)
    );

    // Separating the output by spw can't hold combined spws.
    let plan = plan_partitions(&store, request(input.clone(), &tmp, transform)).unwrap();
    assert_eq!(plan.axis, SeparationAxis::Scan);
    assert_eq!(plan.partitions.len(), 1);
    assert_eq!(plan.partitions[0].input, input);
}

#[test]
fn test_decide_axis_uses_selection() {
    let tmp = TempDir::new().unwrap();
    let store = FakeStore::new();
    let input = create_multi_part(&tmp, &store, SeparationAxis::Spw, &spw_parts());
    let (axis, parts) = read_parts(&store, &input).unwrap().unwrap();
    assert_eq!(axis, SeparationAxis::Spw);

    let resolver = SelectionResolver::new(&store);
    let transform = Transform {
        combine_spws: true,
        ..Default::default()
    };
    let all = SelectionExpr::default();
    assert_eq!(
        decide_axis(&resolver, &input, axis, &parts, &all, &transform).unwrap(),
        AxisDecision::FallBackAxis(SeparationAxis::Scan)
    );

    // Without a transformation, the parts can always be used.
    let spw0 = SelectionExpr {
        spw: "0".parse().unwrap(),
        ..Default::default()
    };
    assert_eq!(
        decide_axis(&resolver, &input, axis, &parts, &spw0, &Transform::default()).unwrap(),
        AxisDecision::Proceed
    );

    let plain = tmp.path().join("plain.ms");
    let dataset = FakeDataset::grid(&[1], 1, &[], 1);
    store.create(&plain, &dataset, &spw_tables(&dataset.dd_spws));
    assert!(read_parts(&store, &plain).unwrap().is_none());
}

/// Runs jobs by creating their outputs as a task would, except for the jobs
/// with the given indices.
struct FakeExecutor<'a> {
    store: &'a FakeStore,
    fail: Vec<usize>,
}

impl JobExecutor for FakeExecutor<'_> {
    fn execute(&self, jobs: &[Job]) -> JobResults {
        jobs.iter()
            .enumerate()
            .map(|(i, job)| {
                let ok = !self.fail.contains(&i);
                if ok {
                    let dataset = FakeDataset::grid(&[1], 1, &[], 1);
                    self.store.create(&job.output, &dataset, &spw_tables(&[0]));
                }
                (job.output.clone(), ok)
            })
            .collect()
    }
}

#[test]
fn test_execute_and_consolidate() {
    let tmp = TempDir::new().unwrap();
    let store = FakeStore::new();
    let input = tmp.path().join("input.ms");
    let dataset = FakeDataset::grid(&[1, 2, 3], 1, &[], 1);
    store.create(&input, &dataset, &spw_tables(&dataset.dd_spws));
    let mut request = request(input, &tmp, Transform::default());
    request.axis = SeparationAxis::Scan;
    let plan = plan_partitions(&store, request).unwrap();
    assert_eq!(plan.partitions.len(), 3);

    let executor = FakeExecutor {
        store: &store,
        fail: vec![0],
    };
    let consolidated = execute_and_consolidate(&store, &executor, &plan).unwrap();
    assert_eq!(consolidated.members.len(), 2);
    assert_eq!(consolidated.failed, vec![plan.partitions[0].output.clone()]);
    assert!(consolidated.members[0].ends_with("output.0000.ms"));
    display_warnings();

    // Nothing to consolidate is an error.
    let mut request = self::request(tmp.path().join("input.ms"), &tmp, Transform::default());
    request.output = tmp.path().join("output2.ms");
    let plan = plan_partitions(&store, request).unwrap();
    let executor = FakeExecutor {
        store: &store,
        fail: (0..plan.partitions.len()).collect(),
    };
    assert!(matches!(
        execute_and_consolidate(&store, &executor, &plan),
        Err(MultiMsError::Consolidate(_))
    ));
}

#[test]
fn test_default_plan_file() {
    assert_eq!(
        default_plan_file(Path::new("/data/out.ms")),
        Path::new("/data/out.plan.json")
    );
}
