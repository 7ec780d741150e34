// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::*;

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[test]
fn test_split_ten_into_three() {
    let scans: Vec<u32> = (1..=10).collect();
    let groups = split_list(&scans, nz(3));
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0], vec![1, 2, 3]);
    assert_eq!(groups[1], vec![4, 5, 6, 7]);
    assert_eq!(groups[2], vec![8, 9, 10]);
}

#[test]
fn test_split_list_properties() {
    for len in 0..40 {
        let items: Vec<usize> = (0..len).collect();
        for n in 1..=len.max(1) {
            let groups = split_list(&items, nz(n));
            assert_eq!(groups.len(), n, "len {len}, n {n}");

            let concatenated: Vec<usize> = groups.iter().flatten().copied().collect();
            assert_eq!(concatenated, items, "len {len}, n {n}");

            let min = groups.iter().map(Vec::len).min().unwrap();
            let max = groups.iter().map(Vec::len).max().unwrap();
            assert!(max - min <= 1, "len {len}, n {n}: {groups:?}");
        }
    }
}

#[test]
fn test_split_more_groups_than_items() {
    let groups = split_list(&[1, 2], nz(4));
    assert_eq!(groups.len(), 4);
    assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), 2);
}

#[test]
fn test_split_indexed() {
    let spws = [0, 1, 2, 3, 4];
    let groups = split_indexed(&spws, nz(2));
    assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    // 2.5 rounds up.
    assert_eq!(groups[&0], vec![0, 1, 2]);
    assert_eq!(groups[&1], vec![3, 4]);
}

#[test]
fn test_reattach_channel_ranges() {
    let original: SpwSelection = "0:5~10,2:20~30".parse().unwrap();
    let groups = split_indexed(&[0, 1, 2, 3], nz(2));
    let reattached = reattach_channel_ranges(&original, &groups);
    assert_eq!(reattached.len(), 2);
    assert_eq!(reattached[&0].to_string(), "0:5~10,1");
    assert_eq!(reattached[&1].to_string(), "2:20~30,3");
}

#[test]
fn test_reattach_keeps_multiple_ranges_and_id_ranges() {
    let original: SpwSelection = "0~1:0~3;8~9,2".parse().unwrap();
    let groups = split_indexed(&[0, 1, 2], nz(3));
    let reattached = reattach_channel_ranges(&original, &groups);
    assert_eq!(reattached[&0].to_string(), "0:0~3;8~9");
    assert_eq!(reattached[&1].to_string(), "1:0~3;8~9");
    assert_eq!(reattached[&2].to_string(), "2");
}
