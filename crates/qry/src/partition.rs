//! 📦 The batch partitioner — bin-packing blobs into size-bounded groups.
//!
//! Two modes, one rule:
//! - With a byte target: pack blobs in listing order until adding the next
//!   one WOULD blow the budget, then close the group and keep going.
//! - Without a target: one group per blob, suffix-stripped destination.
//!
//! Expressed as a strict left-fold carrying (current group, closed groups)
//! so there is exactly one mutable accumulator and zero aliased lists.
//! "He who shares a mutable Vec between two loops, debugs alone and in
//! darkness." — Ancient proverb 📜

use crate::common::{BatchGroup, RAW_BLOB_SUFFIX, SourceObject};

/// 🧮 The fold state: groups already closed, plus the one still filling up.
struct Packing {
    closed: Vec<BatchGroup>,
    current: Vec<SourceObject>,
    current_bytes: u64,
}

impl Packing {
    fn close_current(&mut self, destination_root: &str) {
        // Hollow groups are never emitted. Even when the very first blob is
        // bigger than the target, it joins the (empty) current group first
        // and gets closed as a well-fed singleton later.
        if self.current.is_empty() {
            return;
        }
        let index = self.closed.len();
        self.closed.push(BatchGroup {
            destination: format!("{destination_root}/{index}"),
            members: std::mem::take(&mut self.current),
        });
        self.current_bytes = 0;
    }
}

/// 📦 Bin-pack `objects` (in listing order) into [`BatchGroup`]s.
///
/// Size-target mode: the check is "would exceed", applied before inclusion,
/// but the object is then unconditionally included — so an oversized blob
/// becomes its own group rather than being rejected or split. Unknown sizes
/// count as 0 bytes toward the running total (see DESIGN.md for the policy
/// call). Group `i` lands at `{destination_root}/{i}`.
///
/// Pass-through mode (`target_bytes == None`): one group per object, order
/// preserved, destination `{destination_root}/{name}` with the `.csv.gz`
/// suffix stripped — the suffix, not every lookalike substring.
pub fn partition(
    objects: &[SourceObject],
    destination_root: &str,
    target_bytes: Option<u64>,
) -> Vec<BatchGroup> {
    let root = destination_root.trim_end_matches('/');

    let Some(target) = target_bytes else {
        return objects
            .iter()
            .map(|object| BatchGroup {
                destination: format!("{root}/{}", strip_raw_suffix(&object.name)),
                members: vec![object.clone()],
            })
            .collect();
    };

    let mut packing = objects.iter().fold(
        Packing { closed: Vec::new(), current: Vec::new(), current_bytes: 0 },
        |mut packing, object| {
            if packing.current_bytes + object.billable_size() > target {
                packing.close_current(root);
            }
            packing.current_bytes += object.billable_size();
            packing.current.push(object.clone());
            packing
        },
    );
    packing.close_current(root);
    packing.closed
}

/// 🧹 `name` minus a trailing `.csv.gz`, and ONLY a trailing one.
/// `strip_suffix`, not `replace` — a blob named `x.csv.gz.backup.csv.gz`
/// loses exactly one tail, not both kidneys.
fn strip_raw_suffix(name: &str) -> &str {
    name.strip_suffix(RAW_BLOB_SUFFIX).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(name: &str, size: u64) -> SourceObject {
        SourceObject { name: name.into(), size: Some(size) }
    }

    fn sizes(group: &BatchGroup) -> Vec<u64> {
        group.members.iter().map(|m| m.size.unwrap_or(0)).collect()
    }

    /// 🧪 The canonical packing scenario, step by step:
    /// sizes [100, 200, 50, 900, 10], target 250
    /// → [{100}], [{200, 50}], [{900}], [{10}]
    #[test]
    fn the_one_where_five_blobs_become_four_groups() {
        let the_blobs = vec![
            blob("a.csv.gz", 100),
            blob("b.csv.gz", 200),
            blob("c.csv.gz", 50),
            blob("d.csv.gz", 900),
            blob("e.csv.gz", 10),
        ];

        let the_groups = partition(&the_blobs, "https://dest/curated", Some(250));

        assert_eq!(the_groups.len(), 4);
        assert_eq!(sizes(&the_groups[0]), vec![100]);
        assert_eq!(sizes(&the_groups[1]), vec![200, 50]); // 250 == target: allowed in
        assert_eq!(sizes(&the_groups[2]), vec![900]); // oversized singleton, tolerated
        assert_eq!(sizes(&the_groups[3]), vec![10]);

        // Group i lands at {root}/{i}, numbered in discovery order.
        for (i, group) in the_groups.iter().enumerate() {
            assert_eq!(group.destination, format!("https://dest/curated/{i}"));
        }
    }

    /// 🧪 Concatenating every group's members reproduces the input exactly.
    /// No blob dropped, duplicated, or reordered. The partitioner is a
    /// rearranger, not an editor.
    #[test]
    fn the_one_where_no_blob_is_left_behind() {
        let the_blobs: Vec<_> = (0..37)
            .map(|i| blob(&format!("blob-{i:02}.csv.gz"), (i * 61) % 499))
            .collect();

        let the_groups = partition(&the_blobs, "root", Some(700));

        let the_flattened: Vec<_> =
            the_groups.iter().flat_map(|g| g.members.clone()).collect();
        assert_eq!(the_flattened, the_blobs);
        assert!(the_groups.iter().all(|g| !g.members.is_empty()));
    }

    /// 🧪 An oversized FIRST blob must not leave an empty group behind it.
    /// (The behavior this replaces emitted a hollow group zero. We do not
    /// speak of group zero.)
    #[test]
    fn the_one_where_the_first_blob_is_already_too_big() {
        let the_blobs = vec![blob("huge.csv.gz", 9_000), blob("tiny.csv.gz", 1)];

        let the_groups = partition(&the_blobs, "root", Some(100));

        assert_eq!(the_groups.len(), 2);
        assert_eq!(sizes(&the_groups[0]), vec![9_000]);
        assert_eq!(sizes(&the_groups[1]), vec![1]);
        assert_eq!(the_groups[0].destination, "root/0");
    }

    /// 🧪 Unknown sizes bill as zero, so a parade of size-less blobs packs
    /// into one group instead of starving the partitioner.
    #[test]
    fn the_one_where_unknown_sizes_ride_for_free() {
        let the_blobs: Vec<_> = (0..5)
            .map(|i| SourceObject { name: format!("m{i}.csv.gz"), size: None })
            .collect();

        let the_groups = partition(&the_blobs, "root", Some(10));

        assert_eq!(the_groups.len(), 1);
        assert_eq!(the_groups[0].members.len(), 5);
    }

    #[test]
    fn the_one_where_no_target_means_one_group_per_blob() {
        let the_blobs =
            vec![blob("logs/a.csv.gz", 5), blob("logs/b.csv.gz", 50), blob("logs/c.txt", 1)];

        let the_groups = partition(&the_blobs, "https://dest/out/", None);

        assert_eq!(the_groups.len(), the_blobs.len());
        assert_eq!(the_groups[0].destination, "https://dest/out/logs/a");
        assert_eq!(the_groups[1].destination, "https://dest/out/logs/b");
        // Unknown suffixes pass through untouched.
        assert_eq!(the_groups[2].destination, "https://dest/out/logs/c");
        let the_flattened: Vec<_> =
            the_groups.iter().flat_map(|g| g.members.clone()).collect();
        assert_eq!(the_flattened, the_blobs);
    }

    /// 🧪 The suffix strip is a strip_suffix, not a search-and-destroy.
    #[test]
    fn the_one_where_only_the_trailing_suffix_is_stripped() {
        assert_eq!(strip_raw_suffix("a.csv.gz"), "a");
        assert_eq!(strip_raw_suffix("a.csv.gz.backup.csv.gz"), "a.csv.gz.backup");
        assert_eq!(strip_raw_suffix("a.csv.gzzz"), "a.csv.gzzz");
        assert_eq!(strip_raw_suffix("plain.txt"), "plain.txt");
    }

    #[test]
    fn the_one_where_zero_blobs_yield_zero_groups() {
        assert!(partition(&[], "root", Some(100)).is_empty());
        assert!(partition(&[], "root", None).is_empty());
    }
}
