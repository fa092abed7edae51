//! Budget-limiting modifiers applied after the initial plan is computed
//! (spec.md §4.3 "Modifiers"). Modeled as the function-type alternative
//! Design Notes §9 allows, rather than a trait-object hierarchy.

use super::entry::PreDiffPlanEntry;

/// `(old_entries, new_entries, current_plan) -> demoted_plan`. Takes the
/// full entry list by value and returns a (possibly reordered — spec.md
/// says output order is implementation-defined) transformed list.
pub type PlanModifier = Box<dyn Fn(Vec<PreDiffPlanEntry>) -> Vec<PreDiffPlanEntry>>;

/// Bounds the total uncompressed size of new-entry bytes flagged for
/// recompression. Entries are sorted by `new_entry.uncompressed_size`
/// descending and greedily retained while they fit; the rest are demoted.
pub fn total_recompression_limiter(max_recomp_bytes: u64) -> PlanModifier {
    Box::new(move |mut entries: Vec<PreDiffPlanEntry>| {
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| {
            entries[b]
                .new_entry
                .uncompressed_size
                .cmp(&entries[a].new_entry.uncompressed_size)
        });

        let mut running = 0u64;
        for idx in order {
            if !entries[idx].uncompress_new() {
                continue;
            }
            let size = entries[idx].new_entry.uncompressed_size;
            if running + size <= max_recomp_bytes {
                running += size;
            } else {
                entries[idx].demote_resource_constrained();
            }
        }
        entries
    })
}

/// Bounds `old_file.length + Σ(uncompressed_size - compressed_length)` over
/// entries flagged `uncompress_old`. Same greedy-by-descending-size shape as
/// the recompression limiter.
pub fn delta_friendly_old_blob_size_limiter(
    old_file_length: u64,
    max_total_bytes: u64,
) -> PlanModifier {
    Box::new(move |mut entries: Vec<PreDiffPlanEntry>| {
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| {
            entries[b]
                .old_entry
                .uncompressed_size
                .cmp(&entries[a].old_entry.uncompressed_size)
        });

        let mut running_extra = 0u64;
        for idx in order {
            if !entries[idx].uncompress_old() {
                continue;
            }
            let old_entry = &entries[idx].old_entry;
            let extra = old_entry
                .uncompressed_size
                .saturating_sub(old_entry.compressed_data_range.length);
            if old_file_length + running_extra + extra <= max_total_bytes {
                running_extra += extra;
            } else {
                entries[idx].demote_resource_constrained();
            }
        }
        entries
    })
}
