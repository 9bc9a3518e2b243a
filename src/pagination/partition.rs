//! Greedy, order-preserving partitioning of chapters into parts.

use crate::flow::ChapterFlow;
use crate::pagination::estimate;
use crate::style::ResolvedStyle;

/// Budget used when parts are unbounded.
pub const UNBOUNDED_PAGES: u32 = 1_000_000;

/// A contiguous run of chapters rendered as one output document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Part {
    /// 1-based, in output order
    pub number: usize,
    /// Indices into the chapter list, contiguous and ascending
    pub chapters: Vec<usize>,
    pub estimated_pages: u32,
}

/// Packs page estimates into groups in order, closing a group only when the next
/// chapter would overflow it. A chapter larger than the budget gets a group to itself.
pub fn pack(estimates: &[u32], max_pages_per_part: u32) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut running: u64 = 0;

    for (i, &pages) in estimates.iter().enumerate() {
        let pages = pages as u64;
        if !current.is_empty() && running + pages > max_pages_per_part as u64 {
            groups.push(std::mem::take(&mut current));
            running = 0;
        }
        if pages > max_pages_per_part as u64 {
            log::warn!(
                "Chapter {} is estimated at {pages} pages, more than the {max_pages_per_part} page budget; it gets a part of its own",
                i + 1
            );
        }
        current.push(i);
        running += pages;
    }

    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Estimates each chapter against `style` and packs them into parts. `None` means
/// unbounded, which always yields a single part.
pub fn partition(
    chapters: &[ChapterFlow],
    style: &ResolvedStyle,
    max_pages_per_part: Option<u32>,
) -> Vec<Part> {
    let estimates: Vec<u32> = chapters
        .iter()
        .map(|chapter| estimate(&chapter.items, style))
        .collect();
    for (chapter, pages) in chapters.iter().zip(&estimates) {
        log::debug!(
            "Chapter {} (source id `{}`) estimated at {pages} pages",
            chapter.number,
            chapter.source_id
        );
    }
    partition_estimates(&estimates, max_pages_per_part)
}

pub fn partition_estimates(estimates: &[u32], max_pages_per_part: Option<u32>) -> Vec<Part> {
    let budget = max_pages_per_part.unwrap_or(UNBOUNDED_PAGES).max(1);
    pack(estimates, budget)
        .into_iter()
        .enumerate()
        .map(|(i, chapters)| Part {
            number: i + 1,
            estimated_pages: chapters.iter().map(|&c| estimates[c]).sum(),
            chapters,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn closes_parts_only_on_overflow() {
        let parts = partition_estimates(&[4, 4, 4], Some(10));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].chapters, vec![0, 1]);
        assert_eq!(parts[0].estimated_pages, 8);
        assert_eq!(parts[1].chapters, vec![2]);
        assert_eq!(parts[1].number, 2);
    }

    #[test]
    fn large_budgets_give_one_part() {
        let parts = partition_estimates(&[40, 12, 300], Some(10_000));
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].chapters, vec![0, 1, 2]);
        assert_eq!(partition_estimates(&[900_000, 1], None).len(), 1);
    }

    #[test]
    fn oversized_chapters_stand_alone() {
        let parts = partition_estimates(&[3, 25, 3, 3], Some(10));
        let groups: Vec<Vec<usize>> = parts.into_iter().map(|p| p.chapters).collect();
        assert_eq!(groups, vec![vec![0], vec![1], vec![2, 3]]);
    }

    #[test]
    fn no_chapters_means_no_parts() {
        assert!(partition_estimates(&[], Some(10)).is_empty());
    }

    proptest! {
        #[test]
        fn preserves_chapter_order(
            estimates in proptest::collection::vec(1u32..200, 0..60),
            budget in 1u32..400,
        ) {
            let parts = partition_estimates(&estimates, Some(budget));
            let flattened: Vec<usize> = parts.iter().flat_map(|p| p.chapters.clone()).collect();
            prop_assert_eq!(flattened, (0..estimates.len()).collect::<Vec<usize>>());
            for (i, part) in parts.iter().enumerate() {
                prop_assert_eq!(part.number, i + 1);
            }
        }

        #[test]
        fn respects_the_budget(
            estimates in proptest::collection::vec(1u32..200, 1..60),
            budget in 1u32..400,
        ) {
            for part in partition_estimates(&estimates, Some(budget)) {
                let total: u32 = part.chapters.iter().map(|&c| estimates[c]).sum();
                prop_assert!(total <= budget || part.chapters.len() == 1);
            }
        }
    }
}
