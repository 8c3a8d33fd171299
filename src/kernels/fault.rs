use std::borrow::Cow;
use std::ops::Range;

/// One targeted bit flip: which output element, and which term of its
/// filter-window reduction.
///
/// `output_position` is a flat index into the [N, H, W, C] output tensor.
/// `reduction_position` is a flat index into the filter-window reduction
/// order: `(filter_y * filter_width + filter_x) * filter_input_depth +
/// in_channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FaultSite {
    pub output_position: usize,
    pub reduction_position: usize,
}

/// Precomputed fault-site lists, one per dataset, plus the bit to flip.
///
/// Lists are held sorted in descending (output_position, reduction_position)
/// order and consumed back-to-front, so sites fire in ascending traversal
/// order and each site is consumed exactly once.
#[derive(Debug, Clone)]
pub struct FaultConfig {
    pub dataset_index: usize,
    pub bit_position: u32,
    datasets: Vec<Vec<FaultSite>>,
}

impl FaultConfig {
    pub fn new(dataset_index: usize, bit_position: u32, mut datasets: Vec<Vec<FaultSite>>) -> Self {
        assert!(
            bit_position < 32,
            "FaultConfig: bit position {} out of range for a 32-bit product",
            bit_position
        );
        assert!(
            dataset_index < datasets.len(),
            "FaultConfig: dataset index {} out of range ({} datasets)",
            dataset_index,
            datasets.len()
        );
        for list in &mut datasets {
            sort_descending(list);
        }
        Self {
            dataset_index,
            bit_position,
            datasets,
        }
    }

    /// The selected dataset's site list, in consumption order.
    pub fn active(&self) -> &[FaultSite] {
        &self.datasets[self.dataset_index]
    }
}

/// Sorts a site list into descending consumption-priority order.
pub fn sort_descending(sites: &mut [FaultSite]) {
    sites.sort_by(|a, b| b.cmp(a));
}

/// Restricts a globally-ordered site list to the sites whose output channel
/// falls inside `channels`. Filtering preserves relative order, so the
/// per-range subsets across all chunks form an exact, order-stable partition
/// of the original list.
pub fn sites_for_channel_range(
    sites: &[FaultSite],
    output_depth: usize,
    channels: &Range<usize>,
) -> Vec<FaultSite> {
    sites
        .iter()
        .copied()
        .filter(|site| channels.contains(&(site.output_position % output_depth)))
        .collect()
}

/// Sorted-list-plus-cursor over pending fault sites.
///
/// The next pending site is always `sites[cursor - 1]`; a match flips the
/// chosen bit of the product and decrements the cursor. An exhausted or
/// disabled cursor leaves every product untouched.
#[derive(Debug, Clone)]
pub struct FaultCursor<'a> {
    sites: Cow<'a, [FaultSite]>,
    cursor: usize,
    bit: u32,
}

impl<'a> FaultCursor<'a> {
    pub fn over(sites: &'a [FaultSite], bit: u32) -> Self {
        assert!(bit < 32, "FaultCursor: bit position {} out of range", bit);
        Self {
            cursor: sites.len(),
            sites: Cow::Borrowed(sites),
            bit,
        }
    }

    pub fn owned(sites: Vec<FaultSite>, bit: u32) -> FaultCursor<'static> {
        assert!(bit < 32, "FaultCursor: bit position {} out of range", bit);
        FaultCursor {
            cursor: sites.len(),
            sites: Cow::Owned(sites),
            bit,
        }
    }

    pub fn disabled() -> FaultCursor<'static> {
        FaultCursor {
            sites: Cow::Borrowed(&[]),
            cursor: 0,
            bit: 0,
        }
    }

    /// Sites not yet consumed.
    pub fn remaining(&self) -> usize {
        self.cursor
    }

    /// Routes one accumulation term through the fault hook. Flips the bit and
    /// consumes the pending site on an exact position match, at most once.
    #[inline]
    pub(crate) fn apply(
        &mut self,
        output_position: usize,
        reduction_position: usize,
        product: i32,
    ) -> i32 {
        if self.cursor == 0 {
            return product;
        }
        let site = self.sites[self.cursor - 1];
        if site.output_position == output_position && site.reduction_position == reduction_position
        {
            self.cursor -= 1;
            product ^ ((1u32 << self.bit) as i32)
        } else {
            product
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(output_position: usize, reduction_position: usize) -> FaultSite {
        FaultSite {
            output_position,
            reduction_position,
        }
    }

    #[test]
    fn cursor_consumes_in_ascending_traversal_order() {
        let mut sites = vec![site(3, 0), site(0, 2), site(0, 7)];
        sort_descending(&mut sites);
        assert_eq!(sites, vec![site(3, 0), site(0, 7), site(0, 2)]);

        let mut cursor = FaultCursor::over(&sites, 0);
        assert_eq!(cursor.apply(0, 1, 5), 5);
        assert_eq!(cursor.apply(0, 2, 5), 4); // bit 0 flipped
        assert_eq!(cursor.apply(0, 2, 5), 5); // consumed, never reused
        assert_eq!(cursor.apply(0, 7, 4), 5);
        assert_eq!(cursor.apply(3, 0, -2), -1);
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.apply(9, 9, 7), 7);
    }

    #[test]
    fn sign_bit_flip_is_twos_complement() {
        let sites = vec![site(0, 0)];
        let mut cursor = FaultCursor::over(&sites, 31);
        assert_eq!(cursor.apply(0, 0, 1), 1i32 ^ i32::MIN);
    }

    #[test]
    fn channel_range_restriction_partitions_the_list() {
        // output_depth 4: channel is output_position % 4
        let mut sites = vec![site(0, 0), site(1, 0), site(5, 3), site(6, 1), site(11, 2)];
        sort_descending(&mut sites);

        let lo = sites_for_channel_range(&sites, 4, &(0..2));
        let hi = sites_for_channel_range(&sites, 4, &(2..4));
        assert_eq!(lo, vec![site(5, 3), site(1, 0), site(0, 0)]);
        assert_eq!(hi, vec![site(11, 2), site(6, 1)]);
        assert_eq!(lo.len() + hi.len(), sites.len());
    }
}
