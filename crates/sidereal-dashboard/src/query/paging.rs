//! Windowed reads over filtered collections.

use serde::Serialize;

/// One page of a query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagedResult<T> {
    /// Matches in the requested window, in collection order.
    pub items: Vec<T>,
    /// Number of matches before paging.
    pub total_item_count: usize,
}

impl<T> PagedResult<T> {
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_item_count: 0,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total_item_count: self.total_item_count,
        }
    }
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Count every match and keep the `count` matches starting at `start_index`.
///
/// `None` keeps everything after `start_index`. The whole input is consumed
/// so that `total_item_count` is exact.
pub fn paginate<T, I>(matches: I, start_index: usize, count: Option<usize>) -> PagedResult<T>
where
    I: IntoIterator<Item = T>,
{
    let limit = count.unwrap_or(usize::MAX);
    let mut items = Vec::new();
    let mut total_item_count = 0;

    for item in matches {
        if total_item_count >= start_index && items.len() < limit {
            items.push(item);
        }
        total_item_count += 1;
    }

    PagedResult {
        items,
        total_item_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn start_beyond_total_is_empty() {
        let page = paginate(0..5, 10, Some(3));
        assert!(page.items.is_empty());
        assert_eq!(page.total_item_count, 5);
    }

    #[test]
    fn zero_count_still_reports_total() {
        let page = paginate(0..5, 0, Some(0));
        assert!(page.items.is_empty());
        assert_eq!(page.total_item_count, 5);
    }

    #[test]
    fn missing_count_takes_the_rest() {
        let page = paginate(0..5, 2, None);
        assert_eq!(page.items, vec![2, 3, 4]);
    }

    proptest! {
        #[test]
        fn pages_partition_the_result(
            values in proptest::collection::vec(any::<u16>(), 0..100),
            page_size in 1usize..20,
        ) {
            let total = values.len();
            let mut stitched = Vec::new();
            let mut start = 0;
            while start < total {
                let page = paginate(values.iter().copied(), start, Some(page_size));
                prop_assert!(page.items.len() <= page_size);
                prop_assert_eq!(page.total_item_count, total);
                stitched.extend(page.items);
                start += page_size;
            }
            prop_assert_eq!(stitched, values);
        }
    }
}
