//! Chains of named filter/transform callbacks over a record stream

use crate::progress::fmt_num;

/// Visited items between progress log lines
const LOG_EVERY: usize = 10_000;

type FilterFn<T> = Box<dyn FnMut(T) -> Option<T> + Send>;

struct NamedFilter<T> {
    name: String,
    f: FilterFn<T>,
    removed: usize,
}

/// Ordered list of callbacks applied to every item.
///
/// Each callback returns the (possibly modified) item, or `None` to drop it;
/// a dropped item is not shown to the remaining callbacks.
pub struct FilterChain<T> {
    filters: Vec<NamedFilter<T>>,
    max_items: Option<usize>,
}

impl<T> FilterChain<T> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            max_items: None,
        }
    }

    pub fn with(
        mut self,
        name: impl Into<String>,
        f: impl FnMut(T) -> Option<T> + Send + 'static,
    ) -> Self {
        self.filters.push(NamedFilter {
            name: name.into(),
            f: Box::new(f),
            removed: 0,
        });
        self
    }

    /// Stop after this many kept items
    pub fn max_items(mut self, max: Option<usize>) -> Self {
        self.max_items = max;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.max_items.is_none()
    }

    /// Run one item through the chain
    pub fn apply_one(&mut self, item: T) -> Option<T> {
        let mut item = item;
        for filter in &mut self.filters {
            match (filter.f)(item) {
                Some(next) => item = next,
                None => {
                    filter.removed += 1;
                    return None;
                }
            }
        }
        Some(item)
    }

    /// Items removed by each filter so far, in chain order
    pub fn removed_counts(&self) -> Vec<(&str, usize)> {
        self.filters
            .iter()
            .map(|f| (f.name.as_str(), f.removed))
            .collect()
    }

    /// Lazily filter `items`
    pub fn apply<I>(self, items: I) -> Filtered<I::IntoIter, T>
    where
        I: IntoIterator<Item = T>,
    {
        Filtered {
            inner: items.into_iter(),
            chain: self,
            visited: 0,
            kept: 0,
            finished: false,
        }
    }
}

impl<T> Default for FilterChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`FilterChain::apply`]
pub struct Filtered<I, T> {
    inner: I,
    chain: FilterChain<T>,
    visited: usize,
    kept: usize,
    finished: bool,
}

impl<I, T> Filtered<I, T> {
    pub fn kept(&self) -> usize {
        self.kept
    }

    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn filter_chain(&self) -> &FilterChain<T> {
        &self.chain
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        for (name, removed) in self.chain.removed_counts() {
            log::info!("Items removed by filter {name}: {}", fmt_num(removed));
        }
    }
}

impl<I: Iterator<Item = T>, T> Iterator for Filtered<I, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        loop {
            if self.chain.max_items.is_some_and(|max| self.kept >= max) {
                self.finish();
                return None;
            }
            let Some(item) = self.inner.next() else {
                self.finish();
                return None;
            };
            if self.visited % LOG_EVERY == 0 {
                log::info!(
                    "Processed {} items, kept {}",
                    fmt_num(self.visited),
                    fmt_num(self.kept)
                );
            }
            self.visited += 1;
            if let Some(item) = self.chain.apply_one(item) {
                self.kept += 1;
                return Some(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chain_passes_everything() {
        let out: Vec<i32> = FilterChain::new().apply(1..=5).collect();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn filters_apply_in_order_and_stop_on_drop() {
        let chain = FilterChain::new()
            .with("drop_odd", |x: i32| (x % 2 == 0).then_some(x))
            .with("times_ten", |x: i32| Some(x * 10))
            .with("drop_big", |x: i32| (x < 50).then_some(x));
        let mut it = chain.apply(1..=6);
        let out: Vec<i32> = it.by_ref().collect();
        assert_eq!(out, vec![20, 40]);
        assert_eq!(it.visited(), 6);
        assert_eq!(
            it.filter_chain().removed_counts(),
            vec![("drop_odd", 3), ("times_ten", 0), ("drop_big", 1)]
        );
    }

    #[test]
    fn max_items_stops_early() {
        let mut it = FilterChain::new().max_items(Some(2)).apply(0..100);
        let out: Vec<i32> = it.by_ref().collect();
        assert_eq!(out, vec![0, 1]);
        assert_eq!(it.visited(), 2);
        assert!(it.next().is_none());
    }

    #[test]
    fn max_items_zero_yields_nothing() {
        let out: Vec<i32> = FilterChain::new().max_items(Some(0)).apply(0..10).collect();
        assert!(out.is_empty());
    }

    #[test]
    fn is_empty_tracks_configuration() {
        assert!(FilterChain::<u8>::new().is_empty());
        assert!(!FilterChain::<u8>::new().max_items(Some(1)).is_empty());
        assert!(!FilterChain::new().with("id", |x: u8| Some(x)).is_empty());
    }
}
