//! Lock-free work queue shared by the fetcher's worker threads

use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed list of work items claimed one at a time by competing workers.
///
/// Each [`next()`](WorkQueue::next) call hands out a distinct item; once the
/// list is exhausted every worker sees `None` and exits its loop.
pub struct WorkQueue<T> {
    items: Vec<T>,
    cursor: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next unprocessed item
    pub fn next(&self) -> Option<&T> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i)
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Items not yet claimed
    pub fn remaining(&self) -> usize {
        self.items
            .len()
            .saturating_sub(self.cursor.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn hands_out_each_item_once() {
        let q = WorkQueue::new(vec!["a", "b", "c"]);
        assert_eq!(q.total(), 3);
        assert_eq!(q.next(), Some(&"a"));
        assert_eq!(q.remaining(), 2);
        assert_eq!(q.next(), Some(&"b"));
        assert_eq!(q.next(), Some(&"c"));
        assert_eq!(q.next(), None);
        assert_eq!(q.remaining(), 0);
    }

    #[test]
    fn empty_queue() {
        let q: WorkQueue<String> = WorkQueue::new(vec![]);
        assert_eq!(q.total(), 0);
        assert_eq!(q.next(), None);
    }

    #[test]
    fn concurrent_workers_partition_items() {
        let q = WorkQueue::new((0..1000).collect::<Vec<u32>>());
        let seen = Mutex::new(Vec::new());
        rayon::scope(|s| {
            for _ in 0..4 {
                s.spawn(|_| {
                    while let Some(i) = q.next() {
                        seen.lock().unwrap().push(*i);
                    }
                });
            }
        });
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..1000).collect::<Vec<u32>>());
    }
}
