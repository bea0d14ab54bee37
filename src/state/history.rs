use std::collections::VecDeque;

/// Fixed-capacity FIFO: pushing past capacity evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RollingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { items: VecDeque::with_capacity(capacity + 1), capacity }
    }

    /// Append `item`; returns the evicted sample, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.items.push_back(item);
        if self.items.len() > self.capacity {
            self.items.pop_front()
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_most_recent_in_arrival_order() {
        let mut w = RollingWindow::new(10);
        for i in 1..=15 {
            w.push(i);
        }
        assert_eq!(w.len(), 10);
        assert_eq!(w.to_vec(), (6..=15).collect::<Vec<_>>());
    }

    #[test]
    fn push_reports_eviction() {
        let mut w = RollingWindow::new(2);
        assert_eq!(w.push(1), None);
        assert_eq!(w.push(2), None);
        assert_eq!(w.push(3), Some(1));
        assert_eq!(w.last(), Some(&3));
    }

    #[test]
    fn zero_capacity_still_holds_newest() {
        let mut w = RollingWindow::new(0);
        w.push(1);
        w.push(2);
        assert_eq!(w.to_vec(), vec![2]);
    }
}
