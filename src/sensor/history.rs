/// Fixed-length rolling history of distances, newest first.
///
/// Backed by a boxed slice whose head index rotates backwards on every push, so the oldest
/// slot is overwritten in place.
#[derive(Debug, Clone)]
pub struct History {
    slots: Box<[u32]>,
    head: usize,
}

impl History {
    /// Creates a zero-filled history with at least one slot.
    pub fn new(length: usize) -> Self {
        Self {
            slots: vec![0; length.max(1)].into_boxed_slice(),
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// `0` is the most recent entry.
    pub fn get(&self, index: usize) -> Option<u32> {
        (index < self.slots.len()).then(|| self.slots[(self.head + index) % self.slots.len()])
    }

    pub fn latest(&self) -> u32 {
        self.slots[self.head]
    }

    pub fn push(&mut self, distance_mm: u32) {
        let len = self.slots.len();
        self.head = (self.head + len - 1) % len;
        self.slots[self.head] = distance_mm;
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.slots.len()).map(move |index| self.slots[(self.head + index) % self.slots.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let history = History::new(3);
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![0, 0, 0]);
        assert_eq!(history.latest(), 0);
    }

    #[test]
    fn push_evicts_oldest() {
        let mut history = History::new(3);
        for distance in [10, 20, 30, 40] {
            history.push(distance);
        }
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![40, 30, 20]);
        assert_eq!(history.capacity(), 3);
        assert_eq!(history.get(2), Some(20));
        assert_eq!(history.get(3), None);
    }

    #[test]
    fn single_slot_keeps_latest() {
        let mut history = History::new(1);
        history.push(5);
        history.push(6);
        assert_eq!(history.latest(), 6);
        assert_eq!(history.capacity(), 1);
    }

    #[test]
    fn zero_length_is_promoted_to_one_slot() {
        let mut history = History::new(0);
        history.push(9);
        assert_eq!(history.latest(), 9);
    }
}
