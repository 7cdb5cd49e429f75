use std::collections::BTreeMap;

/// Counts instances of each key.
#[derive(Clone)]
pub struct Counter<T: Ord + Clone> {
    map: BTreeMap<T, usize>,
    sum: usize,
}

impl<T: Ord + Clone> Default for Counter<T> {
    fn default() -> Counter<T> {
        Counter::new()
    }
}

impl<T: Ord + Clone> Counter<T> {
    pub fn new() -> Counter<T> {
        Counter {
            map: BTreeMap::new(),
            sum: 0,
        }
    }

    /// Returns the new count.
    pub fn inc(&mut self, val: T) -> usize {
        self.add(val, 1)
    }

    pub fn add(&mut self, val: T, amount: usize) -> usize {
        let entry = self.map.entry(val).or_insert(0);
        *entry += amount;
        self.sum += amount;
        *entry
    }

    pub fn get(&self, val: T) -> usize {
        self.map.get(&val).cloned().unwrap_or(0)
    }

    /// Total of all counts.
    pub fn sum(&self) -> usize {
        self.sum
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn consume(self) -> BTreeMap<T, usize> {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let mut c = Counter::new();
        c.inc("bus");
        c.inc("bus");
        c.add("metro", 3);
        assert_eq!(c.get("bus"), 2);
        assert_eq!(c.get("metro"), 3);
        assert_eq!(c.get("tram"), 0);
        assert_eq!(c.sum(), 5);
    }
}
