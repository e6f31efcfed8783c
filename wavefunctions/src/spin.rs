/// Spin components addressed by an operation: 0 or 1 selects one
/// component, 2 selects both (full spinors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinRange {
    first: usize,
    last: usize,
}

impl SpinRange {
    pub fn new(ispn: usize) -> SpinRange {
        match ispn {
            0 | 1 => SpinRange {
                first: ispn,
                last: ispn,
            },
            2 => SpinRange { first: 0, last: 1 },
            _ => panic!("SpinRange: spin index {} is not 0, 1 or 2", ispn),
        }
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn last(&self) -> usize {
        self.last
    }

    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.first
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.first..=self.last
    }
}

#[test]
fn test_spin_range() {
    assert_eq!(SpinRange::new(1).iter().collect::<Vec<_>>(), vec![1]);
    assert_eq!(SpinRange::new(2).iter().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(SpinRange::new(2).len(), 2);
    assert!(!SpinRange::new(0).is_empty());
    assert!(!SpinRange::new(2).is_empty());
}
