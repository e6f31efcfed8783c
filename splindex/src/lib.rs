use std::ops::Range;

/// Contiguous near-equal split of `n` items over `nrank` ranks; the first
/// `n % nrank` ranks hold one extra item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    n: usize,
    nrank: usize,
}

impl Block {
    pub fn new(n: usize, nrank: usize) -> Block {
        assert!(nrank > 0, "Block split over zero ranks");

        Block { n, nrank }
    }

    pub fn global_size(&self) -> usize {
        self.n
    }

    pub fn num_ranks(&self) -> usize {
        self.nrank
    }

    pub fn local_size(&self, rank: usize) -> usize {
        let base = self.n / self.nrank;

        if rank < self.n % self.nrank {
            base + 1
        } else {
            base
        }
    }

    pub fn offset(&self, rank: usize) -> usize {
        let base = self.n / self.nrank;
        let rem = self.n % self.nrank;

        rank * base + rank.min(rem)
    }

    pub fn range(&self, rank: usize) -> Range<usize> {
        let first = self.offset(rank);

        first..first + self.local_size(rank)
    }

    /// (owner rank, local index)
    pub fn location(&self, i: usize) -> (usize, usize) {
        assert!(i < self.n, "index {} outside block split of {}", i, self.n);

        let base = self.n / self.nrank;
        let rem = self.n % self.nrank;

        let split = rem * (base + 1);

        if i < split {
            (i / (base + 1), i % (base + 1))
        } else {
            let rank = rem + (i - split) / base;
            (rank, i - self.offset(rank))
        }
    }
}

/// One dimension of a block-cyclic distribution: blocks of `bs` indices are
/// dealt round-robin over `nrank` process coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCyclic {
    n: usize,
    nrank: usize,
    bs: usize,
}

impl BlockCyclic {
    pub fn new(n: usize, nrank: usize, bs: usize) -> BlockCyclic {
        assert!(nrank > 0, "block-cyclic split over zero ranks");
        assert!(bs > 0, "block-cyclic split with zero block size");

        BlockCyclic { n, nrank, bs }
    }

    pub fn global_size(&self) -> usize {
        self.n
    }

    pub fn num_ranks(&self) -> usize {
        self.nrank
    }

    pub fn block_size(&self) -> usize {
        self.bs
    }

    pub fn owner(&self, i: usize) -> usize {
        (i / self.bs) % self.nrank
    }

    pub fn local_index(&self, i: usize) -> usize {
        (i / (self.bs * self.nrank)) * self.bs + i % self.bs
    }

    pub fn global_index(&self, il: usize, rank: usize) -> usize {
        ((il / self.bs) * self.nrank + rank) * self.bs + il % self.bs
    }

    /// numroc
    pub fn local_size(&self, rank: usize) -> usize {
        let nblocks = self.n / self.bs;

        let mut nl = (nblocks / self.nrank) * self.bs;

        let extra = nblocks % self.nrank;

        if rank < extra {
            nl += self.bs;
        } else if rank == extra {
            nl += self.n % self.bs;
        }

        nl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_split() {
        let nrank = 5;
        let nkpt = 31;

        let b = Block::new(nkpt, nrank);
        assert_eq!(b.global_size(), nkpt);

        let sizes: Vec<usize> = (0..nrank).map(|r| b.local_size(r)).collect();
        assert_eq!(sizes, vec![7, 6, 6, 6, 6]);

        let mut next = 0;
        for rank in 0..nrank {
            let r = b.range(rank);
            assert_eq!(r.start, next);
            next = r.end;

            for i in r.clone() {
                assert_eq!(b.location(i), (rank, i - r.start));
            }
        }
        assert_eq!(next, nkpt);
    }

    #[test]
    fn test_block_more_ranks_than_items() {
        let b = Block::new(3, 5);

        assert_eq!(b.range(2), 2..3);
        assert_eq!(b.range(4), 3..3);
        assert_eq!(b.location(2), (2, 0));
    }

    #[test]
    fn test_block_cyclic_covers_once() {
        for &(n, p, bs) in [(17, 3, 2), (100, 2, 16), (5, 4, 3), (64, 1, 64)].iter() {
            let bc = BlockCyclic::new(n, p, bs);
            assert_eq!(bc.global_size(), n);

            let mut seen = vec![0; n];

            for rank in 0..p {
                for il in 0..bc.local_size(rank) {
                    let i = bc.global_index(il, rank);

                    assert_eq!(bc.owner(i), rank);
                    assert_eq!(bc.local_index(i), il);

                    seen[i] += 1;
                }
            }

            assert!(seen.iter().all(|&c| c == 1), "n={} p={} bs={}", n, p, bs);
        }
    }
}
