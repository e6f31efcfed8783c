use splindex::Block;
use std::ops::Range;

/// Muffin-tin coefficient counts per atom. Atoms are split contiguously over
/// the ranks of the G-vector communicator; every rank stores the rows of its
/// own atoms.
#[derive(Debug, Clone)]
pub struct MtBasis {
    num_mt_coeffs: Vec<usize>,
    offsets: Vec<usize>,
    split: Block,
    rank: usize,
}

impl MtBasis {
    pub fn new(num_mt_coeffs: Vec<usize>, rank: usize, nrank: usize) -> MtBasis {
        let mut offsets = Vec::with_capacity(num_mt_coeffs.len() + 1);

        let mut n = 0;
        offsets.push(0);
        for c in num_mt_coeffs.iter() {
            n += c;
            offsets.push(n);
        }

        let split = Block::new(num_mt_coeffs.len(), nrank);

        MtBasis {
            num_mt_coeffs,
            offsets,
            split,
            rank,
        }
    }

    /// `num_atoms` atoms with `f(ia)` coefficients each.
    pub fn from_fn<F: Fn(usize) -> usize>(num_atoms: usize, f: F, rank: usize, nrank: usize) -> MtBasis {
        MtBasis::new((0..num_atoms).map(f).collect(), rank, nrank)
    }

    /// Rank whose atoms this basis addresses.
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn num_ranks(&self) -> usize {
        self.split.num_ranks()
    }

    pub fn num_atoms(&self) -> usize {
        self.num_mt_coeffs.len()
    }

    pub fn num_mt_coeffs(&self, ia: usize) -> usize {
        self.num_mt_coeffs[ia]
    }

    pub fn total(&self) -> usize {
        self.offsets[self.num_atoms()]
    }

    pub fn local_atoms(&self) -> Range<usize> {
        self.split.range(self.rank)
    }

    /// Global rows of the local atoms.
    pub fn local_rows(&self) -> Range<usize> {
        let atoms = self.local_atoms();

        self.offsets[atoms.start]..self.offsets[atoms.end]
    }

    pub fn num_local_rows(&self) -> usize {
        self.local_rows().len()
    }

    /// Local row of the first coefficient of a local atom.
    pub fn local_offset(&self, ia: usize) -> usize {
        assert!(self.local_atoms().contains(&ia), "MtBasis: atom {} is not local to rank {}", ia, self.rank);

        self.offsets[ia] - self.local_rows().start
    }
}

#[test]
fn test_mt_basis_split() {
    let nranks = 4;

    let mut next_row = 0;
    let mut next_atom = 0;

    for rank in 0..nranks {
        let mt = MtBasis::from_fn(31, |ia| 100 + ia, rank, nranks);

        let atoms = mt.local_atoms();
        let rows = mt.local_rows();

        assert_eq!(atoms.start, next_atom);
        assert_eq!(rows.start, next_row);
        assert_eq!(mt.local_offset(atoms.start), 0);

        next_atom = atoms.end;
        next_row = rows.end;
    }

    assert_eq!(next_atom, 31);
    assert_eq!(next_row, (0..31).map(|ia| 100 + ia).sum::<usize>());
}
