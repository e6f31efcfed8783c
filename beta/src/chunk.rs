use crate::{BetaError, UnitCell};

use context::SimulationContext;
use splindex::Block;
use std::ops::Range;

/// How atoms are grouped into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetaChunking {
    /// Greedy contiguous groups of at most this many projectors; an atom
    /// with more projectors gets a chunk of its own.
    MaxBeta(usize),
    /// Near-equal contiguous split into this many chunks.
    Count(usize),
}

impl BetaChunking {
    /// An explicit chunk count in the context wins over the chunk size.
    pub fn from_context(ctx: &SimulationContext) -> BetaChunking {
        match ctx.num_beta_chunks() {
            0 => BetaChunking::MaxBeta(ctx.beta_chunk_size()),
            n => BetaChunking::Count(n),
        }
    }
}

/// Column of a projector chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaColumn {
    pub atom: usize,
    pub l: usize,
    /// 0 for l = 0, Cartesian component for l = 1
    pub m: usize,
    pub sigma: f64,
}

#[derive(Debug, Clone)]
pub struct BetaChunk {
    atoms: Range<usize>,
    offset: usize,
    atom_offsets: Vec<usize>,
    columns: Vec<BetaColumn>,
}

impl BetaChunk {
    fn new(uc: &UnitCell, atoms: Range<usize>, offset: usize) -> BetaChunk {
        let mut atom_offsets = Vec::with_capacity(atoms.len());
        let mut columns = Vec::new();

        for ia in atoms.clone() {
            atom_offsets.push(columns.len());

            for c in uc.atom_type_of(ia).channels().iter() {
                for m in 0..2 * c.l + 1 {
                    columns.push(BetaColumn {
                        atom: ia,
                        l: c.l,
                        m,
                        sigma: c.sigma,
                    });
                }
            }
        }

        BetaChunk {
            atoms,
            offset,
            atom_offsets,
            columns,
        }
    }

    pub fn atoms(&self) -> Range<usize> {
        self.atoms.clone()
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Index of the first projector of the chunk in the full projector set.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn num_beta(&self) -> usize {
        self.columns.len()
    }

    /// Offset of the projectors of atom `ia` inside the chunk.
    pub fn atom_offset(&self, ia: usize) -> usize {
        self.atom_offsets[ia - self.atoms.start]
    }

    pub fn columns(&self) -> &[BetaColumn] {
        &self.columns
    }
}

pub(crate) fn chunk_ranges(uc: &UnitCell, chunking: BetaChunking) -> Result<Vec<Range<usize>>, BetaError> {
    let num_atoms = uc.num_atoms();

    match chunking {
        BetaChunking::Count(count) => {
            if count == 0 || count > num_atoms {
                return Err(BetaError::ChunkCount { count, num_atoms });
            }

            let split = Block::new(num_atoms, count);

            Ok((0..count).map(|i| split.range(i)).collect())
        }
        BetaChunking::MaxBeta(max_beta) => {
            if max_beta == 0 {
                return Err(BetaError::ChunkCount { count: 0, num_atoms });
            }

            let mut ranges = Vec::new();

            let mut start = 0;
            let mut nbeta = 0;

            for ia in 0..num_atoms {
                let n = uc.num_beta(ia);

                if ia > start && nbeta + n > max_beta {
                    ranges.push(start..ia);
                    start = ia;
                    nbeta = 0;
                }

                nbeta += n;
            }

            if num_atoms > 0 {
                ranges.push(start..num_atoms);
            }

            Ok(ranges)
        }
    }
}

/// Contiguous, ordered, non-empty ranges covering `0..num_atoms` once.
pub(crate) fn validate_ranges(ranges: &[Range<usize>], num_atoms: usize) -> Result<(), BetaError> {
    let mut next = 0;

    for (ichunk, r) in ranges.iter().enumerate() {
        if r.start != next {
            let reason = if r.start > next {
                format!("atoms {}..{} are not covered", next, r.start)
            } else {
                format!("atoms {}..{} are covered twice", r.start, next.min(r.end))
            };

            return Err(BetaError::ChunkPartition { chunk: ichunk, reason });
        }

        if r.end <= r.start {
            return Err(BetaError::ChunkPartition {
                chunk: ichunk,
                reason: format!("empty atom range {}..{}", r.start, r.end),
            });
        }

        next = r.end;
    }

    if next != num_atoms {
        return Err(BetaError::ChunkPartition {
            chunk: ranges.len(),
            reason: format!("atoms {}..{} are not covered", next, num_atoms),
        });
    }

    Ok(())
}

pub(crate) fn build_chunks(uc: &UnitCell, ranges: Vec<Range<usize>>) -> Vec<BetaChunk> {
    let mut offset = 0;

    ranges
        .into_iter()
        .map(|r| {
            let chunk = BetaChunk::new(uc, r, offset);
            offset += chunk.num_beta();
            chunk
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Atom, AtomType, BetaChannel};

    fn cell(num_atoms: usize) -> UnitCell {
        let s = AtomType::new("s", vec![BetaChannel { l: 0, sigma: 0.3 }]).unwrap();
        let sp = AtomType::new("sp", vec![BetaChannel { l: 0, sigma: 0.3 }, BetaChannel { l: 1, sigma: 0.2 }]).unwrap();

        let atoms = (0..num_atoms)
            .map(|ia| Atom {
                itype: ia % 2,
                position: [ia as f64 / num_atoms as f64, 0.25, 0.5],
            })
            .collect();

        UnitCell::new([[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]], vec![s, sp], atoms).unwrap()
    }

    #[test]
    fn test_chunks_partition_atoms_once() {
        let uc = cell(31);

        for chunking in [
            BetaChunking::Count(1),
            BetaChunking::Count(4),
            BetaChunking::Count(31),
            BetaChunking::MaxBeta(1),
            BetaChunking::MaxBeta(10),
            BetaChunking::MaxBeta(1000),
        ]
        .iter()
        {
            let ranges = chunk_ranges(&uc, *chunking).unwrap();

            validate_ranges(&ranges, 31).unwrap();

            let chunks = build_chunks(&uc, ranges);

            let mut seen = vec![0; 31];
            let mut offset = 0;

            for c in chunks.iter() {
                assert_eq!(c.offset(), offset);
                offset += c.num_beta();

                for ia in c.atoms() {
                    seen[ia] += 1;
                    assert_eq!(c.columns()[c.atom_offset(ia)].atom, ia);
                }

                if let BetaChunking::MaxBeta(n) = chunking {
                    assert!(c.num_beta() <= *n || c.num_atoms() == 1);
                }
            }

            assert!(seen.iter().all(|&x| x == 1));
            assert_eq!(offset, uc.num_total_beta());
        }

        let four = chunk_ranges(&uc, BetaChunking::Count(4)).unwrap();
        assert_eq!(four.iter().map(|r| r.len()).collect::<Vec<_>>(), vec![8, 8, 8, 7]);
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(matches!(
            validate_ranges(&[0..3, 4..6], 6),
            Err(BetaError::ChunkPartition { chunk: 1, .. })
        ));
        assert!(matches!(
            validate_ranges(&[0..3, 2..6], 6),
            Err(BetaError::ChunkPartition { chunk: 1, .. })
        ));
        assert!(matches!(
            validate_ranges(&[0..3, 3..3, 3..6], 6),
            Err(BetaError::ChunkPartition { chunk: 1, .. })
        ));
        assert!(matches!(
            validate_ranges(&[0..3], 6),
            Err(BetaError::ChunkPartition { chunk: 1, .. })
        ));
        assert!(validate_ranges(&[0..1, 1..6], 6).is_ok());

        assert!(matches!(
            chunk_ranges(&cell(3), BetaChunking::Count(4)),
            Err(BetaError::ChunkCount { count: 4, num_atoms: 3 })
        ));
    }
}
