use crate::BetaError;

use nalgebra::Vector3;
use std::f64::consts::PI;

/// One projector channel: angular momentum `l` and the width `sigma` of
/// the Gaussian form factor `exp(-sigma * q^2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaChannel {
    pub l: usize,
    pub sigma: f64,
}

#[derive(Debug, Clone)]
pub struct AtomType {
    label: String,
    channels: Vec<BetaChannel>,
}

impl AtomType {
    pub fn new(label: &str, channels: Vec<BetaChannel>) -> Result<AtomType, BetaError> {
        if let Some(c) = channels.iter().find(|c| c.l > 1) {
            return Err(BetaError::UnsupportedChannel {
                label: label.to_string(),
                l: c.l,
            });
        }

        Ok(AtomType {
            label: label.to_string(),
            channels,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn channels(&self) -> &[BetaChannel] {
        &self.channels
    }

    /// sum over channels of 2l+1
    pub fn num_beta(&self) -> usize {
        self.channels.iter().map(|c| 2 * c.l + 1).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
    pub itype: usize,
    /// fractional coordinates
    pub position: [f64; 3],
}

#[derive(Debug, Clone)]
pub struct UnitCell {
    lattice: [[f64; 3]; 3],
    reciprocal: [[f64; 3]; 3],
    volume: f64,
    atom_types: Vec<AtomType>,
    atoms: Vec<Atom>,
}

impl UnitCell {
    /// `lattice[i]` is the i-th lattice vector in Cartesian coordinates.
    pub fn new(lattice: [[f64; 3]; 3], atom_types: Vec<AtomType>, atoms: Vec<Atom>) -> Result<UnitCell, BetaError> {
        let a = Vector3::from(lattice[0]);
        let b = Vector3::from(lattice[1]);
        let c = Vector3::from(lattice[2]);

        let volume = a.dot(&b.cross(&c));

        if volume.abs() < 1e-12 {
            return Err(BetaError::DegenerateLattice);
        }

        let scale = 2.0 * PI / volume;

        let b1 = b.cross(&c) * scale;
        let b2 = c.cross(&a) * scale;
        let b3 = a.cross(&b) * scale;

        for (ia, atom) in atoms.iter().enumerate() {
            if atom.itype >= atom_types.len() {
                return Err(BetaError::UnknownAtomType {
                    atom: ia,
                    itype: atom.itype,
                    num_types: atom_types.len(),
                });
            }
        }

        Ok(UnitCell {
            lattice,
            reciprocal: [[b1.x, b1.y, b1.z], [b2.x, b2.y, b2.z], [b3.x, b3.y, b3.z]],
            volume: volume.abs(),
            atom_types,
            atoms,
        })
    }

    pub fn lattice_vectors(&self) -> &[[f64; 3]; 3] {
        &self.lattice
    }

    pub fn reciprocal_lattice_vectors(&self) -> &[[f64; 3]; 3] {
        &self.reciprocal
    }

    pub fn omega(&self) -> f64 {
        self.volume
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn num_atom_types(&self) -> usize {
        self.atom_types.len()
    }

    pub fn atom(&self, ia: usize) -> &Atom {
        &self.atoms[ia]
    }

    pub fn atom_type(&self, itype: usize) -> &AtomType {
        &self.atom_types[itype]
    }

    pub fn atom_type_of(&self, ia: usize) -> &AtomType {
        &self.atom_types[self.atoms[ia].itype]
    }

    pub fn num_beta(&self, ia: usize) -> usize {
        self.atom_type_of(ia).num_beta()
    }

    pub fn num_total_beta(&self) -> usize {
        (0..self.num_atoms()).map(|ia| self.num_beta(ia)).sum()
    }
}

#[test]
fn test_reciprocal_lattice() {
    let uc = UnitCell::new(
        [[2.0, 0.0, 0.0], [0.0, 3.0, 0.0], [1.0, 0.0, 4.0]],
        vec![AtomType::new("A", vec![BetaChannel { l: 0, sigma: 1.0 }, BetaChannel { l: 1, sigma: 0.5 }]).unwrap()],
        vec![Atom {
            itype: 0,
            position: [0.0; 3],
        }],
    )
    .unwrap();

    assert!((uc.omega() - 24.0).abs() < 1e-12);
    assert_eq!(uc.num_total_beta(), 4);

    let a = uc.lattice_vectors();
    let b = uc.reciprocal_lattice_vectors();

    for i in 0..3 {
        for j in 0..3 {
            let d: f64 = (0..3).map(|x| a[i][x] * b[j][x]).sum();
            let expected = if i == j { 2.0 * PI } else { 0.0 };
            assert!((d - expected).abs() < 1e-12);
        }
    }

    assert!(matches!(
        AtomType::new("B", vec![BetaChannel { l: 2, sigma: 1.0 }]),
        Err(BetaError::UnsupportedChannel { l: 2, .. })
    ));
}
