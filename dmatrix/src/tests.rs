use super::*;
use dwmpi::{launch, SelfComm};
use matrix::Matrix;
use types::c64;

#[test]
fn test_grid_must_match_communicator() {
    assert!(matches!(
        BlacsGrid::new(Arc::new(SelfComm::new()), 2, 1),
        Err(DMatrixError::GridSize { nrow: 2, ncol: 1, size: 1 })
    ));

    let grid = BlacsGrid::new(Arc::new(SelfComm::new()), 1, 1).unwrap();
    assert_eq!(grid.coords(0), (0, 0));
}

#[test]
fn test_mapping_is_bijective() {
    let (m, n) = (37, 23);

    for &(pr, pc, bs) in [(2, 3, 4), (3, 2, 5), (1, 6, 3), (6, 1, 16)].iter() {
        let claimed = launch(pr * pc, |comm| {
            let grid = Arc::new(BlacsGrid::new(Arc::new(comm.clone()), pr, pc).unwrap());

            assert_eq!(grid.rank(grid.rank_row(), grid.rank_col()), comm.rank());

            let dm = DMatrix::<f64>::new(m, n, &grid, bs, bs).unwrap();

            let mut owned = Vec::new();

            for jl in 0..dm.num_cols_local() {
                for il in 0..dm.num_rows_local() {
                    let (i, j) = dm.local_to_global(il, jl);

                    let loc = dm.locate(i, j);
                    assert_eq!(loc.rank, comm.rank());
                    assert_eq!((loc.local_row, loc.local_col), (il, jl));

                    owned.push((i, j));
                }
            }

            owned
        });

        let mut seen = vec![0; m * n];

        for owned in claimed.iter() {
            for &(i, j) in owned.iter() {
                seen[j * m + i] += 1;
            }
        }

        assert!(seen.iter().all(|&c| c == 1), "grid {}x{} block {}", pr, pc, bs);
    }
}

#[test]
fn test_gather_restores_global_matrix() {
    let global = Matrix::<c64>::from_fn(19, 11, |i, j| c64::new(i as f64, j as f64));

    let gathered = launch(4, |comm| {
        let grid = Arc::new(BlacsGrid::new(Arc::new(comm.clone()), 2, 2).unwrap());

        let mut dm = DMatrix::from_global(&global, &grid, 3, 2).unwrap();

        let owned = dm.set(5, 7, c64::new(-1.0, 0.0));
        assert_eq!(owned, dm.get(5, 7).is_some());

        dm.gather()
    });

    let mut expected = global.clone();
    expected[[5, 7]] = c64::new(-1.0, 0.0);

    for g in gathered.iter() {
        assert_eq!(g, &expected);
    }
}

#[test]
fn test_identity_and_device_copy() {
    let grid = Arc::new(BlacsGrid::new(Arc::new(SelfComm::new()), 1, 1).unwrap());
    let pool = memory::MemoryPool::new(memory::MemoryType::Device, None);

    let mut dm = DMatrix::<f64>::new(5, 5, &grid, 2, 2).unwrap();
    dm.set_identity();

    dm.allocate(memory::MemoryType::Device, &pool).unwrap();
    dm.copy_to(memory::MemoryType::Device);

    assert_eq!(dm.local().at(memory::MemoryType::Device), Matrix::<f64>::identity(5).as_slice());
    assert_eq!(dm.gather(), Matrix::identity(5));
}
