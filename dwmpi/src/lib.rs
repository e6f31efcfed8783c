// Every rank runs the same control flow. Collectives below are built from
// point-to-point messages and must be issued by all ranks of a communicator
// in the same order; there is no timeout.

mod local;
pub use local::*;

#[cfg(feature = "mpi")]
mod mpi_sys;

#[cfg(feature = "mpi")]
mod world;
#[cfg(feature = "mpi")]
pub use world::*;

use bytemuck::Pod;
use std::ops::AddAssign;

pub const MPI_ROOT: usize = 0;

// user tags live below this value
pub const TAG_RESERVED: i32 = 0x7000_0000;

const TAG_BARRIER: i32 = TAG_RESERVED + 1;
const TAG_BCAST: i32 = TAG_RESERVED + 2;
const TAG_REDUCE: i32 = TAG_RESERVED + 3;
const TAG_GATHER_COUNT: i32 = TAG_RESERVED + 4;
const TAG_GATHER_DATA: i32 = TAG_RESERVED + 5;

pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn send_bytes(&self, buf: &[u8], dest: usize, tag: i32);

    /// Blocks until a message from `source` with `tag` arrives. The message
    /// length must equal `buf.len()`.
    fn recv_bytes(&self, buf: &mut [u8], source: usize, tag: i32);

    fn barrier(&self) {
        let size = self.size();

        if size == 1 {
            return;
        }

        if self.rank() == MPI_ROOT {
            for src in 1..size {
                self.recv_bytes(&mut [], src, TAG_BARRIER);
            }
            for dest in 1..size {
                self.send_bytes(&[], dest, TAG_BARRIER);
            }
        } else {
            self.send_bytes(&[], MPI_ROOT, TAG_BARRIER);
            self.recv_bytes(&mut [], MPI_ROOT, TAG_BARRIER);
        }
    }

    fn is_root(&self) -> bool {
        self.rank() == MPI_ROOT
    }
}

pub fn send_slice<T: Pod>(comm: &dyn Communicator, buf: &[T], dest: usize, tag: i32) {
    comm.send_bytes(bytemuck::cast_slice(buf), dest, tag);
}

pub fn recv_slice<T: Pod>(comm: &dyn Communicator, buf: &mut [T], source: usize, tag: i32) {
    comm.recv_bytes(bytemuck::cast_slice_mut(buf), source, tag);
}

pub fn send_scalar<T: Pod>(comm: &dyn Communicator, v: &T, dest: usize, tag: i32) {
    send_slice(comm, std::slice::from_ref(v), dest, tag);
}

pub fn recv_scalar<T: Pod>(comm: &dyn Communicator, v: &mut T, source: usize, tag: i32) {
    recv_slice(comm, std::slice::from_mut(v), source, tag);
}

pub fn bcast_slice<T: Pod>(comm: &dyn Communicator, buf: &mut [T], root: usize) {
    let size = comm.size();

    if size == 1 {
        return;
    }

    if comm.rank() == root {
        for dest in (0..size).filter(|&r| r != root) {
            send_slice(comm, buf, dest, TAG_BCAST);
        }
    } else {
        recv_slice(comm, buf, root, TAG_BCAST);
    }
}

/// Element-wise sum over all ranks; every rank receives the root's result.
/// The root adds contributions in rank order, so the result does not depend
/// on message arrival.
pub fn allreduce_sum<T: Pod + AddAssign>(comm: &dyn Communicator, buf: &mut [T]) {
    let size = comm.size();

    if size == 1 {
        return;
    }

    if comm.is_root() {
        let mut work = buf.to_vec();

        for src in 1..size {
            recv_slice(comm, &mut work, src, TAG_REDUCE);

            for (x, y) in buf.iter_mut().zip(work.iter()) {
                *x += *y;
            }
        }
    } else {
        send_slice(comm, buf, MPI_ROOT, TAG_REDUCE);
    }

    bcast_slice(comm, buf, MPI_ROOT);
}

pub fn sum_scalar<T: Pod + AddAssign>(comm: &dyn Communicator, v: T) -> T {
    let mut buf = [v];

    allreduce_sum(comm, &mut buf);

    buf[0]
}

/// Gathers variable-length pieces from every rank onto every rank, indexed by
/// source rank.
pub fn allgatherv<T: Pod>(comm: &dyn Communicator, local: &[T]) -> Vec<Vec<T>> {
    let size = comm.size();

    if size == 1 {
        return vec![local.to_vec()];
    }

    let mut counts = vec![0u64; size];

    let mut pieces: Vec<Vec<T>> = vec![Vec::new(); size];

    if comm.is_root() {
        counts[MPI_ROOT] = local.len() as u64;
        pieces[MPI_ROOT] = local.to_vec();

        for src in 1..size {
            recv_scalar(comm, &mut counts[src], src, TAG_GATHER_COUNT);

            let mut piece = vec![T::zeroed(); counts[src] as usize];
            recv_slice(comm, &mut piece, src, TAG_GATHER_DATA);

            pieces[src] = piece;
        }
    } else {
        send_scalar(comm, &(local.len() as u64), MPI_ROOT, TAG_GATHER_COUNT);
        send_slice(comm, local, MPI_ROOT, TAG_GATHER_DATA);
    }

    bcast_slice(comm, &mut counts, MPI_ROOT);

    for (irank, piece) in pieces.iter_mut().enumerate() {
        if !comm.is_root() {
            piece.resize(counts[irank] as usize, T::zeroed());
        }

        bcast_slice(comm, piece, MPI_ROOT);
    }

    pieces
}

pub fn allgather<T: Pod>(comm: &dyn Communicator, local: &[T]) -> Vec<T> {
    allgatherv(comm, local).into_iter().flatten().collect()
}
