use crate::mpi_sys::*;
use crate::Communicator;

use std::os::raw::*;
use std::ptr;

/// MPI_COMM_WORLD. Initialises MPI on construction and finalises on drop;
/// create exactly one per process.
pub struct MpiWorld {
    rank: usize,
    size: usize,
}

impl MpiWorld {
    pub fn init() -> MpiWorld {
        let mut rank = 0;
        let mut size = 0;

        unsafe {
            check(MPI_Init(ptr::null(), ptr::null()), "MPI_Init");
            check(MPI_Comm_rank(MPI_COMM_WORLD, &mut rank), "MPI_Comm_rank");
            check(MPI_Comm_size(MPI_COMM_WORLD, &mut size), "MPI_Comm_size");
        }

        MpiWorld {
            rank: rank as usize,
            size: size as usize,
        }
    }

    pub fn abort(&self, errorcode: i32) -> ! {
        unsafe {
            MPI_Abort(MPI_COMM_WORLD, errorcode);
        }

        std::process::abort()
    }
}

impl Drop for MpiWorld {
    fn drop(&mut self) {
        unsafe {
            MPI_Finalize();
        }
    }
}

fn check(code: c_int, call: &str) {
    if code != 0 {
        panic!("{} exit code: {}", call, code);
    }
}

impl Communicator for MpiWorld {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_bytes(&self, buf: &[u8], dest: usize, tag: i32) {
        let code = unsafe {
            MPI_Send(
                buf.as_ptr() as *const c_void,
                buf.len() as c_int,
                MPI_BYTE,
                dest as c_int,
                tag,
                MPI_COMM_WORLD,
            )
        };

        check(code, "MPI_Send");
    }

    fn recv_bytes(&self, buf: &mut [u8], source: usize, tag: i32) {
        let mut status = MPI_Status::default();

        let code = unsafe {
            MPI_Recv(
                buf.as_mut_ptr() as *mut c_void,
                buf.len() as c_int,
                MPI_BYTE,
                source as c_int,
                tag,
                MPI_COMM_WORLD,
                &mut status,
            )
        };

        check(code, "MPI_Recv");
    }

    fn barrier(&self) {
        check(unsafe { MPI_Barrier(MPI_COMM_WORLD) }, "MPI_Barrier");
    }
}
