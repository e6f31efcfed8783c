#![allow(non_camel_case_types, dead_code)]
// MPICH ABI subset used by MpiWorld.
use std::os::raw::*;

pub type MpiComm = c_int;
pub type MpiDatatype = c_int;

pub static MPI_COMM_WORLD: MpiComm = 0x44000000;

pub static MPI_BYTE: MpiDatatype = 0x4c00010d;

#[repr(C)]
#[derive(Default)]
pub struct MPI_Status {
    count: c_int,
    cancelled: c_int,
    mpi_source: c_int,
    mpi_tag: c_int,
    mpi_error: c_int,
}

#[link(name = "mpich", kind = "dylib")]
extern "C" {
    pub fn MPI_Init(argc: *const c_int, argv: *const c_char) -> c_int;

    pub fn MPI_Finalize() -> c_int;

    pub fn MPI_Comm_rank(comm: MpiComm, rank: *mut c_int) -> c_int;

    pub fn MPI_Comm_size(comm: MpiComm, size: *mut c_int) -> c_int;

    pub fn MPI_Send(
        buf: *const c_void,
        count: c_int,
        datatype: MpiDatatype,
        dest: c_int,
        tag: c_int,
        comm: MpiComm,
    ) -> c_int;

    pub fn MPI_Recv(
        buf: *mut c_void,
        count: c_int,
        datatype: MpiDatatype,
        source: c_int,
        tag: c_int,
        comm: MpiComm,
        status: *mut MPI_Status,
    ) -> c_int;

    pub fn MPI_Barrier(comm: MpiComm) -> c_int;

    pub fn MPI_Abort(comm: MpiComm, errorcode: c_int) -> c_int;
}
