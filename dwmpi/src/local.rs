use crate::Communicator;

use log::error;

use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const NO_RANK: usize = usize::MAX;

#[derive(Default)]
struct Mailbox {
    queues: Mutex<HashMap<(usize, i32), VecDeque<Vec<u8>>>>,
    arrived: Condvar,
}

/// In-process world: every rank is a thread, messages go through per-rank
/// mailboxes keyed by (source, tag).
pub struct LocalWorld {
    mailboxes: Vec<Mailbox>,
    aborted: AtomicBool,
    first_abort: AtomicUsize,
}

impl LocalWorld {
    pub fn new(size: usize) -> Arc<LocalWorld> {
        assert!(size > 0, "LocalWorld needs at least one rank");

        Arc::new(LocalWorld {
            mailboxes: (0..size).map(|_| Mailbox::default()).collect(),
            aborted: AtomicBool::new(false),
            first_abort: AtomicUsize::new(NO_RANK),
        })
    }

    pub fn size(&self) -> usize {
        self.mailboxes.len()
    }

    pub fn comm(self: &Arc<Self>, rank: usize) -> LocalComm {
        assert!(rank < self.size(), "rank {} outside world of {}", rank, self.size());

        LocalComm {
            rank,
            world: Arc::clone(self),
        }
    }

    fn abort(&self, rank: usize) {
        let _ = self
            .first_abort
            .compare_exchange(NO_RANK, rank, Ordering::SeqCst, Ordering::SeqCst);

        error!("rank {} aborted, waking {} mailboxes", rank, self.size());

        self.aborted.store(true, Ordering::SeqCst);

        for mb in self.mailboxes.iter() {
            let _guard = mb.queues.lock();
            mb.arrived.notify_all();
        }
    }
}

#[derive(Clone)]
pub struct LocalComm {
    rank: usize,
    world: Arc<LocalWorld>,
}

impl LocalComm {
    /// A communicator containing only the calling thread.
    pub fn solo() -> LocalComm {
        LocalWorld::new(1).comm(0)
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.world.size()
    }

    fn send_bytes(&self, buf: &[u8], dest: usize, tag: i32) {
        assert!(dest < self.size(), "send to rank {} outside world of {}", dest, self.size());

        let mb = &self.world.mailboxes[dest];

        let mut queues = mb.queues.lock();

        queues
            .entry((self.rank, tag))
            .or_default()
            .push_back(buf.to_vec());

        mb.arrived.notify_all();
    }

    fn recv_bytes(&self, buf: &mut [u8], source: usize, tag: i32) {
        assert!(source < self.size(), "receive from rank {} outside world of {}", source, self.size());

        let mb = &self.world.mailboxes[self.rank];

        let mut queues = mb.queues.lock();

        loop {
            if let Some(msg) = queues.get_mut(&(source, tag)).and_then(|q| q.pop_front()) {
                assert_eq!(
                    msg.len(),
                    buf.len(),
                    "rank {}: message from {} (tag {}) has {} bytes, expected {}",
                    self.rank,
                    source,
                    tag,
                    msg.len(),
                    buf.len()
                );

                buf.copy_from_slice(&msg);

                return;
            }

            if self.world.aborted.load(Ordering::SeqCst) {
                panic!(
                    "rank {}: peer rank {} aborted",
                    self.rank,
                    self.world.first_abort.load(Ordering::SeqCst)
                );
            }

            mb.arrived.wait(&mut queues);
        }
    }
}

/// `Communicator::self` equivalent.
#[derive(Clone)]
pub struct SelfComm(LocalComm);

impl SelfComm {
    pub fn new() -> SelfComm {
        SelfComm(LocalComm::solo())
    }
}

impl Default for SelfComm {
    fn default() -> Self {
        SelfComm::new()
    }
}

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send_bytes(&self, buf: &[u8], dest: usize, tag: i32) {
        self.0.send_bytes(buf, dest, tag)
    }

    fn recv_bytes(&self, buf: &mut [u8], source: usize, tag: i32) {
        self.0.recv_bytes(buf, source, tag)
    }
}

/// Runs `f` on `size` ranks and returns the per-rank results in rank order.
/// A panic on any rank wakes the others and is re-raised here.
pub fn launch<R, F>(size: usize, f: F) -> Vec<R>
where
    F: Fn(&LocalComm) -> R + Sync,
    R: Send,
{
    let world = LocalWorld::new(size);

    let outcomes: Vec<Result<R, Box<dyn Any + Send>>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..size)
            .map(|rank| {
                let comm = world.comm(rank);
                let f = &f;
                let world = &world;

                s.spawn(move || {
                    let r = panic::catch_unwind(AssertUnwindSafe(|| f(&comm)));

                    if r.is_err() {
                        world.abort(rank);
                    }

                    r
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(Err))
            .collect()
    });

    let first = world.first_abort.load(Ordering::SeqCst);

    let mut results = Vec::with_capacity(size);
    let mut failure = None;

    for (rank, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(r) => results.push(r),
            Err(payload) => {
                if failure.is_none() || rank == first {
                    failure = Some(payload);
                }
            }
        }
    }

    if let Some(payload) = failure {
        panic::resume_unwind(payload);
    }

    results
}
