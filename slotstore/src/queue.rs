//! Double-buffered mutation queue.
//!
//! Mutations are appended to the *active* buffer under a short lock. Whoever
//! finds the queue idle becomes the drainer: it flips the active index so new
//! work lands in the other buffer, releases the lock, and runs the captured
//! batch in FIFO order. It keeps flipping until it captures an empty buffer, so
//! work enqueued mid-drain is applied by the same pass.
//!
//! A pause fences the queue: the buffer holding everything submitted before
//! the pause call is drained, and the active index flips so later work waits
//! in the other buffer. The drainer checks for a pending pause between
//! batches, so a pause never waits on an unbounded stream of writers.
//!
//! The lock is never held while a mutation runs.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tracing::{debug, error, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueState {
    Idle,
    Draining,
    Paused,
}

/// How far a drain runs when no pause is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainMode {
    /// Keep flipping until an empty buffer is captured.
    UntilEmpty,
    /// Run one captured batch; later work waits for the next drain.
    Once,
}

/// Two buffers: `slots[active]` takes appends. While `pause_requested` is
/// set, `slots[active ^ 1]` is the fence: work submitted before the pause.
/// Otherwise it is empty outside of a drainer's batch.
#[derive(Debug)]
struct Buffers<M> {
    slots: [VecDeque<M>; 2],
    active: usize,
    state: QueueState,
    pause_requested: bool,
}

impl<M> Buffers<M> {
    fn pending(&self) -> usize {
        self.slots[0].len() + self.slots[1].len()
    }

    /// Drop the fence, keeping fenced work ahead of newer work.
    fn lift_fence(&mut self) {
        let active = self.active;
        let newer = mem::take(&mut self.slots[active]);
        let mut merged = mem::take(&mut self.slots[active ^ 1]);
        merged.extend(newer);
        self.slots[active] = merged;
        self.pause_requested = false;
    }
}

/// Thread-safe FIFO of pending mutations with a single logical writer.
///
/// The queue owns no domain data. Each call that may drain takes a `run`
/// callback that applies one mutation to its target.
#[derive(Debug)]
pub struct MutationQueue<M> {
    buffers: Mutex<Buffers<M>>,
    changed: Condvar,
}

impl<M> Default for MutationQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MutationQueue<M> {
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(Buffers {
                slots: [VecDeque::new(), VecDeque::new()],
                active: 0,
                state: QueueState::Idle,
                pause_requested: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// Append `mutation`; drain on the calling thread if nobody else is.
    ///
    /// Returns immediately when another thread is draining or the queue is
    /// paused; the mutation is then applied by that drain or after resume.
    ///
    /// An error comes from whichever mutation failed in a drain this call
    /// started. That need not be `mutation`, which may still be queued.
    pub fn enqueue<F>(&self, mutation: M, mut run: F) -> Result<()>
    where
        F: FnMut(M) -> Result<()>,
    {
        let mut buffers = self.lock();
        let active = buffers.active;
        buffers.slots[active].push_back(mutation);
        if buffers.state != QueueState::Idle {
            trace!(pending = buffers.pending(), state = ?buffers.state, "mutation buffered");
            return Ok(());
        }
        buffers.state = QueueState::Draining;
        self.drain(buffers, &mut run, DrainMode::UntilEmpty, false)
    }

    /// Block until every mutation submitted before this call has been applied.
    ///
    /// Must not be called from inside `run` or while the calling thread holds
    /// a [`PauseGuard`] for this queue.
    pub fn flush<F>(&self, run: F) -> Result<()>
    where
        F: FnMut(M) -> Result<()>,
    {
        self.pause(run)?.resume()
    }

    /// Apply everything submitted before this call, then hold the queue
    /// paused until the returned guard is resumed or dropped.
    ///
    /// Mutations submitted after the call are buffered, not applied. If
    /// another thread is draining, it finishes its current batch and the
    /// fenced work, then hands the queue over.
    pub fn pause<F>(&self, mut run: F) -> Result<PauseGuard<'_, M, F>>
    where
        F: FnMut(M) -> Result<()>,
    {
        let mut buffers = self.wait_while(self.lock(), |buffers| {
            buffers.pause_requested || buffers.state == QueueState::Paused
        });
        buffers.pause_requested = true;
        buffers.active ^= 1;

        loop {
            match buffers.state {
                QueueState::Paused => break,
                QueueState::Idle => {
                    buffers.state = QueueState::Draining;
                    self.drain(buffers, &mut run, DrainMode::UntilEmpty, true)?;
                    break;
                }
                QueueState::Draining => {
                    buffers = self.wait_while(buffers, |buffers| {
                        buffers.state == QueueState::Draining
                    });
                }
            }
        }
        debug!("mutation queue paused");
        Ok(PauseGuard {
            queue: self,
            run,
            resumed: false,
        })
    }

    /// Number of mutations buffered and not yet picked up by a drain.
    pub fn pending(&self) -> usize {
        self.lock().pending()
    }

    pub fn is_idle(&self) -> bool {
        self.lock().state == QueueState::Idle
    }

    /// Leave the paused state, applying the work buffered during the pause.
    /// Work submitted while that batch runs is left to the next drain.
    fn resume<F>(&self, run: &mut F) -> Result<()>
    where
        F: FnMut(M) -> Result<()>,
    {
        let mut buffers = self.lock();
        debug!(pending = buffers.pending(), "mutation queue resumed");
        buffers.state = QueueState::Draining;
        self.drain(buffers, run, DrainMode::Once, false)
    }

    /// Run captured batches, then enter `Idle`, or `Paused` once a pending
    /// pause's fence is empty. Called with the state already set to `Draining`.
    ///
    /// On failure the failing mutation is dropped, the rest of its batch is
    /// put back ahead of newer work, and the queue returns to `Idle`. A
    /// pending pause survives unless `owns_pause` says this drain serves it.
    fn drain<'a, F>(
        &'a self,
        mut buffers: MutexGuard<'a, Buffers<M>>,
        run: &mut F,
        mode: DrainMode,
        owns_pause: bool,
    ) -> Result<()>
    where
        F: FnMut(M) -> Result<()>,
    {
        let mut applied = 0usize;
        let mut batches = 0usize;
        loop {
            let captured = if buffers.pause_requested {
                let fence = buffers.active ^ 1;
                if buffers.slots[fence].is_empty() {
                    buffers.pause_requested = false;
                    return Ok(self.finish(buffers, QueueState::Paused, applied));
                }
                fence
            } else {
                let captured = buffers.active;
                let done = mode == DrainMode::Once && batches > 0;
                if done || buffers.slots[captured].is_empty() {
                    return Ok(self.finish(buffers, QueueState::Idle, applied));
                }
                buffers.active = captured ^ 1;
                captured
            };
            let mut batch = mem::take(&mut buffers.slots[captured]);
            drop(buffers);

            let mut failure = None;
            while let Some(mutation) = batch.pop_front() {
                if let Err(err) = run(mutation) {
                    failure = Some(err);
                    break;
                }
                applied += 1;
            }
            batches += 1;

            buffers = self.lock();
            let Some(err) = failure else {
                // Hand the emptied buffer back so its allocation is reused,
                // unless a pause flipped new work into it meanwhile.
                if buffers.slots[captured].is_empty() {
                    buffers.slots[captured] = batch;
                }
                continue;
            };
            let requeued = batch.len();
            let target = if buffers.pause_requested {
                buffers.active ^ 1
            } else {
                buffers.active
            };
            let newer = mem::replace(&mut buffers.slots[target], batch);
            buffers.slots[target].extend(newer);
            if owns_pause && buffers.pause_requested {
                buffers.lift_fence();
            }
            self.finish(buffers, QueueState::Idle, applied);
            error!(applied, requeued, error = %err, "mutation failed, drain aborted");
            return Err(err);
        }
    }

    fn finish(&self, mut buffers: MutexGuard<'_, Buffers<M>>, state: QueueState, applied: usize) {
        buffers.state = state;
        drop(buffers);
        self.changed.notify_all();
        if applied > 0 {
            trace!(applied, ?state, "drain complete");
        }
    }

    fn wait_while<'a>(
        &'a self,
        buffers: MutexGuard<'a, Buffers<M>>,
        condition: impl FnMut(&mut Buffers<M>) -> bool,
    ) -> MutexGuard<'a, Buffers<M>> {
        self.changed
            .wait_while(buffers, condition)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Buffers<M>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a [`MutationQueue`] paused.
///
/// Call [`PauseGuard::resume`] to apply buffered mutations and observe their
/// errors; dropping the guard resumes as well and logs any failure.
#[must_use = "dropping the guard resumes the queue immediately"]
pub struct PauseGuard<'a, M, F>
where
    F: FnMut(M) -> Result<()>,
{
    queue: &'a MutationQueue<M>,
    run: F,
    resumed: bool,
}

impl<M, F> PauseGuard<'_, M, F>
where
    F: FnMut(M) -> Result<()>,
{
    pub fn resume(mut self) -> Result<()> {
        self.resumed = true;
        self.queue.resume(&mut self.run)
    }
}

impl<M, F> Drop for PauseGuard<'_, M, F>
where
    F: FnMut(M) -> Result<()>,
{
    fn drop(&mut self) {
        if self.resumed {
            return;
        }
        if let Err(err) = self.queue.resume(&mut self.run) {
            error!(error = %err, "buffered mutations failed after pause");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use anyhow::bail;

    use super::*;

    fn never_runs(_: u32) -> Result<()> {
        panic!("buffered mutation must not run on this thread");
    }

    #[test]
    fn idle_enqueue_applies_immediately_in_order() {
        let queue = MutationQueue::new();
        let mut log = Vec::new();
        for i in 0..5 {
            queue
                .enqueue(i, |m| {
                    log.push(m);
                    Ok(())
                })
                .expect("enqueue");
        }
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.pending(), 0);
        assert!(queue.is_idle());
    }

    /// A mutation enqueued while another thread drains is buffered, and the
    /// in-flight drain applies it after its own batch.
    #[test]
    fn enqueue_during_drain_is_picked_up_by_same_pass() {
        let queue = MutationQueue::new();
        let log = Mutex::new(Vec::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            let queue = &queue;
            let log = &log;
            let drainer = s.spawn(move || {
                queue.enqueue(1, |m| {
                    if m == 1 {
                        started_tx.send(()).expect("signal start");
                        go_rx.recv().expect("wait for go");
                    }
                    log.lock().expect("log").push(m);
                    Ok(())
                })
            });

            started_rx.recv().expect("drain started");
            queue.enqueue(2, never_runs).expect("buffered enqueue");
            assert_eq!(queue.pending(), 1);
            go_tx.send(()).expect("release drain");
            drainer.join().expect("join").expect("drain");
        });

        assert_eq!(*log.lock().expect("log"), vec![1, 2]);
        assert!(queue.is_idle());
        assert_eq!(queue.pending(), 0);
    }

    /// Flush waits for an in-flight drain instead of returning early.
    #[test]
    fn flush_blocks_until_in_flight_drain_finishes() {
        let queue = MutationQueue::new();
        let log = Mutex::new(Vec::new());
        let flushed = AtomicBool::new(false);
        let (started_tx, started_rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel::<()>();

        thread::scope(|s| {
            let queue = &queue;
            let log = &log;
            let flushed = &flushed;
            let drainer = s.spawn(move || {
                queue.enqueue(1, |m| {
                    if m == 1 {
                        started_tx.send(()).expect("signal start");
                        go_rx.recv().expect("wait for go");
                    }
                    log.lock().expect("log").push(m);
                    Ok(())
                })
            });
            started_rx.recv().expect("drain started");
            queue.enqueue(2, never_runs).expect("buffered enqueue");

            let flusher = s.spawn(move || {
                queue.flush(never_runs).expect("flush");
                flushed.store(true, Ordering::SeqCst);
            });

            thread::sleep(Duration::from_millis(50));
            assert!(!flushed.load(Ordering::SeqCst), "flush returned mid-drain");

            go_tx.send(()).expect("release drain");
            drainer.join().expect("join").expect("drain");
            flusher.join().expect("join flusher");
        });

        assert!(flushed.load(Ordering::SeqCst));
        assert_eq!(*log.lock().expect("log"), vec![1, 2]);
    }

    #[test]
    fn pause_buffers_until_resume() {
        let queue = MutationQueue::new();
        let mut log = Vec::new();
        let guard = queue
            .pause(|m| {
                log.push(m);
                Ok(())
            })
            .expect("pause");

        queue.enqueue(7, never_runs).expect("enqueue");
        queue.enqueue(8, never_runs).expect("enqueue");
        assert_eq!(queue.pending(), 2);
        assert!(!queue.is_idle());

        guard.resume().expect("resume");
        assert_eq!(log, vec![7, 8]);
        assert!(queue.is_idle());
    }

    #[test]
    fn dropping_pause_guard_resumes() {
        let queue = MutationQueue::new();
        let mut log = Vec::new();
        {
            let _guard = queue
                .pause(|m| {
                    log.push(m);
                    Ok(())
                })
                .expect("pause");
            queue.enqueue(1, never_runs).expect("enqueue");
        }
        assert_eq!(log, vec![1]);
        assert!(queue.is_idle());
    }

    /// A failing mutation aborts the pass; the rest stays queued in order.
    #[test]
    fn failed_mutation_requeues_remaining_batch() {
        let queue = MutationQueue::new();
        let mut log = Vec::new();
        let guard = queue
            .pause(|m| {
                if m == 2 {
                    bail!("mutation {} rejected", m);
                }
                log.push(m);
                Ok(())
            })
            .expect("pause");
        for i in 1..=4 {
            queue.enqueue(i, never_runs).expect("enqueue");
        }

        let err = guard.resume().unwrap_err();
        assert!(err.to_string().contains("mutation 2 rejected"));
        assert_eq!(log, vec![1]);
        assert_eq!(queue.pending(), 2);
        assert!(queue.is_idle());

        queue
            .flush(|m| {
                log.push(m);
                Ok(())
            })
            .expect("flush");
        assert_eq!(log, vec![1, 3, 4]);
    }

    /// Work submitted after a pause call stays buffered even while the
    /// pausing thread is still draining older work.
    #[test]
    fn pause_excludes_mutations_enqueued_after_request() {
        let queue = MutationQueue::<u32>::new();
        let log = Mutex::new(Vec::new());

        let guard = queue
            .pause(|m| if m == 0 { bail!("rejected") } else { Ok(()) })
            .expect("pause");
        queue.enqueue(0, never_runs).expect("enqueue");
        queue.enqueue(1, never_runs).expect("enqueue");
        assert!(guard.resume().is_err());
        assert_eq!(queue.pending(), 1);

        let (started_tx, started_rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        thread::scope(|s| {
            let queue = &queue;
            let log = &log;
            let pauser = s.spawn(move || {
                let guard = queue
                    .pause(|m| {
                        if m == 1 {
                            started_tx.send(()).expect("signal start");
                            go_rx.recv().expect("wait for go");
                        }
                        log.lock().expect("log").push(m);
                        Ok(())
                    })
                    .expect("pause");
                let at_pause = log.lock().expect("log").clone();
                drop(guard);
                at_pause
            });

            started_rx.recv().expect("pause drain started");
            queue.enqueue(2, never_runs).expect("buffered enqueue");
            go_tx.send(()).expect("release pause");
            assert_eq!(pauser.join().expect("join"), vec![1]);
        });

        assert_eq!(*log.lock().expect("log"), vec![1, 2]);
        assert!(queue.is_idle());
    }

    #[test]
    fn concurrent_enqueues_are_neither_lost_nor_reordered() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;

        let queue = MutationQueue::new();
        let log = Mutex::new(Vec::new());
        let apply = |m: (usize, usize)| -> Result<()> {
            log.lock().expect("log").push(m);
            Ok(())
        };

        thread::scope(|s| {
            for t in 0..THREADS {
                let queue = &queue;
                s.spawn(move || {
                    for i in 0..PER_THREAD {
                        queue.enqueue((t, i), apply).expect("enqueue");
                    }
                });
            }
        });
        queue.flush(apply).expect("flush");

        let log = log.into_inner().expect("log");
        assert_eq!(log.len(), THREADS * PER_THREAD);
        for t in 0..THREADS {
            let seq: Vec<usize> = log
                .iter()
                .filter(|(tt, _)| *tt == t)
                .map(|(_, i)| *i)
                .collect();
            assert_eq!(seq, (0..PER_THREAD).collect::<Vec<_>>());
        }
    }
}
