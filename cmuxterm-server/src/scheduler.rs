//! The "main" scheduler: one thread that runs every request against the
//! topology, serializing mutations so each RPC is individually atomic.
//! Client handlers marshal closures here and block on the reply.

use anyhow::Context;

type Job = Box<dyn FnOnce() + Send>;

#[derive(Clone)]
pub struct Scheduler {
    tx: flume::Sender<Job>,
}

impl Scheduler {
    pub fn spawn() -> Self {
        let (tx, rx) = flume::unbounded::<Job>();
        std::thread::Builder::new()
            .name("mux-main".to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    job();
                }
                log::debug!("scheduler thread exiting");
            })
            .expect("failed to spawn scheduler thread");
        Self { tx }
    }

    /// Run `f` on the scheduler thread and block until its result is
    /// available.
    pub fn call<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.tx
            .send(Box::new(move || {
                reply_tx.send(f()).ok();
            }))
            .map_err(|_| anyhow::anyhow!("scheduler is gone"))?;
        reply_rx.recv().context("waiting for scheduler reply")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_run_in_order_and_return() {
        let scheduler = Scheduler::spawn();
        let mut results = vec![];
        for i in 0..10 {
            results.push(scheduler.call(move || i * 2).unwrap());
        }
        assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn calls_from_many_threads_are_serialized() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let scheduler = Scheduler::spawn();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];
        for _ in 0..8 {
            let scheduler = scheduler.clone();
            let counter = Arc::clone(&counter);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let counter = Arc::clone(&counter);
                    scheduler
                        .call(move || {
                            // non-atomic read-modify-write is safe because
                            // the scheduler serializes jobs
                            let v = counter.load(Ordering::Relaxed);
                            counter.store(v + 1, Ordering::Relaxed);
                        })
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 800);
    }
}
