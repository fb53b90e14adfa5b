//! Fixed set of worker threads fed through a crossbeam channel.

use std::sync::{Arc, Weak};

pub(super) type Task = Box<dyn FnOnce() + Send>;

pub(super) struct WorkerPool {
    /// The only strong reference. Dropping it disconnects the channel once the strokes'
    /// temporary upgrades are gone, and workers exit after draining what is left.
    sender: Option<Arc<crossbeam::channel::Sender<Task>>>,
    workers: Vec<std::thread::JoinHandle<()>>,
}
impl WorkerPool {
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam::channel::unbounded::<Task>();
        let workers = (0..threads.max(1))
            .map(|idx| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("Stroke worker {idx}"))
                    .spawn(move || {
                        while let Ok(task) = receiver.recv() {
                            task();
                        }
                        log::trace!("stroke worker {idx} exiting");
                    })
            })
            .collect::<std::io::Result<Vec<_>>>()?;
        log::debug!("started {} stroke workers", workers.len());
        Ok(Self {
            sender: Some(Arc::new(sender)),
            workers,
        })
    }
    pub fn spawner(&self) -> Spawner {
        Spawner {
            sender: self.sender.as_ref().map_or_else(Weak::new, Arc::downgrade),
        }
    }
    pub fn threads(&self) -> usize {
        self.workers.len()
    }
}
impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("stroke worker panicked outside of a job");
            }
        }
    }
}

/// Handle held by strokes to get work onto the pool.
#[derive(Clone)]
pub(super) struct Spawner {
    sender: Weak<crossbeam::channel::Sender<Task>>,
}
impl Spawner {
    /// Run `task` on a worker. If the pool is gone, it runs on the calling thread instead
    /// so that the stroke can still reach its end.
    pub fn spawn(&self, task: Task) {
        let task = match self.sender.upgrade() {
            Some(sender) => match sender.send(task) {
                Ok(()) => return,
                Err(crossbeam::channel::SendError(task)) => task,
            },
            None => task,
        };
        log::warn!("stroke executor is shut down, running job inline");
        task();
    }
}

#[cfg(test)]
mod test {
    use super::WorkerPool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn drop_drains_queue() {
        let count = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(2).unwrap();
        let spawner = pool.spawner();
        for _ in 0..32 {
            let count = count.clone();
            spawner.spawn(Box::new(move || {
                count.fetch_add(1, Ordering::Relaxed);
            }));
        }
        drop(pool);
        assert_eq!(count.load(Ordering::Relaxed), 32);

        // Pool is gone, falls back to running here.
        let inline = count.clone();
        spawner.spawn(Box::new(move || {
            inline.fetch_add(1, Ordering::Relaxed);
        }));
        assert_eq!(count.load(Ordering::Relaxed), 33);
    }
}
