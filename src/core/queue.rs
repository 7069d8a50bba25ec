//! # Queue Module
//!
//! Thread-safe FIFO backlog of pending jobs.
//!
//! Handing out a `Job` moves it out of the queue entirely; from that
//! moment it belongs to exactly one worker until it reaches a terminal
//! state. There is no peeking and no shared references to queued jobs.

use crate::core::discover::SourceFormat;
use crate::core::job::Job;
use std::collections::VecDeque;
use std::sync::Mutex;

/// FIFO backlog of pending jobs
pub struct JobQueue {
    inner: Mutex<VecDeque<Job>>,
}

impl JobQueue {
    pub fn new(jobs: impl IntoIterator<Item = Job>) -> Self {
        Self {
            inner: Mutex::new(jobs.into_iter().collect()),
        }
    }

    /// Take the next job in discovery order
    pub fn take(&self) -> Option<Job> {
        self.inner.lock().expect("queue lock poisoned").pop_front()
    }

    /// Take the first non-RAW job, preserving the relative order of
    /// everything else.
    ///
    /// Used when the RAW concurrency cap is saturated: RAW jobs stay at
    /// their queue position so they are not starved once the cap frees up.
    pub fn take_non_raw(&self) -> Option<Job> {
        let mut queue = self.inner.lock().expect("queue lock poisoned");
        let index = queue
            .iter()
            .position(|job| job.format != SourceFormat::Raw)?;
        queue.remove(index)
    }

    /// Return a job to the front of the queue (dispatch backed out)
    pub fn push_front(&self, job: Job) {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .push_front(job);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn job(name: &str, format: SourceFormat) -> Job {
        Job::pending(
            PathBuf::from(format!("/in/{}", name)),
            PathBuf::from(format!("/out/{}", name)),
            format,
            1_000,
        )
    }

    #[test]
    fn take_preserves_fifo_order() {
        let queue = JobQueue::new(vec![
            job("a.jpg", SourceFormat::Jpeg),
            job("b.jpg", SourceFormat::Jpeg),
        ]);

        assert!(queue.take().unwrap().source.ends_with("a.jpg"));
        assert!(queue.take().unwrap().source.ends_with("b.jpg"));
        assert!(queue.take().is_none());
    }

    #[test]
    fn take_non_raw_skips_over_raw_jobs() {
        let queue = JobQueue::new(vec![
            job("a.cr2", SourceFormat::Raw),
            job("b.jpg", SourceFormat::Jpeg),
        ]);

        let taken = queue.take_non_raw().unwrap();
        assert!(taken.source.ends_with("b.jpg"));

        // The RAW job kept its place at the front
        assert!(queue.take().unwrap().source.ends_with("a.cr2"));
    }

    #[test]
    fn take_non_raw_on_all_raw_queue_returns_none() {
        let queue = JobQueue::new(vec![job("a.cr2", SourceFormat::Raw)]);
        assert!(queue.take_non_raw().is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn push_front_restores_dispatch_order() {
        let queue = JobQueue::new(vec![job("b.jpg", SourceFormat::Jpeg)]);
        let returned = job("a.cr2", SourceFormat::Raw);
        queue.push_front(returned);

        assert!(queue.take().unwrap().source.ends_with("a.cr2"));
    }

    #[test]
    fn queue_is_shareable_across_threads() {
        let queue = Arc::new(JobQueue::new(
            (0..100).map(|i| job(&format!("{}.jpg", i), SourceFormat::Jpeg)),
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let q = Arc::clone(&queue);
                std::thread::spawn(move || {
                    let mut taken = 0;
                    while q.take().is_some() {
                        taken += 1;
                    }
                    taken
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // Every job was handed out exactly once
        assert_eq!(total, 100);
        assert!(queue.is_empty());
    }
}
