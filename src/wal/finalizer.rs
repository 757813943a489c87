//! Commit finalization pool
//!
//! The flush thread hands each durable transaction to this pool so that
//! visibility flips do not wait behind the next disk write.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::txn::{CommitFinalizer, WalTxn};
use crate::observability::{Event, Logger};

type Job = Arc<dyn WalTxn>;

pub struct FinalizerPool {
    finalizer: Arc<dyn CommitFinalizer>,
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl FinalizerPool {
    pub fn new(workers: usize, finalizer: Arc<dyn CommitFinalizer>) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..workers.max(1))
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let finalizer: Arc<dyn CommitFinalizer> = Arc::clone(&finalizer);
                thread::Builder::new()
                    .name(format!("wal-finalizer-{}", id))
                    .spawn(move || worker_loop(receiver, finalizer))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    Logger::error(
                        Event::FinalizerSpawnFailed.as_str(),
                        &[("error", &e.to_string())],
                    );
                    None
                }
            })
            .collect();
        Self {
            finalizer,
            sender: Some(sender),
            workers,
        }
    }

    /// Queue a transaction for finalization. Finalization order across
    /// workers is unspecified.
    pub fn submit(&self, txn: Arc<dyn WalTxn>) {
        let txn = match self.sender.as_ref() {
            Some(sender) if !self.workers.is_empty() => match sender.send(txn) {
                Ok(()) => return,
                Err(mpsc::SendError(txn)) => txn,
            },
            _ => txn,
        };
        // no worker left; finalize inline rather than drop the commit
        Logger::warn(
            Event::FinalizerUnavailable.as_str(),
            &[("txn_id", &txn.txn_id().to_string())],
        );
        self.finalizer.finalize(txn);
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Let workers drain what is queued, then join them.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for FinalizerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>, finalizer: Arc<dyn CommitFinalizer>) {
    loop {
        let job = {
            let guard = receiver.lock().unwrap_or_else(|e| e.into_inner());
            guard.recv()
        };
        match job {
            Ok(txn) => finalizer.finalize(txn),
            Err(_) => return,
        }
    }
}
