// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Dispatcher/worker messages and the channels that carry them.
//!
//! Each worker owns a one-deep mailbox for dispatch messages and the only
//! sender of its response channel, so a worker that exits without
//! answering disconnects the dispatcher's receiver.

use anyhow::anyhow;
use anyhow::Result;
use crossbeam::channel::bounded;
use crossbeam::channel::unbounded;
use crossbeam::channel::Receiver;
use crossbeam::channel::Sender;
use crossbeam::channel::TrySendError;

use crate::pcb::WorkerId;

/// "You are scheduled now", addressed to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub worker: WorkerId,
}

/// A worker's reply to exactly one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub worker: WorkerId,
    pub slot: usize,
    pub used_full_quantum: bool,
    pub terminated: bool,
}

/// Sending half of a worker's mailbox, held by the dispatcher.
#[derive(Debug, Clone)]
pub struct Mailbox {
    worker: WorkerId,
    tx: Sender<Dispatch>,
}

impl Mailbox {
    /// Create a mailbox for `worker`; the receiver goes to the worker.
    pub fn new(worker: WorkerId) -> (Self, Receiver<Dispatch>) {
        let (tx, rx) = bounded(1);
        (Mailbox { worker, tx }, rx)
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Post a dispatch without blocking.
    pub fn send(&self) -> Result<()> {
        match self.tx.try_send(Dispatch {
            worker: self.worker,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(anyhow!(
                "mailbox of worker {} still holds an undelivered dispatch",
                self.worker
            )),
            Err(TrySendError::Disconnected(_)) => {
                Err(anyhow!("worker {} is no longer receiving", self.worker))
            }
        }
    }
}

/// Create one worker's response channel.
pub fn response_channel() -> (Sender<Response>, Receiver<Response>) {
    unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_holds_one_dispatch() {
        let (mailbox, rx) = Mailbox::new(WorkerId(7));
        mailbox.send().unwrap();
        assert!(mailbox.send().is_err());
        assert_eq!(rx.recv().unwrap(), Dispatch { worker: WorkerId(7) });
        mailbox.send().unwrap();
    }

    #[test]
    fn test_send_to_gone_worker_fails() {
        let (mailbox, rx) = Mailbox::new(WorkerId(1));
        drop(rx);
        assert!(mailbox.send().is_err());
    }
}
