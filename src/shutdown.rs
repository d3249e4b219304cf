// Copyright (c) scx_ossim contributors

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! Run cancellation.
//!
//! `Shutdown` holds the only sender of a channel that never carries a
//! message. Triggering drops that sender, so every clone of the receiver
//! disconnects at once and any `select!` waiting on it wakes up.

use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use crossbeam::channel::after;
use crossbeam::channel::bounded;
use crossbeam::channel::Receiver;
use crossbeam::channel::Sender;
use crossbeam::select;
use log::info;
use serde::Serialize;

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShutdownReason {
    /// Every admitted worker terminated after the creation limit was hit.
    Completed,
    /// The wall-clock cap elapsed.
    WallClock,
    /// External interrupt (SIGINT/SIGTERM).
    Interrupted,
    /// A worker could not be spawned.
    SpawnFailed,
    /// The dispatcher hit an internal error.
    Error,
}

#[derive(Debug)]
struct Inner {
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
    reason: Mutex<Option<ShutdownReason>>,
}

/// Cloneable cancellation token shared by the dispatcher, the workers,
/// the alarm thread and the interrupt handler.
#[derive(Debug, Clone)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Shutdown {
            inner: Arc::new(Inner {
                tx: Mutex::new(Some(tx)),
                rx,
                reason: Mutex::new(None),
            }),
        }
    }

    /// Request shutdown. The first caller's reason sticks; returns whether
    /// this call was the one that triggered it.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let mut cur = self.inner.reason.lock().unwrap();
        if cur.is_some() {
            return false;
        }
        *cur = Some(reason);
        self.inner.tx.lock().unwrap().take();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.reason.lock().unwrap().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.inner.reason.lock().unwrap()
    }

    /// Receiver that disconnects once shutdown is triggered. Meant to be
    /// used as a `select!` arm next to a message receiver.
    pub fn receiver(&self) -> Receiver<()> {
        self.inner.rx.clone()
    }

    /// Block until shutdown is triggered.
    pub fn wait(&self) {
        let _ = self.inner.rx.recv();
    }

    /// Trigger `ShutdownReason::WallClock` after `cap` of real time unless
    /// the run shuts down first.
    pub fn arm_alarm(&self, cap: Duration) -> Result<JoinHandle<()>> {
        let shutdown = self.clone();
        let stop = self.receiver();
        thread::Builder::new()
            .name("alarm".into())
            .spawn(move || {
                select! {
                    recv(after(cap)) -> _ => {
                        if shutdown.trigger(ShutdownReason::WallClock) {
                            info!("Wall-clock cap of {:?} reached", cap);
                        }
                    }
                    recv(stop) -> _ => {}
                }
            })
            .context("Failed to spawn alarm thread")
    }
}
