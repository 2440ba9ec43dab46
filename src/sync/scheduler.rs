//! Write scheduling - immediate flushes and the debounce timer
//!
//! At most one [`PendingWrite`] and one timer exist per instance. A new
//! mutation inside the window merges into the pending payload, aborts the
//! running timer and arms a fresh one, so the window restarts. Each armed
//! timer carries the generation it was armed for; a timer whose generation no
//! longer matches never flushes, even if it wakes up before being aborted.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, trace, warn};

use super::engine::Inner;
use super::types::{defined, overlay, ChangeEvent, ChangeSource, Patch};
use crate::error::Result;

/// One write request produced by a mutation
pub(super) struct ScheduledWrite {
    payload: Patch,
    /// Remove every owned key before applying `payload`
    clear: bool,
    source: ChangeSource,
    /// Snapshot right after the mutation, used to build the notified state
    base: Patch,
}

impl ScheduledWrite {
    pub(super) fn new(payload: Patch, source: ChangeSource, base: Patch) -> Self {
        Self {
            payload,
            clear: false,
            source,
            base,
        }
    }

    pub(super) fn cleared(source: ChangeSource, base: Patch) -> Self {
        Self {
            payload: Patch::new(),
            clear: true,
            source,
            base,
        }
    }
}

/// Accumulated payload waiting for the debounce timer
pub(super) struct PendingWrite {
    pub(super) payload: Patch,
    clear: bool,
    source: ChangeSource,
    base: Patch,
    generation: u64,
    timer: JoinHandle<()>,
}

impl PendingWrite {
    fn new(write: ScheduledWrite, generation: u64, timer: JoinHandle<()>) -> Self {
        Self {
            payload: write.payload,
            clear: write.clear,
            source: write.source,
            base: write.base,
            generation,
            timer,
        }
    }

    /// Merge a newer write; the latest value per field wins
    fn absorb(&mut self, write: ScheduledWrite, generation: u64, timer: JoinHandle<()>) {
        if write.clear {
            self.payload.clear();
            self.clear = true;
        }
        for (field, value) in write.payload {
            self.payload.insert(field, value);
        }
        self.source = write.source;
        self.base = write.base;
        self.generation = generation;
        self.timer.abort();
        self.timer = timer;
    }

    /// Stop the timer; the payload is dropped
    pub(super) fn cancel(self) {
        self.timer.abort();
    }

    fn into_write(self) -> ScheduledWrite {
        ScheduledWrite {
            payload: self.payload,
            clear: self.clear,
            source: self.source,
            base: self.base,
        }
    }
}

impl Inner {
    /// Flush now, or merge into the pending payload and re-arm the timer
    pub(super) fn schedule(self: &Arc<Self>, write: ScheduledWrite) -> Result<()> {
        let Some(delay) = self.debounce else {
            return self.flush_write(write);
        };

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No tokio runtime for the debounce timer, writing synchronously");
                return self.flush_write(write);
            }
        };

        let mut core = self.core.lock();
        core.generation += 1;
        let generation = core.generation;

        let weak = Arc::downgrade(self);
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_timer(generation);
            }
        });

        match core.pending.as_mut() {
            Some(pending) => pending.absorb(write, generation, timer),
            None => core.pending = Some(PendingWrite::new(write, generation, timer)),
        }

        trace!(
            "Debounced write armed for {:?} (generation {}, {} pending fields)",
            delay,
            generation,
            core.pending.as_ref().map_or(0, |p| p.payload.len())
        );
        Ok(())
    }

    fn fire_timer(&self, generation: u64) {
        let write = {
            let mut core = self.core.lock();
            let current = core
                .pending
                .as_ref()
                .is_some_and(|pending| pending.generation == generation);
            if current {
                core.pending.take().map(PendingWrite::into_write)
            } else {
                None
            }
        };

        let Some(write) = write else {
            trace!("Superseded debounce timer (generation {}) ignored", generation);
            return;
        };

        if let Err(e) = self.flush_write(write) {
            error!("Debounced URL write failed: {}", e);
        }
    }

    /// Flush the pending payload immediately, if there is one
    pub(super) fn flush_pending(&self) -> Result<()> {
        self.ensure_ready()?;
        let pending = self.core.lock().pending.take();
        match pending {
            Some(pending) => {
                pending.timer.abort();
                self.flush_write(pending.into_write())
            }
            None => Ok(()),
        }
    }

    /// Sanitize, write to the URL, then notify with the reconstructed state
    ///
    /// The notified state is the snapshot captured when the write was
    /// scheduled, overlaid with the sanitized payload. Mutations made after
    /// scheduling are not reflected in it.
    fn flush_write(&self, write: ScheduledWrite) -> Result<()> {
        let ScheduledWrite {
            payload,
            clear,
            source,
            mut base,
        } = write;

        let payload = self.sanitized(payload);

        // An empty payload clears the namespace, same as an explicit clear
        if clear {
            self.mapper.write_cleared(&self.host, &payload, self.history)?;
        } else {
            self.mapper.write(&self.host, &payload, self.history)?;
        }

        overlay(&mut base, &payload);
        self.notify(ChangeEvent {
            state: defined(&base),
            source,
        });
        Ok(())
    }
}
