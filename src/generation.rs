use crate::error::Error;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

/// Shared session counter. Advancing it supersedes every phase started under an older value.
#[derive(Debug, Clone, Default)]
pub(crate) struct Generations(Arc<AtomicU64>);

impl Generations {
    /// Start a new session, superseding the current one.
    pub(crate) fn advance(&self) -> Generation {
        let id = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Generation {
            id,
            generations: self.clone(),
        }
    }

    fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Identity of one session. Work tagged with a stale generation must do nothing.
#[derive(Debug, Clone)]
pub struct Generation {
    id: u64,
    generations: Generations,
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.generations.current() == self.id
    }

    pub fn check(&self) -> Result<(), Error> {
        if self.is_current() {
            Ok(())
        } else {
            Err(Error::Superseded(self.id))
        }
    }

    /// Sleep for `duration`, waking early if the generation is superseded.
    pub(crate) fn sleep(&self, duration: Duration, interval: Duration) -> Result<(), Error> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(interval.min(deadline - now));
        }
    }

    /// Poll `ready` until it holds, the generation is superseded or `timeout` expires. Returns
    /// whether `ready` held.
    pub(crate) fn wait_until<F>(
        &self,
        timeout: Duration,
        interval: Duration,
        mut ready: F,
    ) -> Result<bool, Error>
    where
        F: FnMut() -> Result<bool, Error>,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.check()?;
            if ready()? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(interval.min(deadline - now));
        }
    }
}

/// Cloneable, thread-safe handle that cancels whatever the pipeline is doing.
#[derive(Debug, Clone)]
pub struct ResetHandle(pub(crate) Generations);

impl ResetHandle {
    /// Supersede the running session. Calling this repeatedly is harmless.
    ///
    /// Cleanup happens on the thread that owns the pipeline: an interrupted `process` call unwinds
    /// and releases everything, and a completed session from then on reports `Idle` with no track.
    pub fn reset(&self) {
        self.0.advance();
    }
}
