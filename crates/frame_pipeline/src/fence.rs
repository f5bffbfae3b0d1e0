use tracing::debug;

use crate::error::FrameError;
use crate::error::FrameResult;

/// Completed value reported by a fence whose device has been removed.
pub const DEVICE_REMOVED_FENCE_VALUE: u64 = u64::MAX;

/// A GPU-signaled fence bound to the queue that signals it.
pub trait GpuFence {
    /// Highest value the GPU has signaled so far.
    fn completed_value(&self) -> u64;

    /// Queue a signal of `value` behind every previously submitted command list.
    fn signal(&mut self, value: u64) -> FrameResult<()>;

    /// Park the calling thread until `completed_value() >= value`.
    fn wait_for_value(&mut self, value: u64) -> FrameResult<()>;
}

/// Owns the monotonic submission counter and the fence it is signaled on.
///
/// Value 0 is never handed out by [`advance`](Self::advance); frame slots use
/// it to mean "never submitted".
pub struct FenceSynchronizer<F> {
    fence: F,
    current_value: u64,
}

impl<F: GpuFence> FenceSynchronizer<F> {
    pub fn new(fence: F) -> Self {
        Self {
            fence,
            current_value: 0,
        }
    }

    /// Last value handed out by [`advance`](Self::advance).
    pub fn current_value(&self) -> u64 {
        self.current_value
    }

    /// Increment and return the next submission counter.
    pub fn advance(&mut self) -> u64 {
        self.current_value += 1;
        self.current_value
    }

    pub fn signal(&mut self, value: u64) -> FrameResult<()> {
        debug_assert!(
            value <= self.current_value,
            "signaling {value} before it was handed out"
        );
        self.fence.signal(value)
    }

    pub fn completed_value(&self) -> u64 {
        self.fence.completed_value()
    }

    /// Block until the GPU has reached `target`.
    ///
    /// `target == 0` returns immediately without touching the fence.
    pub fn wait_until(&mut self, target: u64) -> FrameResult<()> {
        if target == 0 {
            return Ok(());
        }

        let completed = self.fence.completed_value();
        check_device(completed, target)?;
        if completed >= target {
            return Ok(());
        }

        debug!(target, completed, "waiting for GPU");
        self.fence.wait_for_value(target)?;
        check_device(self.fence.completed_value(), target)
    }

    /// Signal a fresh value and wait for it: every submission made so far has
    /// finished on the GPU when this returns.
    pub fn flush(&mut self) -> FrameResult<u64> {
        let value = self.advance();
        self.signal(value)?;
        self.wait_until(value)?;
        Ok(value)
    }

    pub fn fence(&self) -> &F {
        &self.fence
    }
}

/// Spin on `completed_value` until it reaches `value`, yielding between reads.
/// Backends use this when they have no event to park on.
pub fn poll_until_completed<F: GpuFence + ?Sized>(fence: &F, value: u64) -> u64 {
    let mut polls = 0;
    while fence.completed_value() < value {
        polls += 1;
        std::thread::yield_now();
    }
    polls
}

fn check_device(completed: u64, target: u64) -> FrameResult<()> {
    if completed == DEVICE_REMOVED_FENCE_VALUE {
        return Err(FrameError::DeviceLost(format!(
            "fence reported removal while waiting for {target}"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use super::*;

    /// Executes queued signals only when someone waits on them.
    #[derive(Default)]
    pub(crate) struct LazyFence {
        pub completed: Cell<u64>,
        pub queries: Cell<usize>,
        pub signaled: Vec<u64>,
        pub waits: Vec<u64>,
        pub removed: bool,
    }

    impl GpuFence for LazyFence {
        fn completed_value(&self) -> u64 {
            self.queries.set(self.queries.get() + 1);
            if self.removed {
                DEVICE_REMOVED_FENCE_VALUE
            } else {
                self.completed.get()
            }
        }

        fn signal(&mut self, value: u64) -> FrameResult<()> {
            self.signaled.push(value);
            Ok(())
        }

        fn wait_for_value(&mut self, value: u64) -> FrameResult<()> {
            self.waits.push(value);
            assert!(
                self.signaled.contains(&value),
                "waiting on {value} which was never signaled"
            );
            self.completed.set(self.completed.get().max(value));
            Ok(())
        }
    }

    #[test]
    fn advance_is_monotonic_and_starts_after_zero() {
        let mut sync = FenceSynchronizer::new(LazyFence::default());
        assert_eq!(sync.current_value(), 0);
        assert_eq!(sync.advance(), 1);
        assert_eq!(sync.advance(), 2);
        assert_eq!(sync.advance(), 3);
    }

    #[test]
    fn waiting_on_zero_never_touches_the_fence() {
        let mut sync = FenceSynchronizer::new(LazyFence::default());
        sync.wait_until(0).unwrap();
        assert_eq!(sync.fence().queries.get(), 0);
        assert!(sync.fence().waits.is_empty());
    }

    #[test]
    fn wait_returns_with_completed_at_or_past_target() {
        let mut sync = FenceSynchronizer::new(LazyFence::default());
        for _ in 0..3 {
            let value = sync.advance();
            sync.signal(value).unwrap();
        }
        sync.wait_until(2).unwrap();
        assert!(sync.completed_value() >= 2);

        // Already reached: no second park.
        sync.wait_until(1).unwrap();
        assert_eq!(sync.fence().waits, vec![2]);
    }

    #[test]
    fn removal_is_reported_as_device_lost() {
        let mut sync = FenceSynchronizer::new(LazyFence {
            removed: true,
            ..Default::default()
        });
        let value = sync.advance();
        sync.signal(value).unwrap();
        let error = sync.wait_until(value).unwrap_err();
        assert!(error.is_device_lost());
    }

    #[test]
    fn polling_stops_once_the_value_lands() {
        /// Completes one more value every time it is read.
        struct Creeping(Cell<u64>);

        impl GpuFence for Creeping {
            fn completed_value(&self) -> u64 {
                let value = self.0.get();
                self.0.set(value + 1);
                value
            }
            fn signal(&mut self, _: u64) -> FrameResult<()> {
                Ok(())
            }
            fn wait_for_value(&mut self, value: u64) -> FrameResult<()> {
                poll_until_completed(&*self, value);
                Ok(())
            }
        }

        let fence = Creeping(Cell::new(0));
        assert_eq!(poll_until_completed(&fence, 5), 5);
        assert_eq!(poll_until_completed(&fence, 2), 0);

        let mut sync = FenceSynchronizer::new(Creeping(Cell::new(0)));
        for _ in 0..10 {
            let value = sync.advance();
            sync.signal(value).unwrap();
        }
        sync.wait_until(10).unwrap();
        assert!(sync.completed_value() >= 10);
    }

    #[test]
    fn polling_ends_on_device_removal() {
        let fence = LazyFence {
            removed: true,
            ..Default::default()
        };
        assert_eq!(poll_until_completed(&fence, 7), 0);
    }

    #[test]
    fn flush_waits_for_a_fresh_value() {
        let mut sync = FenceSynchronizer::new(LazyFence::default());
        let first = sync.advance();
        sync.signal(first).unwrap();
        let flushed = sync.flush().unwrap();
        assert_eq!(flushed, 2);
        assert_eq!(sync.completed_value(), 2);
    }
}
