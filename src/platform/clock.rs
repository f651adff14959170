//! Frame clock
//!
//! Turns raw timing signals (millisecond timestamps such as the ones
//! `requestAnimationFrame` hands out) into positive `dt` ticks. The
//! [`Ticker`] owns exactly one tick callback for its whole life, so a host
//! can never register the same callback twice and get duplicate frames.

/// Source of raw timing signals
pub trait FrameScheduler {
    /// Identifies one outstanding request
    type Handle: Copy;

    /// Ask for one more timing signal. `None` if the request failed.
    fn request_frame(&mut self) -> Option<Self::Handle>;

    /// Withdraw an outstanding request
    fn cancel_frame(&mut self, handle: Self::Handle);
}

/// Timestamp bookkeeping, independent of any timing source
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_timestamp: Option<f64>,
    active: bool,
    dropped_frames: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fresh run; the next signal only seeds the timestamp
    pub fn activate(&mut self) {
        self.active = true;
        self.last_timestamp = None;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Frames thrown away as duplicates or time travel
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Feed a raw timestamp (ms); returns the seconds to simulate, if any
    pub fn observe(&mut self, now_ms: f64) -> Option<f32> {
        if !now_ms.is_finite() {
            log::warn!("Ignoring non-finite frame timestamp {now_ms}");
            self.dropped_frames += 1;
            return None;
        }

        let Some(last) = self.last_timestamp else {
            self.last_timestamp = Some(now_ms);
            return None;
        };

        let elapsed_ms = now_ms - last;
        if elapsed_ms == 0.0 {
            // Two signals for the same frame: something scheduled us twice
            log::error!("Got a 0 length animation frame at {now_ms}ms");
            self.dropped_frames += 1;
            return None;
        }
        if elapsed_ms < 0.0 {
            log::warn!("Frame timestamp went backwards ({last}ms -> {now_ms}ms), reseeding");
            self.last_timestamp = Some(now_ms);
            self.dropped_frames += 1;
            return None;
        }

        self.last_timestamp = Some(now_ms);
        let dt = (elapsed_ms / 1000.0) as f32;
        if dt > 0.0 {
            Some(dt)
        } else {
            log::warn!("Frame of {elapsed_ms}ms rounds to zero seconds");
            self.dropped_frames += 1;
            None
        }
    }
}

/// Drives a tick callback from a [`FrameScheduler`]
pub struct Ticker<S: FrameScheduler> {
    clock: FrameClock,
    scheduler: S,
    pending: Option<S::Handle>,
    on_tick: Box<dyn FnMut(f32)>,
}

impl<S: FrameScheduler> Ticker<S> {
    /// The callback is fixed for the ticker's lifetime
    pub fn new(scheduler: S, on_tick: impl FnMut(f32) + 'static) -> Self {
        Self {
            clock: FrameClock::new(),
            scheduler,
            pending: None,
            on_tick: Box::new(on_tick),
        }
    }

    /// Activate and request the first signal (no-op if already running)
    pub fn start(&mut self) {
        if self.clock.is_active() {
            return;
        }
        self.clock.activate();
        self.schedule();
        log::info!("Frame clock started");
    }

    /// Deactivate and cancel any outstanding request
    pub fn stop(&mut self) {
        let was_active = self.clock.is_active();
        self.clock.deactivate();
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
        if was_active {
            log::info!(
                "Frame clock stopped ({} dropped frames)",
                self.clock.dropped_frames()
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_active()
    }

    /// True while a signal has been requested and not yet delivered
    pub fn has_pending_frame(&self) -> bool {
        self.pending.is_some()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.clock.dropped_frames()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Deliver a raw timing signal; returns the `dt` passed to the callback
    ///
    /// The next signal is always requested before returning, whether or not
    /// the callback ran. Signals that arrive after `stop` are ignored.
    pub fn handle_signal(&mut self, now_ms: f64) -> Option<f32> {
        if !self.clock.is_active() {
            log::debug!("Ignoring frame signal at {now_ms}ms while stopped");
            return None;
        }
        self.pending = None;

        let dt = self.clock.observe(now_ms);
        if let Some(dt) = dt {
            (self.on_tick)(dt);
        }

        self.schedule();
        dt
    }

    fn schedule(&mut self) {
        if let Some(stale) = self.pending.take() {
            self.scheduler.cancel_frame(stale);
        }
        self.pending = self.scheduler.request_frame();
        if self.pending.is_none() {
            log::error!("Failed to request the next animation frame");
        }
    }
}

impl<S: FrameScheduler> Drop for Ticker<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Scheduler driven by hand (headless runs and tests)
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    next_handle: u64,
    pending: Option<u64>,
    cancelled: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a signal is owed to the ticker
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Requests withdrawn so far
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    type Handle = u64;

    fn request_frame(&mut self) -> Option<u64> {
        self.next_handle += 1;
        self.pending = Some(self.next_handle);
        self.pending
    }

    fn cancel_frame(&mut self, handle: u64) {
        if self.pending == Some(handle) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}
