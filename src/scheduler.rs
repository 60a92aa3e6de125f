//! Semi-fixed timestep loop
//!
//! Display refreshes arrive at whatever rate the host manages; the
//! simulation always advances in whole `fixed_delta_time` steps. Leftover
//! time carries over in the accumulator.

use crate::consts::{FIXED_DT, MAX_FRAME_TIME};
use crate::platform::{FrameRequest, FrameScheduler};
use crate::settings::AnimationSettings;

/// Work run once per fixed step
pub trait FixedUpdate {
    fn fixed_update(&mut self, dt: f32);
}

impl<F: FnMut(f32)> FixedUpdate for F {
    fn fixed_update(&mut self, dt: f32) {
        self(dt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Fixed-timestep accumulator driven by a [`FrameScheduler`]
#[derive(Debug)]
pub struct AnimationLoop<S: FrameScheduler> {
    frames: S,
    state: LoopState,
    fixed_delta_time: f32,
    max_frame_time: f32,
    /// Timestamp of the previous frame (ms)
    last_time: f64,
    accumulator: f32,
    pending: Option<FrameRequest>,
}

impl<S: FrameScheduler> AnimationLoop<S> {
    pub fn new(frames: S, fixed_delta_time: f32, max_frame_time: f32) -> Self {
        let fixed_delta_time = if fixed_delta_time > 0.0 {
            fixed_delta_time
        } else {
            FIXED_DT
        };
        Self {
            frames,
            state: LoopState::Stopped,
            fixed_delta_time,
            max_frame_time: max_frame_time.max(fixed_delta_time),
            last_time: 0.0,
            accumulator: 0.0,
            pending: None,
        }
    }

    pub fn with_defaults(frames: S) -> Self {
        Self::new(frames, FIXED_DT, MAX_FRAME_TIME)
    }

    pub fn from_settings(frames: S, settings: &AnimationSettings) -> Self {
        Self::new(frames, settings.fixed_delta_time, settings.max_frame_time)
    }

    #[inline]
    pub fn state(&self) -> LoopState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == LoopState::Running
    }

    #[inline]
    pub fn fixed_delta_time(&self) -> f32 {
        self.fixed_delta_time
    }

    #[inline]
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    pub fn frames(&self) -> &S {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut S {
        &mut self.frames
    }

    /// Begin from a clean slate; ignored while running
    pub fn start(&mut self, now_ms: f64) {
        if self.state == LoopState::Running {
            return;
        }
        self.state = LoopState::Running;
        self.last_time = now_ms;
        self.accumulator = 0.0;
        self.schedule();
        log::info!("animation loop started");
    }

    /// Freeze scheduling; the accumulator is kept for `resume`
    pub fn pause(&mut self) {
        if self.state != LoopState::Running {
            return;
        }
        self.state = LoopState::Paused;
        self.cancel_pending();
    }

    /// Continue after `pause` without counting the paused time
    pub fn resume(&mut self, now_ms: f64) {
        if self.state != LoopState::Paused {
            return;
        }
        self.state = LoopState::Running;
        self.last_time = now_ms;
        self.schedule();
    }

    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::Stopped;
        self.accumulator = 0.0;
        self.cancel_pending();
        log::info!("animation loop stopped");
    }

    /// Handle one display refresh; returns the number of fixed steps run
    pub fn on_frame<C: FixedUpdate + ?Sized>(&mut self, timestamp_ms: f64, ctx: &mut C) -> u32 {
        self.pending = None;
        if self.state != LoopState::Running {
            return 0;
        }

        let elapsed = ((timestamp_ms - self.last_time) / 1000.0) as f32;
        let frame_time = elapsed.clamp(0.0, self.max_frame_time);
        self.last_time = timestamp_ms;
        self.accumulator += frame_time;

        let mut steps = 0;
        while self.accumulator >= self.fixed_delta_time {
            ctx.fixed_update(self.fixed_delta_time);
            self.accumulator -= self.fixed_delta_time;
            steps += 1;
        }

        self.schedule();
        steps
    }

    fn schedule(&mut self) {
        self.cancel_pending();
        self.pending = Some(self.frames.request_frame());
    }

    fn cancel_pending(&mut self) {
        if let Some(request) = self.pending.take() {
            self.frames.cancel_frame(request);
        }
    }
}
