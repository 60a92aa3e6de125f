//! Marble system orchestrator
//!
//! Owns the live marbles and wires forces, physics, rendering and the
//! animation loop together. Async work (image loading, permission prompts)
//! runs in detached tasks that report back through an inbox; the inbox is
//! drained between ticks, never during one.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::Serialize;

use crate::error::SimError;
use crate::factory::{MarbleFactory, UserEntry};
use crate::forces::{
    ForceSource, MotionDebug, MotionInteraction, MotionReading, OrientationDebug,
    OrientationInteraction, OrientationReading, PointerEvent, PointerInteraction, SensorKind,
    request_sensor,
};
use crate::platform::{
    DebugOverlay, FrameScheduler, ImageLoader, PermissionProvider, PermissionResponse, Renderer,
    SensorPermission,
};
use crate::scheduler::{AnimationLoop, FixedUpdate, LoopState};
use crate::settings::Settings;
use crate::sim::{
    Marble, PhysicsConfig, PhysicsEngine, StepStats, min_speed_floor_scale, substep_count,
};

/// Live marbles with stable id lookup
///
/// Removal swaps the last marble into the freed slot; slot indices are
/// only meaningful until the next mutation.
#[derive(Debug, Default)]
pub struct MarbleArena {
    marbles: Vec<Marble>,
    slots: HashMap<String, usize>,
}

impl MarbleArena {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.marbles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.marbles.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn insert(&mut self, marble: Marble) -> Result<(), SimError> {
        if self.slots.contains_key(&marble.id) {
            return Err(SimError::DuplicateId(marble.id));
        }
        self.slots.insert(marble.id.clone(), self.marbles.len());
        self.marbles.push(marble);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Marble> {
        let slot = self.slots.remove(id)?;
        let marble = self.marbles.swap_remove(slot);
        if let Some(moved) = self.marbles.get(slot) {
            self.slots.insert(moved.id.clone(), slot);
        }
        Some(marble)
    }

    pub fn get(&self, id: &str) -> Option<&Marble> {
        self.slots.get(id).map(|&slot| &self.marbles[slot])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Marble> {
        self.slots.get(id).map(|&slot| &mut self.marbles[slot])
    }

    #[inline]
    pub fn as_slice(&self) -> &[Marble] {
        &self.marbles
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Marble] {
        &mut self.marbles
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marble> {
        self.marbles.iter()
    }

    /// Remove every marble
    pub fn take_all(&mut self) -> Vec<Marble> {
        self.slots.clear();
        std::mem::take(&mut self.marbles)
    }
}

/// Results of async tasks, drained between ticks
#[derive(Debug)]
pub enum SystemMessage {
    Spawned(Marble),
    Permission {
        kind: SensorKind,
        response: PermissionResponse,
    },
}

/// Detached batch spawn: loads avatars and posts each finished marble
pub struct SpawnTask<L: ImageLoader> {
    factory: MarbleFactory,
    entries: Vec<UserEntry>,
    loader: L,
    inbox: Sender<SystemMessage>,
}

impl<L: ImageLoader> SpawnTask<L> {
    /// Run to completion; returns how many marbles were posted
    pub async fn run(mut self) -> usize {
        let mut posted = 0;
        for entry in &self.entries {
            match self.factory.create_marble(entry, &self.loader).await {
                Ok(marble) => {
                    if self.inbox.send(SystemMessage::Spawned(marble)).is_err() {
                        log::debug!("marble system gone, dropping remaining spawns");
                        break;
                    }
                    posted += 1;
                }
                Err(e) => log::warn!("Failed to create marble for {}: {}", entry.label(), e),
            }
        }
        posted
    }
}

/// Detached sensor permission request
pub struct PermissionTask<P: PermissionProvider> {
    kind: SensorKind,
    provider: P,
    inbox: Sender<SystemMessage>,
}

impl<P: PermissionProvider> PermissionTask<P> {
    pub async fn run(self) -> PermissionResponse {
        let response = match request_sensor(&self.provider, self.kind).await {
            Ok(()) => PermissionResponse::Granted,
            Err(e) => {
                log::warn!("{}", e);
                PermissionResponse::Denied
            }
        };
        let message = SystemMessage::Permission {
            kind: self.kind,
            response,
        };
        if self.inbox.send(message).is_err() {
            log::debug!("marble system gone before {} permission resolved", self.kind);
        }
        response
    }
}

/// Everything one fixed tick touches
pub struct MarbleWorld<R: Renderer> {
    marbles: MarbleArena,
    engine: PhysicsEngine,
    pointer: PointerInteraction,
    orientation: OrientationInteraction,
    motion: MotionInteraction,
    pointer_enabled: bool,
    orientation_enabled: bool,
    motion_enabled: bool,
    renderer: R,
    substeps: u32,
}

impl<R: Renderer> MarbleWorld<R> {
    /// Tilt gravity magnitude driving sub-steps (0 when orientation is off)
    fn gravity_magnitude(&self) -> f32 {
        if self.orientation_enabled {
            self.orientation.gravity_magnitude()
        } else {
            0.0
        }
    }

    fn render(&mut self) {
        for m in self.marbles.iter() {
            let corner = m.top_left();
            self.renderer.place(m.visual, corner.x, corner.y, m.radius());
        }
    }

    fn release_all(&mut self) {
        for marble in self.marbles.take_all() {
            self.renderer.release(marble.visual);
        }
    }
}

impl<R: Renderer> FixedUpdate for MarbleWorld<R> {
    fn fixed_update(&mut self, dt: f32) {
        let gravity = self.gravity_magnitude();
        let substeps = substep_count(gravity);
        if substeps != self.substeps {
            log::debug!("sub-steps {} -> {} (gravity {:.2})", self.substeps, substeps, gravity);
            self.substeps = substeps;
        }

        let sub_dt = dt / substeps as f32;
        let floor = self.engine.config().min_speed * min_speed_floor_scale(gravity);
        for _ in 0..substeps {
            let marbles = self.marbles.as_mut_slice();
            if self.pointer_enabled {
                self.pointer.apply_force(marbles, sub_dt);
            }
            if self.orientation_enabled {
                self.orientation.apply_force(marbles, sub_dt);
            }
            if self.motion_enabled {
                self.motion.apply_force(marbles, sub_dt);
            }
            self.engine.step_with_floor(marbles, sub_dt, floor);
        }

        self.render();
    }
}

/// Snapshot for debug overlays and logs
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub marble_count: usize,
    /// Σ ½·m·|v|²
    pub kinetic_energy: f32,
    pub substeps: u32,
    pub collisions_enabled: bool,
    pub pointer_active: bool,
    pub attract_mode: bool,
    pub orientation: OrientationDebug,
    pub motion: MotionDebug,
    pub last_step: StepStats,
}

/// The marble field
pub struct MarbleSystem<R: Renderer, S: FrameScheduler> {
    settings: Settings,
    world: MarbleWorld<R>,
    animation: AnimationLoop<S>,
    factory: MarbleFactory,
    rng: Pcg32,
    overlay: Option<Box<dyn DebugOverlay>>,
    inbox: Receiver<SystemMessage>,
    outbox: Sender<SystemMessage>,
}

impl<R: Renderer, S: FrameScheduler> MarbleSystem<R, S> {
    pub fn new(settings: Settings, width: f32, height: f32, renderer: R, frames: S, seed: u64) -> Self {
        let settings = settings.sanitized();
        let mut pointer = PointerInteraction::new(settings.pointer.clone());
        pointer.init();

        let world = MarbleWorld {
            marbles: MarbleArena::new(),
            engine: PhysicsEngine::new(PhysicsConfig::from_settings(&settings.physics, width, height)),
            pointer,
            orientation: OrientationInteraction::new(
                settings.orientation.clone(),
                SensorPermission::Requestable,
            ),
            motion: MotionInteraction::new(settings.motion.clone(), SensorPermission::Requestable),
            pointer_enabled: true,
            orientation_enabled: true,
            motion_enabled: true,
            renderer,
            substeps: 1,
        };

        let (outbox, inbox) = mpsc::channel();
        let mut rng = Pcg32::seed_from_u64(seed);
        let factory = MarbleFactory::new(&settings, width, height, rand::Rng::random(&mut rng));
        log::info!("marble system ready ({}x{})", width, height);

        Self {
            animation: AnimationLoop::from_settings(frames, &settings.animation),
            settings,
            world,
            factory,
            rng,
            overlay: None,
            inbox,
            outbox,
        }
    }

    /// Declare what the platform offers for each sensor
    ///
    /// Sensors that need no prompt start listening right away.
    pub fn with_sensor_capabilities(mut self, orientation: SensorPermission, motion: SensorPermission) -> Self {
        self.world.orientation = OrientationInteraction::new(self.settings.orientation.clone(), orientation);
        if orientation == SensorPermission::NotRequired {
            self.world.orientation.init();
        }
        self.world.motion = MotionInteraction::new(self.settings.motion.clone(), motion);
        if motion == SensorPermission::NotRequired {
            self.world.motion.init();
        }
        self
    }

    pub fn set_overlay(&mut self, mut overlay: Box<dyn DebugOverlay>) {
        let config = self.world.engine.config();
        overlay.resize(config.field_width, config.field_height);
        self.overlay = Some(overlay);
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ---- marbles ----

    /// Insert a ready marble (ids must be unique)
    pub fn add(&mut self, marble: Marble) -> Result<(), SimError> {
        let visual = marble.visual;
        match self.world.marbles.insert(marble) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("{}", e);
                self.world.renderer.release(visual);
                Err(e)
            }
        }
    }

    /// Task that loads and posts marbles for `entries`
    ///
    /// The host drives it (spawn_local, block_on); marbles appear at the
    /// next `poll_messages`.
    pub fn spawn_task<L: ImageLoader>(&mut self, entries: Vec<UserEntry>, loader: L) -> SpawnTask<L> {
        self.factory
            .set_target_count(self.world.marbles.len() + entries.len());
        SpawnTask {
            factory: self.factory.fork(),
            entries,
            loader,
            inbox: self.outbox.clone(),
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        match self.world.marbles.remove(id) {
            Some(marble) => {
                self.world.renderer.release(marble.visual);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.world.release_all();
    }

    #[inline]
    pub fn marbles(&self) -> &[Marble] {
        self.world.marbles.as_slice()
    }

    pub fn marble(&self, id: &str) -> Option<&Marble> {
        self.world.marbles.get(id)
    }

    #[inline]
    pub fn marble_count(&self) -> usize {
        self.world.marbles.len()
    }

    /// Apply finished async results; returns how many messages were handled
    pub fn poll_messages(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox.try_recv() {
            handled += 1;
            match message {
                SystemMessage::Spawned(marble) => {
                    let id = marble.id.clone();
                    // a rejected marble is already logged and released by `add`
                    if self.add(marble).is_ok() {
                        log::debug!("marble {} joined the field", id);
                    }
                }
                SystemMessage::Permission { kind, response } => match kind {
                    SensorKind::Orientation => self.world.orientation.on_permission(response),
                    SensorKind::Motion => self.world.motion.on_permission(response),
                },
            }
        }
        handled
    }

    // ---- loop ----

    pub fn start(&mut self, now_ms: f64) {
        self.animation.start(now_ms);
    }

    pub fn stop(&mut self) {
        self.animation.stop();
    }

    pub fn pause(&mut self) {
        self.animation.pause();
    }

    pub fn resume(&mut self, now_ms: f64) {
        self.animation.resume(now_ms);
    }

    #[inline]
    pub fn loop_state(&self) -> LoopState {
        self.animation.state()
    }

    pub fn frames_mut(&mut self) -> &mut S {
        self.animation.frames_mut()
    }

    /// Display refresh callback; returns the number of fixed ticks run
    pub fn on_frame(&mut self, timestamp_ms: f64) -> u32 {
        self.poll_messages();
        self.world.pointer.sync_clock(timestamp_ms);
        let ticks = self.animation.on_frame(timestamp_ms, &mut self.world);
        if ticks > 0 && self.overlay.is_some() {
            let diagnostics = self.diagnostics();
            if let Some(overlay) = self.overlay.as_mut() {
                overlay.show(&diagnostics);
            }
        }
        ticks
    }

    // ---- input ----

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.world.pointer.handle_event(event);
    }

    pub fn handle_orientation(&mut self, reading: OrientationReading) {
        self.world.orientation.handle_reading(reading);
    }

    pub fn handle_motion(&mut self, reading: MotionReading) {
        self.world.motion.handle_reading(reading);
    }

    /// Task asking the platform for a sensor; start it from a user gesture
    pub fn request_permission<P: PermissionProvider>(&self, kind: SensorKind, provider: P) -> PermissionTask<P> {
        PermissionTask {
            kind,
            provider,
            inbox: self.outbox.clone(),
        }
    }

    pub fn pointer(&self) -> &PointerInteraction {
        &self.world.pointer
    }

    pub fn orientation(&self) -> &OrientationInteraction {
        &self.world.orientation
    }

    pub fn motion(&self) -> &MotionInteraction {
        &self.world.motion
    }

    // ---- toggles ----

    pub fn set_pointer_enabled(&mut self, enabled: bool) {
        self.world.pointer_enabled = enabled;
    }

    pub fn set_orientation_enabled(&mut self, enabled: bool) {
        self.world.orientation_enabled = enabled;
    }

    pub fn set_motion_enabled(&mut self, enabled: bool) {
        self.world.motion_enabled = enabled;
    }

    /// Toggle marble/marble collisions; re-enabling shakes clusters loose
    pub fn set_collisions_enabled(&mut self, enabled: bool) {
        let was_enabled = self.world.engine.config().collisions_enabled;
        self.world.engine.set_collisions_enabled(enabled);
        if enabled && !was_enabled {
            let speed = &self.settings.speed;
            self.world.engine.randomize_speeds(
                self.world.marbles.as_mut_slice(),
                &mut self.rng,
                speed.min,
                speed.max,
            );
        }
    }

    // ---- field ----

    #[inline]
    pub fn physics_config(&self) -> &PhysicsConfig {
        self.world.engine.config()
    }

    pub fn update_physics_config(&mut self, config: PhysicsConfig) {
        self.world.engine.update_config(config);
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        let config = self.world.engine.config().with_field(width, height);
        self.world.engine.update_config(config);
        self.factory.update_field_size(width, height);
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.resize(width, height);
        }
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        self.factory.zoom()
    }

    /// Change zoom for new marbles and rescale the live ones
    pub fn set_zoom(&mut self, zoom: f32) {
        let old = self.factory.zoom();
        self.factory.set_zoom(zoom);
        let new = self.factory.zoom();
        if new == old {
            return;
        }

        let ratio = new / old;
        let mass_model = *self.factory.mass_model();
        for marble in self.world.marbles.as_mut_slice() {
            if let Err(e) = marble.resize(marble.radius() * ratio, &mass_model) {
                log::warn!("cannot rescale {}: {}", marble.id, e);
            }
        }
    }

    // ---- diagnostics ----

    pub fn kinetic_energy(&self) -> f32 {
        self.world.marbles.iter().map(Marble::kinetic_energy).sum()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let world = &self.world;
        Diagnostics {
            marble_count: world.marbles.len(),
            kinetic_energy: self.kinetic_energy(),
            substeps: world.substeps,
            collisions_enabled: world.engine.config().collisions_enabled,
            pointer_active: world.pointer_enabled && world.pointer.is_active(),
            attract_mode: world.pointer.is_attract_mode(),
            orientation: world.orientation.debug_info(),
            motion: world.motion.debug_info(),
            last_step: world.engine.last_stats(),
        }
    }

    /// Stop the loop, release every marble, detach all inputs
    pub fn destroy(&mut self) {
        self.stop();
        self.clear();
        self.world.pointer.teardown();
        self.world.orientation.teardown();
        self.world.motion.teardown();
        log::info!("marble system destroyed");
    }
}
