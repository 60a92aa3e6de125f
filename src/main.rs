//! Marble Field entry point
//!
//! Native: headless run that spawns a batch of marbles, sweeps the pointer,
//! tilts the "device" and logs diagnostics. The browser build uses the
//! library's `PhysicsWorld` instead.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::cell::Cell;
    use std::path::Path;

    use marble_field::forces::{OrientationReading, PointerEvent};
    use marble_field::platform::{DebugOverlay, ImageLoader, ManualFrames, Renderer, SensorPermission, VisualHandle};
    use marble_field::{Diagnostics, MarbleSystem, Settings, SimError, UserEntry};

    const FIELD_WIDTH: f32 = 1280.0;
    const FIELD_HEIGHT: f32 = 720.0;
    const FRAME_MS: f64 = 1000.0 / 60.0;
    const FRAMES: u32 = 300;

    /// Hands out visual handles without touching the network
    #[derive(Default)]
    struct SyntheticLoader {
        next: Cell<u64>,
    }

    impl ImageLoader for SyntheticLoader {
        async fn load(&self, url: &str) -> Result<VisualHandle, SimError> {
            if url.ends_with("missing") {
                return Err(SimError::ImageLoadFailed { url: url.to_string() });
            }
            let id = self.next.get() + 1;
            self.next.set(id);
            Ok(VisualHandle(id))
        }
    }

    #[derive(Default)]
    struct CountingRenderer {
        placements: u64,
    }

    impl Renderer for CountingRenderer {
        fn place(&mut self, _visual: VisualHandle, _left: f32, _top: f32, _radius: f32) {
            self.placements += 1;
        }

        fn release(&mut self, visual: VisualHandle) {
            log::debug!("released visual {}", visual.0);
        }
    }

    /// Logs a summary line once per simulated second
    #[derive(Default)]
    struct LogOverlay {
        frames: u32,
    }

    impl DebugOverlay for LogOverlay {
        fn resize(&mut self, width: f32, height: f32) {
            log::info!("overlay sized to {}x{}", width, height);
        }

        fn show(&mut self, d: &Diagnostics) {
            self.frames += 1;
            if self.frames % 60 == 0 {
                log::info!(
                    "marbles={} energy={:.0} substeps={} contacts={} pointer={}",
                    d.marble_count,
                    d.kinetic_energy,
                    d.substeps,
                    d.last_step.contacts,
                    d.pointer_active
                );
            }
        }
    }

    pub fn run() {
        let settings = std::env::args()
            .nth(1)
            .map(|path| Settings::load_from_path(Path::new(&path)))
            .unwrap_or_default();

        let mut system = MarbleSystem::new(
            settings,
            FIELD_WIDTH,
            FIELD_HEIGHT,
            CountingRenderer::default(),
            ManualFrames::new(),
            0x5eed,
        )
        .with_sensor_capabilities(SensorPermission::NotRequired, SensorPermission::Denied);
        system.set_overlay(Box::new(LogOverlay::default()));

        let mut entries: Vec<UserEntry> = (0..24)
            .map(|i| UserEntry::new(format!("user{i}"), format!("{}", 10_000 + i)))
            .collect();
        entries.push(UserEntry::new("ghost", "missing"));

        let task = system.spawn_task(entries, SyntheticLoader::default());
        let spawned = pollster::block_on(task.run());
        system.poll_messages();
        log::info!("spawned {} marbles", spawned);

        let mut now = 0.0;
        system.start(now);
        for frame in 0..FRAMES {
            now += FRAME_MS;

            // sweep the pointer across the middle for the first two seconds
            if frame < 120 {
                let t = frame as f32 / 120.0;
                system.handle_pointer(PointerEvent::Move {
                    x: FIELD_WIDTH * t,
                    y: FIELD_HEIGHT / 2.0,
                    modifier: frame >= 60,
                    timestamp_ms: now,
                });
            }
            match frame {
                150 => system.handle_orientation(OrientationReading::new(0.0, 45.0, 10.0)),
                200 => system.set_collisions_enabled(false),
                230 => system.set_collisions_enabled(true),
                260 => system.handle_orientation(OrientationReading::new(0.0, 5.0, 0.0)),
                _ => {}
            }

            if system.frames_mut().take_pending().is_none() {
                break;
            }
            system.on_frame(now);
        }

        match serde_json::to_string_pretty(&system.diagnostics()) {
            Ok(json) => log::info!("final diagnostics:\n{}", json),
            Err(e) => log::error!("cannot serialize diagnostics: {}", e),
        }
        system.destroy();
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Marble Field (native, headless) starting...");
    headless::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is marble_field::web::start
}
