//! Germ Swat entry point
//!
//! The browser build is driven from JS through `platform::web::WebSimulation`.
//! Natively this runs a headless session: a scripted player clicks germs while
//! a manually stepped frame clock advances the arena at 60 Hz.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::cell::RefCell;
    use std::rc::Rc;

    use germ_swat::platform::{ManualScheduler, Ticker};
    use germ_swat::sim::{SimError, SimEvent, Simulation};
    use germ_swat::{RulePreset, Settings};
    use glam::Vec2;

    /// One display refresh at 60 Hz
    const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Give up after two minutes of simulated time
    const MAX_FRAMES: u32 = 60 * 120;
    /// Scripted player clicks three times a second
    const CLICK_EVERY: u32 = 20;
    /// Frame at which a duplicate timestamp is delivered
    const DUPLICATE_AT: u32 = 30;

    /// Preset name, settings JSON path, or defaults
    pub fn load_settings(arg: Option<String>) -> Result<Settings, SimError> {
        let Some(arg) = arg else {
            return Ok(Settings::default());
        };
        if let Some(preset) = RulePreset::from_str(&arg) {
            log::info!("Using {} rules", preset.as_str());
            return Ok(Settings::from_preset(preset));
        }
        let json = std::fs::read_to_string(&arg)
            .map_err(|e| SimError::InvalidConfig(format!("cannot read {arg}: {e}")))?;
        log::info!("Loaded settings from {}", arg);
        Settings::from_json(&json)
    }

    pub fn run(settings: Settings) -> Result<(), SimError> {
        let sim = Rc::new(RefCell::new(Simulation::new(settings)?));

        let mut ticker = Ticker::new(ManualScheduler::new(), {
            let sim = sim.clone();
            move |dt| {
                let _ = sim.borrow_mut().advance(dt);
            }
        });
        ticker.start();

        let mut now = 0.0;
        let mut clicks = 0u32;
        for frame in 0..MAX_FRAMES {
            if !ticker.scheduler().is_pending() {
                log::warn!("Frame clock stalled at frame {}", frame);
                break;
            }
            ticker.handle_signal(now);
            if frame == DUPLICATE_AT {
                ticker.handle_signal(now);
            }
            now += FRAME_MS;

            if frame % CLICK_EVERY == 0 {
                let target = sim
                    .borrow()
                    .state()
                    .entities
                    .iter()
                    .find(|e| e.visible)
                    .map(|e| e.position);
                if let Some(target) = target {
                    // Slightly off-center, like a real click
                    sim.borrow_mut().apply_hit(target + Vec2::new(3.0, -2.0));
                    clicks += 1;
                }
            }

            for event in sim.borrow_mut().drain_events() {
                match event {
                    SimEvent::Cleared => log::info!("All germs swatted!"),
                    other => log::debug!("{:?}", other),
                }
            }

            if sim.borrow().is_cleared() {
                break;
            }
        }
        ticker.stop();

        let sim = sim.borrow();
        let state = sim.state();
        println!(
            "{} after {:.1}s: score {}, {} clicks, {} of {} germs left, {} dropped frames",
            if sim.is_cleared() { "Cleared" } else { "Timed out" },
            state.elapsed,
            state.score,
            clicks,
            state.visible_count(),
            state.entities.len(),
            ticker.dropped_frames()
        );
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Germ Swat (headless) starting...");

    let result = headless::load_settings(std::env::args().nth(1)).and_then(headless::run);
    if let Err(e) = result {
        log::error!("{}", e);
        eprintln!("germ-swat: {e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is WebSimulation, this is just to satisfy the compiler
}
