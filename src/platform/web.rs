//! Browser host
//!
//! Drives the simulation from `requestAnimationFrame`, converts click client
//! coordinates to arena-local pixels, and hands JSON snapshots to a JS render
//! callback. Drawing itself stays on the JS side.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Vec2;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, MouseEvent, Window};

use super::clock::{FrameScheduler, Ticker};
use crate::settings::Settings;
use crate::sim::{SimError, Simulation};

fn to_js(err: SimError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// `requestAnimationFrame` as a frame scheduler
pub struct RafScheduler {
    window: Window,
    frame: Option<Closure<dyn FnMut(f64)>>,
}

impl RafScheduler {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        Ok(Self {
            window,
            frame: None,
        })
    }

    /// Closure invoked with the frame timestamp; requests fail until bound
    pub fn bind(&mut self, frame: Closure<dyn FnMut(f64)>) {
        self.frame = Some(frame);
    }
}

impl FrameScheduler for RafScheduler {
    type Handle = i32;

    fn request_frame(&mut self) -> Option<i32> {
        let frame = self.frame.as_ref()?;
        match self
            .window
            .request_animation_frame(frame.as_ref().unchecked_ref())
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("requestAnimationFrame failed: {:?}", e);
                None
            }
        }
    }

    fn cancel_frame(&mut self, handle: i32) {
        if let Err(e) = self.window.cancel_animation_frame(handle) {
            log::warn!("cancelAnimationFrame failed: {:?}", e);
        }
    }
}

type SharedSim = Rc<RefCell<Simulation>>;
type Renderer = Rc<RefCell<Option<js_sys::Function>>>;

/// Simulation handle exported to JS
#[wasm_bindgen]
pub struct WebSimulation {
    sim: SharedSim,
    renderer: Renderer,
    ticker: Rc<RefCell<Ticker<RafScheduler>>>,
    click_listener: Option<(Element, Closure<dyn FnMut(MouseEvent)>)>,
}

#[wasm_bindgen]
impl WebSimulation {
    /// Build from settings JSON, or the default rules; a missing seed comes from the clock
    #[wasm_bindgen(constructor)]
    pub fn new(settings_json: Option<String>) -> Result<WebSimulation, JsValue> {
        console_error_panic_hook::set_once();
        // Already initialised when a second simulation is created
        let _ = console_log::init_with_level(log::Level::Info);

        let clock_seed = js_sys::Date::now() as u64;
        let settings = match settings_json {
            Some(json) => Settings::from_json_seeded(&json, clock_seed).map_err(to_js)?,
            None => Settings {
                seed: clock_seed,
                ..Settings::default()
            },
        };
        log::info!("Germ Swat starting with seed {}", settings.seed);

        let sim: SharedSim = Rc::new(RefCell::new(Simulation::new(settings).map_err(to_js)?));
        let renderer: Renderer = Rc::new(RefCell::new(None));

        let on_tick = {
            let sim = sim.clone();
            move |dt: f32| {
                // Malformed ticks are logged by the core and skipped
                let _ = sim.borrow_mut().advance(dt);
            }
        };
        let ticker = Rc::new(RefCell::new(Ticker::new(RafScheduler::new()?, on_tick)));

        // Render outside the ticker borrow so the JS callback may call stop()
        let frame = {
            let ticker: Weak<RefCell<Ticker<RafScheduler>>> = Rc::downgrade(&ticker);
            let sim = sim.clone();
            let renderer = renderer.clone();
            Closure::<dyn FnMut(f64)>::new(move |time: f64| {
                let Some(ticker) = ticker.upgrade() else {
                    return;
                };
                let ticked = ticker.borrow_mut().handle_signal(time).is_some();
                if ticked {
                    render(&sim, &renderer);
                }
            })
        };
        ticker.borrow_mut().scheduler_mut().bind(frame);

        Ok(WebSimulation {
            sim,
            renderer,
            ticker,
            click_listener: None,
        })
    }

    /// Listen for clicks on the arena element with the given id
    pub fn attach(&mut self, element_id: &str) -> Result<(), JsValue> {
        self.detach();

        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let element = document
            .get_element_by_id(element_id)
            .ok_or_else(|| JsValue::from_str(&format!("no element #{element_id}")))?;

        let listener = {
            let sim = self.sim.clone();
            let arena = element.clone();
            Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
                let rect = arena.get_bounding_client_rect();
                let point = Vec2::new(
                    (event.client_x() as f64 - rect.left()) as f32,
                    (event.client_y() as f64 - rect.top()) as f32,
                );
                sim.borrow_mut().apply_hit(point);
            })
        };
        element.add_event_listener_with_callback("click", listener.as_ref().unchecked_ref())?;
        self.click_listener = Some((element, listener));
        log::info!("Listening for clicks on #{}", element_id);
        Ok(())
    }

    /// Stop listening for clicks
    pub fn detach(&mut self) {
        if let Some((element, listener)) = self.click_listener.take() {
            let _ = element
                .remove_event_listener_with_callback("click", listener.as_ref().unchecked_ref());
        }
    }

    /// JS function called with a snapshot JSON string after every tick
    #[wasm_bindgen(js_name = setRenderer)]
    pub fn set_renderer(&self, callback: js_sys::Function) {
        *self.renderer.borrow_mut() = Some(callback);
    }

    pub fn start(&self) {
        self.ticker.borrow_mut().start();
    }

    pub fn stop(&self) {
        self.ticker.borrow_mut().stop();
    }

    /// Click at arena-local coordinates; returns the germs eliminated
    pub fn click(&self, x: f32, y: f32) -> u32 {
        self.sim.borrow_mut().apply_hit(Vec2::new(x, y)).eliminated as u32
    }

    pub fn snapshot(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.sim.borrow().snapshot())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Pending events as a JSON array
    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.sim.borrow_mut().drain_events())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = isCleared)]
    pub fn is_cleared(&self) -> bool {
        self.sim.borrow().is_cleared()
    }

    pub fn score(&self) -> f64 {
        self.sim.borrow().score() as f64
    }
}

impl Drop for WebSimulation {
    fn drop(&mut self) {
        self.detach();
        self.ticker.borrow_mut().stop();
    }
}

fn render(sim: &SharedSim, renderer: &Renderer) {
    let Some(callback) = renderer.borrow().clone() else {
        return;
    };
    let snapshot = sim.borrow().snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(json) => {
            if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                log::warn!("Render callback threw: {:?}", e);
            }
        }
        Err(e) => log::error!("Failed to serialize snapshot: {}", e),
    }
}
