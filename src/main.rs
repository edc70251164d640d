//! Wellbeing Sim entry point
//!
//! Browser builds run an interactive session on a canvas; native builds run
//! a headless autopilot session and write the results to disk.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod web_host {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{HtmlCanvasElement, KeyboardEvent, MouseEvent, TouchEvent};

    use wellbeing_sim::autopilot::{Autopilot, Profile};
    use wellbeing_sim::persistence::{LocalStorageGateway, Outbox};
    use wellbeing_sim::platform::{Key, RawInput};
    use wellbeing_sim::renderer::{self, CanvasSurface, Surface, TextAlign, ViewInfo, colors};
    use wellbeing_sim::session::{SessionConfig, SessionIdentity};
    use wellbeing_sim::{Concept, Session, SessionPhase, Settings};

    /// Page-level state shared by the event closures
    struct Host {
        session: Session,
        surface: CanvasSurface,
        canvas: HtmlCanvasElement,
        pilot: Option<Autopilot>,
        outbox: Rc<RefCell<Outbox>>,
        delivered: bool,
    }

    impl Host {
        /// Map client coordinates to the logical view
        fn to_view(&self, client_x: i32, client_y: i32) -> (f32, f32) {
            let rect = self.canvas.get_bounding_client_rect();
            let scale = (rect.width() / renderer::VIEW_WIDTH as f64).min(rect.height() / renderer::VIEW_HEIGHT as f64);
            if scale <= 0.0 {
                return (f32::NAN, f32::NAN);
            }
            let ox = (rect.width() - renderer::VIEW_WIDTH as f64 * scale) / 2.0;
            let oy = (rect.height() - renderer::VIEW_HEIGHT as f64 * scale) / 2.0;
            (
                ((client_x as f64 - rect.left() - ox) / scale) as f32,
                ((client_y as f64 - rect.top() - oy) / scale) as f32,
            )
        }

        fn input(&mut self, event: RawInput) {
            if self.pilot.is_none() {
                self.session.handle_input(&event);
            }
        }

        fn pause(&mut self, reason: &str) {
            if self.session.phase() == SessionPhase::Running && self.session.pause(js_sys::Date::now()).is_ok() {
                log::info!("Auto-paused ({})", reason);
            }
        }

        fn resume(&mut self) {
            if self.session.phase() == SessionPhase::Paused {
                if let Err(e) = self.session.resume(js_sys::Date::now()) {
                    log::warn!("Resume failed: {}", e);
                }
            }
        }

        /// One animation frame: drive, render, hand off a finished result
        fn frame(&mut self) {
            let now = js_sys::Date::now();

            if let Some(pilot) = self.pilot.as_mut() {
                if self.session.phase() == SessionPhase::Running {
                    for event in pilot.inputs(self.session.state(), now) {
                        self.session.handle_input(&event);
                    }
                }
            }
            if !self.session.phase().is_terminal() {
                if let Err(e) = self.session.frame(now) {
                    log::warn!("Frame rejected: {}", e);
                }
            }

            self.surface.resize(web_sys::window().map_or(1.0, |w| w.device_pixel_ratio()));
            let view = ViewInfo::from_session(&self.session);
            renderer::render(self.session.state(), &view, &mut self.surface);

            if let Some(result) = self.session.result() {
                let band = result.metrics().risk_band.label();
                let center = self.surface.size() / 2.0;
                self.surface.fill_rect(glam::Vec2::ZERO, self.surface.size(), colors::OVERLAY);
                self.surface.text(center, "Session complete", 32.0, colors::TEXT, TextAlign::Center);
                self.surface.text(
                    center + glam::Vec2::new(0.0, 36.0),
                    &format!("Risk band: {}", band),
                    18.0,
                    colors::MUTED,
                    TextAlign::Center,
                );
            }
            self.deliver();
        }

        /// Queue the finished result and flush it outside the frame
        fn deliver(&mut self) {
            if self.delivered {
                return;
            }
            let Some(result) = self.session.result() else {
                return;
            };
            self.delivered = true;
            if self.outbox.borrow_mut().enqueue(result) == 0 {
                return;
            }
            let outbox = self.outbox.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let report = outbox.borrow_mut().flush(&mut LocalStorageGateway::new());
                log::info!("Outbox flushed: {} delivered, {} failed", report.delivered, report.failed);
            });
        }
    }

    /// Read `?concept=...&demo=1&invitation=...` style options
    fn query_param(search: &str, name: &str) -> Option<String> {
        search
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.to_string())
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Wellbeing Sim starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .expect("no canvas")
            .dyn_into()
            .expect("not a canvas");
        let mut surface = CanvasSurface::new(canvas.clone()).expect("no 2d context");
        surface.resize(window.device_pixel_ratio());

        let search = window.location().search().unwrap_or_default();
        let concept = query_param(&search, "concept")
            .and_then(|s| Concept::from_slug(&s))
            .unwrap_or(Concept::BalanceUnderPressure);
        let demo = query_param(&search, "demo").is_some_and(|v| v == "1" || v == "true");
        let identity = SessionIdentity {
            subject_id: query_param(&search, "subject").unwrap_or_default(),
            concept_id: concept.slug().to_string(),
            tenant_id: query_param(&search, "tenant").unwrap_or_default(),
            invitation_id: query_param(&search, "invitation"),
        };

        let seed = js_sys::Date::now() as u64;
        let config = SessionConfig {
            concept,
            seed,
            settings: Settings::load(),
            demo,
        };
        let mut gateway = LocalStorageGateway::new();
        let mut session = Session::create(identity, config, Some(&mut gateway));
        if let Err(e) = session.start(js_sys::Date::now()) {
            log::error!("Could not start session: {}", e);
            return;
        }

        let host = Rc::new(RefCell::new(Host {
            session,
            surface,
            canvas: canvas.clone(),
            pilot: demo.then(|| Autopilot::new(Profile::Calm, seed)),
            outbox: Rc::new(RefCell::new(Outbox::new())),
            delivered: false,
        }));

        setup_input_handlers(&canvas, host.clone());
        setup_auto_pause(host.clone());
        setup_teardown(host.clone());

        request_animation_frame(host);
        log::info!("Wellbeing Sim running ({}, seed {})", concept.slug(), seed);
    }

    fn setup_input_handlers(canvas: &HtmlCanvasElement, host: Rc<RefCell<Host>>) {
        let window = web_sys::window().expect("no window");

        // Keyboard
        {
            let host = host.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let Some(key) = Key::from_dom(&event.key()) else {
                    return;
                };
                event.prevent_default();
                let mut h = host.borrow_mut();
                h.resume();
                h.input(RawInput::KeyDown {
                    key,
                    repeat: event.repeat(),
                    timestamp_ms: js_sys::Date::now(),
                });
            });
            let _ = window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let host = host.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if let Some(key) = Key::from_dom(&event.key()) {
                    host.borrow_mut().input(RawInput::KeyUp {
                        key,
                        timestamp_ms: js_sys::Date::now(),
                    });
                }
            });
            let _ = window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Mouse
        {
            let host = host.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let mut h = host.borrow_mut();
                h.resume();
                let (x, y) = h.to_view(event.client_x(), event.client_y());
                h.input(RawInput::PointerDown {
                    x,
                    y,
                    timestamp_ms: js_sys::Date::now(),
                });
            });
            let _ = canvas.add_event_listener_with_callback("mousedown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let host = host.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let mut h = host.borrow_mut();
                let (x, y) = h.to_view(event.client_x(), event.client_y());
                h.input(RawInput::PointerMove {
                    x,
                    y,
                    timestamp_ms: js_sys::Date::now(),
                });
            });
            let _ = canvas.add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let host = host.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                host.borrow_mut().input(RawInput::PointerUp {
                    timestamp_ms: js_sys::Date::now(),
                });
            });
            let _ = canvas.add_event_listener_with_callback("mouseup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Touch
        {
            let host = host.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                if let Some(touch) = event.touches().get(0) {
                    let mut h = host.borrow_mut();
                    h.resume();
                    let (x, y) = h.to_view(touch.client_x(), touch.client_y());
                    h.input(RawInput::PointerDown {
                        x,
                        y,
                        timestamp_ms: js_sys::Date::now(),
                    });
                }
            });
            let _ = canvas.add_event_listener_with_callback("touchstart", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let host = host.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                if let Some(touch) = event.touches().get(0) {
                    let mut h = host.borrow_mut();
                    let (x, y) = h.to_view(touch.client_x(), touch.client_y());
                    h.input(RawInput::PointerMove {
                        x,
                        y,
                        timestamp_ms: js_sys::Date::now(),
                    });
                }
            });
            let _ = canvas.add_event_listener_with_callback("touchmove", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: TouchEvent| {
                host.borrow_mut().input(RawInput::PointerUp {
                    timestamp_ms: js_sys::Date::now(),
                });
            });
            let _ = canvas.add_event_listener_with_callback("touchend", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_auto_pause(host: Rc<RefCell<Host>>) {
        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        // Visibility change (tab switch, minimize)
        {
            let host = host.clone();
            let document_clone = document.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if document_clone.visibility_state() == web_sys::VisibilityState::Hidden {
                    host.borrow_mut().pause("tab hidden");
                }
            });
            let _ = document.add_event_listener_with_callback("visibilitychange", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Window blur (click outside)
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::FocusEvent| {
                host.borrow_mut().pause("window blur");
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    /// Leaving the page abandons an unfinished session and flushes immediately
    fn setup_teardown(host: Rc<RefCell<Host>>) {
        let window = web_sys::window().expect("no window");
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let mut h = host.borrow_mut();
            if h.session.abandon_if_unfinished(js_sys::Date::now()).is_none() {
                return;
            }
            if !h.delivered {
                h.delivered = true;
                if let Some(result) = h.session.result() {
                    let mut outbox = h.outbox.borrow_mut();
                    outbox.enqueue(result);
                    // No later task runs after pagehide; LocalStorage writes are synchronous
                    outbox.flush(&mut LocalStorageGateway::new());
                }
            }
        });
        let _ = window.add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn request_animation_frame(host: Rc<RefCell<Host>>) {
        let window = web_sys::window().expect("no window");
        let closure = Closure::once(move |_time: f64| {
            host.borrow_mut().frame();
            request_animation_frame(host);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    web_host::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::fs;
    use std::path::PathBuf;
    use std::process::ExitCode;
    use std::time::{SystemTime, UNIX_EPOCH};

    use clap::Parser;

    use wellbeing_sim::autopilot::{self, Autopilot, Profile};
    use wellbeing_sim::persistence::{FileGateway, Outbox};
    use wellbeing_sim::session::{SessionConfig, SessionIdentity};
    use wellbeing_sim::{Concept, EngineError, Session, Settings};

    /// Run a headless assessment session driven by a scripted subject
    #[derive(Debug, Parser)]
    #[command(name = "wellbeing-sim", version, about)]
    pub struct Cli {
        /// Simulation concept (balance-under-pressure, falling-objects)
        #[arg(short, long, default_value = "balance-under-pressure")]
        concept: String,

        /// RNG seed; random when omitted
        #[arg(short, long)]
        seed: Option<u64>,

        /// Autopilot temperament (calm, impulsive)
        #[arg(short, long, default_value = "calm")]
        profile: String,

        /// Directory the file gateway writes to
        #[arg(short, long, default_value = "sessions")]
        out: PathBuf,

        /// Settings JSON file
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Demo run: nothing is persisted
        #[arg(long)]
        demo: bool,

        /// Subject identifier
        #[arg(long, default_value = "")]
        subject: String,

        /// Tenant identifier
        #[arg(long, default_value = "")]
        tenant: String,

        /// Invitation to fulfil on completion
        #[arg(long)]
        invitation: Option<String>,

        /// Write the full session result (record, metrics, telemetry) here
        #[arg(long)]
        result: Option<PathBuf>,

        /// Increase log verbosity (-v debug, -vv trace)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
    }

    fn now_ms() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64() * 1000.0)
    }

    pub fn main() -> ExitCode {
        let cli = Cli::parse();

        let level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

        match run(cli) {
            Ok(code) => code,
            Err(e) => {
                log::error!("{}", e);
                ExitCode::FAILURE
            }
        }
    }

    fn run(cli: Cli) -> Result<ExitCode, EngineError> {
        let Some(concept) = Concept::from_slug(&cli.concept) else {
            log::error!("Unknown concept {:?}", cli.concept);
            return Ok(ExitCode::from(2));
        };
        let Some(profile) = Profile::from_name(&cli.profile) else {
            log::error!("Unknown profile {:?}", cli.profile);
            return Ok(ExitCode::from(2));
        };
        let settings = cli.settings.as_deref().map(Settings::load_from).unwrap_or_default();
        let seed = cli.seed.unwrap_or_else(rand::random);

        log::info!("Wellbeing Sim (native) starting...");

        let mut gateway = FileGateway::new(&cli.out);
        let identity = SessionIdentity {
            subject_id: cli.subject,
            concept_id: concept.slug().to_string(),
            tenant_id: cli.tenant,
            invitation_id: cli.invitation,
        };
        let config = SessionConfig {
            concept,
            seed,
            settings,
            demo: cli.demo,
        };
        let mut session = Session::create(identity, config, Some(&mut gateway));
        let mut pilot = Autopilot::new(profile, seed);

        autopilot::drive(&mut session, &mut pilot, now_ms())?;

        let Some(result) = session.result() else {
            log::error!("Session {} ended without a result", session.session_id());
            return Ok(ExitCode::FAILURE);
        };

        let record = result.record();
        let metrics = result.metrics();
        println!("session      {}", record.session_id);
        println!("concept      {}", concept.slug());
        println!("seed         {}", seed);
        println!("completion   {:.1}%", record.completion_rate);
        println!("risk index   {:.1} ({})", metrics.behaviour_risk_index, metrics.risk_band.label());
        for factor in &metrics.explanation.factors {
            println!("  - {}", factor);
        }

        let mut outbox = Outbox::new();
        if outbox.enqueue(result) > 0 {
            let report = outbox.flush(&mut gateway);
            log::info!(
                "Delivered {} message(s) to {} ({} failed)",
                report.delivered,
                gateway.root().display(),
                report.failed
            );
        }

        if let Some(path) = cli.result {
            fs::write(&path, serde_json::to_string_pretty(result)?)?;
            log::info!("Wrote session result to {}", path.display());
        }

        Ok(ExitCode::SUCCESS)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    cli::main()
}
