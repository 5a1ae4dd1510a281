//! Masks entry point
//!
//! Handles platform-specific initialization and runs the frame loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;

    use masks::audio::{AudioBridge, HtmlAudio};
    use masks::persistence::LocalStore;
    use masks::sim::{GameClock, InputState, Key, LevelId};
    use masks::{Screen, ScreenRouter, Settings, Tuning};

    /// Everything the page keeps alive between frames
    struct Game {
        router: ScreenRouter,
        audio: AudioBridge<HtmlAudio>,
        input: InputState,
        clock: GameClock,
    }

    impl Game {
        fn new(seed: u64) -> Self {
            let settings = Settings::load();
            Self {
                router: ScreenRouter::new(
                    Box::new(LocalStore),
                    Tuning::default(),
                    settings.clone(),
                    seed,
                ),
                audio: AudioBridge::new(HtmlAudio::new(), settings.clone()),
                input: InputState::new(),
                clock: GameClock::new(settings.max_frame_delta_ms),
            }
        }

        fn frame(&mut self, time: f64) {
            let input = self.input.sample();
            let router = &mut self.router;
            let audio = &mut self.audio;
            self.clock.frame(time, |dt| {
                let cues = router.tick(&input, dt);
                audio.dispatch(cues);
                audio.update(dt);
            });
        }

        fn update_hud(&self) {
            let Some(document) = web_sys::window().and_then(|w| w.document()) else {
                return;
            };
            if let Some(hud) = document.get_element_by_id("hud") {
                hud.set_text_content(Some(&describe(&self.router)));
            }
        }
    }

    fn describe(router: &ScreenRouter) -> String {
        match router.screen() {
            Screen::Home { .. } => format!("{} / {}", "MASK", router.reflection_text()),
            Screen::LevelSelect => LevelId::ALL
                .iter()
                .map(|l| format!("{}. {}", l.number(), l.title()))
                .collect::<Vec<_>>()
                .join("  "),
            Screen::Transition { .. } => String::new(),
            Screen::Gameplay => router.level().title().to_string(),
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Masks starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");
        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let seed = js_sys::Date::now() as u64;
        let game = Rc::new(RefCell::new(Game::new(seed)));
        game.borrow_mut().clock.set_active(true);

        setup_input_handlers(game.clone());
        request_animation_frame(game);
    }

    fn setup_input_handlers(game: Rc<RefCell<Game>>) {
        let window = web_sys::window().expect("no window");

        // Key down
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::KeyboardEvent| {
                let mut g = game.borrow_mut();
                let key = event.key();
                if let Some(k) = Key::from_code(&key) {
                    event.prevent_default();
                    g.input.key_down(k, event.repeat());
                    return;
                }
                match key.as_str() {
                    "g" | "G" => g.router.open_level_select(),
                    "m" | "M" => {
                        let mut settings = g.audio.settings().clone();
                        let muted = settings.toggle_mute();
                        settings.save();
                        g.audio.set_settings(settings);
                        log::info!("Audio {}", if muted { "muted" } else { "unmuted" });
                    }
                    digit => {
                        let level = digit.parse::<u8>().ok().and_then(LevelId::from_number);
                        if let Some(level) = level {
                            g.router.select_level(level);
                        }
                    }
                }
            });
            let _ = window
                .add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Key up
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: web_sys::KeyboardEvent| {
                if let Some(k) = Key::from_code(&event.key()) {
                    game.borrow_mut().input.key_up(k);
                }
            });
            let _ =
                window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Losing focus drops held keys
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                game.borrow_mut().input.clear();
            });
            let _ = window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game_loop(game, time);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>, time: f64) {
        {
            let mut g = game.borrow_mut();
            g.frame(time);
            g.update_hud();
        }
        request_animation_frame(game);
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::path::PathBuf;

    use masks::audio::{AudioBridge, NullAudio};
    use masks::persistence::FileStore;
    use masks::sim::{GameClock, InputState, Key, LevelId};
    use masks::{Screen, ScreenRouter, Settings, Tuning};

    const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Fifteen minutes of frames; a full playthrough needs a few
    const MAX_FRAMES: u64 = 60 * 60 * 15;

    /// Scripted player: (primary, directional) to hold on this frame
    fn autopilot(screen: Screen, level: LevelId, frame: u64) -> (bool, bool) {
        match screen {
            Screen::Home { fading_ms: None } => (frame % 2 == 0, false),
            Screen::Gameplay => match level {
                LevelId::Conformity => (true, false),
                // Labour until capital boils over
                LevelId::Capital => (frame % 6 < 3, false),
                LevelId::Factory | LevelId::Consumerism | LevelId::Epiphany => (false, true),
            },
            _ => (false, false),
        }
    }

    fn save_path() -> PathBuf {
        std::env::var_os("MASKS_SAVE")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("masks_save.json"))
    }

    fn tuning() -> Tuning {
        let Some(path) = std::env::var_os("MASKS_TUNING") else {
            return Tuning::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(json) => Tuning::from_json_or_default(&json),
            Err(e) => {
                log::warn!("Could not read tuning {:?}: {}", path, e);
                Tuning::default()
            }
        }
    }

    pub fn run() {
        let settings = Settings::load();
        let path = save_path();
        log::info!("Save file: {}", path.display());

        let mut router = ScreenRouter::new(
            Box::new(FileStore::new(path)),
            tuning(),
            settings.clone(),
            42,
        );
        let mut audio = AudioBridge::new(NullAudio, settings.clone());
        let mut input = InputState::new();
        let mut clock = GameClock::new(settings.max_frame_delta_ms);
        clock.set_active(true);

        let mut now = 0.0;
        let mut last = (router.screen(), router.level());
        let mut reached_final = false;

        for frame in 0..MAX_FRAMES {
            now += FRAME_MS;
            let (primary, directional) = autopilot(router.screen(), router.level(), frame);
            for (key, held) in [(Key::Primary, primary), (Key::Directional, directional)] {
                if held {
                    input.key_down(key, false);
                } else {
                    input.key_up(key);
                }
            }
            let tick_input = input.sample();

            clock.frame(now, |dt| {
                let cues = router.tick(&tick_input, dt);
                audio.dispatch(cues);
                audio.update(dt);
            });

            let current = (router.screen(), router.level());
            if current.1 != last.1 || (current.0 == Screen::Gameplay && last.0 != Screen::Gameplay) {
                println!(
                    "[{:>6.1}s] {:?} level {} ({})",
                    now / 1000.0,
                    current.0,
                    current.1.number(),
                    current.1.title()
                );
            }
            if current.0 == Screen::Gameplay && current.1 == LevelId::Epiphany {
                reached_final = true;
            }
            last = current;

            if reached_final && matches!(current.0, Screen::Home { .. }) {
                println!(
                    "Playthrough finished after {:.1}s. Awakened: {} (reflection reads {})",
                    now / 1000.0,
                    router.awakened(),
                    router.reflection_text()
                );
                return;
            }
        }
        log::warn!("Playthrough did not finish within {} frames", MAX_FRAMES);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Masks (native) starting headless playthrough...");
    headless::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
