//! River Quiz entry point
//!
//! Native: headless autopilot runner for balancing and smoke testing.
//! Web: DOM HUD driven by a fixed-timestep requestAnimationFrame loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Question table shipped with the game
const BUNDLED_QUESTIONS: &str = include_str!("../assets/questions.csv");

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{Document, Element, HtmlElement, KeyboardEvent, MouseEvent, TouchEvent};

    use river_quiz::GameConfig;
    use river_quiz::consts::*;
    use river_quiz::sim::{AnswerChoice, AnswerInput, EntityKind, GameEvent, Run, RunPhase, RunView, TickInput, tick};
    use river_quiz::ui::{self, Presenter};

    /// DOM nodes making up the HUD
    struct Hud {
        field: Element,
        score: Element,
        banner: Element,
        prompt: Element,
        options: Vec<Element>,
        feedback: Element,
        link_button: Element,
        config: GameConfig,
    }

    impl Hud {
        fn build(document: &Document, config: &GameConfig) -> Result<Self, JsValue> {
            let body = document.body().ok_or_else(|| JsValue::from_str("no body"))?;
            let make = |id: &str| -> Result<Element, JsValue> {
                let el = document.create_element("div")?;
                el.set_id(id);
                body.append_child(&el)?;
                Ok(el)
            };

            let score = make("score")?;
            let banner = make("banner")?;
            let field = make("field")?;
            field.set_attribute(
                "style",
                &format!(
                    "position:relative;overflow:hidden;width:{}px;height:{}px;background:#1d4e89",
                    config.screen_width, config.screen_height
                ),
            )?;
            let prompt = make("prompt")?;
            let mut options = Vec::with_capacity(4);
            for i in 0..4 {
                let button = document.create_element("button")?;
                button.set_id(&format!("option-{i}"));
                body.append_child(&button)?;
                options.push(button);
            }
            let feedback = make("feedback")?;
            let link_button = document.create_element("button")?;
            link_button.set_id("feedback-link");
            link_button.set_text_content(Some("Tell us what you think"));
            body.append_child(&link_button)?;

            let hud = Self {
                field,
                score,
                banner,
                prompt,
                options,
                feedback,
                link_button,
                config: config.clone(),
            };
            hud.show_question(None);
            hud.set_visible(&hud.link_button, false);
            hud.banner.set_text_content(Some(ui::phase_banner(RunPhase::NotStarted)));
            Ok(hud)
        }

        /// Toggle `display` without touching the element's other inline styles
        fn set_visible(&self, el: &Element, visible: bool) {
            let Some(html) = el.dyn_ref::<HtmlElement>() else {
                return;
            };
            let style = html.style();
            let result = if visible {
                style.remove_property("display").map(|_| ())
            } else {
                style.set_property("display", "none")
            };
            if let Err(err) = result {
                log::warn!("Failed to toggle #{}: {:?}", el.id(), err);
            }
        }

        fn show_question(&self, options: Option<&[String]>) {
            for (i, button) in self.options.iter().enumerate() {
                match options.and_then(|o| o.get(i)) {
                    Some(text) => {
                        button.set_text_content(Some(text));
                        self.set_visible(button, true);
                    }
                    None => self.set_visible(button, false),
                }
            }
            self.set_visible(&self.prompt, options.is_some());
        }
    }

    impl Presenter for Hud {
        fn on_event(&mut self, event: &GameEvent) {
            match event {
                GameEvent::PhaseChanged { to, .. } => {
                    self.banner.set_text_content(Some(ui::phase_banner(*to)));
                    self.set_visible(&self.link_button, *to == RunPhase::Victory);
                    if *to == RunPhase::NotStarted {
                        self.feedback.set_text_content(None);
                        self.show_question(None);
                    }
                }
                GameEvent::Warning { message, .. } => {
                    log::warn!("{message}");
                }
                GameEvent::QuestionPresented(view) => {
                    self.prompt.set_text_content(Some(&view.prompt));
                    self.feedback.set_text_content(None);
                    self.show_question(Some(&view.options));
                }
                GameEvent::AnswerJudged { message, .. } => {
                    self.feedback.set_text_content(Some(message));
                }
                GameEvent::QuestionClosed => {
                    self.feedback.set_text_content(None);
                    self.show_question(None);
                }
                GameEvent::Victory { elapsed_secs } => {
                    self.feedback.set_text_content(Some(&ui::victory_line(*elapsed_secs)));
                }
                GameEvent::OpenLink { url } => {
                    if let Some(window) = web_sys::window()
                        && let Err(err) = window.open_with_url_and_target(url, "_blank")
                    {
                        log::warn!("Failed to open {}: {:?}", url, err);
                    }
                }
                _ => {}
            }
        }

        fn on_frame(&mut self, view: &RunView) {
            self.score.set_text_content(Some(&ui::score_line(&view.progress)));

            let mut html = String::new();
            for entity in &view.entities {
                let color = match entity.kind {
                    EntityKind::Obstacle => "#5b3a1a",
                    EntityKind::Bonus => "#f2c94c",
                };
                let radius = entity.kind.radius(&self.config);
                html.push_str(&format!(
                    "<div style=\"position:absolute;left:{:.0}px;top:{:.0}px;width:{:.0}px;height:{:.0}px;border-radius:50%;background:{}\"></div>",
                    entity.pos.x - radius,
                    entity.pos.y - radius,
                    radius * 2.0,
                    radius * 2.0,
                    color
                ));
            }
            let r = self.config.vessel_radius;
            html.push_str(&format!(
                "<div style=\"position:absolute;left:{:.0}px;top:{:.0}px;width:{:.0}px;height:{:.0}px;background:#c0392b;transform:rotate({:.1}deg)\"></div>",
                view.vessel.position_x - r,
                view.vessel_y - r,
                r * 2.0,
                r * 2.0,
                view.vessel.angle
            ));
            self.field.set_inner_html(&html);
        }
    }

    /// Game instance holding the run and frame bookkeeping
    struct Game {
        run: Run,
        hud: Hud,
        input: TickInput,
        accumulator: f32,
        last_time: f64,
    }

    impl Game {
        fn update(&mut self, time: f64) {
            let frame = if self.last_time > 0.0 {
                ((time - self.last_time) / 1000.0) as f32
            } else {
                0.0
            };
            self.last_time = time;
            self.accumulator += frame.min(0.25);

            let mut substeps = 0;
            while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                tick(&mut self.run, &self.input, SIM_DT);
                self.accumulator -= SIM_DT;
                substeps += 1;

                // One-shot inputs apply to a single tick
                self.input.start = false;
                self.input.restart = false;
                self.input.answer = None;
                self.input.open_feedback_link = false;
            }
            if substeps == MAX_SUBSTEPS {
                self.accumulator = 0.0;
            }

            ui::present(&mut self.run, &mut self.hud);
        }

        /// Screen x to playfield x
        fn field_x(&self, client_x: i32) -> f32 {
            let rect = self.hud.field.get_bounding_client_rect();
            if rect.width() <= 0.0 {
                return client_x as f32;
            }
            ((client_x as f64 - rect.left()) * self.hud.config.screen_width as f64 / rect.width()) as f32
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Logger already initialized".into());
        }

        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(document) = window.document() else {
            return;
        };

        let seed = (js_sys::Math::random() * u32::MAX as f64) as u64;
        let config = GameConfig::default();
        let run = match Run::from_table(config.clone(), super::BUNDLED_QUESTIONS, seed) {
            Ok(run) => run,
            Err(err) => {
                log::error!("[{}] {}", err.code(), err);
                return;
            }
        };
        let hud = match Hud::build(&document, &config) {
            Ok(hud) => hud,
            Err(err) => {
                log::error!("Failed to build HUD: {:?}", err);
                return;
            }
        };
        log::info!("River Quiz starting (seed {}, {} questions)", seed, run.bank().len());

        let game = Rc::new(RefCell::new(Game {
            run,
            hud,
            input: TickInput::default(),
            accumulator: 0.0,
            last_time: 0.0,
        }));

        setup_input_handlers(&document, game.clone());
        setup_buttons(game.clone());
        request_animation_frame(game);
    }

    fn setup_input_handlers(document: &Document, game: Rc<RefCell<Game>>) {
        // Pointer
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let mut g = game.borrow_mut();
                let x = g.field_x(event.client_x());
                g.input.pointer_x = Some(x);
            });
            let _ = document.add_event_listener_with_callback("mousemove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Touch
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                if let Some(touch) = event.touches().get(0) {
                    let mut g = game.borrow_mut();
                    let x = g.field_x(touch.client_x());
                    g.input.pointer_x = Some(x);
                }
            });
            let _ = document.add_event_listener_with_callback("touchmove", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Keyboard steering
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let mut g = game.borrow_mut();
                match event.key().as_str() {
                    "ArrowLeft" | "a" => {
                        g.input.pointer_x = None;
                        g.input.steer = -1.0;
                    }
                    "ArrowRight" | "d" => {
                        g.input.pointer_x = None;
                        g.input.steer = 1.0;
                    }
                    "Enter" | " " => {
                        if g.run.phase() == RunPhase::NotStarted {
                            g.input.start = true;
                        }
                    }
                    "r" | "R" => g.input.restart = true,
                    _ => {}
                }
            });
            let _ = document.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        {
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if matches!(event.key().as_str(), "ArrowLeft" | "ArrowRight" | "a" | "d") {
                    game.borrow_mut().input.steer = 0.0;
                }
            });
            let _ = document.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_buttons(game: Rc<RefCell<Game>>) {
        let (options, banner, link) = {
            let g = game.borrow();
            (g.hud.options.clone(), g.hud.banner.clone(), g.hud.link_button.clone())
        };

        for (index, button) in options.into_iter().enumerate() {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let mut g = game.borrow_mut();
                let answer = g.run.active_question().map(|q| AnswerInput {
                    ticket: q.ticket,
                    choice: AnswerChoice::Index(index),
                });
                g.input.answer = answer;
            });
            let _ = button.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Banner doubles as the start / try again button
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                let mut g = game.borrow_mut();
                match g.run.phase() {
                    RunPhase::NotStarted => g.input.start = true,
                    RunPhase::Victory | RunPhase::Defeated => g.input.restart = true,
                    _ => {}
                }
            });
            let _ = banner.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                game.borrow_mut().input.open_feedback_link = true;
            });
            let _ = link.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let closure = Closure::once(move |time: f64| {
            game.borrow_mut().update(time);
            request_animation_frame(game);
        });
        let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;

    use clap::Parser;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use river_quiz::consts::{SIM_DT, TICKS_PER_SEC};
    use river_quiz::sim::{AnswerChoice, AnswerInput, PresentationTicket, Run, RunPhase, TickInput, tick};
    use river_quiz::ui::{self, LogPresenter};
    use river_quiz::{Difficulty, GameConfig, GameError};

    /// River Quiz headless runner: plays runs on autopilot and reports the result
    #[derive(Parser, Debug)]
    #[command(name = "river-quiz")]
    #[command(version, about, long_about = None)]
    pub struct Args {
        /// Question table (6 comma-separated fields per line); defaults to the bundled table
        #[arg(short, long, value_name = "PATH")]
        questions: Option<PathBuf>,

        /// JSON game config
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Difficulty preset when no config file is given (easy, normal, hard)
        #[arg(long, default_value = "normal")]
        difficulty: String,

        /// RNG seed
        #[arg(short, long, default_value_t = 12345)]
        seed: u64,

        /// Number of runs to play back to back
        #[arg(long, default_value_t = 1)]
        runs: u32,

        /// Give up on a run after this many simulated seconds
        #[arg(long, default_value_t = 600)]
        max_seconds: u64,

        /// Probability that the autopilot answers correctly
        #[arg(long, default_value_t = 0.7)]
        accuracy: f64,
    }

    fn load_config(args: &Args) -> Result<GameConfig, Box<dyn std::error::Error>> {
        if let Some(path) = &args.config {
            let raw = std::fs::read_to_string(path)?;
            return Ok(GameConfig::from_json(&raw)?);
        }
        let difficulty = Difficulty::from_str(&args.difficulty)
            .ok_or_else(|| GameError::InvalidConfig(format!("unknown difficulty '{}'", args.difficulty)))?;
        Ok(GameConfig::from_preset(difficulty))
    }

    /// Pick the answer text for the question on screen
    fn choose_answer(run: &Run, rng: &mut Pcg32, accuracy: f64) -> Option<AnswerInput> {
        let view = run.active_question()?;
        let record = run.bank().iter().find(|r| r.prompt == view.prompt)?;
        let text = if rng.random_bool(accuracy.clamp(0.0, 1.0)) {
            record.correct_option.clone()
        } else {
            view.options
                .iter()
                .find(|o| !record.is_correct(o))
                .cloned()
                .unwrap_or_default()
        };
        Some(AnswerInput {
            ticket: view.ticket,
            choice: AnswerChoice::Text(text),
        })
    }

    /// Play one run to completion or timeout
    fn play(run: &mut Run, rng: &mut Pcg32, args: &Args) -> RunPhase {
        let mut presenter = LogPresenter::default();
        let mut answered: Option<PresentationTicket> = None;
        let max_ticks = args.max_seconds * TICKS_PER_SEC;

        for _ in 0..max_ticks {
            let mut input = TickInput {
                autopilot: true,
                ..Default::default()
            };
            if run.phase() == RunPhase::Answering
                && let Some(answer) = choose_answer(run, rng, args.accuracy)
                && answered != Some(answer.ticket)
            {
                answered = Some(answer.ticket);
                input.answer = Some(answer);
            }

            tick(run, &input, SIM_DT);
            ui::present(run, &mut presenter);

            if run.phase().is_terminal() {
                break;
            }
        }
        run.phase()
    }

    pub fn main() {
        env_logger::init();
        let args = Args::parse();

        let config = match load_config(&args) {
            Ok(config) => config,
            Err(err) => {
                log::error!("Config error: {}", err);
                std::process::exit(2);
            }
        };

        let table = match &args.questions {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(raw) => raw,
                Err(err) => {
                    log::error!("Failed to read {}: {}", path.display(), err);
                    std::process::exit(2);
                }
            },
            None => super::BUNDLED_QUESTIONS.to_string(),
        };

        let mut run = match Run::from_table(config, &table, args.seed) {
            Ok(run) => run,
            Err(err) => {
                log::error!("[{}] {}", err.code(), err);
                std::process::exit(2);
            }
        };
        log::info!(
            "River Quiz (native) starting: {} questions in bank, difficulty {}",
            run.bank().len(),
            run.config().difficulty.as_str()
        );

        let mut rng = Pcg32::seed_from_u64(args.seed ^ 0xA5A5_A5A5);
        let mut victories = 0;
        for n in 0..args.runs {
            if n > 0 {
                run.restart();
            }
            let phase = play(&mut run, &mut rng, &args);
            let progress = run.progress();
            println!(
                "run {}: {:?} ({} correct of {} asked, {} s)",
                n + 1,
                phase,
                progress.correct_count,
                progress.questions_asked,
                run.elapsed_secs()
            );
            if phase == RunPhase::Victory {
                victories += 1;
            }
        }
        println!("{victories}/{} runs won", args.runs);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    native::main();
}
