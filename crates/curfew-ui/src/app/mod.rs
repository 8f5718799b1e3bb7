//! Application wiring for the Curfew blocking window.
//!
//! The restriction is applied before any window exists. If that fails only the
//! fatal notice is shown; otherwise the blocking window owns the session until
//! it terminates.

mod screen;
mod style;
mod view;


use std::env;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use curfew_core::config::{CurfewConfig, UiCfg, DRY_RUN_ENV};
use curfew_core::shutdown::{next_signal, SignalReceiver, TerminationSignal, TerminationWatch};
use curfew_core::{
    logging, EnforcementSession, InputMatcher, RestrictionController, SessionOutcome,
};
use curfew_provider::{MemoryStore, RegistryStore};
use curfew_registry::SystemRegistryStore;
use iced::futures::{SinkExt, Stream};
use iced::widget::text_input;
use iced::window;
use iced::{application, Size, Subscription, Task, Theme};
use log::{error, info, warn};

use screen::ScreenProjection;

type Store = Box<dyn RegistryStore + Send>;
type Session = EnforcementSession<Store, ScreenProjection>;

const INPUT_ID: &str = "commitment-input";

/// Load configuration, start the session, and run the window. Returns the exit code.
pub fn run() -> i32 {
    let config = match load_ui_config() {
        Ok(config) => config,
        Err(err) => {
            logging::init("info");
            error!("configuration unusable: {err:#}");
            return show_fatal(format!("Curfew could not load its configuration.\n\n{err:#}"));
        }
    };
    logging::init(&config.logging.level);

    let matcher = match InputMatcher::new(config.commitment.sentence.clone()) {
        Ok(matcher) => matcher,
        Err(err) => return show_fatal(format!("The configured sentence cannot be used.\n\n{err}")),
    };
    let store = match open_store() {
        Ok(store) => store,
        Err(err) => return show_fatal(format!("{err:#}")),
    };

    // Armed before the restriction is applied; the window only consumes it.
    let signals = match TerminationWatch::spawn() {
        Ok(signals) => signals,
        Err(err) => {
            error!("termination handlers unavailable: {err}");
            return show_fatal(format!(
                "Curfew could not install its termination handlers.\n\n{err}"
            ));
        }
    };

    let mut session = EnforcementSession::new(
        RestrictionController::new(store),
        matcher,
        ScreenProjection::new(),
    );
    if let Err(err) = session.start() {
        let message = session
            .projection()
            .fatal_message()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        drop(session);
        return show_fatal(message);
    }

    let outcome = Arc::new(Mutex::new(SessionOutcome::Blocked));
    if let Err(err) =
        run_blocking_window(session, config.ui, signals.subscribe(), outcome.clone())
    {
        error!("blocking window failed: {err}");
    }
    let outcome = *outcome.lock().unwrap_or_else(PoisonError::into_inner);
    info!("exiting with outcome {outcome:?}");
    outcome.exit_code()
}

fn load_ui_config() -> Result<CurfewConfig> {
    match CurfewConfig::resolve_path(None) {
        Some(path) => CurfewConfig::load_or_default(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(CurfewConfig::default()),
    }
}

fn open_store() -> Result<Store> {
    let dry_run = env::var(DRY_RUN_ENV)
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);
    if dry_run {
        warn!("{DRY_RUN_ENV} set: the restriction only exists in memory");
        return Ok(Box::new(MemoryStore::new()));
    }
    anyhow::ensure!(
        SystemRegistryStore::supported(),
        "The system registry is not available on this platform. Set {DRY_RUN_ENV}=1 to rehearse."
    );
    Ok(Box::new(SystemRegistryStore::new()))
}

fn run_blocking_window(
    session: Session,
    settings: UiCfg,
    signals: SignalReceiver,
    outcome: Arc<Mutex<SessionOutcome>>,
) -> iced::Result {
    let window_settings = window::Settings {
        size: Size::new(1280.0, 800.0),
        decorations: !settings.fullscreen,
        resizable: false,
        level: if settings.always_on_top {
            window::Level::AlwaysOnTop
        } else {
            window::Level::Normal
        },
        exit_on_close_request: false,
        ..window::Settings::default()
    };

    application(BlockingWindow::title, BlockingWindow::update, BlockingWindow::view)
        .window(window_settings)
        .theme(BlockingWindow::theme)
        .subscription(BlockingWindow::subscription)
        .run_with(move || BlockingWindow::init(session, settings, signals, outcome))
}

/// Blocking window state: the session plus the raw text in the input field.
pub(super) struct BlockingWindow {
    session: Session,
    input: String,
    settings: UiCfg,
    signals: SignalReceiver,
    outcome: Arc<Mutex<SessionOutcome>>,
}

#[derive(Debug, Clone)]
pub(super) enum Message {
    InputChanged(String),
    CloseRequested(window::Id),
    Terminate(TerminationSignal),
}

impl BlockingWindow {
    fn new(
        session: Session,
        settings: UiCfg,
        signals: SignalReceiver,
        outcome: Arc<Mutex<SessionOutcome>>,
    ) -> Self {
        Self {
            session,
            input: String::new(),
            settings,
            signals,
            outcome,
        }
    }

    fn init(
        session: Session,
        settings: UiCfg,
        signals: SignalReceiver,
        outcome: Arc<Mutex<SessionOutcome>>,
    ) -> (Self, Task<Message>) {
        let mut tasks = vec![text_input::focus(text_input::Id::new(INPUT_ID))];
        if settings.fullscreen {
            tasks.push(
                window::get_latest()
                    .and_then(|id| window::change_mode(id, window::Mode::Fullscreen)),
            );
        }
        (Self::new(session, settings, signals, outcome), Task::batch(tasks))
    }

    fn title(&self) -> String {
        self.settings.title.clone()
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.input = value;
                self.session.on_input_changed(&self.input);
                self.finish_if_terminated()
            }
            Message::CloseRequested(id) => {
                info!("close request for window {id:?} ignored while blocked");
                Task::none()
            }
            Message::Terminate(signal) => {
                self.session.abort(&format!("received {signal}"));
                self.finish_if_terminated()
            }
        }
    }

    fn finish_if_terminated(&mut self) -> Task<Message> {
        if !self.session.is_terminated() {
            return Task::none();
        }
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = self.session.outcome();
        iced::exit()
    }

    fn view(&self) -> iced::Element<'_, Message> {
        view::render(self)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            window::close_requests().map(Message::CloseRequested),
            Subscription::run_with_id(
                "termination-signals",
                termination_events(self.signals.clone()),
            ),
        ])
    }
}

fn termination_events(mut signals: SignalReceiver) -> impl Stream<Item = Message> {
    iced::stream::channel(1, move |mut output| async move {
        let signal = next_signal(&mut signals).await;
        if let Err(err) = output.send(Message::Terminate(signal)).await {
            warn!("termination signal {signal} could not reach the window: {err}");
        }
        std::future::pending::<()>().await;
    })
}

/// Window shown instead of the blocking window when the session cannot start.
pub(super) struct FatalNotice {
    message: String,
}

#[derive(Debug, Clone)]
pub(super) enum FatalMessage {
    Dismiss,
}

impl FatalNotice {
    fn update(&mut self, message: FatalMessage) -> Task<FatalMessage> {
        match message {
            FatalMessage::Dismiss => iced::exit(),
        }
    }

    fn view(&self) -> iced::Element<'_, FatalMessage> {
        view::render_fatal(self)
    }
}

/// Show `message` in a standalone window. Always returns exit code 1.
fn show_fatal(message: String) -> i32 {
    eprintln!("error: {message}");
    let result = application("Curfew", FatalNotice::update, FatalNotice::view)
        .window(window::Settings {
            size: Size::new(640.0, 360.0),
            level: window::Level::AlwaysOnTop,
            ..window::Settings::default()
        })
        .theme(|_| Theme::Dark)
        .run_with(move || (FatalNotice { message }, Task::none()));
    if let Err(err) = result {
        error!("fatal notice could not be displayed: {err}");
    }
    1
}
