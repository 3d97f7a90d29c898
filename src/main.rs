use iced::widget::{scrollable, stack};
use iced::{keyboard, time, window};
use iced::{Element, Size, Subscription, Task, Theme};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

mod dash;
mod error;
mod state;
mod thumb;
mod ui;

use dash::navigator::{DashInput, Direction, Motion};
use dash::scanner::{run_page_scan, PageScanWorker, ScanSummary};
use dash::{Dashboard, Focus, InputOutcome, LaunchRequest, QuitReason};
use error::{DashError, DashResult};
use state::config::DashConfig;
use state::library::Library;
use state::tree::DEFAULT_VIEW_SIZE;
use thumb::decoder::{decode_thumbnail, DecodeOutcome};
use ui::overlay::Overlay;
use ui::KeyPress;

/// How often in-flight decodes are swept and a changed page re-checks its
/// visible thumbnails
const SWEEP_INTERVAL: Duration = Duration::from_millis(33);

/// Main application state
struct GameDash {
    dashboard: Dashboard,
    /// Panel drawn over the grid
    overlay: Overlay,
    /// Filled when the user confirms a launch, read after the window closes
    launch: Arc<Mutex<Option<LaunchRequest>>>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// Periodic sweep of pending decodes
    Tick,
    Key(KeyPress),
    Resized(Size),
    Scrolled(scrollable::Viewport),
    /// Background decode completed
    ThumbnailDecoded(DecodeOutcome),
    /// Background page scan completed
    ScanFinished(ScanSummary),
}

impl GameDash {
    fn new(mut dashboard: Dashboard, launch: Arc<Mutex<Option<LaunchRequest>>>) -> (Self, Task<Message>) {
        let scans = scan_tasks(dashboard.scan_db());

        (
            GameDash {
                dashboard,
                overlay: Overlay::None,
                launch,
            },
            scans,
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => {
                self.dashboard.tick();
                self.start_decodes()
            }
            Message::Key(press) => self.on_key(press),
            Message::Resized(size) => {
                self.dashboard.set_view_size(size.width, size.height);
                self.decode_visible()
            }
            Message::Scrolled(viewport) => {
                self.dashboard.set_scroll_offset(viewport.absolute_offset().y);
                self.decode_visible()
            }
            Message::ThumbnailDecoded(outcome) => {
                self.dashboard.apply_decoded(outcome);
                Task::none()
            }
            Message::ScanFinished(summary) => {
                if let Err(e) = &summary.result {
                    report(e);
                }
                match self.dashboard.scan_finished(&summary) {
                    Some(focus) => self.focus(focus),
                    None => self.decode_visible(),
                }
            }
        }
    }

    fn on_key(&mut self, press: KeyPress) -> Task<Message> {
        let KeyPress::Input(input) = press else {
            self.overlay = Overlay::None;
            return Task::none();
        };

        match std::mem::take(&mut self.overlay) {
            Overlay::None => self.on_input(input),
            Overlay::Info(details) => {
                if !matches!(input, DashInput::Confirm | DashInput::Info) {
                    self.overlay = Overlay::Info(details);
                }
                Task::none()
            }
            Overlay::Settings { page, sort } => {
                match input {
                    DashInput::Move(Motion::Step(Direction::Left)) => {
                        self.overlay = Overlay::Settings { page, sort: sort.prev() };
                    }
                    DashInput::Move(Motion::Step(Direction::Right)) => {
                        self.overlay = Overlay::Settings { page, sort: sort.next() };
                    }
                    DashInput::Confirm => check(self.dashboard.set_page_sort(&page, sort)),
                    _ => self.overlay = Overlay::Settings { page, sort },
                }
                Task::none()
            }
            Overlay::ConfirmLaunch { item, title } => {
                if input != DashInput::Confirm {
                    self.overlay = Overlay::ConfirmLaunch { item, title };
                    return Task::none();
                }

                match self.dashboard.launch(item) {
                    Ok(request) => {
                        *self.launch.lock() = Some(request);
                        iced::exit()
                    }
                    Err(e) => {
                        check::<()>(Err(e));
                        Task::none()
                    }
                }
            }
        }
    }

    fn on_input(&mut self, input: DashInput) -> Task<Message> {
        match self.dashboard.handle_input(input) {
            InputOutcome::Ignored => Task::none(),
            InputOutcome::Focus(focus) => self.focus(focus),
            InputOutcome::OpenInfo(details) => {
                self.overlay = Overlay::Info(details);
                Task::none()
            }
            InputOutcome::OpenSettings => {
                self.overlay = Overlay::settings(&self.dashboard);
                Task::none()
            }
            InputOutcome::ConfirmLaunch { item, title } => {
                self.overlay = Overlay::ConfirmLaunch { item, title };
                Task::none()
            }
        }
    }

    /// Scroll the focused item into view and decode what became visible
    fn focus(&mut self, focus: Focus) -> Task<Message> {
        let offset = focus.scroll_to.unwrap_or_else(|| self.dashboard.scroll_offset());
        self.dashboard.set_scroll_offset(offset);

        Task::batch([
            scrollable::scroll_to(
                ui::grid::grid_scroll_id(),
                scrollable::AbsoluteOffset { x: 0.0, y: offset },
            ),
            self.decode_visible(),
        ])
    }

    /// Queue decodes for visible untried thumbnails
    fn decode_visible(&mut self) -> Task<Message> {
        self.dashboard.request_visible_thumbnails();
        self.start_decodes()
    }

    /// Run the decodes the dashboard queued
    fn start_decodes(&mut self) -> Task<Message> {
        Task::batch(
            self.dashboard
                .take_decode_jobs()
                .into_iter()
                .map(|job| Task::perform(decode_thumbnail(job), Message::ThumbnailDecoded)),
        )
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let grid = ui::grid::dashboard_view(&self.dashboard);

        match ui::overlay::overlay_view(&self.overlay) {
            Some(panel) => stack![grid, panel].into(),
            None => grid,
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            time::every(SWEEP_INTERVAL).map(|_| Message::Tick),
            keyboard::on_key_press(ui::on_key),
            window::resize_events().map(|(_id, size)| Message::Resized(size)),
        ])
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Launch the scan of every page on the blocking pool
fn scan_tasks(workers: Vec<PageScanWorker>) -> Task<Message> {
    Task::batch(
        workers
            .into_iter()
            .map(|worker| Task::perform(run_page_scan(worker), Message::ScanFinished)),
    )
}

/// Log a failed operation; abort on errors that mean the tree and the
/// database are out of sync
fn check<T>(result: DashResult<T>) {
    if let Err(e) = result {
        report(&e);
    }
}

fn report(e: &DashError) {
    if e.is_fatal() {
        log::error!("❌ {}", e);
        std::process::abort();
    }
    log::warn!("⚠️  {}", e);
}

/// Load the config and open the title database
fn open_dashboard() -> DashResult<Dashboard> {
    let config_path = DashConfig::default_path();
    let config = DashConfig::load(&config_path)?;

    let library = Library::open(&config.database_path())?;
    log::info!(
        "🎮 Dashboard initialized with {} titles from {}",
        library.title_count()?,
        library.path().display()
    );

    Ok(Dashboard::new(config, library).with_config_path(config_path))
}

fn main() {
    env_logger::init();

    let dashboard = match open_dashboard() {
        Ok(dashboard) => dashboard,
        Err(e) => {
            log::error!("❌ Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    let launch = Arc::new(Mutex::new(None));
    let launch_slot = launch.clone();

    let result = iced::application("Game Dashboard", GameDash::update, GameDash::view)
        .subscription(GameDash::subscription)
        .theme(GameDash::theme)
        .window_size(DEFAULT_VIEW_SIZE)
        .centered()
        .run_with(move || GameDash::new(dashboard, launch_slot));

    if let Err(e) = result {
        log::error!("❌ {}", e);
        std::process::exit(1);
    }

    let reason = match launch.lock().take() {
        Some(request) => {
            // The caller runs the printed path
            println!("{}", request.launch_path);
            QuitReason::Launch
        }
        None => QuitReason::User,
    };
    std::process::exit(reason.exit_code());
}
