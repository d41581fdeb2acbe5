// src/app.rs
//! Application controller: owns the scan session, the results panel and the
//! previews, and decides which actions are available.

use std::{
    mem,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, unbounded, Receiver, TryRecvError};
use egui::ColorImage;
use image::DynamicImage;
use log::{debug, error, info, warn};

use crate::{
    camera::{self, CameraOpener, ScanEnd, ScanEvent, ScanJob},
    config::ScannerConfig,
    decode::{self, DecodedResult, Decoder},
    render::ResultsPanel,
};

/// How often the UI wakes up to check on a stopping capture thread.
const RETIRED_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message the UI shows as a blocking dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            message: message.into(),
        }
    }

    pub fn error(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// Which actions are clickable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonStates {
    pub select_image: bool,
    pub start_webcam: bool,
    pub stop_scan: bool,
    pub copy: bool,
    pub open_browser: bool,
}

impl ButtonStates {
    pub const IDLE: Self = Self {
        select_image: true,
        start_webcam: true,
        stop_scan: false,
        copy: false,
        open_browser: false,
    };

    pub const SCANNING: Self = Self {
        select_image: false,
        start_webcam: false,
        stop_scan: true,
        copy: false,
        open_browser: false,
    };

    /// `stopping` is true while a stopped capture thread still holds the
    /// device; starting a new scan waits for it.
    pub fn derive(scanning: bool, stopping: bool, panel: &ResultsPanel) -> Self {
        if scanning {
            return Self::SCANNING;
        }
        let idle = Self {
            start_webcam: !stopping,
            ..Self::IDLE
        };
        match panel.rendered() {
            Some(rendered) => Self {
                copy: true,
                open_browser: rendered.open_target.is_some(),
                ..idle
            },
            None => idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    User,
    PreviewKey,
}

/// A running webcam scan as seen from the UI thread.
struct ScanSession {
    stop_signal: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    frame_rx: Receiver<Arc<ColorImage>>,
    event_rx: Receiver<ScanEvent>,
}

impl ScanSession {
    fn start(job: ScanJob, ctx: egui::Context) -> Self {
        let (frame_tx, frame_rx) = bounded(1);
        let (event_tx, event_rx) = unbounded();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let handle = camera::start_scan_thread(job, frame_tx, event_tx, stop_signal.clone(), ctx);
        Self {
            stop_signal,
            handle: Some(handle),
            frame_rx,
            event_rx,
        }
    }

    /// Raises the stop signal and hands back the thread for joining later.
    fn retire(mut self) -> Option<JoinHandle<()>> {
        self.stop_signal.store(true, Ordering::Relaxed);
        self.handle.take()
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.stop_signal.store(true, Ordering::Relaxed);
    }
}

enum ScanState {
    Idle,
    Scanning(ScanSession),
}

pub struct ScannerController {
    config: ScannerConfig,
    decoder: Arc<dyn Decoder>,
    opener: Arc<dyn CameraOpener>,
    ctx: egui::Context,

    state: ScanState,
    // Stopped capture threads that may still be releasing their device.
    retired: Vec<JoinHandle<()>>,

    panel: ResultsPanel,
    image_preview: Option<Arc<ColorImage>>,
    hide_preview_at: Option<Instant>,
    live_frame: Option<Arc<ColorImage>>,
    notices: Vec<Notice>,
}

impl ScannerController {
    pub fn new(
        config: ScannerConfig,
        decoder: Arc<dyn Decoder>,
        opener: Arc<dyn CameraOpener>,
        ctx: egui::Context,
    ) -> Self {
        Self {
            config,
            decoder,
            opener,
            ctx,
            state: ScanState::Idle,
            retired: Vec::new(),
            panel: ResultsPanel::Empty,
            image_preview: None,
            hide_preview_at: None,
            live_frame: None,
            notices: Vec::new(),
        }
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.state, ScanState::Scanning(_))
    }

    pub fn buttons(&self) -> ButtonStates {
        ButtonStates::derive(self.is_scanning(), self.is_stopping(), &self.panel)
    }

    /// True while a stopped capture thread has not finished releasing its
    /// device.
    pub fn is_stopping(&self) -> bool {
        self.retired.iter().any(|handle| !handle.is_finished())
    }

    pub fn panel(&self) -> &ResultsPanel {
        &self.panel
    }

    pub fn image_preview(&self) -> Option<&Arc<ColorImage>> {
        self.image_preview.as_ref()
    }

    pub fn live_frame(&self) -> Option<&Arc<ColorImage>> {
        self.live_frame.as_ref()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        mem::take(&mut self.notices)
    }

    // --- File decode path ---

    pub fn open_image(&mut self, path: &Path) {
        if self.is_scanning() {
            warn!("Ignoring image {} while a webcam scan is running.", path.display());
            return;
        }
        self.hide_preview_at = None;

        let image = match decode::load_image(path) {
            Ok(image) => image,
            Err(err) => {
                error!("Could not open image: {:#}", err);
                self.reset_display();
                self.notices.push(Notice::error(
                    "Error",
                    format!("Could not open image: {:#}", err),
                ));
                return;
            }
        };
        self.image_preview = Some(Arc::new(to_color_image(&decode::thumbnail(
            &image,
            self.config.thumbnail_max,
        ))));

        match self.decoder.decode(&image) {
            Ok(results) => {
                info!("{} code(s) found in {}", results.len(), path.display());
                self.show_results(&results);
                if results.is_empty() {
                    self.hide_preview_at = Some(Instant::now() + self.config.preview_hide_delay);
                }
            }
            Err(err) => {
                error!("Error decoding image: {:#}", err);
                self.reset_display();
                self.notices.push(Notice::error(
                    "Error",
                    format!("Error decoding image: {:#}", err),
                ));
            }
        }
    }

    // --- Webcam decode path ---

    pub fn start_webcam(&mut self) {
        if self.is_scanning() {
            info!("Scan already running; treating start as a stop request.");
            self.stop_scan(StopReason::User);
            return;
        }

        // The previous device must be released before a new one is opened.
        if self.is_stopping() {
            info!("Previous capture thread is still releasing the camera; not starting yet.");
            return;
        }
        self.reap_retired();
        self.reset_display();

        let job = ScanJob {
            opener: self.opener.clone(),
            decoder: self.decoder.clone(),
            camera_index: self.config.camera_index,
        };
        info!("Starting webcam scan on camera {}.", job.camera_index);
        self.state = ScanState::Scanning(ScanSession::start(job, self.ctx.clone()));
    }

    pub fn stop_scan(&mut self, reason: StopReason) {
        if !self.is_scanning() {
            debug!("Stop requested ({:?}) with no active scan.", reason);
            return;
        }
        info!("Stopping webcam scan ({:?}).", reason);
        self.end_session();
    }

    /// Consumes everything the capture thread posted and runs timers.
    /// Called once per UI turn.
    pub fn poll(&mut self, now: Instant) {
        self.drain_session();

        if self.hide_preview_at.is_some_and(|at| now >= at) {
            debug!("Hiding image preview.");
            self.image_preview = None;
            self.hide_preview_at = None;
        }
        self.reap_retired();
    }

    /// Time until `poll` has pending work, if any.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        let hide = self
            .hide_preview_at
            .map(|at| at.saturating_duration_since(now));
        let reap = (!self.retired.is_empty()).then_some(RETIRED_POLL_INTERVAL);
        match (hide, reap) {
            (Some(hide), Some(reap)) => Some(hide.min(reap)),
            (hide, reap) => hide.or(reap),
        }
    }

    // --- Result actions ---

    /// Text to place on the clipboard, if copying is currently allowed.
    pub fn copy_results(&mut self) -> Option<String> {
        if !self.buttons().copy {
            return None;
        }
        let text = self.panel.text().trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.notices
            .push(Notice::info("Copied", "Result copied to clipboard."));
        Some(text)
    }

    pub fn open_target(&self) -> Option<&str> {
        if self.buttons().open_browser {
            self.panel.open_target()
        } else {
            None
        }
    }

    /// Stops any scan and waits for every capture thread to finish.
    pub fn shutdown(&mut self) {
        if self.is_scanning() {
            self.end_session();
        }
        self.join_retired();
    }

    // --- internals ---

    fn drain_session(&mut self) {
        let ScanState::Scanning(session) = &self.state else {
            return;
        };

        if let Some(frame) = session.frame_rx.try_iter().last() {
            self.live_frame = Some(frame);
        }

        let mut events = Vec::new();
        let mut disconnected = false;
        loop {
            match session.event_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        let finished = events
            .iter()
            .any(|event| matches!(event, ScanEvent::Finished(_)));
        for event in events {
            self.handle_event(event);
        }
        if disconnected && !finished {
            error!("Capture thread disconnected without finishing!");
            self.notices.push(Notice::error(
                "Webcam Error",
                "Capture thread disconnected unexpectedly.",
            ));
            self.end_session();
        }
    }

    fn handle_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Detected(results) => {
                self.show_results(&results);
                self.notices
                    .push(Notice::info("Scan Result", "QR/Barcode detected!"));
            }
            ScanEvent::Error(err) => {
                self.notices.push(Notice::error(
                    "Webcam Error",
                    format!("Error during webcam scanning: {}", err),
                ));
            }
            ScanEvent::Finished(end) => {
                info!("Webcam scan ended: {:?}.", end);
                if self.is_scanning() {
                    self.end_session();
                }
                if end == ScanEnd::DeviceLost {
                    warn!("Camera stopped delivering frames.");
                }
            }
        }
    }

    fn show_results(&mut self, results: &[DecodedResult]) {
        self.panel = ResultsPanel::from_results(results);
    }

    fn end_session(&mut self) {
        if let ScanState::Scanning(session) = mem::replace(&mut self.state, ScanState::Idle) {
            if let Some(handle) = session.retire() {
                self.retired.push(handle);
            }
        }
        self.live_frame = None;
    }

    fn reset_display(&mut self) {
        self.panel = ResultsPanel::Empty;
        self.image_preview = None;
        self.hide_preview_at = None;
    }

    /// Joins the retired threads that have already exited, without blocking.
    fn reap_retired(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = mem::take(&mut self.retired)
            .into_iter()
            .partition(|handle| handle.is_finished());
        self.retired = running;
        for handle in finished {
            if let Err(e) = handle.join() {
                error!("Capture thread panicked: {:?}", e);
            }
        }
    }

    fn join_retired(&mut self) {
        for handle in self.retired.drain(..) {
            if let Err(e) = handle.join() {
                error!("Capture thread panicked: {:?}", e);
            }
        }
    }
}

fn to_color_image(image: &DynamicImage) -> ColorImage {
    let rgba = image.to_rgba8();
    ColorImage::from_rgba_unmultiplied(
        [rgba.width() as usize, rgba.height() as usize],
        rgba.as_raw(),
    )
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::atomic::Ordering, thread};

    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        camera::testing::{FakeOpener, ScriptedDecoder},
        render::NO_DETECTION_MESSAGE,
    };

    fn build(decoder: ScriptedDecoder, opener: FakeOpener) -> (ScannerController, Arc<FakeOpener>) {
        let opener = Arc::new(opener);
        let controller = ScannerController::new(
            ScannerConfig::default(),
            Arc::new(decoder),
            opener.clone(),
            egui::Context::default(),
        );
        (controller, opener)
    }

    fn image_file(width: u32, height: u32) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.png");
        RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();
        (dir, path)
    }

    /// Polls until the scan has ended and every capture thread was joined.
    fn wait_until_idle(controller: &mut ScannerController) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.is_scanning() || !controller.retired.is_empty() {
            assert!(Instant::now() < deadline, "scan never finished");
            thread::sleep(Duration::from_millis(5));
            controller.poll(Instant::now());
        }
    }

    fn qr(payload: &str) -> DecodedResult {
        DecodedResult::new(payload, "QRCODE")
    }

    struct PanickingDecoder;

    impl Decoder for PanickingDecoder {
        fn decode(&self, _image: &DynamicImage) -> anyhow::Result<Vec<DecodedResult>> {
            panic!("decoder bug");
        }
    }

    #[test]
    fn start_disabled_while_previous_thread_stops() {
        let panel = ResultsPanel::from_results(&[qr("https://example.com")]);
        let buttons = ButtonStates::derive(false, true, &panel);
        assert!(!buttons.start_webcam);
        assert!(buttons.select_image);
        assert!(buttons.copy);
        assert!(buttons.open_browser);
        assert_eq!(
            ButtonStates::derive(true, true, &panel),
            ButtonStates::SCANNING
        );
    }

    #[test]
    fn starts_idle() {
        let (controller, _) = build(ScriptedDecoder::never(), FakeOpener::endless());
        assert_eq!(controller.buttons(), ButtonStates::IDLE);
        assert_eq!(controller.panel().text(), "");
    }

    #[test]
    fn file_with_url_enables_copy_and_browser() {
        let (mut controller, _) = build(
            ScriptedDecoder::detecting(1, vec![qr("https://example.com")]),
            FakeOpener::endless(),
        );
        let (_dir, path) = image_file(800, 200);

        controller.open_image(&path);

        assert_eq!(
            controller.panel().text(),
            "Type: QRCODE\nData: https://example.com\n\n"
        );
        assert_eq!(
            controller.buttons(),
            ButtonStates {
                copy: true,
                open_browser: true,
                ..ButtonStates::IDLE
            }
        );
        assert_eq!(controller.open_target(), Some("https://example.com"));
        assert_eq!(controller.image_preview().unwrap().size, [400, 100]);
        assert!(controller.take_notices().is_empty());
    }

    #[test]
    fn file_with_plain_payload_disables_browser() {
        let (mut controller, _) = build(
            ScriptedDecoder::detecting(1, vec![qr("12345")]),
            FakeOpener::endless(),
        );
        let (_dir, path) = image_file(20, 20);

        controller.open_image(&path);

        let buttons = controller.buttons();
        assert!(buttons.copy);
        assert!(!buttons.open_browser);
        assert_eq!(controller.open_target(), None);
    }

    #[test]
    fn browser_target_is_last_url_in_batch() {
        let (mut controller, _) = build(
            ScriptedDecoder::detecting(
                1,
                vec![qr("https://first.example"), qr("https://second.example"), qr("text")],
            ),
            FakeOpener::endless(),
        );
        let (_dir, path) = image_file(20, 20);

        controller.open_image(&path);

        assert_eq!(controller.open_target(), Some("https://second.example"));
        assert_eq!(controller.panel().text().matches("Type: ").count(), 3);
    }

    #[test]
    fn file_without_codes_shows_message_and_hides_preview_later() {
        let (mut controller, _) = build(ScriptedDecoder::never(), FakeOpener::endless());
        let (_dir, path) = image_file(20, 20);

        controller.open_image(&path);

        assert_eq!(controller.panel().text(), NO_DETECTION_MESSAGE);
        assert_eq!(controller.buttons(), ButtonStates::IDLE);
        assert!(controller.image_preview().is_some());
        assert!(controller.next_deadline(Instant::now()).is_some());

        controller.poll(Instant::now() + Duration::from_secs(1));
        assert!(controller.image_preview().is_none());
        assert!(controller.next_deadline(Instant::now()).is_none());
        assert_eq!(controller.panel().text(), NO_DETECTION_MESSAGE);
    }

    #[test]
    fn unreadable_file_reports_error_and_returns_to_idle() {
        let (mut controller, _) = build(
            ScriptedDecoder::detecting(1, vec![qr("old")]),
            FakeOpener::endless(),
        );
        let (_dir, good) = image_file(20, 20);
        controller.open_image(&good);

        let bad = good.with_file_name("broken.png");
        std::fs::write(&bad, b"not an image").unwrap();
        controller.open_image(&bad);

        let notices = controller.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.starts_with("Could not open image:"));
        assert_eq!(controller.buttons(), ButtonStates::IDLE);
        assert_eq!(controller.panel(), &ResultsPanel::Empty);
        assert!(controller.image_preview().is_none());
    }

    #[test]
    fn decoder_failure_reports_error() {
        let (mut controller, _) = build(ScriptedDecoder::failing("corrupt symbol"), FakeOpener::endless());
        let (_dir, path) = image_file(20, 20);

        controller.open_image(&path);

        let notices = controller.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.starts_with("Error decoding image:"));
        assert!(notices[0].message.contains("corrupt symbol"));
        assert_eq!(controller.buttons(), ButtonStates::IDLE);
    }

    #[test]
    fn webcam_detection_renders_first_result_and_stops() {
        let (mut controller, opener) = build(
            ScriptedDecoder::detecting(2, vec![qr("https://example.com")]),
            FakeOpener::endless(),
        );

        controller.start_webcam();
        assert_eq!(controller.buttons(), ButtonStates::SCANNING);

        wait_until_idle(&mut controller);
        controller.shutdown();

        assert_eq!(
            controller.panel().text(),
            "Type: QRCODE\nData: https://example.com\n\n"
        );
        assert!(controller.buttons().copy);
        assert!(controller.buttons().open_browser);
        assert!(controller.live_frame().is_none());
        assert_eq!(
            controller.take_notices(),
            vec![Notice::info("Scan Result", "QR/Barcode detected!")]
        );
        assert_eq!(*opener.opened_indices.lock().unwrap(), vec![0]);
        assert_eq!(opener.stats.open_now.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_while_scanning_stops_instead() {
        let (mut controller, opener) = build(ScriptedDecoder::never(), FakeOpener::endless());

        controller.start_webcam();
        controller.start_webcam();
        assert!(!controller.is_scanning());
        assert!(!controller.buttons().stop_scan);
        assert!(controller.buttons().select_image);

        wait_until_idle(&mut controller);
        assert_eq!(controller.buttons(), ButtonStates::IDLE);
        controller.start_webcam();
        assert!(controller.is_scanning());
        controller.stop_scan(StopReason::User);
        controller.shutdown();

        assert!(opener.stats.opened.load(Ordering::SeqCst) <= 2);
        assert!(opener.stats.max_open.load(Ordering::SeqCst) <= 1);
        assert_eq!(opener.stats.open_now.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn restart_while_device_is_released_does_not_block() {
        let (mut controller, opener) = build(
            ScriptedDecoder::never(),
            FakeOpener {
                frame_delay: Duration::from_millis(400),
                ..FakeOpener::endless()
            },
        );

        controller.start_webcam();
        let deadline = Instant::now() + Duration::from_secs(5);
        while opener.stats.opened.load(Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline, "camera never opened");
            thread::sleep(Duration::from_millis(5));
        }
        controller.stop_scan(StopReason::User);

        // The capture thread is still inside a slow read.
        assert!(controller.is_stopping());
        assert!(!controller.buttons().start_webcam);
        assert!(controller.buttons().select_image);
        assert!(controller.next_deadline(Instant::now()).is_some());

        let started = Instant::now();
        controller.start_webcam();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(!controller.is_scanning());
        assert_eq!(opener.stats.opened.load(Ordering::SeqCst), 1);

        wait_until_idle(&mut controller);
        assert!(!controller.is_stopping());
        assert_eq!(controller.buttons(), ButtonStates::IDLE);
        assert!(controller.next_deadline(Instant::now()).is_none());

        controller.start_webcam();
        assert!(controller.is_scanning());
        controller.shutdown();

        assert_eq!(opener.stats.opened.load(Ordering::SeqCst), 2);
        assert_eq!(opener.stats.max_open.load(Ordering::SeqCst), 1);
        assert_eq!(opener.stats.open_now.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicked_capture_thread_is_joined_by_poll() {
        let opener = Arc::new(FakeOpener::endless());
        let mut controller = ScannerController::new(
            ScannerConfig::default(),
            Arc::new(PanickingDecoder),
            opener.clone(),
            egui::Context::default(),
        );

        controller.start_webcam();
        wait_until_idle(&mut controller);

        assert!(controller.retired.is_empty());
        assert!(!controller.is_stopping());
        assert_eq!(controller.buttons(), ButtonStates::IDLE);
        assert_eq!(
            controller.take_notices(),
            vec![Notice::error(
                "Webcam Error",
                "Capture thread disconnected unexpectedly."
            )]
        );
        assert_eq!(opener.stats.open_now.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_without_scan_is_noop() {
        let (mut controller, _) = build(ScriptedDecoder::never(), FakeOpener::endless());
        controller.stop_scan(StopReason::User);
        controller.stop_scan(StopReason::PreviewKey);
        assert_eq!(controller.buttons(), ButtonStates::IDLE);
        assert!(controller.take_notices().is_empty());
    }

    #[test]
    fn read_failure_on_first_frame_resets_quietly() {
        let (mut controller, opener) = build(ScriptedDecoder::never(), FakeOpener::failing_after(0));

        controller.start_webcam();
        wait_until_idle(&mut controller);
        controller.shutdown();

        assert_eq!(controller.buttons(), ButtonStates::IDLE);
        assert!(controller.take_notices().is_empty());
        assert_eq!(opener.stats.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unavailable_camera_reports_webcam_error() {
        let (mut controller, _) = build(
            ScriptedDecoder::never(),
            FakeOpener::unavailable("device busy"),
        );

        controller.start_webcam();
        wait_until_idle(&mut controller);

        let notices = controller.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].title, "Webcam Error");
        assert_eq!(
            notices[0].message,
            "Error during webcam scanning: device busy"
        );
        assert_eq!(controller.buttons(), ButtonStates::IDLE);
    }

    #[test]
    fn preview_key_stops_scan_and_clears_live_frame() {
        let (mut controller, opener) = build(ScriptedDecoder::never(), FakeOpener::endless());

        controller.start_webcam();
        let deadline = Instant::now() + Duration::from_secs(5);
        while controller.live_frame().is_none() {
            assert!(Instant::now() < deadline, "no preview frame arrived");
            thread::sleep(Duration::from_millis(5));
            controller.poll(Instant::now());
        }

        controller.stop_scan(StopReason::PreviewKey);
        assert!(controller.live_frame().is_none());
        assert!(!controller.is_scanning());

        wait_until_idle(&mut controller);
        assert_eq!(controller.buttons(), ButtonStates::IDLE);

        controller.shutdown();
        assert_eq!(opener.stats.open_now.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn starting_scan_clears_previous_results() {
        let (mut controller, _) = build(
            ScriptedDecoder::detecting(1, vec![qr("https://example.com")]),
            FakeOpener::failing_after(0),
        );
        let (_dir, path) = image_file(20, 20);
        controller.open_image(&path);
        assert!(controller.buttons().copy);

        controller.start_webcam();
        assert_eq!(controller.panel(), &ResultsPanel::Empty);
        assert!(controller.image_preview().is_none());
        wait_until_idle(&mut controller);

        assert_eq!(controller.buttons(), ButtonStates::IDLE);
    }

    #[test]
    fn copy_returns_trimmed_panel_text() {
        let (mut controller, _) = build(
            ScriptedDecoder::detecting(1, vec![qr("12345")]),
            FakeOpener::endless(),
        );
        assert_eq!(controller.copy_results(), None);

        let (_dir, path) = image_file(20, 20);
        controller.open_image(&path);

        assert_eq!(
            controller.copy_results().as_deref(),
            Some("Type: QRCODE\nData: 12345")
        );
        assert_eq!(
            controller.take_notices(),
            vec![Notice::info("Copied", "Result copied to clipboard.")]
        );
    }
}
