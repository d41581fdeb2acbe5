// src/camera.rs
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Result};
use crossbeam_channel::{Sender, TrySendError};
use egui::ColorImage;
use image::{DynamicImage, RgbImage};
use log::{debug, error, info, warn};
use nokhwa::{
    pixel_format::{RgbFormat, YuyvFormat},
    utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution},
    Camera, NokhwaError,
};

use crate::{
    config::ScannerConfig,
    decode::{DecodedResult, Decoder},
};

// --- Constants ---
const MAX_READ_TIMEOUTS: u32 = 3;
const READ_TIMEOUT_BACKOFF: Duration = Duration::from_millis(100);

/// A device that yields frames on demand.
///
/// Lives entirely on the capture thread, so it does not need to be `Send`.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<RgbImage>;
    /// Frees the device. Calling this more than once is a no-op.
    fn release(&mut self);
}

/// Opens capture devices by index. Called from the capture thread.
pub trait CameraOpener: Send + Sync {
    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>>;
}

/// Messages from the capture thread to the UI thread (frames travel separately).
#[derive(Debug)]
pub enum ScanEvent {
    Detected(Vec<DecodedResult>),
    Error(String),
    Finished(ScanEnd),
}

/// Why a capture loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    Detected,
    Stopped,
    DeviceLost,
    Failed,
}

/// Everything a capture thread needs besides its channels.
pub struct ScanJob {
    pub opener: Arc<dyn CameraOpener>,
    pub decoder: Arc<dyn Decoder>,
    pub camera_index: u32,
}

pub fn start_scan_thread(
    job: ScanJob,
    frame_sender: Sender<Arc<ColorImage>>,
    event_sender: Sender<ScanEvent>,
    stop_signal: Arc<AtomicBool>,
    ctx: egui::Context,
) -> JoinHandle<()> {
    info!("Spawning capture thread for camera {}.", job.camera_index);
    thread::spawn(move || {
        capture_thread(job, frame_sender, event_sender, stop_signal, ctx);
    })
}

fn capture_thread(
    job: ScanJob,
    frame_sender: Sender<Arc<ColorImage>>,
    event_sender: Sender<ScanEvent>,
    stop_signal: Arc<AtomicBool>,
    ctx: egui::Context,
) {
    let mut source = match job.opener.open(job.camera_index) {
        Ok(source) => source,
        Err(err) => {
            let error_msg = format!("{:#}", err);
            error!("Failed to open camera {}: {}", job.camera_index, error_msg);
            let _ = event_sender.send(ScanEvent::Error(error_msg));
            let _ = event_sender.send(ScanEvent::Finished(ScanEnd::Failed));
            ctx.request_repaint();
            return;
        }
    };

    let end = scan_loop(
        source.as_mut(),
        job.decoder.as_ref(),
        &frame_sender,
        &event_sender,
        &stop_signal,
        &ctx,
    );

    // --- Cleanup ---
    source.release();
    info!("Capture thread finished: {:?}.", end);
    if event_sender.send(ScanEvent::Finished(end)).is_err() {
        debug!("UI receiver already gone; nothing to notify.");
    }
    ctx.request_repaint();
}

/// Reads, previews and decodes frames until a code shows up, the device
/// fails, or the stop signal is raised.
fn scan_loop(
    source: &mut dyn FrameSource,
    decoder: &dyn Decoder,
    frame_sender: &Sender<Arc<ColorImage>>,
    event_sender: &Sender<ScanEvent>,
    stop_signal: &AtomicBool,
    ctx: &egui::Context,
) -> ScanEnd {
    while !stop_signal.load(Ordering::Relaxed) {
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                warn!("Camera read failed, ending scan: {:#}", err);
                return ScanEnd::DeviceLost;
            }
        };

        let preview = ColorImage::from_rgb(
            [frame.width() as usize, frame.height() as usize],
            frame.as_raw(),
        );
        match frame_sender.try_send(Arc::new(preview)) {
            Ok(()) => ctx.request_repaint(),
            Err(TrySendError::Full(_)) => debug!("Preview channel full. Dropping frame."),
            Err(TrySendError::Disconnected(_)) => {
                info!("UI receiver disconnected. Stopping capture loop.");
                return ScanEnd::Stopped;
            }
        }

        match decoder.decode(&DynamicImage::ImageRgb8(frame)) {
            Ok(results) if results.is_empty() => {}
            Ok(results) => {
                info!("Detected {} code(s) on camera frame.", results.len());
                let _ = event_sender.send(ScanEvent::Detected(results));
                return ScanEnd::Detected;
            }
            Err(err) => {
                let error_msg = format!("{:#}", err);
                error!("Failed to decode camera frame: {}", error_msg);
                let _ = event_sender.send(ScanEvent::Error(error_msg));
                return ScanEnd::Failed;
            }
        }
    }
    info!("Capture loop stopping signal received.");
    ScanEnd::Stopped
}

// --- nokhwa backed device ---

pub struct NokhwaOpener {
    resolution: Resolution,
    fps: u32,
}

impl NokhwaOpener {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            resolution: Resolution::new(config.requested_width, config.requested_height),
            fps: config.requested_fps,
        }
    }

    fn requested_formats(&self) -> [RequestedFormat<'static>; 3] {
        [
            RequestedFormat::new::<YuyvFormat>(RequestedFormatType::Closest(CameraFormat::new(
                self.resolution,
                FrameFormat::YUYV,
                self.fps,
            ))),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
                self.resolution,
                FrameFormat::MJPEG,
                self.fps,
            ))),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
        ]
    }
}

impl CameraOpener for NokhwaOpener {
    fn open(&self, index: u32) -> Result<Box<dyn FrameSource>> {
        let formats = self.requested_formats();
        let mut last_error = None;
        let mut camera = None;
        for (attempt, requested) in formats.iter().enumerate() {
            info!("Requested camera format {}/{}: {:?}", attempt + 1, formats.len(), requested);
            match Camera::new(CameraIndex::Index(index), *requested) {
                Ok(cam) => {
                    camera = Some(cam);
                    break;
                }
                Err(err) => {
                    warn!("Camera format {} rejected: {}", attempt + 1, err);
                    last_error = Some(err);
                }
            }
        }

        let mut camera = match (camera, last_error) {
            (Some(camera), _) => camera,
            (None, Some(err)) => return Err(anyhow!("Failed to open camera {}: {}", index, err)),
            (None, None) => return Err(anyhow!("Failed to open camera {}", index)),
        };
        info!("Actual camera format received: {:?}", camera.camera_format());

        camera
            .open_stream()
            .map_err(|err| anyhow!("Failed to open camera stream: {}", err))?;
        info!("Camera stream opened: {}", camera.info().human_name());

        Ok(Box::new(NokhwaSource {
            camera: Some(camera),
        }))
    }
}

struct NokhwaSource {
    camera: Option<Camera>,
}

impl FrameSource for NokhwaSource {
    fn read_frame(&mut self) -> Result<RgbImage> {
        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| anyhow!("Camera has already been released"))?;

        let mut timeouts = 0;
        loop {
            match camera.frame() {
                Ok(frame) => {
                    return frame
                        .decode_image::<RgbFormat>()
                        .map_err(|err| anyhow!("Failed to decode frame to RGB: {}", err));
                }
                Err(NokhwaError::ReadFrameError(msg))
                    if msg.contains("Timeout") && timeouts < MAX_READ_TIMEOUTS =>
                {
                    timeouts += 1;
                    warn!("Camera frame read timeout ({}/{}).", timeouts, MAX_READ_TIMEOUTS);
                    thread::sleep(READ_TIMEOUT_BACKOFF);
                }
                Err(err) => return Err(anyhow!("Failed to capture frame: {}", err)),
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                error!("Failed to stop camera stream cleanly: {}", e);
            }
            info!("Camera released.");
        }
    }
}

impl Drop for NokhwaSource {
    fn drop(&mut self) {
        self.release();
    }
}
