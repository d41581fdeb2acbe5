// src/ui.rs
use std::{ops::Range, path::PathBuf, sync::Arc, time::Instant};

use egui::{
    text::LayoutJob, Align, ColorImage, ImageData, Key, Layout, RichText, Stroke,
    TextFormat, TextureHandle, TextureOptions, ViewportBuilder, ViewportClass, ViewportId,
};
use log::{debug, error, info};
use rfd::{MessageButtons, MessageDialog, MessageLevel};

use crate::{
    app::{Notice, NoticeLevel, ScannerController, StopReason},
    camera::NokhwaOpener,
    config::ScannerConfig,
    decode::QrDecoder,
    render::{RenderedResults, Segment},
};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];
const LIVE_PREVIEW_TITLE: &str = "QR/Barcode Scanner - Live";
const PREVIEW_MAX_SIDE: f32 = 400.0;

/// A texture together with the image it was last uploaded from.
struct PreviewTexture {
    source: Arc<ColorImage>,
    handle: TextureHandle,
}

pub struct ScannerAppUI {
    controller: ScannerController,
    image_texture: Option<PreviewTexture>,
    live_texture: Option<PreviewTexture>,
    // Selection in the results text as of the previous frame.
    results_selection: Option<Range<usize>>,
}

impl ScannerAppUI {
    pub fn new(cc: &eframe::CreationContext<'_>, config: ScannerConfig) -> Self {
        info!("Initializing ScannerAppUI");
        let opener = Arc::new(NokhwaOpener::new(&config));
        let controller =
            ScannerController::new(config, Arc::new(QrDecoder), opener, cc.egui_ctx.clone());
        Self {
            controller,
            image_texture: None,
            live_texture: None,
            results_selection: None,
        }
    }

    fn sync_textures(&mut self, ctx: &egui::Context) {
        sync_texture(
            ctx,
            &mut self.image_texture,
            self.controller.image_preview(),
            "image_preview",
        );
        sync_texture(
            ctx,
            &mut self.live_texture,
            self.controller.live_frame(),
            "webcam_stream",
        );
    }

    fn buttons_row(&mut self, ui: &mut egui::Ui) {
        let buttons = self.controller.buttons();
        ui.horizontal(|ui| {
            if ui
                .add_enabled(buttons.select_image, egui::Button::new("Select Image"))
                .clicked()
            {
                if let Some(path) = pick_image() {
                    self.controller.open_image(&path);
                }
            }
            if ui
                .add_enabled(buttons.start_webcam, egui::Button::new("Scan from Webcam"))
                .clicked()
            {
                self.controller.start_webcam();
            }
            if ui
                .add_enabled(buttons.stop_scan, egui::Button::new("Stop Scanning"))
                .clicked()
            {
                self.controller.stop_scan(StopReason::User);
            }
        });
    }

    fn results_group(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label(RichText::new("Scan Results").strong());
            ui.separator();
            egui::ScrollArea::vertical()
                .max_height((ui.available_height() - 48.0).max(60.0))
                .auto_shrink([false, false])
                .show(ui, |ui| self.results_text(ui));
        });
    }

    /// Read-only results text. Link spans open the selected URL when clicked
    /// while a selection is held; a click without a selection does nothing.
    fn results_text(&mut self, ui: &mut egui::Ui) {
        let panel = self.controller.panel();
        let rendered = panel.rendered();
        let text = panel.text();
        let mut layouter = |ui: &egui::Ui, text: &str, wrap_width: f32| {
            let mut job = results_layout(ui, rendered, text);
            job.wrap.max_width = wrap_width;
            ui.fonts(|fonts| fonts.layout_job(job))
        };

        let output = egui::TextEdit::multiline(&mut text.as_str())
            .desired_width(f32::INFINITY)
            .desired_rows(8)
            .layouter(&mut layouter)
            .show(ui);

        if output.response.clicked() {
            let clicked = output.response.interact_pointer_pos().map(|pos| {
                output
                    .galley
                    .cursor_from_pos(pos - output.galley_pos)
                    .ccursor
                    .index
            });
            let target = rendered.zip(clicked).and_then(|(rendered, clicked)| {
                rendered.link_for_click(clicked, self.results_selection.clone())
            });
            match target {
                Some(url) => launch_url(&url),
                None => debug!("Results click without a selected link; ignoring."),
            }
        }

        // Pressing collapses the selection before the click registers, so
        // only record it while no pointer button is in play.
        if ui.input(|i| i.pointer.any_down() || i.pointer.any_released()) {
            ui.ctx().request_repaint();
        } else {
            self.results_selection = output.cursor_range.map(|range| {
                let [start, end] = range.sorted_cursors();
                start.ccursor.index..end.ccursor.index
            });
        }
    }

    fn actions_row(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let buttons = self.controller.buttons();
        ui.horizontal(|ui| {
            if ui
                .add_enabled(buttons.copy, egui::Button::new("Copy to Clipboard"))
                .clicked()
            {
                if let Some(text) = self.controller.copy_results() {
                    ctx.copy_text(text);
                }
            }
            if ui
                .add_enabled(buttons.open_browser, egui::Button::new("Open in Browser"))
                .clicked()
            {
                if let Some(url) = self.controller.open_target() {
                    launch_url(url);
                }
            }
        });
    }

    /// Shows the live camera feed while scanning. Returns true when the
    /// user asked to cancel from the preview (Esc, Q or closing it).
    fn live_preview(&self, ctx: &egui::Context) -> bool {
        let texture = self.live_texture.as_ref().map(|t| &t.handle);
        ctx.show_viewport_immediate(
            ViewportId::from_hash_of("live_preview"),
            ViewportBuilder::default()
                .with_title(LIVE_PREVIEW_TITLE)
                .with_inner_size([640.0, 520.0]),
            |ctx, class| {
                let draw = |ui: &mut egui::Ui| {
                    match texture {
                        Some(texture) => {
                            ui.add(
                                egui::Image::new(texture)
                                    .shrink_to_fit()
                                    .maintain_aspect_ratio(true),
                            );
                        }
                        None => {
                            ui.with_layout(Layout::top_down(Align::Center), |ui| {
                                ui.add_space(ui.available_height() / 3.0);
                                ui.spinner();
                                ui.label("Initializing camera stream...");
                            });
                        }
                    }
                    ui.label("Press Esc or Q to stop scanning.");
                };
                if class == ViewportClass::Embedded {
                    egui::Window::new(LIVE_PREVIEW_TITLE).show(ctx, draw);
                } else {
                    egui::CentralPanel::default().show(ctx, draw);
                }
                ctx.input(|i| {
                    i.key_pressed(Key::Escape)
                        || i.key_pressed(Key::Q)
                        || i.viewport().close_requested()
                })
            },
        )
    }
}

impl eframe::App for ScannerAppUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.controller.poll(now);
        self.sync_textures(ctx);

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.add_space(16.0);
                egui::widgets::global_theme_preference_buttons(ui);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                self.buttons_row(ui);
                ui.add_space(10.0);
                if let Some(preview) = &self.image_texture {
                    ui.add(
                        egui::Image::new(&preview.handle)
                            .max_width(PREVIEW_MAX_SIDE)
                            .max_height(PREVIEW_MAX_SIDE)
                            .maintain_aspect_ratio(true)
                            .corner_radius(5.0),
                    );
                }
            });
            ui.add_space(10.0);
            self.results_group(ui);
            ui.add_space(10.0);
            ui.vertical_centered(|ui| self.actions_row(ui, ctx));
        });

        if self.controller.is_scanning() && self.live_preview(ctx) {
            self.controller.stop_scan(StopReason::PreviewKey);
        }

        for notice in self.controller.take_notices() {
            show_notice(&notice);
        }

        if let Some(wait) = self.controller.next_deadline(now) {
            ctx.request_repaint_after(wait);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Exit requested. Stopping capture threads...");
        self.controller.shutdown();
        info!("Capture threads joined.");
    }
}

fn sync_texture(
    ctx: &egui::Context,
    slot: &mut Option<PreviewTexture>,
    image: Option<&Arc<ColorImage>>,
    name: &str,
) {
    let Some(image) = image else {
        *slot = None;
        return;
    };
    match slot {
        Some(texture) if Arc::ptr_eq(&texture.source, image) => {}
        Some(texture) => {
            texture
                .handle
                .set(ImageData::Color(image.clone()), TextureOptions::LINEAR);
            texture.source = image.clone();
        }
        None => {
            info!("Creating {} texture with size: {:?}", name, image.size);
            let handle = ctx.load_texture(name, ImageData::Color(image.clone()), TextureOptions::LINEAR);
            *slot = Some(PreviewTexture {
                source: image.clone(),
                handle,
            });
        }
    }
}

/// Styles the results text: bold block labels, underlined link payloads.
fn results_layout(ui: &egui::Ui, rendered: Option<&RenderedResults>, text: &str) -> LayoutJob {
    let font_id = egui::TextStyle::Body.resolve(ui.style());
    let visuals = ui.visuals();
    let plain = TextFormat::simple(font_id.clone(), visuals.text_color());
    let Some(rendered) = rendered else {
        return LayoutJob::single_section(text.to_owned(), plain);
    };

    let bold = TextFormat::simple(font_id.clone(), visuals.strong_text_color());
    let link = TextFormat {
        underline: Stroke::new(1.0, visuals.hyperlink_color),
        ..TextFormat::simple(font_id, visuals.hyperlink_color)
    };
    let mut job = LayoutJob::default();
    for segment in &rendered.segments {
        match segment {
            Segment::Label(label) => job.append(label, 0.0, bold.clone()),
            Segment::Text(body) => job.append(body, 0.0, plain.clone()),
            Segment::Link { text, url } => {
                job.append(url, 0.0, link.clone());
                job.append(&text[url.len()..], 0.0, plain.clone());
            }
        }
    }
    job
}

fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select Image")
        .add_filter("Image Files", IMAGE_EXTENSIONS)
        .pick_file()
}

fn launch_url(url: &str) {
    match open::that_detached(url) {
        Ok(()) => info!("Opened {} in the default browser.", url),
        Err(err) => error!("Failed to open URL {}: {}", url, err),
    }
}

fn show_notice(notice: &Notice) {
    let level = match notice.level {
        NoticeLevel::Info => MessageLevel::Info,
        NoticeLevel::Error => MessageLevel::Error,
    };
    info!("{}: {}", notice.title, notice.message);
    let _ = MessageDialog::new()
        .set_level(level)
        .set_title(notice.title.as_str())
        .set_description(notice.message.as_str())
        .set_buttons(MessageButtons::Ok)
        .show();
}
