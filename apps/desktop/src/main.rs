use std::path::{Path, PathBuf};

use anyhow::Context;
use eframe::egui;
use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vigil_audio::CpalBackend;
use vigil_domain::{read_log, CsvLog, Settings};
use vigil_emotion::{ArtifactClassifier, EmotionService, Outcome};
use vigil_ui::theme as ui_theme;
use vigil_vision::{annotate, CascadeDetector, DrowsinessDetector};

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Both models must load before any window opens.
    let settings = Settings::load_or_default(None)?;
    let classifier = ArtifactClassifier::load(&settings.emotion.model_path)
        .with_context(|| format!("load classifier {:?}", settings.emotion.model_path))?;
    let log = CsvLog::open(&settings.emotion.log_path)?;
    let detector = DrowsinessDetector::from_settings(&settings.drowsiness)
        .context("load face and eye cascades")?;
    info!("models loaded");

    let voice = VoicePane::new(
        EmotionService::new(classifier, log, &settings.emotion),
        settings.emotion.log_path.clone(),
    );
    let drowsiness = DrowsinessPane::new(detector);
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Vigil",
        options,
        Box::new(move |cc| Box::new(DesktopApp::new(&cc.egui_ctx, drowsiness, voice))),
    )
    .map_err(|e| anyhow::anyhow!(format!("{e:?}")))?;
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ActiveTab {
    Drowsiness,
    Voice,
}

struct DesktopApp {
    active_tab: ActiveTab,
    tokens: ui_theme::ThemeTokens,
    drowsiness: DrowsinessPane,
    voice: VoicePane,
}

impl DesktopApp {
    fn new(ctx: &egui::Context, drowsiness: DrowsinessPane, voice: VoicePane) -> Self {
        ui_theme::ensure_fonts(ctx);
        let tokens = ui_theme::apply(ctx, ui_theme::ThemeMode::Dark);
        Self {
            active_tab: ActiveTab::Drowsiness,
            tokens,
            drowsiness,
            voice,
        }
    }
}

impl eframe::App for DesktopApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.active_tab, ActiveTab::Drowsiness, "Drowsiness");
                ui.add_space(6.0);
                ui.selectable_value(&mut self.active_tab, ActiveTab::Voice, "Voice Emotion");
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.active_tab {
            ActiveTab::Drowsiness => self.drowsiness.ui(ui, &self.tokens),
            ActiveTab::Voice => self.voice.ui(ui, &self.tokens),
        });
    }
}

fn show_message(level: MessageLevel, title: &str, description: &str) {
    MessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(description)
        .set_buttons(MessageButtons::Ok)
        .show();
}

struct DrowsinessPane {
    detector: DrowsinessDetector<CascadeDetector, CascadeDetector>,
    texture: Option<egui::TextureHandle>,
    status: Option<(String, bool)>,
}

impl DrowsinessPane {
    fn new(detector: DrowsinessDetector<CascadeDetector, CascadeDetector>) -> Self {
        Self {
            detector,
            texture: None,
            status: None,
        }
    }

    fn ui(&mut self, ui: &mut egui::Ui, tokens: &ui_theme::ThemeTokens) {
        ui.heading("Drowsiness check");
        ui.label("Faces with fewer than two visible eyes are marked drowsy.");
        ui.add_space(8.0);
        if ui.button("Upload image").clicked() {
            if let Some(path) = FileDialog::new()
                .add_filter("Image", IMAGE_EXTENSIONS)
                .pick_file()
            {
                self.process(ui.ctx(), &path);
            }
        }

        if let Some((line, drowsy)) = &self.status {
            let colour = if *drowsy { tokens.alert } else { tokens.positive };
            ui.add_space(6.0);
            ui.colored_label(colour, line);
        }

        if let Some(texture) = &self.texture {
            ui.add_space(8.0);
            let size = texture.size_vec2();
            let available = ui.available_size();
            let fit = (available.x / size.x).min(available.y / size.y).min(1.0);
            egui::ScrollArea::both().show(ui, |ui| {
                ui.add(egui::Image::new((texture.id(), size * fit)));
            });
        }
    }

    fn process(&mut self, ctx: &egui::Context, path: &Path) {
        let image = match image::open(path) {
            Ok(image) => image,
            Err(err) => {
                error!(path = %path.display(), %err, "failed to open image");
                show_message(
                    MessageLevel::Error,
                    "Drowsiness",
                    &format!("Could not open image: {err}"),
                );
                return;
            }
        };
        let result = self.detector.analyze(&image);
        let annotated = image::DynamicImage::ImageRgb8(annotate(&image, &result)).to_rgba8();
        let size = [annotated.width() as usize, annotated.height() as usize];
        let pixels = egui::ColorImage::from_rgba_unmultiplied(size, annotated.as_raw());
        self.texture = Some(ctx.load_texture("drowsiness-result", pixels, Default::default()));

        let line = format!(
            "{} face(s), {} drowsy",
            result.faces.len(),
            result.drowsy_count
        );
        info!(
            path = %path.display(),
            faces = result.faces.len(),
            drowsy = result.drowsy_count,
            "image checked"
        );
        self.status = Some((line, result.drowsy_count > 0));
        let level = if result.drowsy_count > 0 {
            MessageLevel::Warning
        } else {
            MessageLevel::Info
        };
        show_message(level, "Drowsiness", &result.message());
    }
}

struct VoicePane {
    service: EmotionService<ArtifactClassifier, CsvLog>,
    log_path: PathBuf,
    last: Option<Outcome>,
    requests_logged: Option<usize>,
}

impl VoicePane {
    fn new(service: EmotionService<ArtifactClassifier, CsvLog>, log_path: PathBuf) -> Self {
        let mut pane = Self {
            service,
            log_path,
            last: None,
            requests_logged: None,
        };
        pane.refresh_count();
        pane
    }

    fn refresh_count(&mut self) {
        self.requests_logged = read_log(&self.log_path).ok().map(|rows| rows.len());
    }

    fn ui(&mut self, ui: &mut egui::Ui, tokens: &ui_theme::ThemeTokens) {
        ui.heading("Voice emotion");
        ui.label("Record a short clip or upload one. Clips outside the pitch band are not classified.");
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            if ui.button("Record").clicked() {
                show_message(
                    MessageLevel::Info,
                    "Voice emotion",
                    &format!(
                        "Recording for {} seconds after you press OK.",
                        self.service.capture_seconds()
                    ),
                );
                // blocks for the capture duration
                let outcome = self.service.analyze_recording(&CpalBackend::new());
                self.finish(outcome);
            }
            if ui.button("Upload audio").clicked() {
                if let Some(path) = FileDialog::new()
                    .add_filter("Audio", AUDIO_EXTENSIONS)
                    .pick_file()
                {
                    let outcome = self.service.analyze_file(&path);
                    self.finish(outcome);
                }
            }
        });

        if let Some(outcome) = &self.last {
            ui.add_space(6.0);
            match outcome {
                Outcome::Detected { emotion, median_hz } => {
                    ui.colored_label(
                        tokens.positive,
                        format!("Emotion: {emotion} (median f0 {median_hz:.1} Hz)"),
                    );
                }
                Outcome::Rejected { median_hz } => {
                    ui.colored_label(
                        tokens.muted,
                        format!("Not classified: median f0 {median_hz:.1} Hz is outside the band"),
                    );
                }
            }
        }
        if let Some(count) = self.requests_logged {
            ui.add_space(4.0);
            ui.label(format!("{count} request(s) in {}", self.log_path.display()));
        }
    }

    fn finish(&mut self, outcome: Result<Outcome, vigil_emotion::PipelineError>) {
        match outcome {
            Ok(outcome) => {
                show_message(MessageLevel::Info, "Voice emotion", &outcome.message());
                self.last = Some(outcome);
            }
            Err(err) => {
                error!(%err, "voice request failed");
                show_message(MessageLevel::Error, "Voice emotion", &err.to_string());
            }
        }
        self.refresh_count();
    }
}
