use egui::{Color32, FontData, FontDefinitions, FontFamily, Rounding, Stroke, Visuals};
use once_cell::sync::OnceCell;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

#[derive(Clone, Debug)]
pub struct ThemeTokens {
    pub accent: Color32,
    pub neutral_bg: Color32,
    pub neutral_surface: Color32,
    pub neutral_panel: Color32,
    pub text_primary: Color32,
    /// Result line for awake faces and classified voices.
    pub positive: Color32,
    /// Result line for drowsy faces.
    pub alert: Color32,
    /// Result line for clips the pitch gate turned away.
    pub muted: Color32,
}

#[derive(Clone, Debug)]
pub struct Theme {
    pub tokens: ThemeTokens,
    pub visuals: Visuals,
}

pub fn theme(mode: ThemeMode) -> Theme {
    match mode {
        ThemeMode::Dark => dark(),
        ThemeMode::Light => light(),
    }
}

pub fn dark() -> Theme {
    let tokens = ThemeTokens {
        accent: Color32::from_rgb(0x00, 0xB4, 0xFF),
        neutral_bg: Color32::from_rgb(0x0F, 0x11, 0x15),
        neutral_surface: Color32::from_rgb(0x1C, 0x1F, 0x26),
        neutral_panel: Color32::from_rgb(0x23, 0x28, 0x34),
        text_primary: Color32::from_rgb(0xE6, 0xE6, 0xE6),
        positive: Color32::from_rgb(0x4C, 0xD9, 0x64),
        alert: Color32::from_rgb(0xFF, 0x45, 0x3A),
        muted: Color32::from_gray(0x9A),
    };

    let mut visuals = Visuals::dark();
    visuals.window_rounding = Rounding::same(8.0);
    visuals.panel_fill = tokens.neutral_surface;
    visuals.widgets.noninteractive.bg_fill = tokens.neutral_surface;
    visuals.widgets.inactive.bg_fill = tokens.neutral_panel;
    visuals.widgets.active.bg_fill = tokens.neutral_panel.linear_multiply(1.1);
    visuals.widgets.hovered.bg_fill = tokens.neutral_panel.linear_multiply(1.15);
    visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, tokens.text_primary);
    visuals.selection.bg_fill = tokens.accent;

    Theme { tokens, visuals }
}

pub fn light() -> Theme {
    let tokens = ThemeTokens {
        accent: Color32::from_rgb(0x2B, 0x86, 0xFF),
        neutral_bg: Color32::from_rgb(0xF4, 0xF6, 0xF8),
        neutral_surface: Color32::from_rgb(0xFA, 0xFB, 0xFC),
        neutral_panel: Color32::from_rgb(0xE7, 0xEB, 0xF0),
        text_primary: Color32::from_rgb(0x2B, 0x2D, 0x33),
        positive: Color32::from_rgb(0x1E, 0x8E, 0x3E),
        alert: Color32::from_rgb(0xC6, 0x28, 0x28),
        muted: Color32::from_gray(0x70),
    };

    let mut visuals = Visuals::light();
    visuals.window_rounding = Rounding::same(10.0);
    visuals.panel_fill = tokens.neutral_bg;
    visuals.widgets.noninteractive.bg_fill = tokens.neutral_surface;
    visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, tokens.text_primary);
    visuals.widgets.inactive.bg_fill = tokens.neutral_panel;
    visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, tokens.text_primary);
    visuals.widgets.inactive.bg_stroke = Stroke::new(1.0, Color32::from_gray(200));
    visuals.selection.bg_fill = tokens.accent;
    visuals.selection.stroke = Stroke::new(1.0, tokens.text_primary);

    Theme { tokens, visuals }
}

pub fn apply(ctx: &egui::Context, mode: ThemeMode) -> ThemeTokens {
    let theme = theme(mode);
    ctx.set_visuals(theme.visuals);
    theme.tokens
}

static FONTS_DONE: OnceCell<()> = OnceCell::new();

/// Installs Inter from `assets/fonts` when present; egui defaults otherwise.
pub fn ensure_fonts(ctx: &egui::Context) {
    if FONTS_DONE.get().is_some() {
        return;
    }

    let read = |name: &str| -> Option<Vec<u8>> {
        ["assets/fonts", "../assets/fonts", "../../assets/fonts"]
            .iter()
            .find_map(|dir| std::fs::read(format!("{dir}/{name}")).ok())
    };

    if let Some(regular) = read("Inter-Regular.ttf") {
        let mut defs = FontDefinitions::default();
        defs.font_data
            .insert("Inter-Regular".into(), FontData::from_owned(regular));
        defs.families
            .entry(FontFamily::Proportional)
            .or_default()
            .insert(0, "Inter-Regular".into());
        ctx.set_fonts(defs);
    }

    let _ = FONTS_DONE.set(());
}
