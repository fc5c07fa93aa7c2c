pub mod theme;

pub use theme::{apply, ThemeMode, ThemeTokens};
