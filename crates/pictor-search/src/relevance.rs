//! Theme relevance scoring for fusion.
//!
//! A [`ThemeRelevance`] scores how well an image fits a theme, in `[0, 1]`.
//! The fuser only depends on the trait, so a learned scorer can replace the
//! keyword heuristic without touching fusion.

use pictor_core::defaults::{THEME_RELEVANCE_MATCH, THEME_RELEVANCE_NEUTRAL};
use pictor_core::Theme;

/// Scores an image path against a theme.
pub trait ThemeRelevance: Send + Sync {
    /// Relevance in `[0, 1]`. Implementations must score on-theme paths at
    /// least as high as off-theme ones.
    fn score(&self, image_path: &str, theme: Theme) -> f32;
}

/// Keyword heuristic over the storage path.
///
/// A path containing any of the theme's keywords scores
/// [`THEME_RELEVANCE_MATCH`]; otherwise the theme's baseline. No theme
/// scores [`THEME_RELEVANCE_NEUTRAL`].
#[derive(Debug, Clone, Default)]
pub struct KeywordThemeRelevance;

impl KeywordThemeRelevance {
    fn keywords(theme: Theme) -> &'static [&'static str] {
        match theme {
            Theme::None => &[],
            Theme::Cartoon => &["cartoon", "cute", "comic", "anime"],
            Theme::Realistic => &["realistic", "photo", "real"],
            Theme::Minimal => &["minimal", "simple", "flat", "line"],
            Theme::Fantasy => &["fantasy", "magic", "dream"],
            Theme::Retro => &["retro", "vintage", "classic"],
            Theme::Scifi => &["scifi", "sci-fi", "future", "cyber", "space"],
            Theme::Nature => &["nature", "forest", "plant", "landscape"],
            Theme::Business => &["business", "office", "corporate"],
        }
    }

    fn baseline(theme: Theme) -> f32 {
        match theme {
            Theme::None => THEME_RELEVANCE_NEUTRAL,
            Theme::Realistic => 0.6,
            _ => 0.7,
        }
    }
}

impl ThemeRelevance for KeywordThemeRelevance {
    fn score(&self, image_path: &str, theme: Theme) -> f32 {
        if theme.is_none() {
            return THEME_RELEVANCE_NEUTRAL;
        }
        let path = image_path.to_ascii_lowercase();
        if Self::keywords(theme).iter().any(|k| path.contains(k)) {
            THEME_RELEVANCE_MATCH
        } else {
            Self::baseline(theme)
        }
    }
}

/// Same score for every path.
#[derive(Debug, Clone)]
pub struct ConstantThemeRelevance(pub f32);

impl Default for ConstantThemeRelevance {
    fn default() -> Self {
        Self(THEME_RELEVANCE_NEUTRAL)
    }
}

impl ThemeRelevance for ConstantThemeRelevance {
    fn score(&self, _image_path: &str, _theme: Theme) -> f32 {
        self.0.clamp(0.0, 1.0)
    }
}
