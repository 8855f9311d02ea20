//! Theme catalog and prompt phrase tables.
//!
//! Every theme maps to an enhancement phrase, a set of technical
//! requirements, and a preferred generation provider. Classified prompt
//! complexity and content type select a quality phrase and a style phrase.
//! The builders at the bottom combine them into the prompt variants used by
//! search and generation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// =============================================================================
// THEME
// =============================================================================

/// Visual theme a caller may attach to a recommendation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    None,
    Cartoon,
    Realistic,
    Minimal,
    Fantasy,
    Retro,
    Scifi,
    Nature,
    Business,
}

impl Theme {
    pub const ALL: [Theme; 9] = [
        Theme::None,
        Theme::Cartoon,
        Theme::Realistic,
        Theme::Minimal,
        Theme::Fantasy,
        Theme::Retro,
        Theme::Scifi,
        Theme::Nature,
        Theme::Business,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::None => "none",
            Theme::Cartoon => "cartoon",
            Theme::Realistic => "realistic",
            Theme::Minimal => "minimal",
            Theme::Fantasy => "fantasy",
            Theme::Retro => "retro",
            Theme::Scifi => "scifi",
            Theme::Nature => "nature",
            Theme::Business => "business",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Theme::None)
    }

    /// Phrase appended to the user prompt to steer toward the theme.
    pub fn enhancement(&self) -> &'static str {
        match self {
            Theme::None => "",
            Theme::Cartoon => {
                "in a cartoon style with bright saturated colors, rounded shapes and a playful mood"
            }
            Theme::Realistic => {
                "in a photorealistic style with lifelike lighting and fine surface detail"
            }
            Theme::Minimal => {
                "in a minimalist style with clean lines, generous negative space and a restrained palette"
            }
            Theme::Fantasy => {
                "in a fantasy style with magical elements, dreamlike colors and a sense of wonder"
            }
            Theme::Retro => {
                "in a retro style with vintage colors, period typography cues and a nostalgic texture"
            }
            Theme::Scifi => {
                "in a science fiction style with futuristic technology, neon accents and a high-tech feel"
            }
            Theme::Nature => {
                "in a natural style with organic shapes, earthy colors and soft daylight"
            }
            Theme::Business => {
                "in a professional business style with a tidy layout and a corporate palette"
            }
        }
    }

    /// Technical requirements appended to the optimized prompt.
    pub fn technical_requirements(&self) -> &'static str {
        match self {
            Theme::None => "",
            Theme::Cartoon => "bold outlines, flat shading, high contrast",
            Theme::Realistic => "accurate proportions, natural shadows, high resolution",
            Theme::Minimal => "simple geometric forms, at most three colors, flat vector look",
            Theme::Fantasy => "rich atmosphere, glowing highlights, layered depth",
            Theme::Retro => "muted palette, grain texture, vintage composition",
            Theme::Scifi => "metallic surfaces, light glows, sleek forms",
            Theme::Nature => "natural textures, balanced composition, soft gradients",
            Theme::Business => "clean composition, legible shapes, consistent spacing",
        }
    }

    /// Generation provider best suited to the theme.
    pub fn preferred_provider(&self) -> ImageProvider {
        match self {
            Theme::None | Theme::Fantasy | Theme::Nature => ImageProvider::OpenAi,
            Theme::Cartoon | Theme::Realistic | Theme::Retro | Theme::Scifi | Theme::Business => {
                ImageProvider::Recraft
            }
            Theme::Minimal => ImageProvider::SvgIo,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = Error;

    /// Parses a theme tag; the empty string means no theme.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Ok(Theme::None);
        }
        Theme::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| Error::InvalidInput(format!("unknown theme: {}", s)))
    }
}

// =============================================================================
// PROVIDER
// =============================================================================

/// Image generation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Recraft,
    #[default]
    #[serde(rename = "svgio")]
    SvgIo,
}

impl ImageProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageProvider::OpenAi => "openai",
            ImageProvider::Recraft => "recraft",
            ImageProvider::SvgIo => "svgio",
        }
    }
}

impl fmt::Display for ImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CLASSIFICATION VOCABULARY
// =============================================================================

/// Classified prompt complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    /// Lenient parse; anything unrecognised is `Simple`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "medium" => Complexity::Medium,
            "complex" => Complexity::Complex,
            _ => Complexity::Simple,
        }
    }

    pub fn quality_phrase(&self) -> &'static str {
        match self {
            Complexity::Simple => "clear subject and clean composition",
            Complexity::Medium => "well-balanced detail and harmonious colors",
            Complexity::Complex => "rich detail, layered depth and refined lighting",
        }
    }
}

/// Classified content type of the prompt subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Animal,
    Object,
    Scene,
    Character,
    Nature,
    Building,
    Food,
    Vehicle,
    Abstract,
    #[default]
    Default,
}

impl ContentType {
    /// Lenient parse; anything unrecognised is `Default`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "animal" => ContentType::Animal,
            "object" => ContentType::Object,
            "scene" => ContentType::Scene,
            "character" => ContentType::Character,
            "nature" => ContentType::Nature,
            "building" => ContentType::Building,
            "food" => ContentType::Food,
            "vehicle" => ContentType::Vehicle,
            "abstract" => ContentType::Abstract,
            _ => ContentType::Default,
        }
    }

    pub fn style_phrase(&self) -> &'static str {
        match self {
            ContentType::Animal => "expressive pose and natural fur or feather texture",
            ContentType::Object => "clear silhouette and accurate material",
            ContentType::Scene => "coherent perspective and a clear focal point",
            ContentType::Character => "readable expression and distinctive features",
            ContentType::Nature => "organic forms and natural light",
            ContentType::Building => "correct structure and architectural detail",
            ContentType::Food => "appetizing color and fresh texture",
            ContentType::Vehicle => "dynamic angle and precise mechanical detail",
            ContentType::Abstract => "strong shapes and deliberate color contrast",
            ContentType::Default => "a well-defined subject",
        }
    }
}

// =============================================================================
// PROMPT BUILDERS
// =============================================================================

const CLAUSE_CONNECTORS: [char; 5] = [',', ';', '。', ':', '，'];

/// Prompt for the semantic search path: the literal prompt plus a light
/// theme suffix.
pub fn semantic_prompt(prompt: &str, theme: Theme) -> String {
    if theme.is_none() {
        return prompt.to_string();
    }
    format!("{}, {}", prompt, theme.enhancement())
}

/// Fully optimized prompt used for the theme search path and for generation.
pub fn optimized_prompt(
    prompt: &str,
    theme: Theme,
    complexity: Complexity,
    content_type: ContentType,
) -> String {
    if theme.is_none() {
        return prompt.to_string();
    }

    let connector = if prompt.contains(&CLAUSE_CONNECTORS[..]) {
        "; "
    } else {
        ", "
    };

    let requirements = [
        complexity.quality_phrase(),
        content_type.style_phrase(),
        theme.technical_requirements(),
    ]
    .into_iter()
    .filter(|p| !p.is_empty())
    .collect::<Vec<_>>()
    .join(" and ");

    format!(
        "{}{}{}; Requirements: {}",
        prompt,
        connector,
        theme.enhancement(),
        requirements
    )
}
