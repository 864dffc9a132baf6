//! Scene Plan - Immutable Per-Request Record
//!
//! Every enum here has exactly one wire spelling. The spelling table is the
//! cross-platform contract: front ends match on these strings, so a variant
//! is never renamed once shipped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::sanitize::SanitizedPrompt;

/// Returned when a wire string does not name any variant of an enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseWireError {
    pub kind: &'static str,
    pub value: String,
}

/// Fixed wire spelling of a classifier outcome.
pub trait WireName {
    fn wire_name(&self) -> &'static str;
}

impl WireName for &'static str {
    fn wire_name(&self) -> &'static str {
        self
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident as $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl WireName for $name {
            fn wire_name(&self) -> &'static str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseWireError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ParseWireError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// Generation mode requested by the caller.
    GenerationMode as "mode" {
        TextToImage => "text-to-image",
        ImageToImage => "image-to-image",
        Inpaint => "inpaint",
        Outpaint => "outpaint",
    }
}

wire_enum! {
    SafetyProfile as "safety profile" {
        Safe => "safe",
        AllowNsfw => "allow-nsfw",
    }
}

wire_enum! {
    QualityPreset as "quality preset" {
        Draft => "draft",
        Standard => "standard",
        High => "high",
        Ultra => "ultra",
    }
}

wire_enum! {
    AspectRatio as "aspect ratio" {
        Ratio1x1 => "1:1",
        Ratio16x9 => "16:9",
        Ratio9x16 => "9:16",
        Ratio4x3 => "4:3",
        Ratio3x4 => "3:4",
        Ratio21x9 => "21:9",
    }
}

wire_enum! {
    ColorTone as "color tone" {
        Neutral => "neutral",
        Warm => "warm",
        Cool => "cool",
        HighContrast => "high-contrast",
        Pastel => "pastel",
    }
}

wire_enum! {
    Lighting as "lighting" {
        Auto => "auto",
        Soft => "soft",
        Hard => "hard",
        Dramatic => "dramatic",
        Studio => "studio",
    }
}

wire_enum! {
    CameraAngle as "camera angle" {
        EyeLevel => "eye-level",
        LowAngle => "low-angle",
        HighAngle => "high-angle",
        TopDown => "top-down",
        Isometric => "isometric",
        CloseUp => "close-up",
        WideShot => "wide-shot",
    }
}

wire_enum! {
    ArtStyle as "art style" {
        Unspecified => "unspecified",
        Photorealistic => "photorealistic",
        DigitalPainting => "digital-painting",
        Watercolor => "watercolor",
        Anime => "anime",
        LineArt => "line-art",
        LowPoly => "low-poly",
        PixelArt => "pixel-art",
        ConceptArt => "concept-art",
    }
}

wire_enum! {
    CompositionRule as "composition rule" {
        None => "none",
        RuleOfThirds => "rule-of-thirds",
        Centered => "centered",
        GoldenRatio => "golden-ratio",
        Symmetric => "symmetric",
        LeadingLines => "leading-lines",
    }
}

wire_enum! {
    BrushDetail as "brush detail" {
        Auto => "auto",
        Minimal => "minimal",
        Normal => "normal",
        High => "high",
        Hyper => "hyper",
    }
}

impl Default for GenerationMode {
    fn default() -> Self {
        Self::TextToImage
    }
}

impl Default for SafetyProfile {
    fn default() -> Self {
        Self::Safe
    }
}

impl Default for QualityPreset {
    fn default() -> Self {
        Self::Standard
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDescriptor {
    pub name: String,
    pub attributes: String,
    pub position_hint: String,
}

/// Empty strings mean "not mentioned", never absence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundDescriptor {
    pub environment: String,
    pub time_of_day: String,
    pub weather: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorLightingDescriptor {
    pub color_tone: ColorTone,
    pub lighting: Lighting,
    pub palette_hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    pub angle: CameraAngle,
    pub focal_length_mm: f32,
    pub depth_of_field: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionDescriptor {
    pub rule: CompositionRule,
    pub allow_cropping: bool,
    pub center_main_subject: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtStyleDescriptor {
    pub style: ArtStyle,
    pub brush_detail: BrushDetail,
    pub era_hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeConstraints {
    pub visual_artifacts: String,
    pub content_exclusions: String,
}

/// The structured description of one generation request.
///
/// Built only by the assembler and never mutated afterwards. Field
/// declaration order is the canonical JSON key order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenePlan {
    pub(crate) core_prompt: SanitizedPrompt,
    pub(crate) mode: GenerationMode,
    pub(crate) safety_profile: SafetyProfile,
    pub(crate) quality_preset: QualityPreset,
    pub(crate) aspect_ratio: AspectRatio,
    pub(crate) primary_subject: SubjectDescriptor,
    pub(crate) secondary_subjects: Vec<SubjectDescriptor>,
    pub(crate) background: BackgroundDescriptor,
    pub(crate) color_lighting: ColorLightingDescriptor,
    pub(crate) camera: CameraDescriptor,
    pub(crate) composition: CompositionDescriptor,
    pub(crate) art_style: ArtStyleDescriptor,
    pub(crate) negative_constraints: NegativeConstraints,
}

impl ScenePlan {
    pub fn core_prompt(&self) -> &str {
        self.core_prompt.as_str()
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn safety_profile(&self) -> SafetyProfile {
        self.safety_profile
    }

    pub fn quality_preset(&self) -> QualityPreset {
        self.quality_preset
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn primary_subject(&self) -> &SubjectDescriptor {
        &self.primary_subject
    }

    pub fn secondary_subjects(&self) -> &[SubjectDescriptor] {
        &self.secondary_subjects
    }

    pub fn background(&self) -> &BackgroundDescriptor {
        &self.background
    }

    pub fn color_lighting(&self) -> &ColorLightingDescriptor {
        &self.color_lighting
    }

    pub fn camera(&self) -> &CameraDescriptor {
        &self.camera
    }

    pub fn composition(&self) -> &CompositionDescriptor {
        &self.composition
    }

    pub fn art_style(&self) -> &ArtStyleDescriptor {
        &self.art_style
    }

    pub fn negative_constraints(&self) -> &NegativeConstraints {
        &self.negative_constraints
    }
}
