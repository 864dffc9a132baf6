//! Classifier Bank - Ordered Keyword Decision Tables
//!
//! Every facet is a table of (keywords, value) rules evaluated top to bottom
//! against the lowercased sanitized prompt. The first rule with any keyword
//! present wins; otherwise the table default applies. Rule order is part of
//! the output contract.

use serde::Serialize;

use crate::sanitize::SanitizedPrompt;
use crate::scene::{
    ArtStyle, AspectRatio, CameraAngle, ColorTone, CompositionRule, Lighting, WireName,
};

/// One row of a decision table.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule<T: 'static> {
    pub any_of: &'static [&'static str],
    pub value: T,
}

/// Ordered rules plus the value returned when nothing matches.
#[derive(Debug)]
pub struct DecisionTable<T: 'static> {
    pub facet: &'static str,
    pub rules: &'static [KeywordRule<T>],
    pub default: T,
}

/// Which rule decided a facet, for auditing precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetVerdict {
    pub facet: &'static str,
    pub value: &'static str,
    /// `None` when the default applied.
    pub rule_index: Option<usize>,
    pub keyword: Option<&'static str>,
}

impl<T: Copy + WireName> DecisionTable<T> {
    pub fn classify(&self, lower: &str) -> T {
        match self.first_match(lower) {
            Some((index, _)) => self.rules[index].value,
            None => self.default,
        }
    }

    fn first_match(&self, lower: &str) -> Option<(usize, &'static str)> {
        self.rules.iter().enumerate().find_map(|(index, rule)| {
            rule.any_of
                .iter()
                .copied()
                .find(|keyword| lower.contains(keyword))
                .map(|keyword| (index, keyword))
        })
    }
}

/// Object-safe view of a decision table, so heterogeneous facets can be
/// audited through one list.
pub trait FacetClassifier: Sync {
    fn facet(&self) -> &'static str;
    fn verdict(&self, lower: &str) -> FacetVerdict;
}

impl<T: Copy + WireName + Sync> FacetClassifier for DecisionTable<T> {
    fn facet(&self) -> &'static str {
        self.facet
    }

    fn verdict(&self, lower: &str) -> FacetVerdict {
        match self.first_match(lower) {
            Some((index, keyword)) => FacetVerdict {
                facet: self.facet,
                value: self.rules[index].value.wire_name(),
                rule_index: Some(index),
                keyword: Some(keyword),
            },
            None => FacetVerdict {
                facet: self.facet,
                value: self.default.wire_name(),
                rule_index: None,
                keyword: None,
            },
        }
    }
}

const fn rule<T>(any_of: &'static [&'static str], value: T) -> KeywordRule<T> {
    KeywordRule { any_of, value }
}

// "21:9" sits above the generic wide rule: inside the wide family an explicit
// 21:9 beats 16:9.
pub static ASPECT_RATIO: DecisionTable<AspectRatio> = DecisionTable {
    facet: "aspect_ratio",
    rules: &[
        rule(&["vertical", "portrait", "9:16"], AspectRatio::Ratio9x16),
        rule(&["21:9"], AspectRatio::Ratio21x9),
        rule(&["cinematic", "wide", "16:9"], AspectRatio::Ratio16x9),
        rule(&["4:3"], AspectRatio::Ratio4x3),
        rule(&["3:4"], AspectRatio::Ratio3x4),
    ],
    default: AspectRatio::Ratio1x1,
};

pub static ART_STYLE: DecisionTable<ArtStyle> = DecisionTable {
    facet: "art_style",
    rules: &[
        rule(&["photo", "photoreal", "realistic"], ArtStyle::Photorealistic),
        rule(&["anime", "manga"], ArtStyle::Anime),
        rule(&["watercolor"], ArtStyle::Watercolor),
        rule(&["pixel"], ArtStyle::PixelArt),
        rule(&["line art", "sketch"], ArtStyle::LineArt),
        rule(&["low poly", "low-poly"], ArtStyle::LowPoly),
        rule(&["concept art", "key art"], ArtStyle::ConceptArt),
        rule(&["painting", "digital painting"], ArtStyle::DigitalPainting),
    ],
    default: ArtStyle::Unspecified,
};

pub static LIGHTING: DecisionTable<Lighting> = DecisionTable {
    facet: "lighting",
    rules: &[
        rule(&["soft light", "soft lighting"], Lighting::Soft),
        rule(&["dramatic", "cinematic light"], Lighting::Dramatic),
        rule(&["studio", "three-point"], Lighting::Studio),
        rule(&["hard light"], Lighting::Hard),
    ],
    default: Lighting::Auto,
};

pub static COLOR_TONE: DecisionTable<ColorTone> = DecisionTable {
    facet: "color_tone",
    rules: &[
        rule(&["teal and orange", "warm", "sunset"], ColorTone::Warm),
        rule(&["cool", "blueish"], ColorTone::Cool),
        rule(&["pastel"], ColorTone::Pastel),
        rule(&["high contrast", "noir"], ColorTone::HighContrast),
    ],
    default: ColorTone::Neutral,
};

pub static CAMERA_ANGLE: DecisionTable<CameraAngle> = DecisionTable {
    facet: "camera_angle",
    rules: &[
        rule(&["top-down", "top down", "bird's-eye"], CameraAngle::TopDown),
        rule(&["close-up", "close up", "portrait shot"], CameraAngle::CloseUp),
        rule(&["wide shot", "wide angle"], CameraAngle::WideShot),
        rule(&["low angle"], CameraAngle::LowAngle),
        rule(&["high angle"], CameraAngle::HighAngle),
        rule(&["isometric"], CameraAngle::Isometric),
    ],
    default: CameraAngle::EyeLevel,
};

// "symmetric" is a prefix of "symmetrical", so the Symmetric rule only fires
// on the bare word.
pub static COMPOSITION: DecisionTable<CompositionRule> = DecisionTable {
    facet: "composition",
    rules: &[
        rule(&["rule of thirds"], CompositionRule::RuleOfThirds),
        rule(&["centered", "symmetrical", "symmetry"], CompositionRule::Centered),
        rule(&["golden ratio"], CompositionRule::GoldenRatio),
        rule(&["leading lines"], CompositionRule::LeadingLines),
        rule(&["symmetric"], CompositionRule::Symmetric),
    ],
    default: CompositionRule::None,
};

pub static ENVIRONMENT: DecisionTable<&'static str> = DecisionTable {
    facet: "environment",
    rules: &[
        rule(&["forest"], "forest"),
        rule(&["city"], "city"),
        rule(&["space", "galaxy", "nebula"], "space"),
        rule(&["beach", "ocean", "sea"], "seaside"),
    ],
    default: "",
};

pub static TIME_OF_DAY: DecisionTable<&'static str> = DecisionTable {
    facet: "time_of_day",
    rules: &[
        rule(&["sunset"], "sunset"),
        rule(&["night"], "night"),
        rule(&["dawn", "sunrise"], "dawn"),
    ],
    default: "",
};

pub static WEATHER: DecisionTable<&'static str> = DecisionTable {
    facet: "weather",
    rules: &[
        rule(&["rain"], "rainy"),
        rule(&["fog", "mist"], "foggy"),
        rule(&["snow"], "snowy"),
    ],
    default: "",
};

/// Words skipped when guessing the subject from the tail of the prompt.
pub const STOP_WORDS: [&str; 10] = ["a", "an", "the", "of", "in", "on", "with", "at", "to", "for"];

/// Returned when the prompt has no tokens at all.
pub const FALLBACK_SUBJECT: &str = "subject";

/// Pick the last token that is not a stop word as the subject name.
///
/// Tokens are maximal runs of characters other than space , . ! ?
pub fn guess_subject_name(prompt: &str) -> String {
    let lower = prompt.to_ascii_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c| matches!(c, ' ' | ',' | '.' | '!' | '?'))
        .filter(|token| !token.is_empty())
        .collect();

    let Some(last) = tokens.last() else {
        return FALLBACK_SUBJECT.to_string();
    };

    tokens
        .iter()
        .rev()
        .find(|token| !STOP_WORDS.contains(*token))
        .unwrap_or(last)
        .to_string()
}

/// Everything the bank derives from one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub aspect_ratio: AspectRatio,
    pub art_style: ArtStyle,
    pub lighting: Lighting,
    pub color_tone: ColorTone,
    pub camera_angle: CameraAngle,
    pub composition: CompositionRule,
    pub environment: &'static str,
    pub time_of_day: &'static str,
    pub weather: &'static str,
    pub subject_name: String,
}

/// Runs every facet classifier over a sanitized prompt.
pub struct ClassifierBank {
    facets: [&'static dyn FacetClassifier; 9],
}

impl ClassifierBank {
    pub fn new() -> Self {
        Self {
            facets: [
                &ASPECT_RATIO,
                &ART_STYLE,
                &LIGHTING,
                &COLOR_TONE,
                &CAMERA_ANGLE,
                &COMPOSITION,
                &ENVIRONMENT,
                &TIME_OF_DAY,
                &WEATHER,
            ],
        }
    }

    pub fn classify(&self, prompt: &SanitizedPrompt) -> Classification {
        let lower = prompt.to_lowercase();
        Classification {
            aspect_ratio: ASPECT_RATIO.classify(&lower),
            art_style: ART_STYLE.classify(&lower),
            lighting: LIGHTING.classify(&lower),
            color_tone: COLOR_TONE.classify(&lower),
            camera_angle: CAMERA_ANGLE.classify(&lower),
            composition: COMPOSITION.classify(&lower),
            environment: ENVIRONMENT.classify(&lower),
            time_of_day: TIME_OF_DAY.classify(&lower),
            weather: WEATHER.classify(&lower),
            subject_name: guess_subject_name(prompt.as_str()),
        }
    }

    /// One verdict per facet, in bank order.
    pub fn explain(&self, prompt: &SanitizedPrompt) -> Vec<FacetVerdict> {
        let lower = prompt.to_lowercase();
        self.facets.iter().map(|facet| facet.verdict(&lower)).collect()
    }
}

impl Default for ClassifierBank {
    fn default() -> Self {
        Self::new()
    }
}
