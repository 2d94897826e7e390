use serde::Deserialize;

use super::{Layer, LayerId};

/// A line of text positioned in percentage space around the canvas centre.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TextLayer {
    #[serde(skip)]
    id: LayerId,
    pub text: String,
    pub font_family: String,
    /// Percent of canvas width, positive to the right of centre.
    pub left: f32,
    /// Percent of canvas height, positive above centre.
    pub top: f32,
    /// CSS colour string.
    pub color: String,
    pub font_size: f32,
    pub font_weight: u16,
    pub opacity: f32,
    pub shadow_color: String,
    pub shadow_size: f32,
    /// Degrees, clockwise positive.
    pub rotation: f32,
}

impl TextLayer {
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Current value of one attribute, in the same shape used to change it.
    pub fn attribute(&self, attribute: TextAttribute) -> TextPatch {
        match attribute {
            TextAttribute::Text => TextPatch::Text(self.text.clone()),
            TextAttribute::FontFamily => TextPatch::FontFamily(self.font_family.clone()),
            TextAttribute::Left => TextPatch::Left(self.left),
            TextAttribute::Top => TextPatch::Top(self.top),
            TextAttribute::Color => TextPatch::Color(self.color.clone()),
            TextAttribute::FontSize => TextPatch::FontSize(self.font_size),
            TextAttribute::FontWeight => TextPatch::FontWeight(self.font_weight),
            TextAttribute::Opacity => TextPatch::Opacity(self.opacity),
            TextAttribute::ShadowColor => TextPatch::ShadowColor(self.shadow_color.clone()),
            TextAttribute::ShadowSize => TextPatch::ShadowSize(self.shadow_size),
            TextAttribute::Rotation => TextPatch::Rotation(self.rotation),
        }
    }
}

impl Default for TextLayer {
    fn default() -> Self {
        Self {
            id: LayerId::default(),
            text: "edit".to_string(),
            font_family: "Inter".to_string(),
            left: 0.0,
            top: 0.0,
            color: "white".to_string(),
            font_size: 200.0,
            font_weight: 800,
            opacity: 1.0,
            shadow_color: "rgba(0, 0, 0, 0.8)".to_string(),
            shadow_size: 4.0,
            rotation: 0.0,
        }
    }
}

impl Layer for TextLayer {
    type Patch = TextPatch;

    fn id(&self) -> LayerId {
        self.id
    }

    fn assign_id(&mut self, id: LayerId) {
        self.id = id;
    }

    fn apply(&mut self, patch: TextPatch) {
        match patch {
            TextPatch::Text(v) => self.text = v,
            TextPatch::FontFamily(v) => self.font_family = v,
            TextPatch::Left(v) => self.left = v,
            TextPatch::Top(v) => self.top = v,
            TextPatch::Color(v) => self.color = v,
            TextPatch::FontSize(v) => self.font_size = v,
            TextPatch::FontWeight(v) => self.font_weight = v,
            TextPatch::Opacity(v) => self.opacity = v,
            TextPatch::ShadowColor(v) => self.shadow_color = v,
            TextPatch::ShadowSize(v) => self.shadow_size = v,
            TextPatch::Rotation(v) => self.rotation = v,
        }
    }
}

/// Names one mutable text attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAttribute {
    Text,
    FontFamily,
    Left,
    Top,
    Color,
    FontSize,
    FontWeight,
    Opacity,
    ShadowColor,
    ShadowSize,
    Rotation,
}

/// A new value for exactly one text attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum TextPatch {
    Text(String),
    FontFamily(String),
    Left(f32),
    Top(f32),
    Color(String),
    FontSize(f32),
    FontWeight(u16),
    Opacity(f32),
    ShadowColor(String),
    ShadowSize(f32),
    Rotation(f32),
}

impl TextPatch {
    pub fn attribute(&self) -> TextAttribute {
        match self {
            Self::Text(_) => TextAttribute::Text,
            Self::FontFamily(_) => TextAttribute::FontFamily,
            Self::Left(_) => TextAttribute::Left,
            Self::Top(_) => TextAttribute::Top,
            Self::Color(_) => TextAttribute::Color,
            Self::FontSize(_) => TextAttribute::FontSize,
            Self::FontWeight(_) => TextAttribute::FontWeight,
            Self::Opacity(_) => TextAttribute::Opacity,
            Self::ShadowColor(_) => TextAttribute::ShadowColor,
            Self::ShadowSize(_) => TextAttribute::ShadowSize,
            Self::Rotation(_) => TextAttribute::Rotation,
        }
    }
}
