use serde::Deserialize;

use super::{Layer, LayerId};
use crate::loader::ImageSource;

/// Placement of an overlay image in percentage space.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Transform {
    /// Percent of canvas width of the overlay's centre.
    pub x: f32,
    /// Percent of canvas height of the overlay's centre.
    pub y: f32,
    pub opacity: f32,
    /// 1.0 makes the overlay half the canvas width.
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 50.0,
            y: 50.0,
            opacity: 1.0,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformPatch {
    X(f32),
    Y(f32),
    Opacity(f32),
    Scale(f32),
}

/// A background-removed image drawn between the text and the foreground.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayImage {
    id: LayerId,
    image: ImageSource,
    pub transform: Transform,
}

impl OverlayImage {
    pub fn new(image: ImageSource) -> Self {
        Self::with_transform(image, Transform::default())
    }

    pub fn with_transform(image: ImageSource, transform: Transform) -> Self {
        Self {
            id: LayerId::default(),
            image,
            transform,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn image(&self) -> &ImageSource {
        &self.image
    }
}

impl Layer for OverlayImage {
    type Patch = TransformPatch;

    fn id(&self) -> LayerId {
        self.id
    }

    fn assign_id(&mut self, id: LayerId) {
        self.id = id;
    }

    fn apply(&mut self, patch: TransformPatch) {
        let t = &mut self.transform;
        match patch {
            TransformPatch::X(v) => t.x = v,
            TransformPatch::Y(v) => t.y = v,
            TransformPatch::Opacity(v) => t.opacity = v,
            TransformPatch::Scale(v) => t.scale = v,
        }
    }
}
