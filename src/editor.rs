//! Editing session state as one immutable value.
//!
//! Every method returns a new [`EditorState`]; callers replace their copy
//! with the result. Operations that can fail (background removal) return the
//! error instead of a new state, so the caller's previous state stays as it
//! was.

use tracing::{info, warn};

use crate::compositor::CompositionInput;
use crate::error::RemovalError;
use crate::layers::{LayerId, LayerSet, OverlayImage, TextLayer, TextPatch, Transform, TransformPatch};
use crate::loader::ImageSource;
use crate::removal::{BackgroundRemover, RemovalOptions};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorState {
    background: Option<ImageSource>,
    foreground: Option<ImageSource>,
    image_setup_done: bool,
    texts: LayerSet<TextLayer>,
    overlays: LayerSet<OverlayImage>,
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn background(&self) -> Option<&ImageSource> {
        self.background.as_ref()
    }

    pub fn foreground(&self) -> Option<&ImageSource> {
        self.foreground.as_ref()
    }

    /// True once a foreground cut-out for the current background exists.
    pub fn is_image_setup_done(&self) -> bool {
        self.image_setup_done
    }

    pub fn texts(&self) -> &LayerSet<TextLayer> {
        &self.texts
    }

    pub fn overlays(&self) -> &LayerSet<OverlayImage> {
        &self.overlays
    }

    /// Selects a new background photo. Any previous cut-out belonged to the
    /// old photo and is dropped; layers are kept.
    #[must_use]
    pub fn with_background(&self, background: ImageSource) -> Self {
        Self {
            background: Some(background),
            foreground: None,
            image_setup_done: false,
            ..self.clone()
        }
    }

    /// Uses an already isolated subject as the foreground cut-out.
    #[must_use]
    pub fn with_foreground(&self, foreground: ImageSource) -> Self {
        Self {
            foreground: Some(foreground),
            image_setup_done: true,
            ..self.clone()
        }
    }

    /// Produces the foreground cut-out for the current background.
    ///
    /// On failure nothing changes for the caller: it keeps its state, with
    /// `is_image_setup_done()` still false, and later composites simply omit
    /// the foreground.
    pub async fn setup_image<R: BackgroundRemover>(
        &self,
        remover: &R,
        options: &RemovalOptions,
    ) -> Result<Self, RemovalError> {
        let Some(background) = &self.background else {
            return Err(RemovalError::NoBackground);
        };
        let bytes = background.read().await?;
        match remover.remove_background(&bytes, options).await {
            Ok(cutout) => {
                info!(bytes = cutout.len(), "foreground cut-out ready");
                Ok(self.with_foreground(ImageSource::from_bytes(cutout)))
            }
            Err(err) => {
                warn!(error = %err, "background removal failed for main image");
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn add_text(&self) -> (LayerId, Self) {
        self.add_text_from(TextLayer::default())
    }

    /// Adds a text layer with every attribute taken from `template`.
    #[must_use]
    pub fn add_text_from(&self, template: TextLayer) -> (LayerId, Self) {
        let (id, texts) = self.texts.add(template);
        (id, Self { texts, ..self.clone() })
    }

    #[must_use]
    pub fn update_text(&self, id: LayerId, patch: TextPatch) -> Self {
        Self {
            texts: self.texts.update(id, patch),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn duplicate_text(&self, id: LayerId) -> (Option<LayerId>, Self) {
        let (new_id, texts) = self.texts.duplicate(id);
        (new_id, Self { texts, ..self.clone() })
    }

    #[must_use]
    pub fn remove_text(&self, id: LayerId) -> Self {
        Self {
            texts: self.texts.remove(id),
            ..self.clone()
        }
    }

    /// Isolates the subject of `image` and adds it as an overlay placed by
    /// `transform`. If removal fails no overlay is inserted.
    pub async fn add_overlay<R: BackgroundRemover>(
        &self,
        image: &[u8],
        remover: &R,
        options: &RemovalOptions,
        transform: Transform,
    ) -> Result<(LayerId, Self), RemovalError> {
        let cutout = remover
            .remove_background(image, options)
            .await
            .inspect_err(|err| warn!(error = %err, "background removal failed for overlay"))?;
        Ok(self.add_overlay_cutout(ImageSource::from_bytes(cutout), transform))
    }

    /// Adds an overlay whose image is already background-removed.
    #[must_use]
    pub fn add_overlay_cutout(&self, image: ImageSource, transform: Transform) -> (LayerId, Self) {
        let (id, overlays) = self
            .overlays
            .add(OverlayImage::with_transform(image, transform));
        (id, Self { overlays, ..self.clone() })
    }

    #[must_use]
    pub fn update_overlay(&self, id: LayerId, patch: TransformPatch) -> Self {
        Self {
            overlays: self.overlays.update(id, patch),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn duplicate_overlay(&self, id: LayerId) -> (Option<LayerId>, Self) {
        let (new_id, overlays) = self.overlays.duplicate(id);
        (new_id, Self { overlays, ..self.clone() })
    }

    #[must_use]
    pub fn remove_overlay(&self, id: LayerId) -> Self {
        Self {
            overlays: self.overlays.remove(id),
            ..self.clone()
        }
    }

    /// Snapshot for one export. `None` until a background is selected.
    pub fn composition_input(&self) -> Option<CompositionInput> {
        let background = self.background.clone()?;
        Some(CompositionInput {
            background,
            foreground: self.foreground.clone(),
            texts: self.texts.as_slice().to_vec(),
            overlays: self.overlays.as_slice().to_vec(),
        })
    }
}
