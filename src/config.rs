use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::compositor::CompositorOptions;
use crate::layers::{TextLayer, Transform};
use crate::removal::{CommandRemover, RemovalOptions};

/// External background-removal command.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemovalConfig {
    /// Executable reading an image on stdin and writing the cut-out to stdout.
    pub program: String,
    /// Arguments; `{quality}` is replaced by `quality`.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "RemovalConfig::default_quality")]
    pub quality: f32,
}

impl RemovalConfig {
    const fn default_quality() -> f32 {
        1.0
    }

    pub fn remover(&self) -> CommandRemover {
        CommandRemover::new(self.program.clone(), self.args.iter().cloned())
    }

    pub fn options(&self) -> RemovalOptions {
        RemovalOptions {
            quality: self.quality,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OverlayConfig {
    /// Image to place on top of the text.
    pub path: PathBuf,
    /// Run the image through background removal before adding it. When
    /// false the file is expected to be a cut-out already.
    #[serde(default = "OverlayConfig::default_remove_background")]
    pub remove_background: bool,
    #[serde(flatten)]
    pub transform: Transform,
}

impl OverlayConfig {
    const fn default_remove_background() -> bool {
        true
    }
}

/// One composition, as described by a YAML project file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Background photo; its pixel size becomes the canvas size.
    pub background: PathBuf,
    /// Pre-computed foreground cut-out. Takes precedence over background removal.
    pub foreground: Option<PathBuf>,
    /// Command used to cut out the subject of the background and of overlays.
    pub background_removal: Option<RemovalConfig>,
    /// Text layers, bottom to top.
    pub texts: Vec<TextLayer>,
    /// Overlay images, bottom to top.
    pub overlays: Vec<OverlayConfig>,
    /// Directory the exported PNG is written to.
    pub output_dir: PathBuf,
    /// Extra directories scanned for font files.
    pub font_dirs: Vec<PathBuf>,
    /// Whether installed system fonts are available to text layers.
    pub system_fonts: bool,
    /// Canvas pixels per unit of text font size.
    pub text_scale: f32,
    /// Give up on an image load after this long.
    #[serde(with = "humantime_serde")]
    pub load_timeout: Option<Duration>,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading project file {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&s)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(cfg.relative_to(base))
    }

    /// Resolves every relative path against `base`.
    pub fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() && !p.as_os_str().is_empty() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.background);
        if let Some(fg) = self.foreground.as_mut() {
            resolve(fg);
        }
        for overlay in &mut self.overlays {
            resolve(&mut overlay.path);
        }
        for dir in &mut self.font_dirs {
            resolve(dir);
        }
        resolve(&mut self.output_dir);
        self
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.background.as_os_str().is_empty(),
            "background must be set"
        );
        ensure!(
            self.text_scale.is_finite() && self.text_scale > 0.0,
            "text-scale must be positive"
        );
        if let Some(timeout) = self.load_timeout {
            ensure!(!timeout.is_zero(), "load-timeout must be greater than zero");
        }
        if let Some(removal) = &self.background_removal {
            ensure!(
                !removal.program.trim().is_empty(),
                "background-removal.program must not be empty"
            );
            removal
                .options()
                .validate()
                .context("invalid background-removal configuration")?;
        }
        for (idx, text) in self.texts.iter().enumerate() {
            ensure!(
                (0.0..=1.0).contains(&text.opacity),
                "texts[{idx}].opacity must be within 0..=1"
            );
            ensure!(
                text.font_size > 0.0,
                "texts[{idx}].font-size must be positive"
            );
        }
        for (idx, overlay) in self.overlays.iter().enumerate() {
            ensure!(
                (0.0..=1.0).contains(&overlay.transform.opacity),
                "overlays[{idx}].opacity must be within 0..=1"
            );
            ensure!(
                !overlay.remove_background || self.background_removal.is_some(),
                "overlays[{idx}] asks for background removal but no background-removal command is configured"
            );
        }
        Ok(self)
    }

    pub fn compositor_options(&self) -> CompositorOptions {
        CompositorOptions {
            text_scale: self.text_scale,
            load_timeout: self.load_timeout,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        let defaults = CompositorOptions::default();
        Self {
            background: PathBuf::new(),
            foreground: None,
            background_removal: None,
            texts: Vec::new(),
            overlays: Vec::new(),
            output_dir: PathBuf::from("."),
            font_dirs: Vec::new(),
            system_fonts: true,
            text_scale: defaults.text_scale,
            load_timeout: defaults.load_timeout,
        }
    }
}
