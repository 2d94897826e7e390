//! Background-removal collaborator.
//!
//! Segmentation itself happens elsewhere; this module only defines the seam
//! (`image bytes in, foreground-isolated image bytes out`) and an adapter
//! that pipes the bytes through an external command.

use std::future::Future;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::RemovalError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemovalOptions {
    /// Encoding quality of the returned image, in `(0, 1]`.
    pub quality: f32,
}

impl Default for RemovalOptions {
    fn default() -> Self {
        Self { quality: 1.0 }
    }
}

impl RemovalOptions {
    pub fn validate(&self) -> Result<(), RemovalError> {
        if self.quality > 0.0 && self.quality <= 1.0 {
            Ok(())
        } else {
            Err(RemovalError::InvalidQuality(self.quality))
        }
    }
}

pub trait BackgroundRemover {
    /// Returns an encoded image in which everything but the subject is transparent.
    fn remove_background(
        &self,
        image: &[u8],
        options: &RemovalOptions,
    ) -> impl Future<Output = Result<Vec<u8>, RemovalError>> + Send;
}

/// Runs `program args...` with the image on stdin and reads the cut-out from
/// stdout. The placeholder `{quality}` in any argument is replaced by the
/// requested quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRemover {
    program: String,
    args: Vec<String>,
}

impl CommandRemover {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn expanded_args(&self, options: &RemovalOptions) -> Vec<String> {
        let quality = options.quality.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{quality}", &quality))
            .collect()
    }

    async fn run(&self, image: Vec<u8>, options: &RemovalOptions) -> Result<Vec<u8>, RemovalError> {
        options.validate()?;
        let spawn_err = |source| RemovalError::Spawn {
            program: self.program.clone(),
            source,
        };
        let mut child = Command::new(&self.program)
            .args(self.expanded_args(options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_err)?;

        let Some(mut stdin) = child.stdin.take() else {
            return Err(RemovalError::Other("child stdin unavailable".into()));
        };
        // Feed stdin concurrently so a tool that streams output cannot deadlock on a full pipe.
        let feeder = tokio::spawn(async move {
            let res = stdin.write_all(&image).await;
            drop(stdin);
            res
        });
        let output = child.wait_with_output().await.map_err(spawn_err)?;
        match feeder.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(error = %err, "removal command closed stdin early"),
            Err(err) => warn!(error = %err, "stdin feeder task failed"),
        }

        if !output.status.success() {
            return Err(RemovalError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if output.stdout.is_empty() {
            return Err(RemovalError::EmptyOutput);
        }
        debug!(
            program = %self.program,
            bytes = output.stdout.len(),
            "background removal finished"
        );
        Ok(output.stdout)
    }
}

impl BackgroundRemover for CommandRemover {
    fn remove_background(
        &self,
        image: &[u8],
        options: &RemovalOptions,
    ) -> impl Future<Output = Result<Vec<u8>, RemovalError>> + Send {
        let image = image.to_vec();
        let options = *options;
        async move { self.run(image, &options).await }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_must_be_in_unit_interval() {
        assert!(RemovalOptions { quality: 1.0 }.validate().is_ok());
        assert!(RemovalOptions { quality: 0.01 }.validate().is_ok());
        assert!(RemovalOptions { quality: 0.0 }.validate().is_err());
        assert!(RemovalOptions { quality: 1.5 }.validate().is_err());
        assert!(RemovalOptions { quality: f32::NAN }.validate().is_err());
    }

    #[test]
    fn quality_placeholder_is_substituted() {
        let remover = CommandRemover::new("tool", ["--q={quality}", "-"]);
        let args = remover.expanded_args(&RemovalOptions { quality: 0.5 });
        assert_eq!(args, vec!["--q=0.5".to_string(), "-".to_string()]);
    }

    #[tokio::test]
    async fn invalid_quality_fails_before_spawning() {
        let remover = CommandRemover::new("definitely-not-a-real-binary", Vec::<String>::new());
        let err = remover
            .remove_background(b"x", &RemovalOptions { quality: 2.0 })
            .await
            .unwrap_err();
        assert!(matches!(err, RemovalError::InvalidQuality(_)));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let remover = CommandRemover::new("definitely-not-a-real-binary", Vec::<String>::new());
        let err = remover
            .remove_background(b"x", &RemovalOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemovalError::Spawn { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pipes_bytes_through_the_command() {
        let remover = CommandRemover::new("cat", Vec::<String>::new());
        let out = remover
            .remove_background(b"payload", &RemovalOptions::default())
            .await
            .unwrap();
        assert_eq!(out, b"payload");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let remover = CommandRemover::new("sh", ["-c", "echo broken >&2; exit 3"]);
        let err = remover
            .remove_background(b"payload", &RemovalOptions::default())
            .await
            .unwrap_err();
        match err {
            RemovalError::Failed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn empty_output_is_an_error() {
        let remover = CommandRemover::new("sh", ["-c", "cat >/dev/null"]);
        let err = remover
            .remove_background(b"payload", &RemovalOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemovalError::EmptyOutput));
    }
}
