//! Per-request scratch storage, removed on drop on every exit path.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::error::Result;

const INPUT_NAME: &str = "input";
const OUTPUT_NAME: &str = "output.mp4";

pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("ffa_serve_").tempdir()?;
        debug!(path = %dir.path().display(), "created scratch dir");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.path().join(INPUT_NAME)
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_NAME)
    }

    /// Stage the upload on disk; mp4 demuxing needs a seekable input.
    pub async fn write_input(&self, data: &[u8]) -> Result<PathBuf> {
        let path = self.input_path();
        tokio::fs::write(&path, data).await?;
        Ok(path)
    }

    pub async fn read_output(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.output_path()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removed_on_drop() {
        let scratch = Scratch::new().unwrap();
        let input = scratch.write_input(b"bytes").await.unwrap();
        let dir = scratch.path().to_path_buf();
        assert!(input.exists());

        drop(scratch);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn removed_when_a_task_fails() {
        async fn failing(dir_out: &mut Option<PathBuf>) -> Result<()> {
            let scratch = Scratch::new()?;
            *dir_out = Some(scratch.path().to_path_buf());
            scratch.write_input(b"bytes").await?;
            scratch.read_output().await?; // never written
            Ok(())
        }

        let mut dir = None;
        assert!(failing(&mut dir).await.is_err());
        assert!(!dir.unwrap().exists());
    }

    #[test]
    fn scratch_dirs_are_distinct() {
        let a = Scratch::new().unwrap();
        let b = Scratch::new().unwrap();
        assert_ne!(a.path(), b.path());
        assert_ne!(a.output_path(), b.output_path());
    }
}
