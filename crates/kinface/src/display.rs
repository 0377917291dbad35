//! Where annotated frames go.

use image::RgbImage;
use std::path::PathBuf;

/// Display surface for ready-to-show frames.
pub trait FrameSink {
    fn show(&mut self, sequence: u32, frame: &RgbImage) -> anyhow::Result<()>;
}

/// Writes each frame as `frame_<sequence>.png` into a directory.
pub struct PngSink {
    dir: PathBuf,
}

impl PngSink {
    pub fn create(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl FrameSink for PngSink {
    fn show(&mut self, sequence: u32, frame: &RgbImage) -> anyhow::Result<()> {
        let path = self.dir.join(format!("frame_{sequence:05}.png"));
        frame.save(&path)?;
        tracing::trace!(path = %path.display(), "frame written");
        Ok(())
    }
}

/// Drops every frame.
pub struct NullSink;

impl FrameSink for NullSink {
    fn show(&mut self, _sequence: u32, _frame: &RgbImage) -> anyhow::Result<()> {
        Ok(())
    }
}
