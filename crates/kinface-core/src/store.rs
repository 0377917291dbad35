//! File-backed enrollment store.
//!
//! Each enrollment is two artifacts sharing a stem `TF_<ticks>`: a JSON
//! metadata file whose suffix names the processor partition (`.fmb` or
//! `.pca`) and a PNG holding the grayscale sample. Ticks count 100 ns
//! intervals since 0001-01-01 UTC.

use crate::types::{Deformations, EnrollmentRecord, ProcessorKind};
use chrono::Utc;
use image::ImageFormat;
use kinface_sensor::RgbColor;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STEM_PREFIX: &str = "TF_";
pub const IMAGE_SUFFIX: &str = ".png";

/// 100 ns ticks between 0001-01-01 and the Unix epoch.
const TICKS_AT_UNIX_EPOCH: i64 = 621_355_968_000_000_000;
/// Fresh stems tried before `save` gives up.
const MAX_STEM_ATTEMPTS: usize = 16;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bad metadata in {path}: {source}")]
    Metadata {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("image error on {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("record {path} has an empty label")]
    EmptyLabel { path: String },
    #[error("no unused file stem after {0} attempts")]
    StemExhausted(usize),
    #[error("metadata encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// On-disk metadata artifact.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordMetadata {
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hair_color: Option<RgbColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skin_color: Option<RgbColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deformations: Option<Deformations>,
}

impl From<&EnrollmentRecord> for RecordMetadata {
    fn from(record: &EnrollmentRecord) -> Self {
        Self {
            label: record.label.clone(),
            hair_color: record.hair_color,
            skin_color: record.skin_color,
            deformations: record.deformations.clone(),
        }
    }
}

/// A partition entry that could not be loaded.
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of loading a partition: the readable records in enumeration
/// order, plus whatever had to be skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<EnrollmentRecord>,
    pub skipped: Vec<SkippedRecord>,
}

fn ticks_now() -> i64 {
    let now = Utc::now();
    let since_epoch = now
        .timestamp_nanos_opt()
        .map(|ns| ns / 100)
        .unwrap_or_else(|| now.timestamp_micros() * 10);
    TICKS_AT_UNIX_EPOCH + since_epoch
}

/// Stem of `path` if it is a metadata artifact of `kind`'s partition.
fn partition_stem(path: &Path, kind: ProcessorKind) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(kind.suffix())?;
    stem.starts_with(STEM_PREFIX).then(|| stem.to_string())
}

pub struct EnrollmentStore {
    dir: PathBuf,
    last_ticks: i64,
}

impl EnrollmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_ticks: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Strictly increasing within this store, even when the clock is coarse
    /// or steps backwards.
    fn next_ticks(&mut self) -> i64 {
        let ticks = ticks_now().max(self.last_ticks + 1);
        self.last_ticks = ticks;
        ticks
    }

    /// Persist `record` into `kind`'s partition and return the stem used.
    ///
    /// Never overwrites: a stem whose metadata or image already exists is
    /// abandoned for the next tick.
    pub fn save(&mut self, record: &EnrollmentRecord, kind: ProcessorKind) -> Result<String, StoreError> {
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;
        let metadata = serde_json::to_vec(&RecordMetadata::from(record))?;

        for _ in 0..MAX_STEM_ATTEMPTS {
            let stem = format!("{STEM_PREFIX}{}", self.next_ticks());
            let meta_path = self.dir.join(format!("{stem}{}", kind.suffix()));
            let image_path = self.dir.join(format!("{stem}{IMAGE_SUFFIX}"));

            if image_path.exists() {
                tracing::warn!(stem = %stem, "image artifact already exists; picking a new stem");
                continue;
            }

            let mut file = match OpenOptions::new().write(true).create_new(true).open(&meta_path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::warn!(stem = %stem, "metadata artifact already exists; picking a new stem");
                    continue;
                }
                Err(e) => return Err(io_err(&meta_path)(e)),
            };

            if let Err(e) = file.write_all(&metadata) {
                drop(file);
                let _ = fs::remove_file(&meta_path);
                return Err(io_err(&meta_path)(e));
            }

            if let Err(e) = record.image.save_with_format(&image_path, ImageFormat::Png) {
                let _ = fs::remove_file(&image_path);
                let _ = fs::remove_file(&meta_path);
                return Err(StoreError::Image {
                    path: image_path.display().to_string(),
                    source: e,
                });
            }

            tracing::info!(
                stem = %stem,
                kind = %kind,
                label = %record.label,
                dir = %self.dir.display(),
                "enrollment saved"
            );
            return Ok(stem);
        }

        Err(StoreError::StemExhausted(MAX_STEM_ATTEMPTS))
    }

    /// Load every record in `kind`'s partition, in directory enumeration
    /// order. Unreadable records are skipped and reported, never fatal. A
    /// missing store directory is an empty partition.
    pub fn load_all(&self, kind: ProcessorKind) -> Result<LoadReport, StoreError> {
        let mut report = LoadReport::default();

        for meta_path in self.partition_entries(kind)? {
            match Self::load_record(&meta_path, kind) {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    tracing::warn!(path = %meta_path.display(), error = %e, "skipping enrollment record");
                    report.skipped.push(SkippedRecord {
                        path: meta_path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            kind = %kind,
            loaded = report.records.len(),
            skipped = report.skipped.len(),
            "enrollment partition loaded"
        );
        Ok(report)
    }

    /// Stems in `kind`'s partition, without decoding anything.
    pub fn list(&self, kind: ProcessorKind) -> Result<Vec<String>, StoreError> {
        Ok(self
            .partition_entries(kind)?
            .iter()
            .filter_map(|p| partition_stem(p, kind))
            .collect())
    }

    fn partition_entries(&self, kind: ProcessorKind) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir.display(), "store directory missing; nothing enrolled");
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_err(&self.dir)(e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if partition_stem(&path, kind).is_some() {
                        paths.push(path);
                    }
                }
                Err(e) => tracing::warn!(dir = %self.dir.display(), error = %e, "unreadable directory entry"),
            }
        }
        Ok(paths)
    }

    fn load_record(meta_path: &Path, kind: ProcessorKind) -> Result<EnrollmentRecord, StoreError> {
        let raw = fs::read(meta_path).map_err(io_err(meta_path))?;
        let metadata: RecordMetadata = serde_json::from_slice(&raw).map_err(|e| StoreError::Metadata {
            path: meta_path.display().to_string(),
            source: e,
        })?;
        if metadata.label.is_empty() {
            return Err(StoreError::EmptyLabel {
                path: meta_path.display().to_string(),
            });
        }

        // The image artifact shares the stem; swap the partition suffix.
        let image_path = partition_stem(meta_path, kind)
            .map(|stem| meta_path.with_file_name(format!("{stem}{IMAGE_SUFFIX}")))
            .unwrap_or_else(|| meta_path.with_extension("png"));
        let image = image::open(&image_path)
            .map_err(|e| StoreError::Image {
                path: image_path.display().to_string(),
                source: e,
            })?
            .to_luma8();

        Ok(EnrollmentRecord {
            label: metadata.label,
            image,
            hair_color: metadata.hair_color,
            skin_color: metadata.skin_color,
            deformations: metadata.deformations,
        })
    }
}
