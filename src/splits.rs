use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SplitConfig;
use crate::constants::splits::DEFAULT_MANIFEST_FILENAME;
use crate::errors::HunkError;
use crate::store::{RecordStore, TaskRef};

/// Logical dataset partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitLabel {
    /// Training split.
    Train,
    /// Test split.
    Test,
}

#[derive(Debug, Clone)]
/// SplitMix64 generator; the permutation depends only on the seed.
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Generator starting from `seed`.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64_internal(&mut self) -> u64 {
        let mut z = self.state.wrapping_add(0x9E3779B97F4A7C15);
        self.state = z;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl RngCore for DeterministicRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64_internal() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u64_internal()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut offset = 0;
        while offset < dest.len() {
            let value = self.next_u64_internal();
            let bytes = value.to_le_bytes();
            let remaining = dest.len() - offset;
            let copy_len = remaining.min(bytes.len());
            dest[offset..offset + copy_len].copy_from_slice(&bytes[..copy_len]);
            offset += copy_len;
        }
    }
}

/// In-place Fisher–Yates shuffle drawing `next_u64() % (i + 1)` from the back.
///
/// The draw rule is fixed so any implementation using the same generator and
/// rule reproduces the permutation exactly.
pub fn shuffle_with<T, R: RngCore + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = (rng.next_u64() % (i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}

/// A train/test partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit<T> {
    /// Training items in shuffled order.
    pub train: Vec<T>,
    /// Test items in shuffled order.
    pub test: Vec<T>,
}

impl<T> TrainTestSplit<T> {
    /// Items of one split.
    pub fn get(&self, label: SplitLabel) -> &[T] {
        match label {
            SplitLabel::Train => &self.train,
            SplitLabel::Test => &self.test,
        }
    }
}

/// Deterministic shuffle-and-cut partitioner.
#[derive(Clone, Copy, Debug)]
pub struct SplitBuilder {
    config: SplitConfig,
}

impl SplitBuilder {
    /// Builder with validated settings.
    pub fn new(config: SplitConfig) -> Result<Self, HunkError> {
        Ok(Self {
            config: config.validated()?,
        })
    }

    /// Settings in use.
    pub fn config(&self) -> SplitConfig {
        self.config
    }

    /// Number of items the test split receives out of `total`.
    pub fn test_len(&self, total: usize) -> usize {
        ((total as f64) * self.config.test_fraction).floor() as usize
    }

    /// Shuffle `items` with the fixed seed and cut the front into `test`.
    pub fn split<T: Clone>(&self, items: &[T]) -> TrainTestSplit<T> {
        let mut shuffled = items.to_vec();
        shuffle_with(&mut shuffled, &mut DeterministicRng::new(self.config.seed));
        let train = shuffled.split_off(self.test_len(items.len()));
        TrainTestSplit {
            train,
            test: shuffled,
        }
    }
}

/// Split `items` with `config`; see [`SplitBuilder::split`].
pub fn split<T: Clone>(items: &[T], config: SplitConfig) -> Result<TrainTestSplit<T>, HunkError> {
    Ok(SplitBuilder::new(config)?.split(items))
}

/// Persisted train/test manifest listing task references per split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitManifest {
    /// Seed the split was derived with.
    pub seed: u64,
    /// Test fraction the split was derived with.
    pub test_fraction: f64,
    /// Training task references.
    pub train: Vec<TaskRef>,
    /// Test task references.
    pub test: Vec<TaskRef>,
}

impl SplitManifest {
    /// Split the tasks a store holds at `context_window`.
    pub fn build(
        store: &RecordStore,
        context_window: usize,
        config: SplitConfig,
    ) -> Result<Self, HunkError> {
        let builder = SplitBuilder::new(config)?;
        let refs = store.discover(context_window)?;
        let TrainTestSplit { train, test } = builder.split(&refs);
        Ok(Self {
            seed: config.seed,
            test_fraction: config.test_fraction,
            train,
            test,
        })
    }

    /// Task references of one split.
    pub fn tasks(&self, label: SplitLabel) -> &[TaskRef] {
        match label {
            SplitLabel::Train => &self.train,
            SplitLabel::Test => &self.test,
        }
    }

    /// Write the manifest as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HunkError> {
        let path = coerce_manifest_path(path.as_ref().to_path_buf());
        ensure_parent_dir(&path)?;
        fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Read a manifest written by [`SplitManifest::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HunkError> {
        let path = coerce_manifest_path(path.as_ref().to_path_buf());
        let bytes = fs::read(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => HunkError::NotFound { path: path.clone() },
            _ => err.into(),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn coerce_manifest_path(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        return path.join(DEFAULT_MANIFEST_FILENAME);
    }
    path
}

fn ensure_parent_dir(path: &Path) -> Result<(), HunkError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
