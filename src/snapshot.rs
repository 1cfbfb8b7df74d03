use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::world::{World, WorldSnapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub scenario: String,
    pub year: i32,
    pub written_at: String,
    pub dwelling_count: usize,
    pub job_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub metadata: SnapshotMetadata,
    pub world: WorldSnapshot,
}

/// Writes `<dir>/<scenario>/year_<yyyy>.json` every `interval_years` completed
/// years and `final.json` once the run ends. An interval of 0 disables the
/// periodic files.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval_years: u32,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval_years: u32) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval_years,
        }
    }

    pub fn should_write(&self, years_completed: u32) -> bool {
        self.interval_years != 0 && years_completed > 0 && years_completed % self.interval_years == 0
    }

    pub fn maybe_write(
        &self,
        world: &World,
        scenario: &str,
        years_completed: u32,
    ) -> Result<Option<PathBuf>> {
        if !self.should_write(years_completed) {
            return Ok(None);
        }
        let file_name = format!("year_{:04}.json", world.year());
        self.write(world, scenario, &file_name).map(Some)
    }

    pub fn write_final(&self, world: &World, scenario: &str) -> Result<PathBuf> {
        self.write(world, scenario, "final.json")
    }

    fn write(&self, world: &World, scenario: &str, file_name: &str) -> Result<PathBuf> {
        let dir = self.output_dir.join(scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;

        let snapshot = world.snapshot(scenario);
        let file = SnapshotFile {
            metadata: SnapshotMetadata {
                scenario: scenario.to_string(),
                year: snapshot.year,
                written_at: chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string(),
                dwelling_count: snapshot.dwellings.len(),
                job_count: snapshot.jobs.len(),
            },
            world: snapshot,
        };

        let path = dir.join(file_name);
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        info!(year = file.metadata.year, path = %path.display(), "snapshot written");
        Ok(path)
    }
}

/// Reads back a file produced by [`SnapshotWriter`].
pub fn load_snapshot(path: impl AsRef<Path>) -> Result<SnapshotFile> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let file = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    Ok(file)
}
