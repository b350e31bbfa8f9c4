use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "rollbook.json";

/// Per-workspace settings. Every field may be omitted from `rollbook.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceConfig {
    pub students_file: PathBuf,
    pub attendance_file: PathBuf,
    pub exam_results_file: PathBuf,
    pub reports_dir: PathBuf,
    pub low_attendance_threshold: f64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            students_file: PathBuf::from("students.txt"),
            attendance_file: PathBuf::from("attendance.txt"),
            exam_results_file: PathBuf::from("exam_results.txt"),
            reports_dir: PathBuf::from("reports"),
            low_attendance_threshold: crate::calc::GOOD_ATTENDANCE_PCT,
        }
    }
}

impl WorkspaceConfig {
    /// Reads `rollbook.json` when present, then anchors relative paths at `root`.
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let cfg_path = root.join(CONFIG_FILE);
        let cfg = if cfg_path.is_file() {
            let text = std::fs::read_to_string(&cfg_path)
                .with_context(|| format!("failed to read {}", cfg_path.to_string_lossy()))?;
            serde_json::from_str::<WorkspaceConfig>(&text)
                .with_context(|| format!("{} is invalid JSON", cfg_path.to_string_lossy()))?
        } else {
            WorkspaceConfig::default()
        };
        Ok(cfg.anchored_at(root))
    }

    fn anchored_at(self, root: &Path) -> Self {
        let anchor = |p: PathBuf| if p.is_absolute() { p } else { root.join(p) };
        Self {
            students_file: anchor(self.students_file),
            attendance_file: anchor(self.attendance_file),
            exam_results_file: anchor(self.exam_results_file),
            reports_dir: anchor(self.reports_dir),
            low_attendance_threshold: self.low_attendance_threshold,
        }
    }
}
