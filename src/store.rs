use crate::calc;
use crate::codec::Record;
use crate::config::WorkspaceConfig;
use crate::model::{AttendanceRecord, ExamResult, Student};
use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Flat file holding one record of type `T` per line.
///
/// There is no locking. Two writers on the same file lose updates
/// (last `save_all` wins); the sidecar handles one request at a time.
pub struct RecordStore<T> {
    path: PathBuf,
    _kind: PhantomData<T>,
}

impl<T: Record> RecordStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _kind: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes every non-blank line. A missing file is an empty collection.
    pub fn load_all(&self) -> anyhow::Result<Vec<T>> {
        if !self.path.exists() {
            tracing::debug!(kind = T::KIND, path = %self.path.display(), "no data file yet");
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("failed to read {}", self.path.to_string_lossy()))?;
        let text = String::from_utf8_lossy(&bytes);

        let mut out = Vec::new();
        let mut blank = 0usize;
        for line in text.lines() {
            if line.trim().is_empty() {
                blank += 1;
                continue;
            }
            out.push(T::decode(line));
        }
        if blank > 0 {
            tracing::warn!(kind = T::KIND, path = %self.path.display(), blank, "skipped blank lines");
        }
        tracing::debug!(kind = T::KIND, count = out.len(), "loaded records");
        Ok(out)
    }

    /// Read path for reporting: an unreadable file degrades to "no data".
    pub fn load_all_or_empty(&self) -> Vec<T> {
        match self.load_all() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(kind = T::KIND, "treating unreadable data file as empty: {e:#}");
                Vec::new()
            }
        }
    }

    /// Truncates the file and writes `items` in order.
    pub fn save_all(&self, items: &[T]) -> anyhow::Result<()> {
        self.ensure_parent()?;
        let file = File::create(&self.path)
            .with_context(|| format!("failed to create {}", self.path.to_string_lossy()))?;
        let mut w = BufWriter::new(file);
        for item in items {
            writeln!(w, "{}", item.encode())
                .with_context(|| format!("failed to write {}", self.path.to_string_lossy()))?;
        }
        w.flush()
            .with_context(|| format!("failed to flush {}", self.path.to_string_lossy()))?;
        tracing::info!(kind = T::KIND, count = items.len(), "rewrote data file");
        Ok(())
    }

    pub fn append(&self, item: &T) -> anyhow::Result<()> {
        self.append_many(std::slice::from_ref(item))
    }

    /// Appends all `items` through a single open handle.
    pub fn append_many(&self, items: &[T]) -> anyhow::Result<()> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {} for append", self.path.to_string_lossy()))?;
        let mut w = BufWriter::new(file);
        for item in items {
            writeln!(w, "{}", item.encode())
                .with_context(|| format!("failed to append to {}", self.path.to_string_lossy()))?;
        }
        w.flush()
            .with_context(|| format!("failed to flush {}", self.path.to_string_lossy()))?;
        tracing::info!(kind = T::KIND, count = items.len(), "appended records");
        Ok(())
    }

    fn ensure_parent(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create directory {}", parent.to_string_lossy())
                })?;
            }
        }
        Ok(())
    }
}

/// The three data files of one institution plus where reports go.
pub struct Workspace {
    root: PathBuf,
    config: WorkspaceConfig,
    pub students: RecordStore<Student>,
    pub attendance: RecordStore<AttendanceRecord>,
    pub exam_results: RecordStore<ExamResult>,
}

impl Workspace {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("failed to create workspace {}", root.to_string_lossy()))?;
        let config = WorkspaceConfig::load(root)?;
        Ok(Self::with_config(root, config))
    }

    pub fn with_config(root: &Path, config: WorkspaceConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            students: RecordStore::new(config.students_file.clone()),
            attendance: RecordStore::new(config.attendance_file.clone()),
            exam_results: RecordStore::new(config.exam_results_file.clone()),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn reports_dir(&self) -> &Path {
        &self.config.reports_dir
    }

    pub fn load_students(&self) -> anyhow::Result<Vec<Student>> {
        self.students.load_all()
    }

    pub fn save_students(&self, students: &[Student]) -> anyhow::Result<()> {
        self.students.save_all(students)
    }

    pub fn load_attendance(&self) -> anyhow::Result<Vec<AttendanceRecord>> {
        self.attendance.load_all()
    }

    pub fn append_attendance(&self, record: &AttendanceRecord) -> anyhow::Result<()> {
        self.attendance.append(record)
    }

    pub fn append_attendance_batch(&self, records: &[AttendanceRecord]) -> anyhow::Result<()> {
        self.attendance.append_many(records)
    }

    pub fn load_exam_results(&self) -> anyhow::Result<Vec<ExamResult>> {
        self.exam_results.load_all()
    }

    pub fn append_exam_result(&self, result: &ExamResult) -> anyhow::Result<()> {
        self.exam_results.append(result)
    }

    /// Loads attendance and computes the percentage for one student.
    pub fn attendance_percentage(&self, roll_no: &str, subject: Option<&str>) -> f64 {
        let records = self.attendance.load_all_or_empty();
        calc::attendance_percentage(&records, roll_no, subject)
    }

    /// Dataset name and path of each data file, for backup bundles.
    pub fn data_files(&self) -> [(&'static str, &Path); 3] {
        [
            ("students", self.students.path()),
            ("attendance", self.attendance.path()),
            ("exam_results", self.exam_results.path()),
        ]
    }
}
