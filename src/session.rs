//! Session file format and the save procedure.
//!
//! A session file holds one JSON object per line, each describing a view
//! that can be relaunched: the argv of its process and the workspace it sat
//! on. Files written by older tools (pretty-printed objects separated by a
//! `--------view--------` line) are still accepted on load.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::process::ProcessInspector;
use crate::types::{Geometry, View, ViewWorkspace, WorkspaceCoords};

/// Record separator used by the legacy format
const LEGACY_DELIMITER: &str = "\n--------view--------\n";

/// One view's resumable state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub pid: i64,
    #[serde(rename = "app-id", default)]
    pub app_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmdline: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceCoords>,
}

impl ViewRecord {
    /// Record for a live view, without argv or workspace yet
    pub fn from_view(view: &View) -> Self {
        Self {
            id: view.id,
            pid: view.pid,
            app_id: view.app_id.clone(),
            title: view.title.clone(),
            geometry: view.geometry,
            cmdline: None,
            workspace: None,
        }
    }

    /// The argv to relaunch with, if there is one
    pub fn launch_args(&self) -> Option<&[String]> {
        self.cmdline.as_deref().filter(|args| !args.is_empty())
    }
}

/// Outcome of a save
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub written: usize,
    pub skipped: usize,
}

/// Serialize one record as a single line (without the newline)
pub fn encode_record(record: &ViewRecord) -> Result<String, serde_json::Error> {
    serde_json::to_string(record)
}

/// Parse a session file's contents
pub fn decode(contents: &str) -> Result<Vec<ViewRecord>, SessionError> {
    if is_legacy(contents) {
        return decode_legacy(contents);
    }

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| SessionError::Parse {
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// Legacy files start with a pretty-printed object, i.e. a lone `{` line,
/// or with a `null` segment followed by the delimiter. Neither can occur in
/// a newline-delimited file.
fn is_legacy(contents: &str) -> bool {
    contents.contains(LEGACY_DELIMITER)
        || contents
            .lines()
            .find(|line| !line.trim().is_empty())
            .is_some_and(|line| line.trim() == "{")
}

fn decode_legacy(contents: &str) -> Result<Vec<ViewRecord>, SessionError> {
    let mut records = Vec::new();
    let mut line = 1;
    for segment in contents.split(LEGACY_DELIMITER) {
        if !segment.trim().is_empty() {
            // Views whose command line could not be read were written as `null`
            let record: Option<ViewRecord> = serde_json::from_str(segment)
                .map_err(|source| SessionError::Parse { line, source })?;
            records.extend(record);
        }
        line += segment.matches('\n').count() + LEGACY_DELIMITER.matches('\n').count();
    }
    Ok(records)
}

/// Build the record for one view: argv from the process, workspace from
/// the view->workspace map.
pub fn capture_view(
    view: &View,
    workspaces: &HashMap<u64, WorkspaceCoords>,
    inspector: &impl ProcessInspector,
) -> Result<ViewRecord, SessionError> {
    let pid = u32::try_from(view.pid)
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| SessionError::ProcessLookup {
            pid: view.pid,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid pid"),
        })?;

    let cmdline = inspector
        .cmdline_of(pid)
        .map_err(|source| SessionError::ProcessLookup {
            pid: view.pid,
            source,
        })?;

    let mut record = ViewRecord::from_view(view);
    record.cmdline = Some(cmdline);
    record.workspace = workspaces.get(&view.id).copied();
    Ok(record)
}

/// A session file on disk
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::FileIo {
            path: self.path.clone(),
            source,
        }
    }

    /// Remove any previous session and create an empty file in its place
    fn recreate(&self) -> Result<File, SessionError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| self.io_error(e))?;
            log::info!("Old session {:?} removed", self.path);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))
    }

    /// Save the toplevel views in `views`, in order.
    ///
    /// Views whose process is gone are skipped with a warning; everything
    /// written before a failure stays intact since each record is flushed
    /// on its own.
    pub fn save(
        &self,
        views: &[View],
        workspaces: &[ViewWorkspace],
        inspector: &impl ProcessInspector,
    ) -> Result<SaveReport, SessionError> {
        let mut file = self.recreate()?;
        log::info!("New session file {:?} created", self.path);

        let workspaces: HashMap<u64, WorkspaceCoords> =
            workspaces.iter().map(|w| (w.view_id, w.coords())).collect();

        let mut report = SaveReport::default();
        for view in views.iter().filter(|v| v.is_toplevel()) {
            let record = match capture_view(view, &workspaces, inspector) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping view {} ({}): {}", view.id, view.app_id, e);
                    report.skipped += 1;
                    continue;
                }
            };

            let line = encode_record(&record).map_err(|e| {
                self.io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })?;
            writeln!(file, "{}", line).map_err(|e| self.io_error(e))?;
            file.flush().map_err(|e| self.io_error(e))?;
            report.written += 1;
        }

        log::info!(
            "Saved {} views to {:?} ({} skipped)",
            report.written,
            self.path,
            report.skipped
        );
        Ok(report)
    }

    /// Read every record in the file
    pub fn load(&self) -> Result<Vec<ViewRecord>, SessionError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        let records = decode(&contents)?;
        log::info!("Loaded {} session records from {:?}", records.len(), self.path);
        Ok(records)
    }
}
