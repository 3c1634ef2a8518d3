//! Session replay: relaunch recorded applications and put each one back on
//! its workspace.

use std::thread;
use std::time::{Duration, Instant};

use crate::error::SessionError;
use crate::ipc::Compositor;
use crate::process::shell_join;
use crate::session::ViewRecord;
use crate::types::WorkspaceCoords;

/// Timing knobs for replay
#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    /// Pause after a launch before looking for its view
    pub settle_delay: Duration,
    /// Pause between view list scans
    pub poll_interval: Duration,
    /// Give up on a record once this much time has passed after the launch
    pub placement_timeout: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            poll_interval: Duration::from_millis(250),
            placement_timeout: Duration::from_secs(10),
        }
    }
}

/// A record that is about to be relaunched
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLaunch {
    /// Command line handed to the compositor
    pub command: String,
    /// Target workspace
    pub workspace: WorkspaceCoords,
    /// App id at capture time (for logging)
    pub app_id: String,
}

impl PendingLaunch {
    /// The launch for a record, or `None` if it cannot be replayed
    pub fn from_record(record: &ViewRecord) -> Option<Self> {
        let workspace = record.workspace?;
        let args = record.launch_args()?;
        Some(Self {
            command: shell_join(args),
            workspace,
            app_id: record.app_id.clone(),
        })
    }
}

/// What a replay did
#[derive(Debug, Default)]
pub struct ReplayReport {
    /// Views that were found and moved into place
    pub placed: Vec<u64>,
    /// Records without a workspace or a command line
    pub skipped: usize,
    /// Records that were launched but could not be placed
    pub failures: Vec<SessionError>,
}

impl ReplayReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives the compositor through a session replay
pub struct SessionReplayer<'a, C: Compositor> {
    compositor: &'a mut C,
    options: ReplayOptions,
}

impl<'a, C: Compositor> SessionReplayer<'a, C> {
    pub fn new(compositor: &'a mut C, options: ReplayOptions) -> Self {
        Self {
            compositor,
            options,
        }
    }

    /// Replay every eligible record, in order.
    ///
    /// Per-record failures are collected in the report; only a broken
    /// compositor connection aborts the whole replay.
    pub fn start(&mut self, records: &[ViewRecord]) -> Result<ReplayReport, SessionError> {
        let mut report = ReplayReport::default();

        for record in records {
            let Some(launch) = PendingLaunch::from_record(record) else {
                if record.workspace.is_some() {
                    log::warn!(
                        "Session record {} ({}) has no command line",
                        record.id,
                        record.app_id
                    );
                } else {
                    log::debug!(
                        "Session record {} ({}) has no workspace",
                        record.id,
                        record.app_id
                    );
                }
                report.skipped += 1;
                continue;
            };

            match self.restore(&launch) {
                Ok(view_id) => report.placed.push(view_id),
                Err(SessionError::Ipc(e)) => return Err(SessionError::Ipc(e)),
                Err(e) => {
                    log::warn!("Could not restore {} ({}): {}", launch.app_id, launch.command, e);
                    report.failures.push(e);
                }
            }
        }

        log::info!(
            "Session replay: {} placed, {} skipped, {} failed",
            report.placed.len(),
            report.skipped,
            report.failures.len()
        );
        Ok(report)
    }

    /// Launch one application and move its view into place
    fn restore(&mut self, launch: &PendingLaunch) -> Result<u64, SessionError> {
        // New views open on the focused workspace
        self.compositor.set_workspace(launch.workspace, None)?;

        log::info!(
            "Restoring '{}' on workspace ({}, {})",
            launch.command,
            launch.workspace.x,
            launch.workspace.y
        );
        let pid = self
            .compositor
            .run(&launch.command)?
            .ok_or_else(|| SessionError::Launch {
                cmdline: launch.command.clone(),
                reason: "compositor returned no pid".to_string(),
            })?;

        let view_id = self.wait_for_view(pid)?;

        // The second maximize catches a geometry commit racing the first
        self.compositor.maximize(view_id)?;
        self.compositor.set_workspace(launch.workspace, Some(view_id))?;
        self.compositor.maximize(view_id)?;
        Ok(view_id)
    }

    /// Poll the view list until a view owned by `pid` shows up
    fn wait_for_view(&mut self, pid: u32) -> Result<u64, SessionError> {
        let started = Instant::now();
        thread::sleep(self.options.settle_delay);

        loop {
            let views = self.compositor.list_views()?;
            if let Some(view) = views.iter().find(|v| v.pid == i64::from(pid)) {
                log::debug!("pid {} mapped as view {}", pid, view.id);
                return Ok(view.id);
            }

            let waited = started.elapsed();
            if waited >= self.options.placement_timeout {
                return Err(SessionError::PlacementTimeout { pid, waited });
            }
            thread::sleep(self.options.poll_interval.min(self.options.placement_timeout - waited));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Geometry, View, ViewWorkspace};
    use serde_json::Map;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        SetWorkspace(WorkspaceCoords, Option<u64>),
        Run(String),
        ListViews,
        Maximize(u64),
    }

    /// In-memory compositor: each launch maps a view after `map_after` scans
    struct FakeCompositor {
        calls: Vec<Call>,
        views: Vec<View>,
        next_pid: u32,
        return_pid: bool,
        map_after: Option<usize>,
        pending: Vec<(u32, usize)>,
        fail_ipc: bool,
        /// Number of upcoming maximize requests the compositor refuses
        reject_maximize: usize,
    }

    impl FakeCompositor {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                views: Vec::new(),
                next_pid: 4242,
                return_pid: true,
                map_after: Some(0),
                pending: Vec::new(),
                fail_ipc: false,
                reject_maximize: 0,
            }
        }

        fn launches(&self) -> usize {
            self.calls.iter().filter(|c| matches!(c, Call::Run(_))).count()
        }

        fn without_scans(&self) -> Vec<Call> {
            self.calls
                .iter()
                .filter(|c| !matches!(c, Call::ListViews))
                .cloned()
                .collect()
        }
    }

    impl Compositor for FakeCompositor {
        fn list_views(&mut self) -> std::io::Result<Vec<View>> {
            self.calls.push(Call::ListViews);
            let mut still_pending = Vec::new();
            for (pid, remaining) in self.pending.drain(..) {
                if remaining == 0 {
                    self.views.push(View {
                        id: u64::from(pid) + 1000,
                        pid: i64::from(pid),
                        app_id: "app".to_string(),
                        title: String::new(),
                        geometry: Geometry::default(),
                        output_id: Some(1),
                        role: "toplevel".to_string(),
                        mapped: true,
                        minimized: false,
                        extra: Map::new(),
                    });
                } else {
                    still_pending.push((pid, remaining - 1));
                }
            }
            self.pending = still_pending;
            Ok(self.views.clone())
        }

        fn workspaces_with_views(&mut self) -> std::io::Result<Vec<ViewWorkspace>> {
            Ok(Vec::new())
        }

        fn set_workspace(
            &mut self,
            ws: WorkspaceCoords,
            view_id: Option<u64>,
        ) -> std::io::Result<()> {
            if self.fail_ipc {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
            }
            self.calls.push(Call::SetWorkspace(ws, view_id));
            Ok(())
        }

        fn maximize(&mut self, view_id: u64) -> std::io::Result<()> {
            self.calls.push(Call::Maximize(view_id));
            if self.reject_maximize > 0 {
                self.reject_maximize -= 1;
                return Err(std::io::Error::other("grid/slot_c failed: No such view"));
            }
            Ok(())
        }

        fn run(&mut self, cmdline: &str) -> std::io::Result<Option<u32>> {
            self.calls.push(Call::Run(cmdline.to_string()));
            if !self.return_pid {
                return Ok(None);
            }
            let pid = self.next_pid;
            self.next_pid += 1;
            if let Some(scans) = self.map_after {
                self.pending.push((pid, scans));
            }
            Ok(Some(pid))
        }
    }

    fn fast() -> ReplayOptions {
        ReplayOptions {
            settle_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            placement_timeout: Duration::from_millis(200),
        }
    }

    fn record(cmdline: &[&str], workspace: Option<(i32, i32)>) -> ViewRecord {
        ViewRecord {
            cmdline: Some(cmdline.iter().map(|s| s.to_string()).collect()),
            workspace: workspace.map(|(x, y)| WorkspaceCoords::new(x, y)),
            ..Default::default()
        }
    }

    #[test]
    fn test_replay_single_record() {
        let mut compositor = FakeCompositor::new();
        let report = SessionReplayer::new(&mut compositor, fast())
            .start(&[record(&["xterm"], Some((1, 0)))])
            .unwrap();

        assert_eq!(report.placed, vec![5242]);
        assert!(report.is_success());

        let ws = WorkspaceCoords::new(1, 0);
        assert_eq!(
            compositor.without_scans(),
            vec![
                Call::SetWorkspace(ws, None),
                Call::Run("xterm".to_string()),
                Call::Maximize(5242),
                Call::SetWorkspace(ws, Some(5242)),
                Call::Maximize(5242),
            ]
        );
    }

    #[test]
    fn test_replay_skips_record_without_workspace() {
        let mut compositor = FakeCompositor::new();
        let report = SessionReplayer::new(&mut compositor, fast())
            .start(&[record(&["xterm"], None)])
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert!(compositor.calls.is_empty());
    }

    #[test]
    fn test_replay_skips_record_without_cmdline() {
        let mut compositor = FakeCompositor::new();
        let mut no_cmdline = record(&[], Some((0, 0)));
        let report = SessionReplayer::new(&mut compositor, fast())
            .start(&[no_cmdline.clone()])
            .unwrap();
        assert_eq!(report.skipped, 1);

        no_cmdline.cmdline = None;
        SessionReplayer::new(&mut compositor, fast())
            .start(&[no_cmdline])
            .unwrap();
        assert_eq!(compositor.launches(), 0);
    }

    #[test]
    fn test_launch_count_bounded_by_workspace_records() {
        let records = vec![
            record(&["a"], Some((0, 0))),
            record(&["b"], None),
            record(&["c"], Some((2, 1))),
            record(&["d"], None),
        ];
        let mut compositor = FakeCompositor::new();
        let report = SessionReplayer::new(&mut compositor, fast())
            .start(&records)
            .unwrap();

        assert_eq!(compositor.launches(), 2);
        assert_eq!(report.placed.len(), 2);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn test_replay_waits_for_late_view() {
        let mut compositor = FakeCompositor::new();
        compositor.map_after = Some(3);
        let report = SessionReplayer::new(&mut compositor, fast())
            .start(&[record(&["slow-app"], Some((0, 1)))])
            .unwrap();

        assert_eq!(report.placed, vec![5242]);
        let scans = compositor.calls.iter().filter(|c| **c == Call::ListViews).count();
        assert_eq!(scans, 4);
    }

    #[test]
    fn test_replay_times_out_and_continues() {
        let mut compositor = FakeCompositor::new();
        compositor.map_after = None;
        let options = ReplayOptions {
            placement_timeout: Duration::from_millis(30),
            ..fast()
        };
        let report = SessionReplayer::new(&mut compositor, options)
            .start(&[record(&["never"], Some((0, 0))), record(&["also-never"], Some((1, 1)))])
            .unwrap();

        assert!(report.placed.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0],
            SessionError::PlacementTimeout { pid: 4242, .. }
        ));
        assert!(!compositor.calls.iter().any(|c| matches!(c, Call::Maximize(_))));
    }

    #[test]
    fn test_replay_without_pid() {
        let mut compositor = FakeCompositor::new();
        compositor.return_pid = false;
        let report = SessionReplayer::new(&mut compositor, fast())
            .start(&[record(&["xterm"], Some((0, 0)))])
            .unwrap();

        assert!(matches!(report.failures[0], SessionError::Launch { .. }));
        assert!(!compositor.calls.contains(&Call::ListViews));
    }

    #[test]
    fn test_replay_aborts_on_ipc_failure() {
        let mut compositor = FakeCompositor::new();
        compositor.fail_ipc = true;
        let result = SessionReplayer::new(&mut compositor, fast())
            .start(&[record(&["xterm"], Some((0, 0)))]);
        assert!(matches!(result, Err(SessionError::Ipc(_))));
    }

    #[test]
    fn test_replay_continues_after_rejected_request() {
        let mut compositor = FakeCompositor::new();
        compositor.reject_maximize = 1;
        let report = SessionReplayer::new(&mut compositor, fast())
            .start(&[record(&["splash"], Some((0, 0))), record(&["xterm"], Some((1, 0)))])
            .unwrap();

        assert_eq!(compositor.launches(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], SessionError::Rejected(_)));
        assert_eq!(report.placed, vec![5243]);
    }

    #[test]
    fn test_pending_launch_quotes_arguments() {
        let foot = record(&["foot", "--title", "two words"], Some((0, 0)));
        let launch = PendingLaunch::from_record(&foot).unwrap();
        assert_eq!(launch.command, "foot --title 'two words'");
    }

    #[test]
    fn test_empty_session() {
        let mut compositor = FakeCompositor::new();
        let report = SessionReplayer::new(&mut compositor, fast()).start(&[]).unwrap();
        assert!(report.placed.is_empty());
        assert_eq!(report.skipped, 0);
        assert!(compositor.calls.is_empty());
    }
}
