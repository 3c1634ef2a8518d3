//! Shared types used across multiple modules.
//!
//! These mirror the JSON objects Wayfire returns over IPC. Field names
//! follow Wayfire's kebab-case spelling on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A rectangle as reported by the compositor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Center X coordinate
    pub fn center_x(&self) -> i32 {
        self.x + self.width / 2
    }

    /// Center Y coordinate
    pub fn center_y(&self) -> i32 {
        self.y + self.height / 2
    }

    /// A rectangle of the given size centered inside `self`
    pub fn centered(&self, width: i32, height: i32) -> Geometry {
        Geometry::new(self.center_x() - width / 2, self.center_y() - height / 2, width, height)
    }
}

/// Workspace grid coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceCoords {
    pub x: i32,
    pub y: i32,
}

impl WorkspaceCoords {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A view as listed by `window-rules/list-views`.
///
/// Only the fields wayctl acts on are typed; everything else the compositor
/// sends is kept in `extra` so it survives a print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: u64,
    #[serde(default)]
    pub pid: i64,
    #[serde(rename = "app-id", default)]
    pub app_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(rename = "output-id", default, skip_serializing_if = "Option::is_none")]
    pub output_id: Option<u64>,
    #[serde(default)]
    pub role: String,
    #[serde(default = "default_true")]
    pub mapped: bool,
    #[serde(default)]
    pub minimized: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

impl View {
    /// Regular application window (not a panel, background or popup)
    pub fn is_toplevel(&self) -> bool {
        self.role.is_empty() || self.role == "toplevel"
    }
}

/// Workspace state of an output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputWorkspace {
    pub x: i32,
    pub y: i32,
    pub grid_width: i32,
    pub grid_height: i32,
}

/// An output as listed by `window-rules/list-outputs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub workarea: Geometry,
    #[serde(default)]
    pub workspace: OutputWorkspace,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Output {
    /// Workspace holding a rectangle given in output-local coordinates.
    ///
    /// View coordinates are relative to the output's current workspace, so a
    /// view one output-width to the right lives one workspace to the right.
    /// The result is clamped to the workspace grid.
    pub fn workspace_containing(&self, rect: &Geometry) -> WorkspaceCoords {
        let width = self.geometry.width.max(1);
        let height = self.geometry.height.max(1);
        let dx = rect.center_x().div_euclid(width);
        let dy = rect.center_y().div_euclid(height);
        let max_x = (self.workspace.grid_width - 1).max(0);
        let max_y = (self.workspace.grid_height - 1).max(0);
        WorkspaceCoords {
            x: (self.workspace.x + dx).clamp(0, max_x),
            y: (self.workspace.y + dy).clamp(0, max_y),
        }
    }
}

/// A view paired with the workspace it occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewWorkspace {
    #[serde(rename = "view-id")]
    pub view_id: u64,
    pub x: i32,
    pub y: i32,
}

impl ViewWorkspace {
    pub fn coords(&self) -> WorkspaceCoords {
        WorkspaceCoords::new(self.x, self.y)
    }
}

/// Map every view onto the workspace it occupies.
///
/// Views on an unknown output, unmapped views and views without an output
/// are left out.
pub fn workspaces_with_views(views: &[View], outputs: &[Output]) -> Vec<ViewWorkspace> {
    views
        .iter()
        .filter(|v| v.mapped)
        .filter_map(|view| {
            let output = outputs.iter().find(|o| Some(o.id) == view.output_id)?;
            let ws = output.workspace_containing(&view.geometry);
            Some(ViewWorkspace {
                view_id: view.id,
                x: ws.x,
                y: ws.y,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(id: u64, ws_x: i32, ws_y: i32) -> Output {
        Output {
            id,
            name: format!("DP-{}", id),
            geometry: Geometry::new(0, 0, 1920, 1080),
            workarea: Geometry::new(0, 30, 1920, 1050),
            workspace: OutputWorkspace {
                x: ws_x,
                y: ws_y,
                grid_width: 3,
                grid_height: 3,
            },
            extra: Map::new(),
        }
    }

    fn view(id: u64, output_id: u64, geometry: Geometry) -> View {
        View {
            id,
            pid: 100 + id as i64,
            app_id: "foot".to_string(),
            title: "shell".to_string(),
            geometry,
            output_id: Some(output_id),
            role: "toplevel".to_string(),
            mapped: true,
            minimized: false,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_view_deserialization_keeps_unknown_fields() {
        let json = r#"{
            "id": 7, "pid": 1234, "app-id": "firefox", "title": "Mozilla",
            "geometry": {"x": 10, "y": 20, "width": 800, "height": 600},
            "output-id": 1, "role": "toplevel", "activated": true
        }"#;
        let view: View = serde_json::from_str(json).unwrap();
        assert_eq!(view.id, 7);
        assert_eq!(view.app_id, "firefox");
        assert_eq!(view.output_id, Some(1));
        assert!(view.mapped);
        assert_eq!(view.extra.get("activated"), Some(&Value::Bool(true)));

        let back = serde_json::to_value(&view).unwrap();
        assert_eq!(back["app-id"], "firefox");
        assert_eq!(back["activated"], true);
    }

    #[test]
    fn test_is_toplevel() {
        let mut v = view(1, 1, Geometry::default());
        assert!(v.is_toplevel());
        v.role = "desktop-environment".to_string();
        assert!(!v.is_toplevel());
        v.role.clear();
        assert!(v.is_toplevel());
    }

    #[test]
    fn test_workspace_containing_current() {
        let out = output(1, 1, 0);
        let ws = out.workspace_containing(&Geometry::new(100, 100, 800, 600));
        assert_eq!(ws, WorkspaceCoords::new(1, 0));
    }

    #[test]
    fn test_workspace_containing_offsets() {
        let out = output(1, 1, 1);
        // One output to the right
        let ws = out.workspace_containing(&Geometry::new(2000, 100, 800, 600));
        assert_eq!(ws, WorkspaceCoords::new(2, 1));
        // One output to the left and one up
        let ws = out.workspace_containing(&Geometry::new(-1800, -900, 800, 600));
        assert_eq!(ws, WorkspaceCoords::new(0, 0));
    }

    #[test]
    fn test_workspace_containing_clamps_to_grid() {
        let out = output(1, 2, 2);
        let ws = out.workspace_containing(&Geometry::new(5000, 5000, 100, 100));
        assert_eq!(ws, WorkspaceCoords::new(2, 2));
    }

    #[test]
    fn test_workspaces_with_views_skips_unknown_output() {
        let outputs = vec![output(1, 0, 0)];
        let views = vec![
            view(10, 1, Geometry::new(0, 0, 100, 100)),
            view(11, 9, Geometry::new(0, 0, 100, 100)),
        ];
        let ws = workspaces_with_views(&views, &outputs);
        assert_eq!(ws.len(), 1);
        assert_eq!(ws[0].view_id, 10);
        assert_eq!(ws[0].coords(), WorkspaceCoords::new(0, 0));
    }

    #[test]
    fn test_centered() {
        let area = Geometry::new(0, 30, 1920, 1050);
        let g = area.centered(1000, 600);
        assert_eq!(g, Geometry::new(460, 255, 1000, 600));
    }
}
