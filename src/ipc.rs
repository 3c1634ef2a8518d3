//! IPC client for the Wayfire compositor.
//!
//! Wayfire's `ipc` plugin listens on a Unix socket (advertised through
//! `$WAYFIRE_SOCKET`). Every message in either direction is a 4-byte
//! little-endian length followed by that many bytes of JSON. Requests look
//! like `{"method": "window-rules/list-views", "data": {...}}`; a reply
//! carrying an `error` key is a failure.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::types::{self, Geometry, Output, View, ViewWorkspace, WorkspaceCoords};

/// Replies larger than this are treated as a corrupt length header
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Environment variable Wayfire exports to its clients
pub const SOCKET_ENV: &str = "WAYFIRE_SOCKET";

/// Get the socket path from the environment
pub fn socket_path() -> std::io::Result<PathBuf> {
    std::env::var_os(SOCKET_ENV)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not set. Is Wayfire running with the ipc plugin?", SOCKET_ENV),
            )
        })
}

/// Whether an error means the connection itself is unusable.
///
/// Errors the compositor reports in a reply (`{"error": ...}`) come back as
/// `ErrorKind::Other` and leave the socket in sync; these kinds do not.
pub fn is_transport_error(e: &std::io::Error) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        e.kind(),
        BrokenPipe
            | UnexpectedEof
            | ConnectionReset
            | ConnectionAborted
            | NotConnected
            | TimedOut
            | WouldBlock
    )
}

/// The compositor operations session replay depends on.
///
/// `WayfireSocket` is the real implementation; tests drive the replayer with
/// an in-memory fake.
pub trait Compositor {
    /// All views currently known to the compositor
    fn list_views(&mut self) -> std::io::Result<Vec<View>>;

    /// Workspace coordinates of every view whose workspace can be derived
    fn workspaces_with_views(&mut self) -> std::io::Result<Vec<ViewWorkspace>>;

    /// Switch to a workspace; with a view id, move that view there too
    fn set_workspace(&mut self, ws: WorkspaceCoords, view_id: Option<u64>) -> std::io::Result<()>;

    /// Maximize a view
    fn maximize(&mut self, view_id: u64) -> std::io::Result<()>;

    /// Run a shell command line inside the compositor, returning its pid
    fn run(&mut self, cmdline: &str) -> std::io::Result<Option<u32>>;
}

/// Write one length-prefixed message
pub fn write_message(stream: &mut impl Write, message: &Value) -> std::io::Result<()> {
    let payload = serde_json::to_vec(message)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "IPC message too large")
    })?;
    stream.write_all(&len.to_le_bytes())?;
    stream.write_all(&payload)?;
    stream.flush()
}

/// Read one length-prefixed message
pub fn read_message(stream: &mut impl Read) -> std::io::Result<Value> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("IPC message too large: {} bytes", len),
        ));
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    serde_json::from_slice(&payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Connection to the Wayfire IPC socket
pub struct WayfireSocket {
    stream: UnixStream,
}

impl WayfireSocket {
    /// Connect to the socket named by `$WAYFIRE_SOCKET`
    pub fn connect() -> std::io::Result<Self> {
        Self::connect_to(&socket_path()?)
    }

    /// Connect to an explicit socket path
    pub fn connect_to(path: &Path) -> std::io::Result<Self> {
        let stream = UnixStream::connect(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to connect to Wayfire at {:?}: {}", path, e),
            )
        })?;

        stream.set_read_timeout(Some(Duration::from_secs(10)))?;
        stream.set_write_timeout(Some(Duration::from_secs(5)))?;

        log::debug!("Connected to Wayfire IPC at {:?}", path);
        Ok(Self { stream })
    }

    /// Send a request and return the raw reply
    pub fn call(&mut self, method: &str, data: Value) -> std::io::Result<Value> {
        log::debug!("IPC request {} {}", method, data);
        write_message(&mut self.stream, &json!({ "method": method, "data": data }))?;
        let reply = read_message(&mut self.stream)?;

        if let Some(error) = reply.get("error") {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(std::io::Error::other(format!("{} failed: {}", method, message)));
        }
        Ok(reply)
    }

    fn call_as<T: DeserializeOwned>(&mut self, method: &str, data: Value) -> std::io::Result<T> {
        let reply = self.call(method, data)?;
        serde_json::from_value(reply)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Unwrap the `info` object several window-rules replies nest their payload in
    fn call_info<T: DeserializeOwned>(&mut self, method: &str, data: Value) -> std::io::Result<T> {
        let mut reply = self.call(method, data)?;
        let info = reply
            .get_mut("info")
            .map(Value::take)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("{} reply has no info", method),
                )
            })?;
        serde_json::from_value(info)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn get_focused_view(&mut self) -> std::io::Result<View> {
        self.call_info("window-rules/get-focused-view", json!({}))
    }

    pub fn list_outputs(&mut self) -> std::io::Result<Vec<Output>> {
        self.call_as("window-rules/list-outputs", json!({}))
    }

    pub fn get_focused_output(&mut self) -> std::io::Result<Output> {
        self.call_info("window-rules/get-focused-output", json!({}))
    }

    pub fn configure_view(&mut self, view_id: u64, geometry: Geometry) -> std::io::Result<()> {
        self.call(
            "window-rules/configure-view",
            json!({ "id": view_id, "geometry": geometry }),
        )
        .map(drop)
    }

    pub fn set_minimized(&mut self, view_id: u64, state: bool) -> std::io::Result<()> {
        self.call("wm-actions/set-minimized", json!({ "view_id": view_id, "state": state }))
            .map(drop)
    }

    pub fn set_sticky(&mut self, view_id: u64, state: bool) -> std::io::Result<()> {
        self.call("wm-actions/set-sticky", json!({ "view_id": view_id, "state": state }))
            .map(drop)
    }

    pub fn set_always_on_top(&mut self, view_id: u64, state: bool) -> std::io::Result<()> {
        self.call(
            "wm-actions/set-always-on-top",
            json!({ "view_id": view_id, "state": state }),
        )
        .map(drop)
    }

    pub fn set_fullscreen(&mut self, view_id: u64, state: bool) -> std::io::Result<()> {
        self.call("wm-actions/set-fullscreen", json!({ "view_id": view_id, "state": state }))
            .map(drop)
    }

    pub fn move_cursor(&mut self, x: i32, y: i32) -> std::io::Result<()> {
        self.call("stipc/move_cursor", json!({ "x": x, "y": y })).map(drop)
    }

    /// Ask the view-shot plugin to write a view's contents to `file`
    pub fn capture_view(&mut self, view_id: u64, file: &Path) -> std::io::Result<()> {
        self.call(
            "view-shot/capture",
            json!({ "view-id": view_id, "file": file.to_string_lossy() }),
        )
        .map(drop)
    }

    /// Read a configuration option such as `core/plugins`
    pub fn get_option(&mut self, option: &str) -> std::io::Result<String> {
        let reply = self.call("wayfire/get-config-option", json!({ "option": option }))?;
        match reply.get("value") {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("option {} has no value", option),
            )),
        }
    }

    /// Set configuration options, e.g. `{"core/plugins": "..."}`
    pub fn set_options(&mut self, options: Value) -> std::io::Result<()> {
        self.call("wayfire/set-config-options", options).map(drop)
    }
}

impl Compositor for WayfireSocket {
    fn list_views(&mut self) -> std::io::Result<Vec<View>> {
        self.call_as("window-rules/list-views", json!({}))
    }

    fn workspaces_with_views(&mut self) -> std::io::Result<Vec<ViewWorkspace>> {
        let outputs = self.list_outputs()?;
        let views = self.list_views()?;
        Ok(types::workspaces_with_views(&views, &outputs))
    }

    fn set_workspace(&mut self, ws: WorkspaceCoords, view_id: Option<u64>) -> std::io::Result<()> {
        let output = self.get_focused_output()?;
        let mut data = json!({ "x": ws.x, "y": ws.y, "output-id": output.id });
        if let Some(id) = view_id {
            data["view-id"] = json!(id);
        }
        self.call("vswitch/set-workspace", data).map(drop)
    }

    fn maximize(&mut self, view_id: u64) -> std::io::Result<()> {
        // The grid plugin's center slot fills the whole workarea
        self.call("grid/slot_c", json!({ "view_id": view_id })).map(drop)
    }

    fn run(&mut self, cmdline: &str) -> std::io::Result<Option<u32>> {
        let reply = self.call("stipc/run", json!({ "cmd": cmdline }))?;
        Ok(reply
            .get("pid")
            .and_then(Value::as_i64)
            .filter(|pid| *pid > 0)
            .and_then(|pid| u32::try_from(pid).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::os::unix::net::UnixListener;
    use std::thread;

    #[test]
    fn test_message_framing() {
        let mut buf = Vec::new();
        write_message(&mut buf, &json!({"method": "window-rules/list-views", "data": {}})).unwrap();

        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(len, buf.len() - 4);

        let value = read_message(&mut Cursor::new(buf)).unwrap();
        assert_eq!(value["method"], "window-rules/list-views");
    }

    #[test]
    fn test_read_rejects_oversized_header() {
        let mut buf = (u32::MAX).to_le_bytes().to_vec();
        buf.extend_from_slice(b"{}");
        let err = read_message(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_read_truncated_message() {
        let mut buf = 10u32.to_le_bytes().to_vec();
        buf.extend_from_slice(b"{}");
        let err = read_message(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    /// Serve canned replies for each request on one connection
    fn serve(replies: Vec<Value>) -> (tempfile::TempDir, PathBuf, thread::JoinHandle<Vec<Value>>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wayfire.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut requests = Vec::new();
            for reply in replies {
                requests.push(read_message(&mut stream).unwrap());
                write_message(&mut stream, &reply).unwrap();
            }
            requests
        });
        (dir, path, handle)
    }

    #[test]
    fn test_run_returns_pid() {
        let (_dir, path, handle) = serve(vec![json!({"result": "ok", "pid": 4242})]);
        let mut sock = WayfireSocket::connect_to(&path).unwrap();
        assert_eq!(sock.run("xterm").unwrap(), Some(4242));

        let requests = handle.join().unwrap();
        assert_eq!(requests[0]["method"], "stipc/run");
        assert_eq!(requests[0]["data"]["cmd"], "xterm");
    }

    #[test]
    fn test_run_without_pid() {
        let (_dir, path, handle) = serve(vec![json!({"result": "ok", "pid": 0})]);
        let mut sock = WayfireSocket::connect_to(&path).unwrap();
        assert_eq!(sock.run("false").unwrap(), None);
        handle.join().unwrap();
    }

    #[test]
    fn test_error_reply() {
        let (_dir, path, handle) = serve(vec![json!({"error": "No such view"})]);
        let mut sock = WayfireSocket::connect_to(&path).unwrap();
        let err = sock.maximize(99).unwrap_err();
        assert!(err.to_string().contains("No such view"));
        assert!(err.to_string().contains("grid/slot_c"));
        handle.join().unwrap();
    }

    #[test]
    fn test_set_workspace_for_view() {
        let (_dir, path, handle) = serve(vec![
            json!({"info": {"id": 3, "name": "DP-1"}}),
            json!({"result": "ok"}),
        ]);
        let mut sock = WayfireSocket::connect_to(&path).unwrap();
        sock.set_workspace(WorkspaceCoords::new(1, 0), Some(77)).unwrap();

        let requests = handle.join().unwrap();
        assert_eq!(requests[0]["method"], "window-rules/get-focused-output");
        assert_eq!(requests[1]["method"], "vswitch/set-workspace");
        assert_eq!(requests[1]["data"], json!({"x": 1, "y": 0, "output-id": 3, "view-id": 77}));
    }

    #[test]
    fn test_transport_errors() {
        let rejected = std::io::Error::other("grid/slot_c failed: No such view");
        assert!(!is_transport_error(&rejected));
        let gone = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(is_transport_error(&gone));
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(is_transport_error(&eof));
    }

    #[test]
    fn test_error_reply_is_not_transport_error() {
        let (_dir, path, handle) = serve(vec![json!({"error": "Workspace out of range"})]);
        let mut sock = WayfireSocket::connect_to(&path).unwrap();
        let err = sock
            .set_workspace(WorkspaceCoords::new(9, 9), None)
            .unwrap_err();
        assert!(!is_transport_error(&err));
        handle.join().unwrap();
    }

    #[test]
    fn test_get_option() {
        let (_dir, path, handle) = serve(vec![json!({"value": "grid vswitch ipc"})]);
        let mut sock = WayfireSocket::connect_to(&path).unwrap();
        assert_eq!(sock.get_option("core/plugins").unwrap(), "grid vswitch ipc");
        handle.join().unwrap();
    }
}
