//! Action handling.
//!
//! `Ctl` owns the compositor connection for one invocation and carries out
//! the actions parsed from the command line.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cli::{Action, DpmsAction, PluginAction, SessionAction};
use crate::config::Config;
use crate::ipc::{Compositor, WayfireSocket};
use crate::process::{self, ProcFs};
use crate::replay::SessionReplayer;
use crate::session::SessionStore;
use crate::types::{View, WorkspaceCoords};

/// Option holding the space-separated list of loaded plugins
const PLUGINS_OPTION: &str = "core/plugins";

/// Plugins that stay loaded during `reload all` so wayctl can restore the list
const IPC_PLUGINS: [&str; 3] = ["ipc", "ipc-rules", "stipc"];

pub struct Ctl {
    pub(crate) sock: WayfireSocket,
    pub(crate) config: Config,
    raw: bool,
}

impl Ctl {
    pub fn new(sock: WayfireSocket, config: Config, raw: bool) -> Self {
        Self { sock, config, raw }
    }

    /// Carry out one action
    pub fn handle(&mut self, action: Action) -> Result<()> {
        log::debug!("Handling action: {:?}", action);

        match action {
            Action::ViewFocused => {
                let view = self.sock.get_focused_view()?;
                self.print_view(&view)
            }
            Action::ViewList { has_title } => self.view_list(has_title.as_deref()),
            Action::Dpms(dpms) => self.dpms(dpms),
            Action::ColorPicker => {
                let color = self.pick_color()?;
                println!("{}", color);
                Ok(())
            }
            Action::Screenshot(target) => self.screenshot(target),
            Action::MoveFocusedView { x, y } => {
                let view = self.sock.get_focused_view()?;
                self.sock
                    .set_workspace(WorkspaceCoords::new(x, y), Some(view.id))
                    .with_context(|| format!("Failed to move view {} to ({}, {})", view.id, x, y))
            }
            Action::Session(SessionAction::Save) => self.save_session(),
            Action::Session(SessionAction::Start) => self.start_session(),
            Action::MoveCursor { x, y } => Ok(self.sock.move_cursor(x, y)?),
            Action::Plugin(plugin) => self.plugin(plugin),
            Action::Drop { command } => self.toggle_dropdown(&command),
            Action::OutputFocused => {
                let output = self.sock.get_focused_output()?;
                println!("{}", self.to_json(&output)?);
                Ok(())
            }
            Action::OutputViews => {
                let output = self.sock.get_focused_output()?;
                let views: Vec<View> = self
                    .sock
                    .list_views()?
                    .into_iter()
                    .filter(|v| v.output_id == Some(output.id))
                    .collect();
                println!("{}", self.to_json(&views)?);
                Ok(())
            }
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.raw {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json)
    }

    fn print_view(&self, view: &View) -> Result<()> {
        println!("[{}: {}]", view.app_id, view.title);
        println!("{}", self.to_json(view)?);
        println!("\n");
        Ok(())
    }

    /// Every view except the focused one, optionally filtered by title
    fn view_list(&mut self, has_title: Option<&str>) -> Result<()> {
        let views = self.sock.list_views()?;
        let focused = self.sock.get_focused_view().ok().map(|v| v.id);
        for view in filter_views(&views, focused, has_title) {
            self.print_view(view)?;
        }
        Ok(())
    }

    fn save_session(&mut self) -> Result<()> {
        let store = SessionStore::new(self.config.session.path());
        let views = self.sock.list_views()?;
        let workspaces = self.sock.workspaces_with_views()?;
        let report = store.save(&views, &workspaces, &ProcFs::new())?;
        println!(
            "Saved {} views to {}",
            report.written,
            store.path().display()
        );
        Ok(())
    }

    fn start_session(&mut self) -> Result<()> {
        let store = SessionStore::new(self.config.session.path());
        let records = store.load()?;
        let options = self.config.session.replay_options();
        let report = SessionReplayer::new(&mut self.sock, options).start(&records)?;

        println!(
            "Restored {} views ({} skipped, {} failed)",
            report.placed.len(),
            report.skipped,
            report.failures.len()
        );
        if !report.is_success() {
            for failure in &report.failures {
                eprintln!("{}", failure);
            }
            bail!("{} session records could not be restored", report.failures.len());
        }
        Ok(())
    }

    fn dpms(&mut self, action: DpmsAction) -> Result<()> {
        match action {
            DpmsAction::On(output) => wlopm("--on", &output),
            DpmsAction::Off(Some(output)) => wlopm("--off", &output),
            DpmsAction::Off(None) | DpmsAction::OffAll => self.dpms_all("--off"),
            DpmsAction::OnAll => self.dpms_all("--on"),
            DpmsAction::OffAfter { output, delay } => {
                log::info!("Turning {} off in {} s", output, delay.as_secs());
                std::thread::sleep(delay);
                wlopm("--off", &output)
            }
            DpmsAction::Toggle => {
                let output = self.sock.get_focused_output()?;
                wlopm("--toggle", &output.name)
            }
        }
    }

    fn dpms_all(&mut self, mode: &str) -> Result<()> {
        for output in self.sock.list_outputs()? {
            wlopm(mode, &output.name)?;
        }
        Ok(())
    }

    fn enabled_plugins(&mut self) -> Result<Vec<String>> {
        let value = self.sock.get_option(PLUGINS_OPTION)?;
        Ok(value.split_whitespace().map(str::to_string).collect())
    }

    fn set_plugins(&mut self, plugins: &[String]) -> Result<()> {
        let value = plugins.join(" ");
        log::info!("Setting {} to '{}'", PLUGINS_OPTION, value);
        let mut options = Map::new();
        options.insert(PLUGINS_OPTION.to_string(), Value::String(value));
        self.sock
            .set_options(Value::Object(options))
            .context("Failed to update plugin list")
    }

    fn plugin(&mut self, action: PluginAction) -> Result<()> {
        let enabled = self.enabled_plugins()?;
        match action {
            PluginAction::List => {
                println!("Enabled plugins:");
                for plugin in &enabled {
                    println!("{}", plugin);
                }
                Ok(())
            }
            PluginAction::Enable(name) => self.set_plugins(&with_plugin(&enabled, &name)),
            PluginAction::Disable(name) => self.set_plugins(&without_plugin(&enabled, &name)),
            PluginAction::Reload(name) => {
                if !enabled.contains(&name) {
                    bail!("Plugin '{}' is not enabled", name);
                }
                self.set_plugins(&without_plugin(&enabled, &name))?;
                self.set_plugins(&enabled)
            }
            PluginAction::ReloadAll => {
                let kept: Vec<String> = enabled
                    .iter()
                    .filter(|p| IPC_PLUGINS.contains(&p.as_str()))
                    .cloned()
                    .collect();
                self.set_plugins(&kept)?;
                self.set_plugins(&enabled)
            }
        }
    }
}

fn wlopm(mode: &str, output: &str) -> Result<()> {
    process::run_status("wlopm", &[mode, output])
        .with_context(|| format!("wlopm {} {} failed", mode, output))
}

/// Views other than the focused one whose title contains `has_title`
/// (case-insensitive)
pub fn filter_views<'a>(
    views: &'a [View],
    focused: Option<u64>,
    has_title: Option<&str>,
) -> Vec<&'a View> {
    let needle = has_title.map(str::to_lowercase);
    views
        .iter()
        .filter(|v| Some(v.id) != focused)
        .filter(|v| match &needle {
            Some(needle) => v.title.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .collect()
}

/// Plugin list with `name` appended unless already present
pub fn with_plugin(enabled: &[String], name: &str) -> Vec<String> {
    let mut plugins = enabled.to_vec();
    if !plugins.iter().any(|p| p == name) {
        plugins.push(name.to_string());
    }
    plugins
}

/// Plugin list with every occurrence of `name` removed
pub fn without_plugin(enabled: &[String], name: &str) -> Vec<String> {
    enabled.iter().filter(|p| *p != name).cloned().collect()
}
