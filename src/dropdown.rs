//! Dropdown ("guake style") views.
//!
//! `wayctl --drop foot` shows a foot window centered on the focused output,
//! hides it when it is shown, and starts it if it is not running.

use std::thread;

use anyhow::{bail, Result};

use crate::actions::Ctl;
use crate::config::DropdownConfig;
use crate::ipc::Compositor;
use crate::process;
use crate::types::{Geometry, View};

/// Minimized and visible views of the dropdown app
#[derive(Debug, Default)]
pub struct DropdownViews {
    pub hidden: Option<View>,
    pub shown: Option<View>,
}

impl DropdownViews {
    /// Views whose app id matches the command, case-insensitively
    pub fn find(views: Vec<View>, command: &str) -> Self {
        let wanted = command.to_lowercase();
        let mut found = Self::default();
        for view in views {
            if view.app_id.to_lowercase() != wanted {
                continue;
            }
            if view.minimized {
                found.hidden = Some(view);
            } else {
                found.shown = Some(view);
            }
        }
        found
    }
}

/// Where a dropdown view goes inside the output's workarea, if resizing is on
pub fn dropdown_geometry(config: &DropdownConfig, workarea: &Geometry) -> Option<Geometry> {
    if config.width == 0 || config.height == 0 {
        return None;
    }
    Some(workarea.centered(config.width, config.height))
}

impl Ctl {
    pub fn toggle_dropdown(&mut self, command: &str) -> Result<()> {
        let found = DropdownViews::find(self.sock.list_views()?, command);

        match found {
            DropdownViews { shown: Some(view), .. } => {
                log::info!("Hiding dropdown view {}", view.id);
                self.sock.set_minimized(view.id, true)?;
            }
            DropdownViews { hidden: Some(view), .. } => self.show_dropdown(&view)?,
            DropdownViews { hidden: None, shown: None } => {
                process::spawn_command_line(command)?;
                thread::sleep(self.config.session.settle_delay());

                match DropdownViews::find(self.sock.list_views()?, command) {
                    DropdownViews { shown: Some(view), .. } => self.show_dropdown(&view)?,
                    _ => bail!("Failed to start '{}': no view appeared", command),
                }
            }
        }
        Ok(())
    }

    fn show_dropdown(&mut self, view: &View) -> Result<()> {
        log::info!("Showing dropdown view {}", view.id);
        self.sock.set_minimized(view.id, false)?;

        let output = self.sock.get_focused_output()?;
        if let Some(geometry) = dropdown_geometry(&self.config.dropdown, &output.workarea) {
            self.sock.configure_view(view.id, geometry)?;
        }
        self.sock.set_sticky(view.id, self.config.dropdown.sticky)?;
        self.sock
            .set_always_on_top(view.id, self.config.dropdown.always_on_top)?;
        Ok(())
    }
}
