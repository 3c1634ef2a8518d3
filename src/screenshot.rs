//! Screenshots and the color picker.
//!
//! Views are captured by Wayfire's view-shot plugin; outputs and regions by
//! `grim`, with `slurp` for region selection. Finished files are opened with
//! the configured viewer.

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use image::ImageFormat;

use crate::actions::Ctl;
use crate::cli::ScreenshotTarget;
use crate::ipc::Compositor;
use crate::process;
use crate::types::View;

impl Ctl {
    pub fn screenshot(&mut self, target: ScreenshotTarget) -> Result<()> {
        match target {
            ScreenshotTarget::FocusedView => self.screenshot_focused_view(),
            ScreenshotTarget::Slurp => self.screenshot_slurp(),
            ScreenshotTarget::SlurpFocusedView => {
                // Meant for fullscreen games that hold the pointer: capture the
                // view, show the capture fullscreen, then select inside it
                self.screenshot_focused_view()?;
                thread::sleep(self.config.session.settle_delay());
                let viewer = self.sock.get_focused_view()?;
                self.sock.set_fullscreen(viewer.id, true)?;
                self.screenshot_slurp()
            }
            ScreenshotTarget::FocusedOutput => {
                let output = self.sock.get_focused_output()?;
                let path = self.screenshot_dir().join(format!("output-{}.png", output.name));
                remove_stale(&path)?;
                process::run_status("grim", &["-o", &output.name, &path.to_string_lossy()])?;
                self.open(&path)
            }
            ScreenshotTarget::AllOutputs => {
                let path = self.screenshot_dir().join("outputs-all.png");
                remove_stale(&path)?;
                process::run_status("grim", &[&path.to_string_lossy()])?;
                self.open(&path)
            }
            ScreenshotTarget::AllViews => {
                let dir = self.screenshot_dir().join("screenshots");
                recreate_dir(&dir)?;
                for view in self.sock.list_views()? {
                    let path = dir.join(format!("{}.png", view.id));
                    self.sock.capture_view(view.id, &path)?;
                }
                self.open(&dir)
            }
        }
    }

    fn screenshot_dir(&self) -> PathBuf {
        self.config.screenshot.directory()
    }

    fn open(&self, path: &Path) -> Result<()> {
        let viewer = &self.config.screenshot.viewer;
        process::spawn_detached(viewer, &[&path.to_string_lossy()])
            .with_context(|| format!("Failed to open {:?} with {}", path, viewer))
    }

    fn screenshot_focused_view(&mut self) -> Result<()> {
        let focused = self.sock.get_focused_view()?;
        let path = view_shot_path(&self.screenshot_dir(), &focused);
        remove_stale(&path)?;
        self.sock.capture_view(focused.id, &path)?;
        self.open(&path)
    }

    fn screenshot_slurp(&mut self) -> Result<()> {
        let region = select_region()?;
        let focused = self.sock.get_focused_view()?;
        let path = view_shot_path(&self.screenshot_dir(), &focused);
        remove_stale(&path)?;
        // grim must finish writing before the viewer opens the file
        process::run_status("grim", &["-g", &region, &path.to_string_lossy()])?;
        self.open(&path)
    }

    /// Select a region and return the color at its center as `#RRGGBB`,
    /// copying it to the clipboard
    pub fn pick_color(&mut self) -> Result<String> {
        let region = select_region()?;
        let ppm = process::run_output("grim", &["-g", &region, "-t", "ppm", "-"])?;
        let color = center_color(&ppm)?;
        process::spawn_detached("wl-copy", &[&color])?;
        Ok(color)
    }
}

/// Ask the user for a region with slurp
fn select_region() -> Result<String> {
    let out = process::run_output("slurp", &[])?;
    let region = String::from_utf8_lossy(&out).trim().to_string();
    if region.is_empty() {
        anyhow::bail!("No region selected");
    }
    Ok(region)
}

/// `<dir>/<app-id>-<id>.png`
pub fn view_shot_path(dir: &Path, view: &View) -> PathBuf {
    dir.join(format!("{}-{}.png", view.app_id, view.id))
}

fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path).with_context(|| format!("Failed to remove {:?}", path))?;
    }
    Ok(())
}

fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).with_context(|| format!("Failed to remove {:?}", dir))?;
    }
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))
}

/// Hex color of the center pixel of a PPM image
pub fn center_color(ppm: &[u8]) -> Result<String> {
    let img = image::load_from_memory_with_format(ppm, ImageFormat::Pnm)
        .context("Failed to decode grim output")?
        .to_rgb8();
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        anyhow::bail!("Empty capture");
    }
    let [r, g, b] = img.get_pixel(width / 2, height / 2).0;
    Ok(format!("#{:02X}{:02X}{:02X}", r, g, b))
}
