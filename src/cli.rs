//! Command-line surface.
//!
//! Every flag takes a few words (`--screenshot focused view`,
//! `--dpms off HDMI-A-1 timeout 30`), which are parsed into typed
//! [`Action`]s before anything talks to the compositor.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// wayctl - control parts of the Wayfire compositor from a script
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print views: `focused`, or `list [has_title <text>]`
    #[arg(long, num_args = 1.., value_name = "WORDS")]
    pub view: Option<Vec<String>>,

    /// Move the focused view: `set view focused <x> <y>`
    #[arg(long, num_args = 1.., value_name = "WORDS", allow_negative_numbers = true)]
    pub workspace: Option<Vec<String>>,

    /// Move the pointer to `<x> <y>`
    #[arg(
        long,
        alias = "move_cursor",
        num_args = 2,
        value_names = ["X", "Y"],
        allow_negative_numbers = true
    )]
    pub move_cursor: Option<Vec<String>>,

    /// Display power: `on <output>`, `off [<output> [timeout <secs>]]`, `on_all`, `off_all`, `toggle`
    #[arg(long, num_args = 1.., value_name = "WORDS")]
    pub dpms: Option<Vec<String>>,

    /// Print outputs: `focused`, or `list views` for the views on the focused output
    #[arg(long, num_args = 1.., value_name = "WORDS")]
    pub output: Option<Vec<String>>,

    /// Take a screenshot: `focused view`, `focused output`, `slurp`, `slurp focused view`, `output all`, `view all`
    #[arg(long, num_args = 1.., value_name = "WORDS")]
    pub screenshot: Option<Vec<String>>,

    /// Pick a color from a selected region and copy it to the clipboard
    #[arg(long)]
    pub colorpicker: bool,

    /// Session handling: `save` the current views, or `start` a saved session
    #[arg(long, num_args = 1, value_name = "save|start")]
    pub session: Option<String>,

    /// Plugins: `list`, `enable <name>`, `disable <name>`, `reload <name|all>`
    #[arg(long, num_args = 1.., value_name = "WORDS")]
    pub plugin: Option<Vec<String>>,

    /// Toggle a dropdown view running the given command
    #[arg(long, value_name = "COMMAND")]
    pub drop: Option<String>,

    /// Socket path (default: $WAYFIRE_SOCKET)
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    /// Config file (default: ~/.config/wayctl/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output raw JSON without pretty-printing
    #[arg(long, global = true)]
    pub raw: bool,
}

/// One thing wayctl was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ViewFocused,
    ViewList { has_title: Option<String> },
    Dpms(DpmsAction),
    ColorPicker,
    Screenshot(ScreenshotTarget),
    MoveFocusedView { x: i32, y: i32 },
    Session(SessionAction),
    MoveCursor { x: i32, y: i32 },
    Plugin(PluginAction),
    Drop { command: String },
    OutputFocused,
    OutputViews,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DpmsAction {
    On(String),
    /// Without an output: every output
    Off(Option<String>),
    OffAfter { output: String, delay: Duration },
    OnAll,
    OffAll,
    /// Toggle the focused output
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotTarget {
    FocusedView,
    FocusedOutput,
    Slurp,
    SlurpFocusedView,
    AllOutputs,
    AllViews,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Save,
    Start,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PluginAction {
    List,
    Enable(String),
    Disable(String),
    Reload(String),
    ReloadAll,
}

impl Cli {
    /// Translate the flags into actions, in execution order.
    ///
    /// `--view` is exclusive: when present nothing else runs.
    pub fn actions(&self) -> Result<Vec<Action>, String> {
        if let Some(words) = &self.view {
            return Ok(vec![parse_view(&words_of(words))?]);
        }

        let mut actions = Vec::new();
        if let Some(words) = &self.dpms {
            actions.push(Action::Dpms(parse_dpms(&words_of(words))?));
        }
        if self.colorpicker {
            actions.push(Action::ColorPicker);
        }
        if let Some(words) = &self.screenshot {
            actions.push(Action::Screenshot(parse_screenshot(&words_of(words))?));
        }
        if let Some(words) = &self.workspace {
            actions.push(parse_workspace(&words_of(words))?);
        }
        if let Some(word) = &self.session {
            actions.push(Action::Session(parse_session(word)?));
        }
        if let Some(words) = &self.move_cursor {
            let words = words_of(words);
            actions.push(Action::MoveCursor {
                x: parse_int(words[0], "x")?,
                y: parse_int(words[1], "y")?,
            });
        }
        if let Some(words) = &self.plugin {
            actions.push(Action::Plugin(parse_plugin(&words_of(words))?));
        }
        if let Some(command) = &self.drop {
            actions.push(Action::Drop {
                command: command.clone(),
            });
        }
        if let Some(words) = &self.output {
            actions.push(parse_output(&words_of(words))?);
        }

        if actions.is_empty() {
            return Err("No action given. Run 'wayctl --help' for usage.".into());
        }
        Ok(actions)
    }
}

fn words_of(words: &[String]) -> Vec<&str> {
    words.iter().map(|w| w.trim()).collect()
}

fn parse_int(word: &str, what: &str) -> Result<i32, String> {
    word.parse()
        .map_err(|_| format!("Invalid {} coordinate: '{}'", what, word))
}

fn parse_view(words: &[&str]) -> Result<Action, String> {
    match words {
        ["focused", ..] => Ok(Action::ViewFocused),
        ["list"] => Ok(Action::ViewList { has_title: None }),
        ["list", "has_title", text @ ..] if !text.is_empty() => Ok(Action::ViewList {
            has_title: Some(text.join(" ")),
        }),
        _ => Err("Usage: wayctl --view focused | list [has_title <text>]".into()),
    }
}

fn parse_dpms(words: &[&str]) -> Result<DpmsAction, String> {
    match words {
        ["on_all"] => Ok(DpmsAction::OnAll),
        ["off_all"] => Ok(DpmsAction::OffAll),
        ["on", output] => Ok(DpmsAction::On(output.to_string())),
        ["off"] => Ok(DpmsAction::Off(None)),
        ["off", output] => Ok(DpmsAction::Off(Some(output.to_string()))),
        ["off", output, "timeout", secs] => {
            let secs: u64 = secs
                .parse()
                .map_err(|_| format!("Invalid timeout: '{}'", secs))?;
            Ok(DpmsAction::OffAfter {
                output: output.to_string(),
                delay: Duration::from_secs(secs),
            })
        }
        ["toggle", ..] => Ok(DpmsAction::Toggle),
        _ => Err(
            "Usage: wayctl --dpms on <output> | off [<output> [timeout <secs>]] | on_all | off_all | toggle"
                .into(),
        ),
    }
}

fn parse_screenshot(words: &[&str]) -> Result<ScreenshotTarget, String> {
    match words {
        ["focused", "view"] => Ok(ScreenshotTarget::FocusedView),
        ["focused", "output"] => Ok(ScreenshotTarget::FocusedOutput),
        ["slurp"] => Ok(ScreenshotTarget::Slurp),
        ["slurp", "focused", "view"] => Ok(ScreenshotTarget::SlurpFocusedView),
        ["output", "all"] => Ok(ScreenshotTarget::AllOutputs),
        ["view", "all"] => Ok(ScreenshotTarget::AllViews),
        _ => Err(
            "Usage: wayctl --screenshot focused view | focused output | slurp | slurp focused view | output all | view all"
                .into(),
        ),
    }
}

fn parse_workspace(words: &[&str]) -> Result<Action, String> {
    match words {
        ["set", "view", "focused", x, y] => Ok(Action::MoveFocusedView {
            x: parse_int(x, "x")?,
            y: parse_int(y, "y")?,
        }),
        _ => Err("Usage: wayctl --workspace set view focused <x> <y>".into()),
    }
}

fn parse_session(word: &str) -> Result<SessionAction, String> {
    match word.trim() {
        "save" => Ok(SessionAction::Save),
        "start" => Ok(SessionAction::Start),
        other => Err(format!("Unknown session action: '{}'. Use save or start", other)),
    }
}

fn parse_plugin(words: &[&str]) -> Result<PluginAction, String> {
    match words {
        ["list"] => Ok(PluginAction::List),
        ["enable", name] => Ok(PluginAction::Enable(name.to_string())),
        ["disable", name] => Ok(PluginAction::Disable(name.to_string())),
        ["reload", "all"] => Ok(PluginAction::ReloadAll),
        ["reload", name] => Ok(PluginAction::Reload(name.to_string())),
        _ => Err(
            "Usage: wayctl --plugin list | enable <name> | disable <name> | reload <name|all>"
                .into(),
        ),
    }
}

fn parse_output(words: &[&str]) -> Result<Action, String> {
    match words {
        ["focused", ..] => Ok(Action::OutputFocused),
        ["list", "views"] => Ok(Action::OutputViews),
        _ => Err("Usage: wayctl --output focused | list views".into()),
    }
}
