use crate::github::checks::{ci_label, Tone};
use crate::github::{CiRunSummary, PrState, PullRequestSummary, PushStatus};
use crate::process::Runner;
use chrono::{Local, TimeZone};
use regex::Regex;
use std::io::IsTerminal;
use std::sync::OnceLock;

/// ANSI sequences used for rendering. Every field is empty when colours are
/// disabled, so formatting code can interpolate them unconditionally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Colors {
    pub local: String,
    pub current: String,
    pub commit: String,
    pub date: String,
    pub reset: String,
    pub green: String,
    pub yellow: String,
    pub red: String,
    pub cyan: String,
    pub magenta: String,
    pub blue: String,
    pub grey: String,
    pub bold: String,
    pub italic_on: String,
    pub italic_off: String,
}

impl Colors {
    /// Read branch colours from git config, falling back to git's defaults.
    pub fn detect(runner: &dyn Runner, no_color: bool) -> Self {
        if no_color {
            return Self::default();
        }
        let git_color = |name: &str, fallback: &str| {
            runner
                .run(&["git", "config", "--get-color", name, fallback], None, false)
                .map(|out| out.stdout.trim_end_matches('\n').to_string())
                .unwrap_or_default()
        };
        Self {
            local: git_color("color.branch.local", "normal"),
            current: git_color("color.branch.current", "green"),
            commit: git_color("color.diff.commit", "yellow"),
            date: git_color("color.branch.upstream", "cyan"),
            ..Self::ansi()
        }
    }

    /// Fixed palette without git config lookups.
    pub fn ansi() -> Self {
        Self {
            local: String::new(),
            current: "\x1b[32m".into(),
            commit: "\x1b[33m".into(),
            date: "\x1b[36m".into(),
            reset: "\x1b[0m".into(),
            green: "\x1b[32m".into(),
            yellow: "\x1b[33m".into(),
            red: "\x1b[31m".into(),
            cyan: "\x1b[36m".into(),
            magenta: "\x1b[35m".into(),
            blue: "\x1b[34m".into(),
            grey: "\x1b[90m".into(),
            bold: "\x1b[1m".into(),
            italic_on: "\x1b[3m".into(),
            italic_off: "\x1b[23m".into(),
        }
    }

    pub fn enabled(&self) -> bool {
        !self.reset.is_empty()
    }

    /// Wrap `text` in `color` when colours are on.
    pub fn paint(&self, color: &str, text: &str) -> String {
        if self.enabled() && !color.is_empty() {
            format!("{}{}{}", color, text, self.reset)
        } else {
            text.to_string()
        }
    }
}

/// Cut `text` to at most `width` characters, marking the cut with `…`.
pub fn truncate_display(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let len = text.chars().count();
    if len <= width {
        return text.to_string();
    }
    if width == 1 {
        return text.chars().take(1).collect();
    }
    let mut out: String = text.chars().take(width - 1).collect();
    out.push('…');
    out
}

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;]*m|\x1b\]8;;[^\x1b]*\x1b\\").expect("static regex")
    })
}

/// Printable width of `text` once colour and hyperlink escapes are removed.
pub fn visible_width(text: &str) -> usize {
    ansi_re().replace_all(text, "").chars().count()
}

pub fn pad_right(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(visible_width(text));
    format!("{}{}", text, " ".repeat(pad))
}

pub fn pad_left(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(visible_width(text));
    format!("{}{}", " ".repeat(pad), text)
}

/// OSC 8 terminal hyperlink.
pub fn osc8(url: &str, text: &str) -> String {
    format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
}

/// Local date of a unix timestamp, `unknown` when absent.
pub fn format_epoch(epoch: i64, fmt: &str) -> String {
    if epoch <= 0 {
        return "unknown".to_string();
    }
    match Local.timestamp_opt(epoch, 0).single() {
        Some(dt) => dt.format(fmt).to_string(),
        None => "unknown".to_string(),
    }
}

/// Terminal width, or `default` when stdout is not a terminal.
pub fn term_cols(default: usize) -> usize {
    if !std::io::stdout().is_terminal() {
        return default;
    }
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(default)
}

fn conventional_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<kind>[a-zA-Z]+)(?P<scope>\([^)]*\))?!?:").expect("static regex")
    })
}

/// Conventional-commit type of a subject line (`feat`, `fix`, ...).
pub fn commit_kind(subject: &str) -> Option<String> {
    let caps = conventional_re().captures(subject)?;
    Some(caps["kind"].to_lowercase())
}

/// Icon shown in front of rows whose subject follows conventional commits.
pub fn kind_icon(kind: &str) -> Option<&'static str> {
    let icon = match kind {
        "feat" => "\u{f135}",
        "fix" => "\u{f188}",
        "docs" => "\u{f02d}",
        "style" => "\u{f1fc}",
        "refactor" => "\u{f021}",
        "perf" => "\u{f0e4}",
        "test" => "\u{f0c3}",
        "build" => "\u{f0ad}",
        "ci" => "\u{f085}",
        "chore" => "\u{f0ae}",
        "revert" => "\u{f0e2}",
        _ => return None,
    };
    Some(icon)
}

/// Colour the `type(scope)` part of `feat`/`fix` subjects.
pub fn highlight_subject(subject: &str, colors: &Colors) -> String {
    if !colors.enabled() {
        return subject.to_string();
    }
    let Some(caps) = conventional_re().captures(subject) else {
        return subject.to_string();
    };
    let color = match caps["kind"].to_lowercase().as_str() {
        "feat" => &colors.green,
        "fix" => &colors.red,
        _ => return subject.to_string(),
    };
    let head_len = caps["kind"].len() + caps.name("scope").map_or(0, |m| m.len());
    format!(
        "{}{}{}{}",
        color,
        &subject[..head_len],
        colors.reset,
        &subject[head_len..]
    )
}

// Nerd Font glyphs.
pub const ICON_BRANCH: &str = "\u{f062c}";
pub const ICON_TRACKING: &str = "\u{f0df2}";
pub const ICON_AHEAD: &str = "\u{f0b85}";
pub const ICON_BEHIND: &str = "\u{f0b86}";
pub const ICON_CHANGES: &str = "\u{f06ff}";
const ICON_LOCAL: &str = "\u{f418}";
const ICON_WORKTREE: &str = "\u{eb45}";

/// State glyph and label of a pull request.
pub fn pr_icon(pr: &PullRequestSummary, colors: &Colors) -> (String, &'static str) {
    let (color, glyph, label) = if pr.is_merged() {
        (&colors.magenta, "\u{f419}", "Merged")
    } else if pr.state == PrState::Closed {
        (&colors.red, "\u{f05e}", "Closed")
    } else if pr.is_draft {
        (&colors.yellow, "\u{f41f}", "Draft")
    } else {
        (&colors.green, "\u{f407}", "Open")
    };
    (colors.paint(color, glyph), label)
}

pub fn ci_icon(run: &CiRunSummary, colors: &Colors) -> (String, String) {
    let (label, tone) = ci_label(run);
    let (color, glyph) = match (tone, label.as_str()) {
        (Tone::Yellow, "In progress") => (&colors.yellow, "\u{f251}"),
        (Tone::Green, _) => (&colors.green, "\u{f058}"),
        (Tone::Red, "Cancelled") => (&colors.red, "\u{f05e}"),
        (Tone::Red, _) => (&colors.red, "\u{f057}"),
        (Tone::Cyan, _) => (&colors.cyan, "\u{f192}"),
        (Tone::Yellow, _) => (&colors.yellow, "\u{f110}"),
    };
    (colors.paint(color, glyph), label)
}

pub fn push_icon(status: PushStatus, colors: &Colors) -> String {
    match status {
        PushStatus::Pushed => colors.paint(&colors.green, "\u{f403}"),
        PushStatus::NotPushed => colors.paint(&colors.red, "\u{ebda}"),
        PushStatus::Unknown => colors.paint(&colors.yellow, "\u{ebc3}"),
    }
}

pub fn local_branch_icon(colors: &Colors) -> String {
    colors.paint(&colors.green, ICON_LOCAL)
}

pub fn worktree_icon(colors: &Colors) -> String {
    colors.paint(&colors.magenta, ICON_WORKTREE)
}
