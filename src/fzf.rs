use crate::errors::Result;
use crate::process::Runner;
use std::io::{BufRead, Write};

const COLORS: &str =
    "--color=footer:italic:bold,border:magenta,prompt:bright-magenta,pointer:bright-cyan,marker:bright-cyan";

const DEFAULT_BINDS: [&str; 8] = [
    "alt-n:next-history",
    "alt-p:previous-history",
    "ctrl-j:preview-down",
    "ctrl-k:preview-up",
    "ctrl-n:down",
    "ctrl-p:up",
    "ctrl-d:change-preview-window(right:wrap|down,70%:wrap)",
    "ctrl-u:preview-half-page-up",
];

/// One finder line: `display` is shown, `value` is what selection returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub display: String,
    pub value: String,
}

impl Row {
    pub fn new(display: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FinderRequest {
    pub header: String,
    pub preview: Option<String>,
    pub multi: bool,
    pub binds: Vec<String>,
    pub expect: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Key from `--expect` that ended the selection; `None` for Enter.
    pub key: Option<String>,
    pub values: Vec<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

pub fn finder_argv(request: &FinderRequest) -> Vec<String> {
    let mut argv: Vec<String> = [
        "fzf",
        "--reverse",
        "--ansi",
        "--delimiter=\t",
        "--with-nth=1",
        "--footer",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    argv.push(request.header.clone());
    argv.extend(
        [
            "--preview-window=bottom:75%:nohidden:wrap",
            "--border=rounded",
            COLORS,
            "--prompt=❯ ",
            "--pointer=❯",
            "--marker=•",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    if let Some(preview) = &request.preview {
        argv.push("--preview".to_string());
        argv.push(preview.clone());
    }
    if request.multi {
        argv.push("--multi".to_string());
    }

    let binds: Vec<&str> = DEFAULT_BINDS
        .iter()
        .copied()
        .chain(request.binds.iter().map(String::as_str))
        .collect();
    argv.push("--bind".to_string());
    argv.push(binds.join(","));

    if !request.expect.is_empty() {
        argv.push("--expect".to_string());
        argv.push(request.expect.join(","));
    }
    argv
}

/// Split finder stdout into the pressed key (when `expecting`) and the
/// values after each line's first tab.
pub fn parse_output(stdout: &str, expecting: bool) -> Selection {
    let mut lines = stdout.lines();
    let key = if expecting {
        lines.next().filter(|k| !k.is_empty()).map(str::to_string)
    } else {
        None
    };
    let values = lines
        .filter_map(|line| line.split_once('\t').map(|(_, value)| value.to_string()))
        .collect();
    Selection { key, values }
}

/// Let the user pick rows. An empty row set returns an empty selection
/// without starting fzf.
pub fn select(runner: &dyn Runner, rows: &[Row], request: &FinderRequest) -> Result<Selection> {
    if rows.is_empty() {
        return Ok(Selection::default());
    }
    let input = rows
        .iter()
        .map(|row| format!("{}\t{}", row.display, row.value))
        .collect::<Vec<_>>()
        .join("\n");
    let argv = finder_argv(request);
    let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
    let out = runner.pipe(&argv, &input)?;
    Ok(parse_output(&out.stdout, !request.expect.is_empty()))
}

/// Pick one of `remotes`; a single remote is taken without asking.
pub fn select_remote(runner: &dyn Runner, remotes: &[String]) -> Result<Option<String>> {
    if remotes.is_empty() {
        return Ok(None);
    }
    let out = runner.pipe(
        &[
            "fzf",
            "-1",
            "--height=10",
            "--reverse",
            "--border=rounded",
            COLORS,
            "--prompt=❯ Select remote: ",
            "--pointer=❯",
            "--marker=•",
            "--preview",
            "git remote get-url {}",
            "--preview-window=down:2:wrap",
        ],
        &remotes.join("\n"),
    )?;
    let remote = out.stdout.trim();
    Ok((!remote.is_empty()).then(|| remote.to_string()))
}

/// Quote `arg` for `sh`. Finder placeholders like `{2}` stay bare so fzf can
/// substitute them.
pub fn shell_quote(arg: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "-_./:=@%+,{}".contains(c);
    if !arg.is_empty() && arg.chars().all(safe) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Yes/no questions before destructive actions.
pub trait Prompter {
    fn confirm(&self, prompt: &str) -> bool;
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{} [y/N]: ", prompt);
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        }
    }
}
