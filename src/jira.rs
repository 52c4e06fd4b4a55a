use crate::process::Runner;
use crate::render::osc8;
use regex::Regex;

/// Ticket key named by `branch`, taken from the first capture group of
/// `pattern` (or the whole match when it has none). An invalid pattern
/// matches nothing.
pub fn ticket_for_branch(pattern: &str, branch: &str) -> Option<String> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            log::debug!("ignoring invalid JIRA pattern {:?}: {}", pattern, e);
            return None;
        }
    };
    let caps = re.captures(branch)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
}

pub fn ticket_url(base_url: &str, ticket: &str) -> String {
    format!("{}/browse/{}", base_url.trim_end_matches('/'), ticket)
}

/// Preview block for `ticket`: the `jayrah` rendering when available,
/// otherwise a hyperlink to the issue page.
pub fn format_section(runner: &dyn Runner, base_url: &str, ticket: &str) -> String {
    let mut lines = vec!["────────".to_string()];
    match jayrah_view(runner, ticket) {
        Some(view) => lines.push(view.trim_end().to_string()),
        None => lines.push(format!(
            "JIRA Ticket: {}",
            osc8(&ticket_url(base_url, ticket), ticket)
        )),
    }
    lines.join("\n")
}

fn jayrah_view(runner: &dyn Runner, ticket: &str) -> Option<String> {
    if !runner.which("jayrah") {
        return None;
    }
    let raw = runner
        .run(&["jayrah", "cli", "view", ticket], None, false)
        .ok()
        .filter(|out| out.success() && !out.stdout.trim().is_empty())?
        .stdout;
    if runner.which("gum") {
        if let Ok(out) = runner.pipe(&["gum", "format", "-l", "markdown", "--theme=tokyo-night"], &raw) {
            if out.success() && !out.stdout.is_empty() {
                return Some(out.stdout);
            }
        }
    }
    Some(raw)
}
