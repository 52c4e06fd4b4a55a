use crossterm::{
    cursor,
    style::Print,
    terminal::{Clear, ClearType},
    QueueableCommand,
};
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Animated stderr indicator shown while a blocking call runs. Stops and
/// clears its line when dropped.
pub struct Spinner {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Start only when `enabled` and stderr is a terminal.
    pub fn start_if(enabled: bool, message: &str) -> Self {
        if !enabled || !std::io::stderr().is_terminal() {
            return Self {
                stop: Arc::new(AtomicBool::new(true)),
                handle: None,
            };
        }
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let message = message.to_string();
        let handle = std::thread::spawn(move || {
            let mut stderr = std::io::stderr();
            let mut frame = 0;
            while !flag.load(Ordering::Relaxed) {
                if let Err(e) = draw_frame(&mut stderr, frame, &message) {
                    log::debug!("spinner stopped drawing: {}", e);
                    break;
                }
                frame += 1;
                std::thread::sleep(Duration::from_millis(80));
            }
            let _ = stderr.queue(cursor::MoveToColumn(0));
            let _ = stderr.queue(Clear(ClearType::CurrentLine));
            let _ = stderr.flush();
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

fn draw_frame<W: Write>(out: &mut W, frame: usize, message: &str) -> std::io::Result<()> {
    out.queue(cursor::MoveToColumn(0))?
        .queue(Print(FRAMES[frame % FRAMES.len()]))?
        .queue(Print(format!(" {}", message)))?;
    out.flush()
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_spinner_has_no_thread() {
        let spinner = Spinner::start_if(false, "working");
        assert!(!spinner.is_running());
        drop(spinner);
    }

    #[test]
    fn test_draw_frame_returns_to_column_zero() {
        let mut out = Vec::new();
        draw_frame(&mut out, 11, "Fetching PRs").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\x1b[1G"));
        assert!(text.ends_with("⠙ Fetching PRs"));
    }
}
