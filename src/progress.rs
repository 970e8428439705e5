//! Progress bar for index passes, with log lines routed above it.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Print one log line above any live bar.
///
/// indicatif drops `println` on a hidden draw target (stderr is not a
/// terminal), so those lines go straight to stderr.
fn print_above(line: &str) {
    print_line(multi_progress(), &mut io::stderr(), line);
}

fn print_line(mp: &MultiProgress, fallback: &mut impl Write, line: &str) {
    if mp.is_hidden() {
        let _ = writeln!(fallback, "{}", line);
    } else {
        let _ = mp.println(line);
    }
}

/// Per-file progress for an index or prune pass.
///
/// Disabled (every call a no-op) when there is nothing to process or the
/// caller turned progress off.
pub struct FileProgress {
    bar: Option<ProgressBar>,
}

impl FileProgress {
    pub fn new(len: usize, message: &str, enabled: bool) -> Self {
        if !enabled || len == 0 {
            return Self { bar: None };
        }

        let bar = multi_progress().add(ProgressBar::new(len as u64));
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
        ) {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Advance by one file, showing its path
    pub fn tick(&self, path: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(path.to_string());
            bar.inc(1);
        }
    }

    pub fn finish(self, message: &str) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(message.to_string());
        }
    }
}

/// `MakeWriter` for the fmt layer that prints whole lines through the
/// shared `MultiProgress`, so they never tear a live bar.
#[derive(Default, Clone)]
pub struct LogWriterFactory;

pub struct LogWriter {
    buffer: String,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.buffer.find('\n') {
            print_above(self.buffer[..idx].trim_end_matches('\r'));
            self.buffer.drain(..=idx);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            print_above(self.buffer.trim_end_matches(['\r', '\n']));
            self.buffer.clear();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_is_inert() {
        let progress = FileProgress::new(0, "Indexing", true);
        progress.tick("threads/a.md");
        progress.finish("done");

        let progress = FileProgress::new(5, "Indexing", false);
        assert!(progress.bar.is_none());
    }

    #[test]
    fn test_log_writer_keeps_partial_line_buffered() {
        let mut writer = LogWriterFactory.make_writer();
        writer.write_all(b"first line\nsecond").unwrap();
        assert_eq!(writer.buffer, "second");
        writer.flush().unwrap();
        assert!(writer.buffer.is_empty());
    }

    #[test]
    fn test_hidden_target_falls_back_to_writer() {
        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let mut out = Vec::new();
        print_line(&mp, &mut out, "ERROR store missing");
        assert_eq!(String::from_utf8(out).unwrap(), "ERROR store missing\n");
    }
}
