//! Progress bars that stay pinned below streaming log lines
//!
//! Log output is routed through the shared [`MultiProgress`] so a running
//! crawl bar is redrawn under each line instead of being torn apart.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Bar counting finished sites of an indexing run
pub fn sites_progress_bar(sites: u64) -> ProgressBar {
    let bar = multi_progress().add(ProgressBar::new(sites));
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} sites {msg}")
    {
        bar.set_style(style);
    }
    bar
}

fn print_line(line: &str) {
    let _ = multi_progress().println(line.trim_end_matches('\r'));
}

/// Tracing writer factory printing through the progress bars
#[derive(Default, Clone)]
pub struct LogWriterFactory;

/// Line buffered writer handed out per log event
pub struct LogWriter {
    pending: String,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));
        while let Some(end) = self.pending.find('\n') {
            print_line(&self.pending[..end]);
            self.pending.drain(..=end);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            print_line(&self.pending);
            self.pending.clear();
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
            pending: String::new(),
        }
    }
}
