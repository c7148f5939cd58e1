use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use colored::Colorize;
use tracing_subscriber::fmt::MakeWriter;

use crate::classify::StatusKind;
use crate::types::ProbeOutcome;

pub const DEFAULT_BAR_WIDTH: usize = 30;

/// Erase the current terminal line and return the cursor to column 0.
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Render `[#####-----] 50.0% (5/10)`.
///
/// A `total` of zero is drawn as a finished bar.
pub fn render_bar(processed: u64, total: u64, width: usize) -> String {
    let ratio = if total == 0 {
        1.0
    } else {
        (processed as f64 / total as f64).clamp(0.0, 1.0)
    };
    let filled = ((ratio * width as f64) as usize).min(width);
    format!(
        "[{}{}] {:.1}% ({}/{})",
        "#".repeat(filled),
        "-".repeat(width - filled),
        ratio * 100.0,
        processed,
        total
    )
}

struct ConsoleInner {
    out: Box<dyn Write + Send>,
    log: Box<dyn Write + Send>,
    show_progress: bool,
    bar_width: usize,
    last: Option<(u64, u64)>,
}

impl ConsoleInner {
    fn draw(&mut self) -> io::Result<()> {
        if let (true, Some((done, total))) = (self.show_progress, self.last) {
            write!(self.out, "{CLEAR_LINE}{}", render_bar(done, total, self.bar_width))?;
        }
        self.out.flush()
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        if self.show_progress {
            write!(self.out, "{CLEAR_LINE}")?;
        }
        writeln!(self.out, "{text}")?;
        self.draw()
    }

    /// Log records go to their own stream, but the bar is cleared first and
    /// redrawn after so the two never share a line.
    fn log_record(&mut self, record: &[u8]) -> io::Result<()> {
        if self.show_progress && self.last.is_some() {
            write!(self.out, "{CLEAR_LINE}")?;
            self.out.flush()?;
        }
        self.log.write_all(record)?;
        self.log.flush()?;
        self.draw()
    }
}

/// The one place terminal output goes through.
///
/// Result lines and progress redraws share the same lock, so concurrent
/// probes never interleave their writes. The progress bar always stays on the
/// last line: a result line erases it, prints, then redraws it.
///
/// `Console` is also a [`MakeWriter`], so `tracing` output emitted mid-run is
/// serialized with the bar instead of landing in the middle of it.
#[derive(Clone)]
pub struct Console {
    inner: Arc<Mutex<ConsoleInner>>,
}

impl Console {
    pub fn new(out: impl Write + Send + 'static, show_progress: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConsoleInner {
                out: Box::new(out),
                log: Box::new(io::stderr()),
                show_progress,
                bar_width: DEFAULT_BAR_WIDTH,
                last: None,
            })),
        }
    }

    pub fn stdout(show_progress: bool) -> Self {
        Self::new(io::stdout(), show_progress)
    }

    /// Swallows everything. Handy for tests and library callers.
    pub fn sink() -> Self {
        Self::new(io::sink(), false)
    }

    pub fn with_bar_width(self, width: usize) -> Self {
        self.lock().bar_width = width;
        self
    }

    /// Where log records end up. Defaults to stderr.
    pub fn with_log_writer(self, log: impl Write + Send + 'static) -> Self {
        self.lock().log = Box::new(log);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleInner> {
        // A panic while printing leaves nothing half-updated that matters.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn progress(&self, processed: u64, total: u64) {
        let mut inner = self.lock();
        // Workers finish out of order; never move the bar backwards.
        if matches!(inner.last, Some((done, _)) if done > processed) {
            return;
        }
        inner.last = Some((processed, total));
        let _ = inner.draw();
    }

    pub fn result(&self, outcome: &ProbeOutcome) {
        let Some(code) = outcome.status.code() else {
            return;
        };
        let code_str = code.to_string();
        let code_str = match StatusKind::of(code) {
            StatusKind::Success => code_str.green().to_string(),
            StatusKind::Redirect => code_str.blue().to_string(),
            StatusKind::Other => code_str,
        };
        let text = format!("{:<20} Status: {}", outcome.candidate, code_str);
        let _ = self.lock().line(&text);
    }

    pub fn message(&self, text: &str) {
        let _ = self.lock().line(text);
    }

    /// Move past the progress line so later output starts on a fresh line.
    pub fn finish(&self) {
        let mut inner = self.lock();
        if inner.show_progress && inner.last.is_some() {
            let _ = writeln!(inner.out);
            let _ = inner.out.flush();
        }
    }
}

/// Buffers one formatted log record and hands it to the console when dropped.
pub struct LogWriter {
    console: Console,
    buf: Vec<u8>,
}

impl Write for LogWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            let _ = self.console.lock().log_record(&self.buf);
        }
    }
}

impl<'a> MakeWriter<'a> for Console {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            console: self.clone(),
            buf: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::StatusPolicy;
    use crate::types::ProbeStatus;

    #[derive(Clone, Default)]
    struct Buf(Arc<Mutex<Vec<u8>>>);

    impl Write for Buf {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn renders_half_bar() {
        assert_eq!(render_bar(5, 10, 10), "[#####-----] 50.0% (5/10)");
    }

    #[test]
    fn renders_empty_and_full() {
        assert_eq!(render_bar(0, 4, 4), "[----] 0.0% (0/4)");
        assert_eq!(render_bar(4, 4, 4), "[####] 100.0% (4/4)");
    }

    #[test]
    fn zero_total_does_not_divide_by_zero() {
        assert_eq!(render_bar(0, 0, 5), "[#####] 100.0% (0/0)");
    }

    #[test]
    fn overshoot_is_clamped() {
        assert_eq!(render_bar(7, 5, 5), "[#####] 100.0% (7/5)");
    }

    #[test]
    fn result_line_is_followed_by_progress_redraw() {
        colored::control::set_override(false);
        let buf = Buf::default();
        let console = Console::new(buf.clone(), true).with_bar_width(4);
        console.progress(1, 2);
        let outcome = ProbeOutcome::new(
            "admin".into(),
            "http://h/admin".into(),
            ProbeStatus::Completed(200),
            &StatusPolicy::default(),
        );
        console.result(&outcome);
        let text = buf.text();
        let line_at = text.find("admin").unwrap();
        let last_bar = text.rfind("[##--] 50.0% (1/2)").unwrap();
        assert!(last_bar > line_at);
        assert!(text.contains("Status: 200"));
    }

    #[test]
    fn progress_never_moves_backwards() {
        let buf = Buf::default();
        let console = Console::new(buf.clone(), true).with_bar_width(2);
        console.progress(2, 2);
        console.progress(1, 2);
        assert!(!buf.text().contains("(1/2)"));
    }

    #[test]
    fn progress_disabled_prints_only_lines() {
        let buf = Buf::default();
        let console = Console::new(buf.clone(), false);
        console.progress(1, 2);
        console.message("hello");
        console.finish();
        assert_eq!(buf.text(), "hello\n");
    }

    #[test]
    fn log_records_clear_and_redraw_the_bar() {
        let out = Buf::default();
        let log = Buf::default();
        let console = Console::new(out.clone(), true)
            .with_bar_width(2)
            .with_log_writer(log.clone());
        console.progress(1, 2);
        {
            let mut w = console.make_writer();
            w.write_all(b"WARN task aborted\n").unwrap();
            // nothing is written until the record is complete
            assert!(log.text().is_empty());
        }
        assert_eq!(log.text(), "WARN task aborted\n");
        let text = out.text();
        assert!(text.ends_with(&format!("{CLEAR_LINE}[#-] 50.0% (1/2)")));
        assert_eq!(text.matches("(1/2)").count(), 2);
    }

    #[test]
    fn tracing_events_go_through_the_console() {
        let log = Buf::default();
        let console = Console::new(io::sink(), false).with_log_writer(log.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_writer(console)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("worker task aborted");
        });
        assert!(log.text().contains("worker task aborted"));
    }
}
