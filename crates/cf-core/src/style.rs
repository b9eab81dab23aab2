//! Terminal styling helpers with NO_COLOR support, and the console printer
//! every component writes user-facing output through.

use std::io::Write;

use crossterm::cursor::MoveTo;
use crossterm::terminal::{Clear, ClearType};

/// Check if color output is enabled (respects `NO_COLOR` env var).
pub fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// Terminal style helper that respects NO_COLOR.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self::new()
    }
}

impl Style {
    pub fn new() -> Self {
        Self {
            enabled: color_enabled(),
        }
    }

    /// Create a style with colors explicitly enabled (for tests).
    pub fn force_enabled() -> Self {
        Self { enabled: true }
    }

    /// Create a style with colors explicitly disabled.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    fn code(&self, code: &'static str) -> &'static str {
        if self.enabled {
            code
        } else {
            ""
        }
    }

    pub fn dim_start(&self) -> &'static str {
        self.code("\x1b[2m")
    }

    pub fn bold_start(&self) -> &'static str {
        self.code("\x1b[1m")
    }

    pub fn red_start(&self) -> &'static str {
        self.code("\x1b[31m")
    }

    pub fn yellow_start(&self) -> &'static str {
        self.code("\x1b[33m")
    }

    pub fn green_start(&self) -> &'static str {
        self.code("\x1b[32m")
    }

    pub fn cyan_start(&self) -> &'static str {
        self.code("\x1b[36m")
    }

    pub fn reset(&self) -> &'static str {
        self.code("\x1b[0m")
    }
}

/// Narrow printing interface for user-facing output.
///
/// Write errors are ignored: a closed terminal must never abort a turn.
pub struct Console<W: Write> {
    writer: W,
    style: Style,
}

impl Console<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout(), Style::new())
    }
}

impl<W: Write> Console<W> {
    pub fn new(writer: W, style: Style) -> Self {
        Self { writer, style }
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn colored(&mut self, color: &'static str, text: &str) {
        let reset = self.style.reset();
        let _ = writeln!(self.writer, "{color}{text}{reset}");
        let _ = self.writer.flush();
    }

    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.writer, "{text}");
        let _ = self.writer.flush();
    }

    pub fn blank(&mut self) {
        self.line("");
    }

    pub fn info(&mut self, text: &str) {
        self.colored(self.style.cyan_start(), text);
    }

    pub fn success(&mut self, text: &str) {
        self.colored(self.style.green_start(), text);
    }

    pub fn warn(&mut self, text: &str) {
        self.colored(self.style.yellow_start(), text);
    }

    pub fn error(&mut self, text: &str) {
        self.colored(self.style.red_start(), text);
    }

    pub fn dim(&mut self, text: &str) {
        self.colored(self.style.dim_start(), text);
    }

    pub fn heading(&mut self, text: &str) {
        let bold = self.style.bold_start();
        let cyan = self.style.cyan_start();
        let reset = self.style.reset();
        let _ = writeln!(self.writer, "{bold}{cyan}{text}{reset}");
        let _ = self.writer.flush();
    }

    /// `label` in the given color, followed by plain `text` on the same line.
    pub fn labeled(&mut self, color: &'static str, label: &str, text: &str) {
        let reset = self.style.reset();
        let _ = writeln!(self.writer, "{color}{label}{reset} {text}");
        let _ = self.writer.flush();
    }

    /// `label` on its own line followed by a multi-line body.
    pub fn block(&mut self, color: &'static str, label: &str, body: &str) {
        let reset = self.style.reset();
        let _ = writeln!(self.writer, "\n{color}{label}{reset}\n{body}");
        let _ = self.writer.flush();
    }

    pub fn clear_screen(&mut self) {
        let _ = crossterm::queue!(self.writer, Clear(ClearType::All), MoveTo(0, 0));
        let _ = self.writer.flush();
    }
}
