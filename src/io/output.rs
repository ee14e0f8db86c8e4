//! Output management for CLI commands.
//!
//! Results go to stdout, diagnostics to stderr. In JSON mode every result or
//! error is one pretty-printed [`JsonResponse`].

use crate::display::THEME;
use crate::error::IndexError;
use crate::io::exit_code::ExitCode;
use crate::io::format::{JsonResponse, OutputFormat};
use serde::Serialize;
use std::io::{self, Write};

pub struct OutputManager {
    format: OutputFormat,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

impl OutputManager {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }

    /// Create an output manager with custom writers.
    pub fn new_with_writers(
        format: OutputFormat,
        stdout: Box<dyn Write>,
        stderr: Box<dyn Write>,
    ) -> Self {
        Self {
            format,
            stdout,
            stderr,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Output a successful result.
    ///
    /// JSON mode serializes `data`; text mode prints the pre-rendered `text`.
    pub fn success<T>(&mut self, data: &T, text: &str) -> io::Result<ExitCode>
    where
        T: Serialize,
    {
        match self.format {
            OutputFormat::Json => {
                let response = JsonResponse::success(data);
                writeln!(self.stdout, "{}", serde_json::to_string_pretty(&response)?)?;
            }
            OutputFormat::Text => {
                writeln!(self.stdout, "{text}")?;
            }
        }
        Ok(ExitCode::Success)
    }

    /// Output an error with suggestions.
    pub fn error(&mut self, error: &IndexError) -> io::Result<ExitCode> {
        match self.format {
            OutputFormat::Json => {
                let response = JsonResponse::from_error(error);
                writeln!(self.stderr, "{}", serde_json::to_string_pretty(&response)?)?;
            }
            OutputFormat::Text => {
                writeln!(self.stderr, "{}", THEME.error_with_icon(&format!("Error: {error}")))?;
                for suggestion in error.recovery_suggestions() {
                    let line = format!("  Suggestion: {suggestion}");
                    writeln!(self.stderr, "{}", THEME.apply(&THEME.dim, line))?;
                }
            }
        }
        Ok(ExitCode::from_error(error))
    }

    /// Report a failure that has no [`IndexError`], such as unreadable
    /// settings, and return [`ExitCode::GeneralError`].
    pub fn failure(&mut self, message: &str) -> io::Result<ExitCode> {
        let code = ExitCode::GeneralError;
        match self.format {
            OutputFormat::Json => {
                let response = JsonResponse::general_error(message);
                writeln!(self.stderr, "{}", serde_json::to_string_pretty(&response)?)?;
            }
            OutputFormat::Text => {
                let line = format!("{}: {message}", code.description());
                writeln!(self.stderr, "{}", THEME.error_with_icon(&line))?;
            }
        }
        Ok(code)
    }

    /// Informational message, suppressed in JSON mode.
    pub fn info(&mut self, message: &str) -> io::Result<()> {
        if matches!(self.format, OutputFormat::Text) {
            writeln!(self.stderr, "{message}")?;
        }
        Ok(())
    }
}
