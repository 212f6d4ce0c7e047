//! Diagnostic log channel
//!
//! Structured console lines tagged by plugin namespace with a small set of
//! styles, globally suppressible via the `quiet` runtime parameter. A
//! separate fine-grained debug channel goes through `tracing` and is
//! independent of `quiet`.

use std::fmt;

/// Style of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    Success,
    Failure,
    Warning,
    Info,
}

impl LogStyle {
    fn symbol(&self) -> &'static str {
        match self {
            LogStyle::Success => "✔",
            LogStyle::Failure => "✖",
            LogStyle::Warning => "⚠",
            LogStyle::Info => "ℹ",
        }
    }
}

impl fmt::Display for LogStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The engine-wide log channel
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    quiet: bool,
}

impl Logger {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Returns true when styled output is suppressed
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Prints a styled, namespace-tagged line unless suppressed
    pub fn log(&self, namespace: &str, message: &str, style: LogStyle) {
        if self.quiet {
            return;
        }

        match style {
            LogStyle::Failure => eprintln!("{} [{}] {}", style, namespace, message),
            _ => println!("{} [{}] {}", style, namespace, message),
        }
    }

    /// Emits a debug event on the fine-grained channel; never suppressed by
    /// `quiet`
    pub fn debug(&self, namespace: &str, message: &str) {
        tracing::debug!(namespace, "{}", message);
    }

    /// Scopes the channel to a single plugin namespace
    pub fn namespaced(&self, namespace: impl Into<String>) -> NamespacedLogger {
        NamespacedLogger {
            logger: *self,
            namespace: namespace.into(),
        }
    }
}

/// A log channel bound to one plugin's namespace; this is what hooks receive
#[derive(Debug, Clone)]
pub struct NamespacedLogger {
    logger: Logger,
    namespace: String,
}

impl NamespacedLogger {
    /// The namespace this channel is bound to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn log(&self, message: &str, style: LogStyle) {
        self.logger.log(&self.namespace, message, style);
    }

    pub fn success(&self, message: &str) {
        self.log(message, LogStyle::Success);
    }

    pub fn failure(&self, message: &str) {
        self.log(message, LogStyle::Failure);
    }

    pub fn warn(&self, message: &str) {
        self.log(message, LogStyle::Warning);
    }

    pub fn info(&self, message: &str) {
        self.log(message, LogStyle::Info);
    }

    /// Fine-grained debug event, independent of the styled channel
    pub fn debug(&self, message: &str) {
        self.logger.debug(&self.namespace, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_flag_is_reported() {
        assert!(Logger::new(true).is_quiet());
        assert!(!Logger::new(false).is_quiet());
    }

    #[test]
    fn namespaced_logger_keeps_namespace() {
        let logger = Logger::new(true);
        let scoped = logger.namespaced("source-cms");

        assert_eq!(scoped.namespace(), "source-cms");

        // Suppressed channels must still accept every style without output.
        scoped.success("ok");
        scoped.failure("bad");
        scoped.warn("careful");
        scoped.info("fyi");
        scoped.debug("detail");
    }

    #[test]
    fn style_symbols() {
        assert_eq!(LogStyle::Success.symbol(), "✔");
        assert_eq!(LogStyle::Failure.symbol(), "✖");
        assert_eq!(LogStyle::Warning.symbol(), "⚠");
        assert_eq!(LogStyle::Info.symbol(), "ℹ");
    }
}
