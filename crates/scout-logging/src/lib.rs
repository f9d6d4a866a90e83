//! Minimal structured-logging facade.
//!
//! Resolvers write through [`Logger`] so the host decides where log lines
//! go. The default adapter forwards to `tracing`; [`NopLogger`] drops
//! everything. The core only ever writes to the logger, never reads.

use std::fmt::Display;
use std::sync::Arc;

/// A key/value pair attached to a log line.
pub type Field<'a> = (&'a str, &'a dyn Display);

pub trait Logger: Send + Sync {
    fn info(&self, msg: &str, fields: &[Field<'_>]);
    fn debug(&self, msg: &str, fields: &[Field<'_>]);
    fn error(&self, msg: &str, fields: &[Field<'_>]);
}

pub type SharedLogger = Arc<dyn Logger>;

/// Forwards to the global `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn shared() -> SharedLogger {
        Arc::new(Self)
    }
}

impl Logger for TracingLogger {
    fn info(&self, msg: &str, fields: &[Field<'_>]) {
        tracing::info!("{msg}{}", render(fields));
    }

    fn debug(&self, msg: &str, fields: &[Field<'_>]) {
        tracing::debug!("{msg}{}", render(fields));
    }

    fn error(&self, msg: &str, fields: &[Field<'_>]) {
        tracing::error!("{msg}{}", render(fields));
    }
}

/// Swallows every log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopLogger;

impl NopLogger {
    pub fn shared() -> SharedLogger {
        Arc::new(Self)
    }
}

impl Logger for NopLogger {
    fn info(&self, _msg: &str, _fields: &[Field<'_>]) {}
    fn debug(&self, _msg: &str, _fields: &[Field<'_>]) {}
    fn error(&self, _msg: &str, _fields: &[Field<'_>]) {}
}

fn render(fields: &[Field<'_>]) -> String {
    let mut out = String::new();
    for (key, value) in fields {
        out.push_str(&format!(" {key}={value}"));
    }
    out
}
