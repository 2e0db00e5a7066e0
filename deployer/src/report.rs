use std::fmt::{Display, Formatter};

use error_stack::{AttachmentKind, FrameKind, Report};
use itertools::Itertools;
use valuable::Valuable;

/// Structured representation of an error report, so it can be logged as a single field.
#[derive(Valuable, PartialEq, Debug, Default)]
pub struct LoggableError {
    pub msg: String,
    pub attachments: Vec<String>,
    pub cause: Option<Box<LoggableError>>,
}

impl Display for LoggableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)?;

        if !self.attachments.is_empty() {
            write!(f, " ({})", self.attachments.iter().join(", "))?;
        }

        match &self.cause {
            Some(cause) => write!(f, ": {cause}"),
            None => Ok(()),
        }
    }
}

impl<T> From<&Report<T>> for LoggableError {
    fn from(report: &Report<T>) -> Self {
        // frames are ordered from the outermost context to the root cause, and the printable
        // attachments of a context precede it
        let mut errors: Vec<LoggableError> = vec![];
        let mut attachments = vec![];

        for frame in report.frames() {
            match frame.kind() {
                FrameKind::Context(context) => {
                    attachments.reverse();
                    errors.push(LoggableError {
                        msg: context.to_string(),
                        attachments: std::mem::take(&mut attachments),
                        cause: None,
                    });
                }
                FrameKind::Attachment(AttachmentKind::Printable(printable)) => {
                    attachments.push(printable.to_string())
                }
                FrameKind::Attachment(_) => {}
            }
        }

        errors
            .into_iter()
            .rev()
            .fold(None, |cause: Option<LoggableError>, mut error| {
                error.cause = cause.map(Box::new);
                Some(error)
            })
            .unwrap_or_default()
    }
}
