use std::{borrow::Cow, fmt, panic::Location};

/// Error message that remembers where in the engine it was raised.
///
/// Every error variant in the workspace carries one of these. Build it with
/// [`DiagnosticMessage::new`] or the [`diag!`] macro; both record the caller
/// location so a failed callback run can be traced back to the pipeline
/// step that rejected it.
#[derive(Clone, Debug)]
pub struct DiagnosticMessage {
    message: Cow<'static, str>,
    location: &'static Location<'static>,
}

impl DiagnosticMessage {
    #[track_caller]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_ref()
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Prefix the message with the name of the component or key it concerns,
    /// keeping the original location.
    pub fn scoped(self, scope: &str) -> Self {
        Self {
            message: Cow::Owned(format!("{scope}: {}", self.message)),
            location: self.location,
        }
    }
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (at {}:{})",
            self.message,
            self.location.file(),
            self.location.line()
        )
    }
}

/// `format!`-style constructor for [`DiagnosticMessage`].
#[macro_export]
macro_rules! diag {
    ($msg:literal $(,)?) => {
        $crate::error::diagnostics::DiagnosticMessage::new($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::diagnostics::DiagnosticMessage::new(format!($fmt, $($arg)*))
    };
}
