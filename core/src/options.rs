//! Per-call options.
//!
//! # Design
//! `CallOptions` records each setter as a `CallOption` in call order and
//! replays them onto a fresh `RequestSpec`. Scalar settings are last-wins and
//! header settings merge. Configuration never fails: a non-positive timeout
//! resets to the executor's default instead of being rejected.

use std::time::Duration;

use crate::types::{BasicAuth, ContentType, RequestSpec};

/// One recorded option.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOption {
    /// Timeout in milliseconds; `<= 0` means "use the default".
    TimeoutMillis(i64),
    Header { name: String, values: Vec<String> },
    BasicAuth(BasicAuth),
    ContentType(ContentType),
}

/// Ordered set of options for one call.
///
/// ```
/// use outbound_core::{CallOptions, ContentType};
///
/// let opts = CallOptions::new()
///     .timeout_ms(500)
///     .header("X-Tenant", ["acme"])
///     .content_type(ContentType::Form);
/// assert_eq!(opts.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    options: Vec<CallOption>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn timeout_ms(mut self, millis: i64) -> Self {
        self.options.push(CallOption::TimeoutMillis(millis));
        self
    }

    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        self.timeout_ms(millis)
    }

    /// Set a header. Repeating a name appends the new values to the old ones.
    #[must_use]
    pub fn header<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.options.push(CallOption::Header {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    #[must_use]
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.options.push(CallOption::BasicAuth(BasicAuth {
            username: username.into(),
            password: password.into(),
        }));
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.options.push(CallOption::ContentType(content_type));
        self
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallOption> {
        self.options.iter()
    }

    /// Replay the options onto `spec` in the order they were added.
    pub fn apply(self, spec: &mut RequestSpec, default_timeout: Duration) {
        for option in self.options {
            match option {
                CallOption::TimeoutMillis(ms) if ms > 0 => {
                    spec.timeout = Duration::from_millis(ms.unsigned_abs());
                }
                CallOption::TimeoutMillis(_) => spec.timeout = default_timeout,
                CallOption::Header { name, values } => spec.merge_header(name, values),
                CallOption::BasicAuth(auth) => spec.basic_auth = Some(auth),
                CallOption::ContentType(ct) => spec.content_type = ct,
            }
        }
    }
}
