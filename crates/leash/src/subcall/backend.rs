//! The injected inference capability.

/// Text and token usage reported for one completed call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawCompletion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl RawCompletion {
    pub fn new(text: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            text: text.into(),
            input_tokens,
            output_tokens,
        }
    }
}

/// Performs one bounded reasoning call over `prompt` and `chunk`.
///
/// Implementations block until the call finishes. They are never invoked
/// directly by task code; the [`SubcallGateway`](super::SubcallGateway)
/// wraps every call in the guard protocol. Failures are reported as plain
/// strings and surface as [`Error::Backend`](crate::Error::Backend).
pub trait SubcallBackend: Send + Sync {
    fn complete(&self, prompt: &str, chunk: &str) -> Result<RawCompletion, String>;
}

/// A backend wrapping a closure. Handy for tests and for adapting other
/// clients.
///
/// ```
/// use leash::subcall::{FnBackend, RawCompletion, SubcallBackend};
///
/// let echo = FnBackend::new(|prompt: &str, _chunk: &str| {
///     Ok(RawCompletion::new(prompt.to_uppercase(), 10, 2))
/// });
/// assert_eq!(echo.complete("hi", "").unwrap().text, "HI");
/// ```
pub struct FnBackend<F>(F)
where
    F: Fn(&str, &str) -> Result<RawCompletion, String> + Send + Sync;

impl<F> FnBackend<F>
where
    F: Fn(&str, &str) -> Result<RawCompletion, String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> SubcallBackend for FnBackend<F>
where
    F: Fn(&str, &str) -> Result<RawCompletion, String> + Send + Sync,
{
    fn complete(&self, prompt: &str, chunk: &str) -> Result<RawCompletion, String> {
        (self.0)(prompt, chunk)
    }
}
