//! Collector for recoverable irregularities found while ingesting or
//! serialising coverage documents. Each message is logged as it is recorded.

/// Ordered list of warning messages.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    messages: Vec<String>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message` at warn level and keep it.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    #[must_use]
    pub fn contains(&self, message: &str) -> bool {
        self.messages.iter().any(|m| m == message)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
