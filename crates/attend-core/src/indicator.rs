//! Visual feedback for the operator

/// Status light. Each signal may take a moment (a blink pattern) to play.
pub trait StatusIndicator {
    /// A fingerprint was accepted or an operation completed.
    fn success(&mut self) -> impl Future<Output = ()>;

    /// A fingerprint was not recognised or an operation failed.
    fn failure(&mut self) -> impl Future<Output = ()>;

    /// Steady "busy" light while waiting on the network.
    fn waiting(&mut self, on: bool) -> impl Future<Output = ()>;
}

/// Indicator for setups without a light.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    async fn success(&mut self) {}

    async fn failure(&mut self) {}

    async fn waiting(&mut self, _on: bool) {}
}
