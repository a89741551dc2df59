use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Operator abort flag shared between a signal handler and the pipeline.
///
/// Components check it before each gateway call; raising it never interrupts
/// a call already in flight.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
