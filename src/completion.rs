//! Completion flag shared between the DMA interrupt and the transmitter.
//!
//! The interrupt handler is the only writer of a terminal status, the
//! transmitter's wait loop the only reader. The flag is a single atomic byte,
//! so it needs no compare-and-swap and works on cores without one.
//!
//! ```rust
//! use ws2812_framebuffer::completion::{Completion, CompletionSignal};
//!
//! static DONE: CompletionSignal = CompletionSignal::new();
//!
//! // in the DMA interrupt handler
//! DONE.signal();
//!
//! assert_eq!(DONE.status(), Completion::Done);
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

const PENDING: u8 = 0;
const DONE: u8 = 1;
const FAILED: u8 = 2;

/// Observed state of the transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// No completion or fault reported since the last reset.
    Pending,
    /// The engine finished moving the whole buffer.
    Done,
    /// The engine reported a fault.
    Failed,
}

/// Single-producer / single-consumer completion flag.
#[derive(Debug)]
pub struct CompletionSignal {
    state: AtomicU8,
}

impl CompletionSignal {
    /// Create a pending signal.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
        }
    }

    /// Report that the transfer completed. Call from the completion interrupt.
    pub fn signal(&self) {
        self.state.store(DONE, Ordering::Release);
    }

    /// Report that the transfer engine faulted. Call from the interrupt.
    pub fn signal_error(&self) {
        self.state.store(FAILED, Ordering::Release);
    }

    /// Re-arm the signal before starting a transfer.
    pub fn reset(&self) {
        self.state.store(PENDING, Ordering::Release);
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> Completion {
        match self.state.load(Ordering::Acquire) {
            DONE => Completion::Done,
            FAILED => Completion::Failed,
            _ => Completion::Pending,
        }
    }

    /// Whether a terminal status has been reported.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.status() != Completion::Pending
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}
