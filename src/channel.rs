//! Hardware seam between the transmitter and the output peripheral.
//!
//! A [`ChannelDriver`] wraps one peripheral-clocked output channel (an SPI
//! shift register, a timer compare channel, ...) together with the DMA
//! channel feeding it and the data pin. It exposes only what the
//! [`Transmitter`](crate::transfer::Transmitter) needs to run a frame; all
//! clock tree, pin mux and peripheral setup happens before the driver is
//! built.
//!
//! The completion interrupt is not part of this trait: the handler the
//! integrator binds calls
//! [`CompletionSignal::signal`](crate::completion::CompletionSignal::signal)
//! on the shared [`OutputLine`](crate::transfer::OutputLine).

use crate::encoding::Symbol;

/// Logic level on the data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Line driven low.
    Low,
    /// Line driven high.
    High,
}

/// One output channel able to stream symbols of type `S`.
pub trait ChannelDriver<S: Symbol> {
    /// Driver-specific error.
    type Error: core::fmt::Debug;

    /// Enable the transfer-complete and transfer-error interrupts.
    ///
    /// Called once when the transmitter is initialized.
    fn listen(&mut self) -> Result<(), Self::Error>;

    /// Take the data pin away from the peripheral and drive it to `level`.
    fn set_output_level(&mut self, level: Level) -> Result<(), Self::Error>;

    /// Hand the data pin back to the peripheral and enable the channel.
    fn enable_output(&mut self) -> Result<(), Self::Error>;

    /// Start the clock generator shifting symbols onto the line.
    fn start_clock(&mut self) -> Result<(), Self::Error>;

    /// Stop the clock generator and disable the channel.
    fn stop_clock(&mut self) -> Result<(), Self::Error>;

    /// Start a DMA transfer of `symbols` into the channel's data register.
    ///
    /// # Safety
    ///
    /// The memory behind `symbols` is read by hardware after this call
    /// returns. The caller must keep it alive and unmodified until the
    /// completion signal fires or [`stop_clock`](Self::stop_clock) has been
    /// called.
    unsafe fn arm(&mut self, symbols: &[S]) -> Result<(), Self::Error>;

    /// Poll the DMA engine's error status.
    ///
    /// Drivers whose error interrupt already calls
    /// [`CompletionSignal::signal_error`](crate::completion::CompletionSignal::signal_error)
    /// can keep the default.
    fn transfer_failed(&mut self) -> bool {
        false
    }
}
