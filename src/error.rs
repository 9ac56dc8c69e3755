//! Errors reported by the transmitter.

use derive_more::Display;

use crate::transfer::TransferState;

/// A specialized `Result` for transfers over a driver with error type `E`.
pub type Result<T, E> = core::result::Result<T, TransferError<E>>;

/// Why a frame was not delivered.
///
/// Every variant except [`Busy`](Self::Busy) is reported after the line has
/// been returned to idle and the reset gap has elapsed, so the caller may
/// retry `send` straight away.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError<E> {
    /// Another transfer owns the output line.
    #[display("output line busy ({_0:?})")]
    Busy(TransferState),

    /// The DMA engine reported a fault mid-frame.
    #[display("transfer engine fault")]
    Transfer,

    /// The completion signal did not fire within the configured timeout.
    #[display("transfer did not complete in time")]
    Timeout,

    /// The channel driver failed.
    #[display("channel driver error: {_0:?}")]
    Driver(E),
}

impl<E: core::fmt::Debug> core::error::Error for TransferError<E> {}
