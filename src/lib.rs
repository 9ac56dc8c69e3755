//! Symbol framebuffer and DMA transfer orchestration for WS2812/SK6812 LED
//! strips, plus a debounced proximity-sensor input.
//!
//! ## How WS2812 LED Strips Work
//!
//! WS2812-class LEDs ("NeoPixels") are daisy-chained over a single data line.
//! There is no clock wire: every bit is encoded in the width of a high pulse.
//!
//! ### Bit timing (nominal, ±150 ns tolerance)
//! - **0 bit** – ~0.40 µs high, ~0.85 µs low
//! - **1 bit** – ~0.80 µs high, ~0.45 µs low
//! - **Period** – ~1.25 µs per bit (800 kHz)
//!
//! ### Frame format
//! 1. Each LED consumes the first 24 bits it sees (green, red, blue, each most
//!    significant bit first) and forwards everything after that to the next
//!    LED in the chain.
//! 2. After the last LED's bits the line must stay low for the *reset gap*
//!    (at least 80 µs on current parts, 50 µs on older ones). Only then do the
//!    LEDs latch the shifted colors onto their outputs.
//! 3. A new frame may start once the reset gap has elapsed.
//!
//! ### Implications for software / hardware drivers
//! - Bit-banging at these timings is fragile, so a peripheral generates the
//!   pulses: a serial shift register clocking out one byte per bit, or a timer
//!   compare register loaded with one duty value per bit.
//! - The whole strip is precomputed as a run of such *symbols* and streamed to
//!   the peripheral by DMA, leaving the CPU free while the frame is shifted out.
//! - A gap in the stream longer than the reset gap latches a partial frame, so
//!   the stream must not stall once started.
//!
//! ## Crate layout
//!
//! - [`encoding`] maps colors to symbols ([`encoding::SpiEncoding`] for a
//!   ~6.4 MHz shift register, [`encoding::PwmEncoding`] for a 16 MHz timer).
//! - [`framebuffer::DmaFrameBuffer`] holds the encoded strip plus leading and
//!   trailing low padding and implements the `ReadBuffer` trait for DMA.
//! - [`transfer::Transmitter`] drives a buffer out through a
//!   [`channel::ChannelDriver`], walking the
//!   Idle → Priming → Transmitting → SettlingReset cycle on a shared
//!   [`transfer::OutputLine`].
//! - [`completion::CompletionSignal`] carries the DMA completion interrupt to
//!   the waiting transmitter.
//! - [`strip::LedStrip`] bundles a buffer and a transmitter behind
//!   `set_color` / `clear` / `send`.
//! - [`proximity`] debounces a binary proximity sensor and reports edges.
//!
//! ## Available Feature Flags
//!
//! ### `esp-dma` Feature (required when using `esp-hal`)
//! **Required** when using the `esp-hal` crate for ESP32 development. This feature
//! switches the `ReadBuffer` trait implementation from `embedded-dma` to `esp-hal::dma`.
//! The `esp32`, `esp32s3` and `esp32c6` features select the chip and enable it.
//!
//! ```toml
//! [dependencies]
//! ws2812-framebuffer = { version = "0.1.0", features = ["esp32s3"] }
//! ```
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public types and routes the crate's
//! diagnostics through `defmt`.
//!
//! ### `log` Feature
//! Routes the crate's diagnostics through the `log` facade. Ignored when
//! `defmt` is enabled.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

#[macro_use]
mod fmt;

use core::convert::Infallible;

#[cfg(not(feature = "esp-dma"))]
use embedded_dma::ReadBuffer;
use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::pixelcolor::Rgb888;
#[cfg(feature = "esp-dma")]
use esp_hal::dma::ReadBuffer;

pub mod channel;
pub mod completion;
pub mod encoding;
pub mod error;
pub mod framebuffer;
pub mod proximity;
pub mod strip;
pub mod transfer;

#[cfg(test)]
mod mock;

pub use encoding::{Encoding, PwmEncoding, SpiEncoding, Symbol};
pub use error::TransferError;
pub use framebuffer::DmaFrameBuffer;
pub use strip::LedStrip;
pub use transfer::{OutputLine, TransferConfig, TransferState, Transmitter};

/// Color type used in the framebuffer
pub type Color = Rgb888;

/// Word size configuration for the framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordSize {
    /// 8-bit word size
    Eight,
    /// 16-bit word size
    Sixteen,
}

/// Trait for read-only framebuffers
///
/// This trait defines the basic functionality required for a framebuffer
/// that can be read from and transferred via DMA.
pub trait FrameBuffer: ReadBuffer {
    /// Hardware word the buffer is made of
    type Symbol: Symbol;

    /// Returns the word size configuration for this framebuffer
    fn get_word_size(&self) -> WordSize;

    /// Number of LEDs the buffer addresses
    fn led_count(&self) -> usize;

    /// The complete symbol stream, padding included, in transmission order.
    ///
    /// The returned slice must not be mutated while a transfer is in flight.
    fn raw(&self) -> &[Self::Symbol];
}

/// Trait for mutable framebuffers
///
/// This trait extends `FrameBuffer` with the ability to draw to the framebuffer
/// using the `embedded_graphics` drawing primitives. The strip is exposed as a
/// canvas one pixel high.
pub trait MutableFrameBuffer:
    FrameBuffer + DrawTarget<Color = Color, Error = Infallible>
{
}

/// Trait for all operations a user may want to call on a framebuffer.
pub trait FrameBufferOperations: FrameBuffer {
    /// Set every LED to black.
    fn clear(&mut self);

    /// Set one LED. Indices outside the strip are ignored.
    fn set_color(&mut self, index: usize, color: Color);
}
