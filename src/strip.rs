//! High level strip handle.
//!
//! [`LedStrip`] pairs a [`DmaFrameBuffer`] with a [`Transmitter`] and exposes
//! the handful of calls application code needs:
//!
//! ```rust,ignore
//! static LINE: OutputLine = OutputLine::new();
//! static mut FB: DmaFrameBuffer<SpiEncoding, 60> = DmaFrameBuffer::new();
//!
//! let transmitter = Transmitter::new(&LINE, driver, delay, TransferConfig::new());
//! let mut strip = LedStrip::new(unsafe { &mut *addr_of_mut!(FB) }, transmitter)?;
//!
//! strip.set_color(0, 255, 0, 0);
//! strip.set_color(1, 0, 255, 0);
//! strip.send()?;
//! ```
//!
//! It also implements [`SmartLedsWrite`] so it can stand in for any other
//! `smart-leds` driver.

use embedded_hal::delay::DelayNs;
use smart_leds::{SmartLedsWrite, RGB8};

use crate::channel::ChannelDriver;
use crate::encoding::Encoding;
use crate::error::Result;
use crate::framebuffer::{DmaFrameBuffer, DEFAULT_LEAD};
use crate::transfer::Transmitter;
use crate::Color;

/// A strip of `LEDS` LEDs driven through one output channel.
pub struct LedStrip<
    'a,
    E: Encoding,
    D,
    T,
    const LEDS: usize,
    const LEAD: usize = DEFAULT_LEAD,
    const TRAIL: usize = 0,
> {
    buffer: &'a mut DmaFrameBuffer<E, LEDS, LEAD, TRAIL>,
    transmitter: Transmitter<'a, D, T>,
}

impl<'a, E, D, T, const LEDS: usize, const LEAD: usize, const TRAIL: usize>
    LedStrip<'a, E, D, T, LEDS, LEAD, TRAIL>
where
    E: Encoding,
    D: ChannelDriver<E::Symbol>,
    T: DelayNs,
{
    /// Take over `buffer`, blank it and prepare the output line.
    ///
    /// Nothing is transmitted; the first [`send`](Self::send) turns every LED
    /// off unless colors were set in between.
    pub fn new(
        buffer: &'a mut DmaFrameBuffer<E, LEDS, LEAD, TRAIL>,
        mut transmitter: Transmitter<'a, D, T>,
    ) -> Result<Self, D::Error> {
        buffer.clear();
        transmitter.init::<E::Symbol>()?;
        Ok(Self {
            buffer,
            transmitter,
        })
    }

    /// Number of LEDs on the strip.
    pub const fn len(&self) -> usize {
        LEDS
    }

    /// Whether the strip has no LEDs at all.
    pub const fn is_empty(&self) -> bool {
        LEDS == 0
    }

    /// Set one LED in the buffer. Indices past the end are ignored.
    pub fn set_color(&mut self, index: usize, r: u8, g: u8, b: u8) {
        self.buffer.set_color(index, Color::new(r, g, b));
    }

    /// Turn every LED off in the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Transmit the buffer and wait until the strip has latched it.
    pub fn send(&mut self) -> Result<(), D::Error> {
        self.transmitter.send(&*self.buffer)
    }

    /// The framebuffer, for drawing with `embedded-graphics`.
    pub fn buffer(&mut self) -> &mut DmaFrameBuffer<E, LEDS, LEAD, TRAIL> {
        &mut *self.buffer
    }

    /// The transmitter.
    pub fn transmitter(&mut self) -> &mut Transmitter<'a, D, T> {
        &mut self.transmitter
    }

    /// Split the strip back into its buffer and transmitter.
    pub fn release(
        self,
    ) -> (
        &'a mut DmaFrameBuffer<E, LEDS, LEAD, TRAIL>,
        Transmitter<'a, D, T>,
    ) {
        (self.buffer, self.transmitter)
    }
}

impl<E, D, T, const LEDS: usize, const LEAD: usize, const TRAIL: usize> SmartLedsWrite
    for LedStrip<'_, E, D, T, LEDS, LEAD, TRAIL>
where
    E: Encoding,
    D: ChannelDriver<E::Symbol>,
    T: DelayNs,
{
    type Error = crate::error::TransferError<D::Error>;
    type Color = RGB8;

    /// Write the colors in order starting at LED 0, blank the rest and send.
    ///
    /// Colors past the end of the strip are dropped.
    fn write<I, C>(&mut self, iterator: I) -> core::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = C>,
        C: Into<Self::Color>,
    {
        self.buffer.clear();
        for (index, color) in iterator.into_iter().take(LEDS).enumerate() {
            let RGB8 { r, g, b } = color.into();
            self.buffer.set_color(index, Color::new(r, g, b));
        }
        self.send()
    }
}
