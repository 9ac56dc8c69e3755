//! DMA-ready symbol framebuffer for a WS2812 strip.
//!
//! The buffer stores the strip already encoded into hardware symbols, so a
//! DMA engine can stream it to the output peripheral without any per-bit work
//! while the frame is on the wire.
//!
//! # Memory Layout
//! ```text
//! | LEAD low symbols | LED 0: 24 symbols | ... | LED n-1: 24 symbols | TRAIL low symbols |
//! ```
//! - The leading run keeps the line low while the peripheral starts up, so
//!   glitches in its first words never reach the first LED.
//! - The trailing run keeps the line low after the last data symbol. Timer/PWM
//!   peripherals that repeat their last compare value need at least one.
//!
//! The length is `LEDS * 24 + LEAD + TRAIL` symbols (see
//! [`compute_buffer_len`]) and is fixed by the type.
//!
//! # Example
//! ```rust
//! use embedded_graphics::pixelcolor::RgbColor;
//! use ws2812_framebuffer::{Color, DmaFrameBuffer, SpiEncoding};
//!
//! const LEDS: usize = 144;
//!
//! let mut framebuffer = DmaFrameBuffer::<SpiEncoding, LEDS>::new();
//! framebuffer.clear();
//! framebuffer.set_color(0, Color::RED);
//! framebuffer.set_color(LEDS, Color::RED); // ignored, out of range
//!
//! assert_eq!(framebuffer.led(0), Some(Color::RED));
//! assert_eq!(framebuffer.raw().len(), LEDS * 24 + 96);
//! ```
//!
//! # Safety
//! The buffer implements `ReadBuffer` so its memory can be handed to a DMA
//! engine. It must not be mutated or moved while a transfer is running; the
//! [`Transmitter`](crate::transfer::Transmitter) enforces this by borrowing it
//! for the whole transfer.

use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_graphics::prelude::Point;

use super::Color;
use crate::encoding::{self, Encoding, Symbol, SymbolSequence, SYMBOLS_PER_LED};
#[cfg(not(feature = "esp-dma"))]
use embedded_dma::ReadBuffer;
#[cfg(feature = "esp-dma")]
use esp_hal::dma::ReadBuffer;

/// Default number of leading pad symbols (four LEDs worth).
pub const DEFAULT_LEAD: usize = 4 * SYMBOLS_PER_LED;

/// Computes the total number of symbols in a [`DmaFrameBuffer`].
///
/// # Arguments
///
/// * `leds` - Number of LEDs in the strip
/// * `lead` - Number of low symbols before the first LED
/// * `trail` - Number of low symbols after the last LED
#[must_use]
pub const fn compute_buffer_len(leds: usize, lead: usize, trail: usize) -> usize {
    leds * SYMBOLS_PER_LED + lead + trail
}

/// DMA-compatible framebuffer holding an encoded WS2812 strip.
///
/// # Type Parameters
/// - `E`: Symbol encoding, which also fixes the word type
/// - `LEDS`: Number of LEDs in the strip
/// - `LEAD`: Low symbols sent before the first LED
/// - `TRAIL`: Low symbols sent after the last LED
///
/// A new buffer is entirely low. Call [`clear`](Self::clear) or
/// [`set_color`](Self::set_color) to put valid LED data in it.
#[repr(C)]
#[repr(align(4))]
pub struct DmaFrameBuffer<
    E: Encoding,
    const LEDS: usize,
    const LEAD: usize = DEFAULT_LEAD,
    const TRAIL: usize = 0,
> {
    lead: [E::Symbol; LEAD],
    leds: [SymbolSequence<E::Symbol>; LEDS],
    trail: [E::Symbol; TRAIL],
    _encoding: PhantomData<E>,
}

impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize> Default
    for DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize>
    DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    /// Total number of symbols, padding included.
    pub const LEN: usize = compute_buffer_len(LEDS, LEAD, TRAIL);

    /// Create a new framebuffer with every symbol low.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lead: [<E::Symbol as Symbol>::LOW; LEAD],
            leds: [[<E::Symbol as Symbol>::LOW; SYMBOLS_PER_LED]; LEDS],
            trail: [<E::Symbol as Symbol>::LOW; TRAIL],
            _encoding: PhantomData,
        }
    }

    /// This returns the size of the DMA buffer in bytes.  Its used to calculate
    /// the number of DMA descriptors needed for `esp-hal`.
    #[cfg(feature = "esp-dma")]
    #[must_use]
    pub const fn dma_buffer_size_bytes() -> usize {
        Self::LEN * core::mem::size_of::<E::Symbol>()
    }

    /// Number of LEDs in the strip.
    #[must_use]
    pub const fn led_count(&self) -> usize {
        LEDS
    }

    /// Set every LED to black. Padding stays low.
    pub fn clear(&mut self) {
        for led in &mut self.leds {
            *led = [E::ZERO; SYMBOLS_PER_LED];
        }
    }

    /// Set every LED to the same color.
    pub fn fill(&mut self, color: Color) {
        let symbols = encoding::encode::<E>(color);
        self.leds.fill(symbols);
    }

    /// Set one LED. Indices outside the strip are ignored.
    #[inline]
    pub fn set_color(&mut self, index: usize, color: Color) {
        if let Some(led) = self.leds.get_mut(index) {
            encoding::encode_into::<E>(led, color);
        }
    }

    /// Decode one LED back into a color.
    ///
    /// Returns `None` for indices outside the strip and for slots that do not
    /// hold valid symbols (a fresh, never cleared buffer).
    #[must_use]
    pub fn led(&self, index: usize) -> Option<Color> {
        self.leds.get(index).and_then(encoding::decode::<E>)
    }

    /// The encoded symbols of one LED.
    #[must_use]
    pub fn led_symbols(&self, index: usize) -> Option<&SymbolSequence<E::Symbol>> {
        self.leds.get(index)
    }

    /// The complete symbol stream, padding included, in transmission order.
    #[must_use]
    pub fn raw(&self) -> &[E::Symbol] {
        // SAFETY: `Self` is `repr(C)` and made only of arrays of `E::Symbol`
        // followed by a zero-sized marker, so the arrays are laid out back to
        // back with no padding between them and `LEN` symbols start at `self`.
        unsafe { core::slice::from_raw_parts(core::ptr::from_ref(self).cast(), Self::LEN) }
    }

    fn set_pixel_internal(&mut self, p: Point, color: Color) {
        if p.x < 0 || p.y != 0 {
            return;
        }
        self.set_color(p.x as usize, color);
    }
}

impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize>
    embedded_graphics::prelude::OriginDimensions for DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    fn size(&self) -> embedded_graphics::prelude::Size {
        embedded_graphics::prelude::Size::new(LEDS as u32, 1)
    }
}

impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize>
    embedded_graphics::draw_target::DrawTarget for DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.set_pixel_internal(pixel.0, pixel.1);
        }
        Ok(())
    }
}

unsafe impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize> ReadBuffer
    for DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    #[cfg(not(feature = "esp-dma"))]
    type Word = E::Symbol;

    #[cfg(not(feature = "esp-dma"))]
    unsafe fn read_buffer(&self) -> (*const E::Symbol, usize) {
        let raw = self.raw();
        (raw.as_ptr(), raw.len())
    }

    #[cfg(feature = "esp-dma")]
    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        let raw = self.raw();
        (raw.as_ptr().cast(), core::mem::size_of_val(raw))
    }
}

unsafe impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize> ReadBuffer
    for &mut DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    #[cfg(not(feature = "esp-dma"))]
    type Word = E::Symbol;

    #[cfg(not(feature = "esp-dma"))]
    unsafe fn read_buffer(&self) -> (*const E::Symbol, usize) {
        let raw = self.raw();
        (raw.as_ptr(), raw.len())
    }

    #[cfg(feature = "esp-dma")]
    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        let raw = self.raw();
        (raw.as_ptr().cast(), core::mem::size_of_val(raw))
    }
}

impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize> core::fmt::Debug
    for DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DmaFrameBuffer")
            .field("leds", &LEDS)
            .field("lead", &LEAD)
            .field("trail", &TRAIL)
            .field("len", &Self::LEN)
            .field("word_size", &<E::Symbol as Symbol>::WORD_SIZE)
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize> defmt::Format
    for DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DmaFrameBuffer<{}, {}, {}>", LEDS, LEAD, TRAIL);
        defmt::write!(f, " len: {}", Self::LEN);
        defmt::write!(f, " word_size: {}", <E::Symbol as Symbol>::WORD_SIZE);
    }
}

impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize> super::FrameBuffer
    for DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    type Symbol = E::Symbol;

    fn get_word_size(&self) -> super::WordSize {
        <E::Symbol as Symbol>::WORD_SIZE
    }

    fn led_count(&self) -> usize {
        LEDS
    }

    fn raw(&self) -> &[E::Symbol] {
        DmaFrameBuffer::raw(self)
    }
}

impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize>
    super::FrameBufferOperations for DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
    fn clear(&mut self) {
        DmaFrameBuffer::clear(self);
    }

    fn set_color(&mut self, index: usize, color: Color) {
        DmaFrameBuffer::set_color(self, index, color);
    }
}

impl<E: Encoding, const LEDS: usize, const LEAD: usize, const TRAIL: usize>
    super::MutableFrameBuffer for DmaFrameBuffer<E, LEDS, LEAD, TRAIL>
{
}
