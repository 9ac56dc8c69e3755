//! Color to symbol encoding for WS2812-class LEDs.
//!
//! Every color bit becomes one fixed-width hardware *symbol*: a word that,
//! when shifted out by the peripheral at its configured clock rate, produces
//! the high/low pulse the LED samples as a logical `0` or `1`.
//!
//! Each LED consumes 24 symbols, green first, then red, then blue, each
//! channel most significant bit first:
//!
//! ```text
//! symbol index   0 ..  7   8 .. 15   16 .. 23
//! channel        G7 .. G0  R7 .. R0  B7 .. B0
//! ```
//!
//! Two calibrated encodings are provided:
//! - [`SpiEncoding`]: one byte per bit for a serial shift register running at
//!   ~6.4 MHz (0.156 µs per clock).
//! - [`PwmEncoding`]: one 16-bit compare value per bit for a timer clocked at
//!   16 MHz with a 1.25 µs period.
//!
//! # Example
//! ```rust
//! use ws2812_framebuffer::encoding::{decode, encode, Encoding, SpiEncoding};
//! use ws2812_framebuffer::Color;
//!
//! let symbols = encode::<SpiEncoding>(Color::new(255, 0, 0));
//! // green is sent first and is zero
//! assert_eq!(symbols[0], SpiEncoding::ZERO);
//! // red follows
//! assert_eq!(symbols[8], SpiEncoding::ONE);
//! assert_eq!(decode::<SpiEncoding>(&symbols), Some(Color::new(255, 0, 0)));
//! ```

use bitfield::bitfield;
use embedded_graphics::pixelcolor::RgbColor;

use super::{Color, WordSize};

/// Number of symbols needed to encode one LED.
pub const SYMBOLS_PER_LED: usize = 24;

/// Encoded color of a single LED, in transmission order.
pub type SymbolSequence<S> = [S; SYMBOLS_PER_LED];

/// A hardware word the output peripheral consumes for every color bit.
pub trait Symbol: Copy + Default + Eq + core::fmt::Debug + 'static {
    /// Word that keeps the data line low for a whole symbol period.
    const LOW: Self;
    /// Width of the word as seen by the DMA engine.
    const WORD_SIZE: WordSize;
}

impl Symbol for u8 {
    const LOW: Self = 0;
    const WORD_SIZE: WordSize = WordSize::Eight;
}

impl Symbol for u16 {
    const LOW: Self = 0;
    const WORD_SIZE: WordSize = WordSize::Sixteen;
}

/// Calibrated symbol pair for one peripheral family and clock rate.
pub trait Encoding {
    /// Word type shifted out by the peripheral.
    type Symbol: Symbol;
    /// Symbol for a logical `0` (short high pulse).
    const ZERO: Self::Symbol;
    /// Symbol for a logical `1` (long high pulse).
    const ONE: Self::Symbol;
}

/// Serial shift register (SPI MOSI) at ~6.4 MHz, 8 clocks per color bit.
///
/// - `0`: `0b1110_0000`, ~0.47 µs high / ~0.78 µs low
/// - `1`: `0b1111_1100`, ~0.94 µs high / ~0.31 µs low
///
/// The `1` pattern is one clock longer than the nominal timing to absorb the
/// propagation delay of a 3.3 V to 5 V level shifter on the data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiEncoding;

impl Encoding for SpiEncoding {
    type Symbol = u8;
    const ZERO: u8 = 0b1110_0000;
    const ONE: u8 = 0b1111_1100;
}

/// Timer clock feeding [`PwmEncoding`] compare values, in MHz.
pub const PWM_CLOCK_MHZ: u32 = 16;

/// WS2812 high time of a `0` bit in ns.
const T0H_NS: u32 = 400;
/// WS2812 high time of a `1` bit in ns.
const T1H_NS: u32 = 800;
/// WS2812 bit period in ns.
const BIT_PERIOD_NS: u32 = 1250;

/// Convert nanoseconds to timer ticks, rounding.
const fn to_ticks(ns: u32) -> u32 {
    (ns * PWM_CLOCK_MHZ + 500) / 1000
}

/// Timer period (top value) in ticks that [`PwmEncoding`] expects.
pub const PWM_PERIOD_TICKS: u16 = to_ticks(BIT_PERIOD_NS) as u16;

/// Timer/PWM compare register at 16 MHz with a 20 tick period.
///
/// - `0`: 6 ticks high (~0.38 µs)
/// - `1`: 13 ticks high (~0.81 µs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmEncoding;

impl Encoding for PwmEncoding {
    type Symbol = u16;
    const ZERO: u16 = to_ticks(T0H_NS) as u16;
    const ONE: u16 = to_ticks(T1H_NS) as u16;
}

bitfield! {
    /// A color packed in WS2812 wire order.
    ///
    /// Bit 23 is transmitted first:
    /// - Bits 23-16: green
    /// - Bits 15-8: red
    /// - Bits 7-0: blue
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct GrbWord(u32);
    impl Debug;
    pub u8, green, set_green: 23, 16;
    pub u8, red, set_red: 15, 8;
    pub u8, blue, set_blue: 7, 0;
}

impl GrbWord {
    /// Pack a color.
    #[must_use]
    pub fn from_color(color: Color) -> Self {
        let mut word = Self(0);
        word.set_green(color.g());
        word.set_red(color.r());
        word.set_blue(color.b());
        word
    }

    /// Unpack into a color.
    #[must_use]
    pub fn to_color(self) -> Color {
        Color::new(self.red(), self.green(), self.blue())
    }

    /// Value of the `n`th transmitted bit (0 is sent first).
    #[inline]
    #[must_use]
    pub fn wire_bit(self, n: usize) -> bool {
        (self.0 >> (SYMBOLS_PER_LED - 1 - n)) & 1 != 0
    }
}

/// Encode a color into its 24 symbols.
#[must_use]
pub fn encode<E: Encoding>(color: Color) -> SymbolSequence<E::Symbol> {
    let mut symbols = [E::ZERO; SYMBOLS_PER_LED];
    encode_into::<E>(&mut symbols, color);
    symbols
}

/// Encode a color in place, overwriting all 24 symbols.
#[inline]
pub fn encode_into<E: Encoding>(symbols: &mut SymbolSequence<E::Symbol>, color: Color) {
    let word = GrbWord::from_color(color);
    for (n, symbol) in symbols.iter_mut().enumerate() {
        *symbol = if word.wire_bit(n) { E::ONE } else { E::ZERO };
    }
}

/// Recover the color from 24 symbols.
///
/// Returns `None` if any symbol is neither [`Encoding::ZERO`] nor
/// [`Encoding::ONE`].
#[must_use]
pub fn decode<E: Encoding>(symbols: &SymbolSequence<E::Symbol>) -> Option<Color> {
    let mut word = 0u32;
    for symbol in symbols {
        let bit = match *symbol {
            s if s == E::ONE => 1,
            s if s == E::ZERO => 0,
            _ => return None,
        };
        word = (word << 1) | bit;
    }
    Some(GrbWord(word).to_color())
}
