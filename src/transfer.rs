//! Frame transfer state machine.
//!
//! A [`Transmitter`] moves one framebuffer onto the wire through a
//! [`ChannelDriver`]. Each [`send`](Transmitter::send) walks the physical
//! output line through four states:
//!
//! ```text
//!  Idle ──send──▶ Priming ──armed──▶ Transmitting ──done/fault/timeout──▶ SettlingReset ──gap──▶ Idle
//! ```
//!
//! 1. **Priming** – the channel is disabled and the line is held low, then the
//!    level shifter gets a short high handshake pulse before the channel is
//!    handed back to the peripheral.
//! 2. **Transmitting** – the completion signal is cleared, the clock is started
//!    and DMA streams the buffer. The transmitter polls the
//!    [`CompletionSignal`] (set from the DMA interrupt) until it fires, the
//!    driver reports a fault, or the timeout runs out.
//! 3. **SettlingReset** – the clock is stopped, the line is forced low and held
//!    for the reset gap so the strip latches the frame.
//!
//! `send` returns only after the line is idle again. The state lives in a
//! shared [`OutputLine`] so that a second transmitter (or an interrupt
//! handler) trying to use the same line while a frame is in flight is turned
//! away with [`TransferError::Busy`] instead of corrupting it.
//!
//! # Example
//! ```rust,ignore
//! static LINE: OutputLine = OutputLine::new();
//!
//! #[interrupt]
//! fn DMAC_0() {
//!     // acknowledge the DMA channel interrupt, then
//!     LINE.completion().signal();
//! }
//!
//! let mut transmitter = Transmitter::new(&LINE, spi_dma_channel, delay, TransferConfig::new());
//! transmitter.init()?;
//! transmitter.send(&framebuffer)?;
//! ```

use core::cell::Cell;

use critical_section::Mutex;
use embassy_time::Duration;
use embedded_hal::delay::DelayNs;

use crate::channel::{ChannelDriver, Level};
use crate::completion::{Completion, CompletionSignal};
use crate::error::{Result, TransferError};
use crate::FrameBuffer;

/// Shortest reset gap the transmitter will honor.
pub const MIN_RESET_GAP: Duration = Duration::from_micros(80);

/// Default time the line is held low before a frame.
pub const DEFAULT_LINE_RESET: Duration = Duration::from_micros(200);
/// Default width of the level-shifter handshake pulse.
pub const DEFAULT_HANDSHAKE: Duration = Duration::from_micros(10);
/// Default settle time after re-enabling the channel.
pub const DEFAULT_SYNC: Duration = Duration::from_micros(10);
/// Default low time after a frame.
pub const DEFAULT_RESET_GAP: Duration = Duration::from_micros(200);
/// Default bound on the wait for the completion signal.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_millis(20);
/// Default spacing of completion polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(5);

/// Where the output line is in the frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferState {
    /// Ready for a new frame.
    Idle,
    /// Line reset and level-shifter handshake in progress.
    Priming,
    /// DMA is streaming the buffer.
    Transmitting,
    /// Line held low for the reset gap.
    SettlingReset,
}

/// Timing of the frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    line_reset: Duration,
    handshake: Duration,
    sync: Duration,
    reset_gap: Duration,
    completion_timeout: Duration,
    poll_interval: Duration,
}

impl TransferConfig {
    /// Timing used by the reference hardware (SPI at ~6.4 MHz behind a
    /// 3.3 V to 5 V level shifter).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            line_reset: DEFAULT_LINE_RESET,
            handshake: DEFAULT_HANDSHAKE,
            sync: DEFAULT_SYNC,
            reset_gap: DEFAULT_RESET_GAP,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Time the line is held low before the handshake pulse.
    #[must_use]
    pub const fn with_line_reset(mut self, line_reset: Duration) -> Self {
        self.line_reset = line_reset;
        self
    }

    /// Width of the high handshake pulse. Zero skips the pulse.
    #[must_use]
    pub const fn with_handshake(mut self, handshake: Duration) -> Self {
        self.handshake = handshake;
        self
    }

    /// Settle time between enabling the channel and arming DMA.
    #[must_use]
    pub const fn with_sync(mut self, sync: Duration) -> Self {
        self.sync = sync;
        self
    }

    /// Low time after each frame. Values below [`MIN_RESET_GAP`] are raised
    /// to it.
    #[must_use]
    pub const fn with_reset_gap(mut self, reset_gap: Duration) -> Self {
        self.reset_gap = if reset_gap.as_ticks() < MIN_RESET_GAP.as_ticks() {
            MIN_RESET_GAP
        } else {
            reset_gap
        };
        self
    }

    /// Upper bound on the wait for the completion signal.
    #[must_use]
    pub const fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    /// Spacing of completion polls. At least one microsecond.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = if interval.as_micros() == 0 {
            Duration::from_micros(1)
        } else {
            interval
        };
        self
    }

    /// Low time after each frame.
    #[must_use]
    pub const fn reset_gap(&self) -> Duration {
        self.reset_gap
    }

    /// Upper bound on the wait for the completion signal.
    #[must_use]
    pub const fn completion_timeout(&self) -> Duration {
        self.completion_timeout
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The physical data line: its transfer state and completion flag.
///
/// There is one per output pin, normally in a `static` so the completion
/// interrupt can reach it.
#[derive(Debug)]
pub struct OutputLine {
    state: Mutex<Cell<TransferState>>,
    completion: CompletionSignal,
}

impl OutputLine {
    /// An idle line.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(TransferState::Idle)),
            completion: CompletionSignal::new(),
        }
    }

    /// Current state of the line.
    pub fn state(&self) -> TransferState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    /// The flag the completion interrupt sets.
    pub fn completion(&self) -> &CompletionSignal {
        &self.completion
    }

    /// Move from idle to priming, or report who holds the line.
    fn claim(&self) -> core::result::Result<(), TransferState> {
        critical_section::with(|cs| {
            let state = self.state.borrow(cs);
            match state.get() {
                TransferState::Idle => {
                    state.set(TransferState::Priming);
                    Ok(())
                }
                other => Err(other),
            }
        })
    }

    fn set_state(&self, next: TransferState) {
        critical_section::with(|cs| self.state.borrow(cs).set(next));
    }
}

impl Default for OutputLine {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives framebuffers out over one [`OutputLine`].
pub struct Transmitter<'a, D, T> {
    line: &'a OutputLine,
    driver: D,
    delay: T,
    config: TransferConfig,
}

impl<'a, D, T: DelayNs> Transmitter<'a, D, T> {
    /// Create a transmitter. Call [`init`](Self::init) before the first frame.
    pub fn new(line: &'a OutputLine, driver: D, delay: T, config: TransferConfig) -> Self {
        Self {
            line,
            driver,
            delay,
            config,
        }
    }

    /// Current state of the line this transmitter drives.
    pub fn state(&self) -> TransferState {
        self.line.state()
    }

    /// The line this transmitter drives.
    pub fn line(&self) -> &'a OutputLine {
        self.line
    }

    /// Frame timing in use.
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Access the channel driver.
    pub fn driver(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Give back the driver and delay.
    pub fn release(self) -> (D, T) {
        (self.driver, self.delay)
    }

    /// Enable completion interrupts and park the line low.
    pub fn init<S>(&mut self) -> Result<(), D::Error>
    where
        S: crate::Symbol,
        D: ChannelDriver<S>,
    {
        self.line.completion.reset();
        self.driver.listen().map_err(TransferError::Driver)?;
        self.driver
            .set_output_level(Level::Low)
            .map_err(TransferError::Driver)?;
        debug!("output line ready");
        Ok(())
    }

    /// Transmit a framebuffer and wait for the strip to latch it.
    ///
    /// Returns [`TransferError::Busy`] without touching the hardware when the
    /// line is not idle. On every other outcome the line has been settled
    /// and is idle again when this returns.
    pub fn send<F>(&mut self, frame: &F) -> Result<(), D::Error>
    where
        F: FrameBuffer + ?Sized,
        D: ChannelDriver<F::Symbol>,
    {
        self.send_symbols(frame.raw())
    }

    /// Transmit a raw symbol stream. See [`send`](Self::send).
    pub fn send_symbols<S>(&mut self, symbols: &[S]) -> Result<(), D::Error>
    where
        S: crate::Symbol,
        D: ChannelDriver<S>,
    {
        if let Err(holder) = self.line.claim() {
            warn!("send rejected, line is {:?}", holder);
            return Err(TransferError::Busy(holder));
        }

        let result = self.prime().and_then(|()| self.transmit(symbols));
        let settled = self.settle();
        self.line.set_state(TransferState::Idle);

        if matches!(result, Err(TransferError::Driver(_))) || settled.is_err() {
            error!("channel driver failed, frame aborted");
        }
        result.and(settled)?;
        trace!("frame of {} symbols latched", symbols.len());
        Ok(())
    }

    fn prime<S>(&mut self) -> Result<(), D::Error>
    where
        S: crate::Symbol,
        D: ChannelDriver<S>,
    {
        self.driver
            .set_output_level(Level::Low)
            .map_err(TransferError::Driver)?;
        self.wait(self.config.line_reset);

        if self.config.handshake.as_ticks() > 0 {
            self.driver
                .set_output_level(Level::High)
                .map_err(TransferError::Driver)?;
            self.wait(self.config.handshake);
        }

        self.driver.enable_output().map_err(TransferError::Driver)?;
        self.wait(self.config.sync);
        Ok(())
    }

    fn transmit<S>(&mut self, symbols: &[S]) -> Result<(), D::Error>
    where
        S: crate::Symbol,
        D: ChannelDriver<S>,
    {
        self.line.completion.reset();
        self.line.set_state(TransferState::Transmitting);

        self.driver.start_clock().map_err(TransferError::Driver)?;
        // SAFETY: `symbols` stays borrowed until `send_symbols` returns, which
        // happens only after `settle` has stopped the clock.
        unsafe { self.driver.arm(symbols) }.map_err(TransferError::Driver)?;

        self.wait_for_completion()
    }

    fn wait_for_completion<S>(&mut self) -> Result<(), D::Error>
    where
        S: crate::Symbol,
        D: ChannelDriver<S>,
    {
        let step = self.config.poll_interval;
        let mut waited = Duration::from_ticks(0);
        loop {
            match self.line.completion.status() {
                Completion::Done => return Ok(()),
                Completion::Failed => {
                    error!("transfer engine reported a fault");
                    return Err(TransferError::Transfer);
                }
                Completion::Pending => {}
            }
            if self.driver.transfer_failed() {
                error!("transfer engine reported a fault");
                return Err(TransferError::Transfer);
            }
            if waited >= self.config.completion_timeout {
                error!(
                    "no completion after {} us",
                    self.config.completion_timeout.as_micros()
                );
                return Err(TransferError::Timeout);
            }
            self.wait(step);
            waited += step;
        }
    }

    fn settle<S>(&mut self) -> Result<(), D::Error>
    where
        S: crate::Symbol,
        D: ChannelDriver<S>,
    {
        self.line.set_state(TransferState::SettlingReset);
        // The line must be low for the full gap even if the driver complains.
        let stopped = self.driver.stop_clock();
        let parked = self.driver.set_output_level(Level::Low);
        self.wait(self.config.reset_gap);

        stopped.map_err(TransferError::Driver)?;
        parked.map_err(TransferError::Driver)
    }

    fn wait(&mut self, duration: Duration) {
        let us = duration.as_micros();
        if us > 0 {
            self.delay.delay_us(u32::try_from(us).unwrap_or(u32::MAX));
        }
    }
}
