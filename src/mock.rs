//! Recording doubles for the hardware seams, used by the unit tests.

extern crate std;

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::boxed::Box;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin};

use crate::channel::{ChannelDriver, Level};
use crate::encoding::Symbol;
use crate::transfer::{OutputLine, TransferState};

/// Something the transmitter did to the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Listen,
    Level(Level),
    EnableOutput,
    StartClock,
    StopClock,
    Arm(Vec<u16>),
    /// Busy wait, in microseconds.
    Delay(u32),
}

#[derive(Default)]
struct Log {
    events: Vec<Event>,
    states: Vec<TransferState>,
    nested: Vec<Result<(), String>>,
}

/// Shared log written by the mock driver and delay.
#[derive(Clone, Default)]
pub struct Recorder(Rc<RefCell<Log>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.0.borrow_mut().events.push(event);
    }

    fn observe(&self, state: TransferState) {
        let mut log = self.0.borrow_mut();
        if log.states.last() != Some(&state) {
            log.states.push(state);
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().events.clone()
    }

    /// Line states seen by the driver, consecutive repeats collapsed.
    pub fn states(&self) -> Vec<TransferState> {
        self.0.borrow().states.clone()
    }

    /// Symbols of the most recent arm.
    pub fn armed(&self) -> Vec<u16> {
        self.0
            .borrow()
            .events
            .iter()
            .rev()
            .find_map(|e| match e {
                Event::Arm(symbols) => Some(symbols.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn armed_count(&self) -> usize {
        self.0
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, Event::Arm(_)))
            .count()
    }

    /// Results returned by the `on_arm` hook.
    pub fn nested_results(&self) -> Vec<Result<(), String>> {
        self.0.borrow().nested.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    Arm,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum OnArm {
    Complete,
    Fault,
    Nothing,
}

type ArmHook<'a> = Box<dyn FnMut(&'a OutputLine) -> Result<(), String> + 'a>;

/// Channel driver that records calls and plays the interrupt's part.
pub struct MockDriver<'a> {
    line: &'a OutputLine,
    recorder: Recorder,
    on_arm: OnArm,
    fail_arm: bool,
    hook: Option<ArmHook<'a>>,
    polls: usize,
    fail_after: Option<usize>,
    complete_after: Option<usize>,
}

impl<'a> MockDriver<'a> {
    /// A driver whose transfers complete as soon as they are armed.
    pub fn new(line: &'a OutputLine, recorder: Recorder) -> Self {
        Self {
            line,
            recorder,
            on_arm: OnArm::Complete,
            fail_arm: false,
            hook: None,
            polls: 0,
            fail_after: None,
            complete_after: None,
        }
    }

    /// Never raise the completion interrupt on arm.
    pub fn silent(mut self) -> Self {
        self.on_arm = OnArm::Nothing;
        self
    }

    /// Raise the error interrupt on arm.
    pub fn failing_interrupt(mut self) -> Self {
        self.on_arm = OnArm::Fault;
        self
    }

    /// Refuse to arm.
    pub fn failing_arm(mut self) -> Self {
        self.fail_arm = true;
        self
    }

    /// Report a DMA fault from the `n`th status poll.
    pub fn fail_after_polls(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Raise the completion interrupt during the `n`th status poll.
    pub fn complete_after_polls(mut self, n: usize) -> Self {
        self.complete_after = Some(n);
        self
    }

    /// Run `hook` while the transfer is in flight.
    pub fn on_arm<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&'a OutputLine) -> Result<(), String> + 'a,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Back to transfers that complete on arm.
    pub fn heal(&mut self) {
        self.on_arm = OnArm::Complete;
        self.fail_arm = false;
        self.fail_after = None;
        self.complete_after = None;
    }

    fn record(&self, event: Event) {
        self.recorder.observe(self.line.state());
        self.recorder.push(event);
    }
}

impl<S: Symbol + Into<u16>> ChannelDriver<S> for MockDriver<'_> {
    type Error = MockError;

    fn listen(&mut self) -> Result<(), Self::Error> {
        self.record(Event::Listen);
        Ok(())
    }

    fn set_output_level(&mut self, level: Level) -> Result<(), Self::Error> {
        self.record(Event::Level(level));
        Ok(())
    }

    fn enable_output(&mut self) -> Result<(), Self::Error> {
        self.record(Event::EnableOutput);
        Ok(())
    }

    fn start_clock(&mut self) -> Result<(), Self::Error> {
        self.record(Event::StartClock);
        Ok(())
    }

    fn stop_clock(&mut self) -> Result<(), Self::Error> {
        self.record(Event::StopClock);
        Ok(())
    }

    unsafe fn arm(&mut self, symbols: &[S]) -> Result<(), Self::Error> {
        if self.fail_arm {
            return Err(MockError::Arm);
        }
        self.polls = 0;
        self.record(Event::Arm(symbols.iter().map(|&s| s.into()).collect()));

        if let Some(hook) = self.hook.as_mut() {
            let result = hook(self.line);
            self.recorder.0.borrow_mut().nested.push(result);
        }

        match self.on_arm {
            OnArm::Complete => self.line.completion().signal(),
            OnArm::Fault => self.line.completion().signal_error(),
            OnArm::Nothing => {}
        }
        Ok(())
    }

    fn transfer_failed(&mut self) -> bool {
        self.polls += 1;
        if self.complete_after == Some(self.polls) {
            self.line.completion().signal();
        }
        self.fail_after.is_some_and(|n| self.polls >= n)
    }
}

/// Delay that records instead of waiting.
pub struct MockDelay {
    recorder: Recorder,
}

impl MockDelay {
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.recorder.push(Event::Delay(ns.div_ceil(1000)));
    }

    fn delay_us(&mut self, us: u32) {
        self.recorder.push(Event::Delay(us));
    }
}

/// Input pin whose level the test sets through a shared handle.
#[derive(Clone, Default)]
pub struct MockPin {
    high: Rc<Cell<bool>>,
    reads: Rc<Cell<usize>>,
}

impl MockPin {
    pub fn new(high: bool) -> Self {
        let pin = Self::default();
        pin.set_high(high);
        pin
    }

    pub fn set_high(&self, high: bool) {
        self.high.set(high);
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.high.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}
