//! Debounced binary proximity sensor.
//!
//! Modules like the D-SUN ultrasonic/IR proximity boards pull one digital
//! output high while something is in range. The raw line chatters around the
//! detection threshold, so [`Debouncer`] only accepts a new reading once it
//! has persisted for [`DEBOUNCE_WINDOW`].
//!
//! Polling is up to the caller: call [`ProximitySensor::poll`] once per
//! control-loop tick, at whatever rate the loop runs. Queries never touch the
//! pin; they report what the last poll concluded. A loop that polls less often
//! than the window simply sees changes later.
//!
//! ```rust,ignore
//! let mut sensor = ProximitySensor::new(pin, Instant::now())?;
//! loop {
//!     sensor.poll(Instant::now())?;
//!     if sensor.just_detected() {
//!         strip.fill_and_send(Color::WHITE)?;
//!     }
//!     if sensor.just_lost() {
//!         strip.clear();
//!         strip.send()?;
//!     }
//! }
//! ```

use embassy_time::{Duration, Instant};
use embedded_hal::digital::InputPin;

/// Time a changed reading must persist before it is accepted.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Debounced sensor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorState {
    /// No poll has happened yet.
    Unknown,
    /// Nothing in range.
    NoObject,
    /// Something in range.
    ObjectDetected,
}

/// An accepted transition between `NoObject` and `ObjectDetected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// `NoObject` to `ObjectDetected`.
    Detected,
    /// `ObjectDetected` to `NoObject`.
    Lost,
}

/// Pin level that means "object detected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveLevel {
    /// High means detected.
    #[default]
    High,
    /// Low means detected.
    Low,
}

/// Sensor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    window: Duration,
    active_level: ActiveLevel,
}

impl SensorConfig {
    /// [`DEBOUNCE_WINDOW`], active high.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window: DEBOUNCE_WINDOW,
            active_level: ActiveLevel::High,
        }
    }

    /// Dwell time before a changed reading is accepted. Zero accepts every
    /// change immediately.
    #[must_use]
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Which pin level means "object detected".
    #[must_use]
    pub const fn with_active_level(mut self, level: ActiveLevel) -> Self {
        self.active_level = level;
        self
    }

    /// Dwell time before a changed reading is accepted.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Which pin level means "object detected".
    #[must_use]
    pub const fn active_level(&self) -> ActiveLevel {
        self.active_level
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Pin-independent debounce state machine.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    current: SensorState,
    previous: SensorState,
    last_change: Option<Instant>,
    pending: Option<(SensorState, Instant)>,
    edge: Option<Edge>,
}

impl Debouncer {
    /// A debouncer in the `Unknown` state.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            current: SensorState::Unknown,
            previous: SensorState::Unknown,
            last_change: None,
            pending: None,
            edge: None,
        }
    }

    /// Feed one reading taken at `now` and return the debounced state.
    ///
    /// The first reading is accepted as is. After that, a reading that
    /// differs from the current state must be seen continuously for the
    /// window, measured from the first poll that saw it. A reading that
    /// agrees with the current state drops any half-counted change.
    pub fn update(&mut self, detected: bool, now: Instant) -> SensorState {
        self.edge = None;
        let candidate = if detected {
            SensorState::ObjectDetected
        } else {
            SensorState::NoObject
        };

        if self.current == SensorState::Unknown {
            self.accept(candidate, now);
            return self.current;
        }

        if candidate == self.current {
            self.pending = None;
            return self.current;
        }

        let since = match self.pending {
            Some((state, since)) if state == candidate => since,
            _ => {
                self.pending = Some((candidate, now));
                now
            }
        };
        if now.saturating_duration_since(since) >= self.window {
            self.accept(candidate, now);
        }
        self.current
    }

    fn accept(&mut self, next: SensorState, now: Instant) {
        debug!("proximity {:?} -> {:?}", self.current, next);
        self.edge = match (self.current, next) {
            (SensorState::NoObject, SensorState::ObjectDetected) => Some(Edge::Detected),
            (SensorState::ObjectDetected, SensorState::NoObject) => Some(Edge::Lost),
            _ => None,
        };
        self.previous = self.current;
        self.current = next;
        self.last_change = Some(now);
        self.pending = None;
    }

    /// Debounced state.
    #[must_use]
    pub fn state(&self) -> SensorState {
        self.current
    }

    /// State held before the most recent accepted transition.
    #[must_use]
    pub fn previous(&self) -> SensorState {
        self.previous
    }

    /// Whether an object is in range.
    #[must_use]
    pub fn is_detected(&self) -> bool {
        self.current == SensorState::ObjectDetected
    }

    /// Transition accepted by the most recent update, if any.
    #[must_use]
    pub fn edge(&self) -> Option<Edge> {
        self.edge
    }

    /// The most recent update accepted `NoObject` to `ObjectDetected`.
    #[must_use]
    pub fn just_detected(&self) -> bool {
        self.edge == Some(Edge::Detected)
    }

    /// The most recent update accepted `ObjectDetected` to `NoObject`.
    #[must_use]
    pub fn just_lost(&self) -> bool {
        self.edge == Some(Edge::Lost)
    }

    /// When the current state was accepted.
    #[must_use]
    pub fn last_change(&self) -> Option<Instant> {
        self.last_change
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

/// A proximity sensor on a digital input pin.
pub struct ProximitySensor<P> {
    pin: P,
    active_level: ActiveLevel,
    debouncer: Debouncer,
}

impl<P: InputPin> ProximitySensor<P> {
    /// Take the pin and poll it once, so the state is known from the start.
    pub fn new(pin: P, now: Instant) -> Result<Self, P::Error> {
        Self::with_config(pin, SensorConfig::new(), now)
    }

    /// [`new`](Self::new) with explicit settings.
    pub fn with_config(pin: P, config: SensorConfig, now: Instant) -> Result<Self, P::Error> {
        let mut sensor = Self {
            pin,
            active_level: config.active_level,
            debouncer: Debouncer::new(config.window),
        };
        sensor.poll(now)?;
        Ok(sensor)
    }

    /// Whether the pin currently reads "object detected", without debouncing.
    pub fn read_raw(&mut self) -> Result<bool, P::Error> {
        match self.active_level {
            ActiveLevel::High => self.pin.is_high(),
            ActiveLevel::Low => self.pin.is_low(),
        }
    }

    /// Sample the pin at `now` and update the debounced state.
    pub fn poll(&mut self, now: Instant) -> Result<SensorState, P::Error> {
        let detected = self.read_raw()?;
        Ok(self.debouncer.update(detected, now))
    }

    /// [`poll`](Self::poll) at the current time.
    pub fn poll_now(&mut self) -> Result<SensorState, P::Error> {
        self.poll(Instant::now())
    }

    /// Debounced state as of the last poll.
    pub fn state(&self) -> SensorState {
        self.debouncer.state()
    }

    /// Whether an object was in range as of the last poll.
    pub fn is_detected(&self) -> bool {
        self.debouncer.is_detected()
    }

    /// Whether the last poll saw an object arrive.
    pub fn just_detected(&self) -> bool {
        self.debouncer.just_detected()
    }

    /// Whether the last poll saw an object leave.
    pub fn just_lost(&self) -> bool {
        self.debouncer.just_lost()
    }

    /// The underlying state machine.
    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Give back the pin.
    pub fn release(self) -> P {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec;

    use super::*;
    use crate::mock::MockPin;

    const T0: u64 = 1_000;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(T0 + ms)
    }

    fn settled(detected: bool) -> Debouncer {
        let mut debouncer = Debouncer::default();
        debouncer.update(detected, at(0));
        debouncer
    }

    #[test]
    fn test_starts_unknown() {
        let debouncer = Debouncer::default();
        assert_eq!(debouncer.state(), SensorState::Unknown);
        assert_eq!(debouncer.previous(), SensorState::Unknown);
        assert!(!debouncer.is_detected());
        assert_eq!(debouncer.last_change(), None);
    }

    #[test]
    fn test_first_poll_leaves_unknown_without_edge() {
        let mut debouncer = Debouncer::default();
        assert_eq!(debouncer.update(true, at(0)), SensorState::ObjectDetected);
        assert_eq!(debouncer.previous(), SensorState::Unknown);
        assert!(!debouncer.just_detected());
        assert_eq!(debouncer.last_change(), Some(at(0)));

        let mut debouncer = Debouncer::default();
        assert_eq!(debouncer.update(false, at(0)), SensorState::NoObject);
        assert!(!debouncer.just_lost());
    }

    #[test]
    fn test_step_accepted_at_window() {
        let mut debouncer = settled(false);
        for ms in [10, 20, 30, 40, 59] {
            debouncer.update(true, at(ms));
            assert!(!debouncer.is_detected(), "detected early at {ms} ms");
        }
        assert!(!debouncer.is_detected());
        debouncer.update(true, at(60));
        assert!(debouncer.is_detected());
        assert!(debouncer.just_detected());
        assert_eq!(debouncer.last_change(), Some(at(60)));
        debouncer.update(true, at(70));
        assert!(debouncer.is_detected());
        assert!(!debouncer.just_detected());
    }

    #[test]
    fn test_step_with_fine_polling() {
        let mut debouncer = settled(false);
        let flip = 100;
        for ms in (flip..flip + 200).step_by(5) {
            debouncer.update(true, at(ms));
            assert_eq!(debouncer.is_detected(), ms >= flip + 50, "at {ms} ms");
        }
    }

    #[test]
    fn test_glitch_rejected() {
        let mut debouncer = settled(false);
        debouncer.update(true, at(10));
        debouncer.update(true, at(40));
        debouncer.update(false, at(45));
        debouncer.update(true, at(55));
        debouncer.update(true, at(70));
        assert!(!debouncer.is_detected());
        debouncer.update(true, at(105));
        assert!(debouncer.is_detected());
    }

    #[test]
    fn test_exactly_one_detected_edge() {
        let mut debouncer = settled(false);
        let readings = [
            (5, true),
            (10, false),
            (15, true),
            (20, false),
            (25, true),
            (40, true),
            (60, true),
            (75, true),
            (80, true),
            (120, true),
            (200, true),
        ];
        let edges: Vec<u64> = readings
            .iter()
            .filter_map(|&(ms, raw)| {
                debouncer.update(raw, at(ms));
                debouncer.just_detected().then_some(ms)
            })
            .collect();
        assert_eq!(edges, std::vec![75]);
        assert_eq!(debouncer.previous(), SensorState::NoObject);
    }

    #[test]
    fn test_lost_edge() {
        let mut debouncer = settled(true);
        debouncer.update(false, at(100));
        assert!(debouncer.is_detected());
        debouncer.update(false, at(150));
        assert!(debouncer.just_lost());
        assert!(!debouncer.just_detected());
        assert_eq!(debouncer.edge(), Some(Edge::Lost));
        assert_eq!(debouncer.previous(), SensorState::ObjectDetected);
        assert_eq!(debouncer.state(), SensorState::NoObject);

        debouncer.update(false, at(160));
        assert!(!debouncer.just_lost());
        assert_eq!(debouncer.previous(), SensorState::ObjectDetected);
    }

    #[test]
    fn test_zero_window() {
        let mut debouncer = Debouncer::new(Duration::from_ticks(0));
        debouncer.update(false, at(0));
        debouncer.update(true, at(1));
        assert!(debouncer.just_detected());
        debouncer.update(false, at(1));
        assert!(debouncer.just_lost());
    }

    #[test]
    fn test_time_going_backwards_does_not_accept() {
        let mut debouncer = settled(false);
        debouncer.update(true, at(100));
        debouncer.update(true, at(20));
        assert!(!debouncer.is_detected());
    }

    #[test]
    fn test_sensor_init_polls_once() {
        let pin = MockPin::new(true);
        let sensor = ProximitySensor::new(pin.clone(), at(0)).unwrap();
        assert_eq!(pin.reads(), 1);
        assert_eq!(sensor.state(), SensorState::ObjectDetected);
        assert!(sensor.is_detected());
        assert!(!sensor.just_detected());
    }

    #[test]
    fn test_sensor_queries_do_not_poll() {
        let pin = MockPin::new(false);
        let sensor = ProximitySensor::new(pin.clone(), at(0)).unwrap();
        pin.set_high(true);
        assert!(!sensor.is_detected());
        assert!(!sensor.just_detected());
        assert!(!sensor.just_lost());
        assert_eq!(pin.reads(), 1);
    }

    #[test]
    fn test_sensor_edges() {
        let pin = MockPin::new(false);
        let mut sensor = ProximitySensor::new(pin.clone(), at(0)).unwrap();

        pin.set_high(true);
        assert_eq!(sensor.poll(at(10)).unwrap(), SensorState::NoObject);
        assert_eq!(sensor.poll(at(60)).unwrap(), SensorState::ObjectDetected);
        assert!(sensor.just_detected());

        pin.set_high(false);
        sensor.poll(at(70)).unwrap();
        assert!(!sensor.just_detected());
        assert!(sensor.is_detected());
        sensor.poll(at(120)).unwrap();
        assert!(sensor.just_lost());
        assert!(!sensor.is_detected());
    }

    #[test]
    fn test_active_low() {
        let pin = MockPin::new(false);
        let config = SensorConfig::new()
            .with_active_level(ActiveLevel::Low)
            .with_window(Duration::from_millis(20));
        let mut sensor = ProximitySensor::with_config(pin.clone(), config, at(0)).unwrap();
        assert!(sensor.is_detected());
        assert!(sensor.read_raw().unwrap());

        pin.set_high(true);
        sensor.poll(at(5)).unwrap();
        sensor.poll(at(25)).unwrap();
        assert!(sensor.just_lost());
    }

    #[test]
    fn test_config_defaults() {
        let config = SensorConfig::default();
        assert_eq!(config.window(), DEBOUNCE_WINDOW);
        assert_eq!(config.window(), Duration::from_millis(50));
        assert_eq!(config.active_level(), ActiveLevel::High);
    }

    #[test]
    fn test_poll_now() {
        let pin = MockPin::new(true);
        let mut sensor = ProximitySensor::new(pin, Instant::now()).unwrap();
        assert_eq!(sensor.poll_now().unwrap(), SensorState::ObjectDetected);
        assert!(sensor.debouncer().last_change().is_some());
        let _pin = sensor.release();
    }
}
