use std::fmt;

/// Notice produced by one probe observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    /// Up, and was up before
    Ok,
    /// First failure after being up
    Alert,
    /// Still failing
    Down,
    /// First success after being down
    Recovered,
}

impl HealthEvent {
    pub fn evaluate(was_down: bool, is_up: bool) -> HealthEvent {
        match (was_down, is_up) {
            (false, true) => HealthEvent::Ok,
            (false, false) => HealthEvent::Alert,
            (true, false) => HealthEvent::Down,
            (true, true) => HealthEvent::Recovered,
        }
    }

    /// Whether the observation flipped the up/down state
    pub fn is_transition(&self) -> bool {
        matches!(self, HealthEvent::Alert | HealthEvent::Recovered)
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthEvent::Ok => "OK",
            HealthEvent::Alert => "ALERT",
            HealthEvent::Down => "DOWN",
            HealthEvent::Recovered => "RECOVERED",
        }
    }
}

impl fmt::Display for HealthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Up/down state of one target
///
/// Starts out as up; only changes when an observation contradicts it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthState {
    is_down: bool,
}

impl HealthState {
    pub fn is_down(&self) -> bool {
        self.is_down
    }

    pub fn observe(&mut self, is_up: bool) -> HealthEvent {
        let event = HealthEvent::evaluate(self.is_down, is_up);
        self.is_down = !is_up;
        event
    }
}
