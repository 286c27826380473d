//! Sample-accurate parameter automation.
//!
//! An `AudioParam` holds a timeline of set-value and ramp events and can be
//! evaluated at any time on the audio clock. Ramps interpolate from the
//! previous event's time and value to their own.

#[derive(Debug, Clone, Copy, PartialEq)]
enum Automation {
    SetValue { time: f64, value: f32 },
    LinearRamp { time: f64, value: f32 },
    ExponentialRamp { time: f64, value: f32 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Automation::SetValue { time, .. }
            | Automation::LinearRamp { time, .. }
            | Automation::ExponentialRamp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Automation::SetValue { value, .. }
            | Automation::LinearRamp { value, .. }
            | Automation::ExponentialRamp { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioParam {
    default_value: f32,
    events: Vec<Automation>,
}

impl AudioParam {
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            events: Vec::new(),
        }
    }

    fn insert(&mut self, event: Automation) {
        let at = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(at, event);
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(Automation::SetValue { time, value });
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, end_time: f64) {
        self.insert(Automation::LinearRamp {
            time: end_time,
            value,
        });
    }

    /// Exponential ramp. If the start and target values are not both
    /// non-zero with the same sign, the start value is held until `end_time`.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, end_time: f64) {
        self.insert(Automation::ExponentialRamp {
            time: end_time,
            value,
        });
    }

    /// Drops every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Freezes the parameter at whatever it evaluates to at `time`,
    /// discarding later automation. Returns the frozen value.
    pub fn hold_at(&mut self, time: f64) -> f32 {
        let current = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.set_value_at_time(current, time);
        current
    }

    pub fn value_at(&self, time: f64) -> f32 {
        let next = self.events.partition_point(|e| e.time() <= time);
        let (t0, v0) = match next.checked_sub(1).map(|i| self.events[i]) {
            Some(prev) => (prev.time(), prev.value()),
            None => (0.0, self.default_value),
        };

        match self.events.get(next) {
            Some(Automation::LinearRamp { time: t1, value: v1 }) => {
                let span = t1 - t0;
                if span <= 0.0 {
                    return *v1;
                }
                let progress = ((time - t0) / span) as f32;
                v0 + (v1 - v0) * progress
            }
            Some(Automation::ExponentialRamp { time: t1, value: v1 }) => {
                let span = t1 - t0;
                if span <= 0.0 {
                    return *v1;
                }
                if v0 == 0.0 || v0 * v1 <= 0.0 {
                    return v0;
                }
                let progress = ((time - t0) / span) as f32;
                v0 * (v1 / v0).powf(progress)
            }
            _ => v0,
        }
    }

    /// True once no automation remains after `time`.
    pub fn is_settled(&self, time: f64) -> bool {
        self.events.last().is_none_or(|e| e.time() <= time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn default_value_without_events() {
        let p = AudioParam::new(0.7);
        assert_eq!(p.value_at(3.0), 0.7);
        assert!(p.is_settled(0.0));
    }

    #[test]
    fn linear_then_exponential_envelope() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 1.0);
        p.linear_ramp_to_value_at_time(0.5, 1.1);
        p.exponential_ramp_to_value_at_time(0.05, 1.2);

        assert_eq!(p.value_at(0.5), 0.0);
        assert!(approx(p.value_at(1.05), 0.25));
        assert!(approx(p.value_at(1.1), 0.5));
        // Halfway through an exponential ramp is the geometric mean.
        assert!(approx(p.value_at(1.15), (0.5f32 * 0.05).sqrt()));
        assert!(approx(p.value_at(1.2), 0.05));
        assert!(approx(p.value_at(9.0), 0.05));
        assert!(!p.is_settled(1.15));
        assert!(p.is_settled(1.2));
    }

    #[test]
    fn exponential_ramp_from_zero_holds() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.exponential_ramp_to_value_at_time(1.0, 1.0);
        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 1.0);
    }

    #[test]
    fn hold_at_freezes_mid_ramp() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.linear_ramp_to_value_at_time(1.0, 1.0);

        let held = p.hold_at(0.25);
        assert!(approx(held, 0.25));
        assert!(approx(p.value_at(0.5), 0.25));
        assert!(approx(p.value_at(2.0), 0.25));

        p.exponential_ramp_to_value_at_time(0.001, 0.55);
        assert!(approx(p.value_at(0.55), 0.001));
        assert!(p.value_at(0.4) < 0.25 && p.value_at(0.4) > 0.001);
    }

    #[test]
    fn cancel_drops_future_events_only() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.2, 0.0);
        p.set_value_at_time(0.9, 1.0);
        p.cancel_scheduled_values(0.5);
        assert_eq!(p.value_at(2.0), 0.2);
    }
}
