//! PID controller for the kiln heating elements
//!
//! Proportional-integral-derivative controller producing an SSR on-time
//! per pulse window.  The integral term lives in output units and is
//! clamped to the output limits, and the derivative acts on the
//! measurement so setpoint steps don't kick the output.

/// PID controller
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    setpoint: f32,
    integral: f32,
    prev_measurement: Option<f32>,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32, setpoint: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            setpoint,
            integral: 0.0,
            prev_measurement: None,
            output_min: 0.0,
            output_max: 100.0,
        }
    }

    /// Set output limits.  The integrator is pulled inside the new range,
    /// so a momentary narrow limit discards accumulated wind-up.
    pub fn set_limits(&mut self, min: f32, max: f32) {
        if min >= max {
            return;
        }
        self.output_min = min;
        self.output_max = max;
        self.integral = self.integral.clamp(min, max);
    }

    pub fn set_tunings(&mut self, kp: f32, ki: f32, kd: f32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Update setpoint
    pub fn set_target(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    pub fn limits(&self) -> (f32, f32) {
        (self.output_min, self.output_max)
    }

    /// Compute PID output given current measurement and seconds since the
    /// previous computation.
    pub fn compute(&mut self, measurement: f32, dt: f32) -> f32 {
        let error = self.setpoint - measurement;

        // Proportional
        let p = self.kp * error;

        // Integral (clamped to the output range)
        self.integral = (self.integral + self.ki * error * dt).clamp(self.output_min, self.output_max);

        // Derivative on measurement
        let d = match self.prev_measurement {
            Some(prev) if dt > 0.0 => -self.kd * (measurement - prev) / dt,
            _ => 0.0,
        };
        self.prev_measurement = Some(measurement);

        (p + self.integral + d).clamp(self.output_min, self.output_max)
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_measurement = None;
    }
}
