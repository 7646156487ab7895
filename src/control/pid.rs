//! PID controller for the purge interval
//!
//! Output = bias + Kp·e + Ki·∫e + Kd·de/dt, clamped to the output limits.
//! The integral is either frozen while the output saturates, or held in
//! a band proportional to the current error (see [`PidController::with_integral_band`]).

/// PID controller
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    bias: f32,
    integral: f32,
    prev_error: Option<f32>,
    output_min: f32,
    output_max: f32,
    integral_band: Option<(f32, f32)>,
}

impl PidController {
    pub fn new(kp: f32, ki: f32, kd: f32, bias: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            bias,
            integral: 0.0,
            prev_error: None,
            output_min: f32::MIN,
            output_max: f32::MAX,
            integral_band: None,
        }
    }

    /// Set output limits
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
    }

    /// Hold the integral within `[lo·e, hi·e]` of the current error `e`.
    pub fn with_integral_band(mut self, lo: f32, hi: f32) -> Self {
        self.integral_band = Some((lo, hi));
        self
    }

    /// Advance one step with an already-formed error term.
    pub fn update(&mut self, error: f32, dt: f32) -> f32 {
        let p = self.kp * error;

        self.integral += error * dt;
        if let Some((lo, hi)) = self.integral_band {
            let (a, b) = (error * lo, error * hi);
            self.integral = self.integral.clamp(a.min(b), a.max(b));
        }
        let i = self.ki * self.integral;

        // No derivative kick on the first sample.
        let derivative = match self.prev_error {
            Some(prev) if dt > 0.0 => (error - prev) / dt,
            _ => 0.0,
        };
        let d = self.kd * derivative;
        self.prev_error = Some(error);

        let output = (self.bias + p + i + d).clamp(self.output_min, self.output_max);

        // Anti-windup: if output is saturated, stop integrating
        if self.integral_band.is_none()
            && (output >= self.output_max || output <= self.output_min)
        {
            self.integral -= error * dt;
        }

        output
    }

    /// Error taken as `setpoint - measurement`.
    pub fn compute(&mut self, setpoint: f32, measurement: f32, dt: f32) -> f32 {
        self.update(setpoint - measurement, dt)
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }
}
