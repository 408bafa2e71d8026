use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub setpoint: f64,
    /// Symmetric bound on the accumulated error
    pub integral_limit: f64,
}

impl PidConfig {
    pub fn nominal() -> Self {
        Self {
            kp: 1.0,
            ki: 0.1,
            kd: 0.05,
            setpoint: 0.0,
            integral_limit: 100.0,
        }
    }

    pub fn with_gains(mut self, kp: f64, ki: f64, kd: f64) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self::nominal()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Pid {
    #[serde(skip)]
    config: PidConfig,
    integral: f64,
    last_error: f64,
    output: f64,
}

impl Pid {
    pub fn new(config: PidConfig) -> Self {
        Self {
            config,
            integral: 0.0,
            last_error: 0.0,
            output: 0.0,
        }
    }

    pub fn compute(&mut self, measured: f64) -> f64 {
        let c = &self.config;
        let error = c.setpoint - measured;

        self.integral = (self.integral + error).clamp(-c.integral_limit, c.integral_limit);
        let derivative = error - self.last_error;
        self.last_error = error;

        self.output = c.kp * error + c.ki * self.integral + c.kd * derivative;
        self.output
    }

    /// Gains and setpoint are kept
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.config.setpoint = setpoint;
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn last_output(&self) -> f64 {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_step() {
        let mut pid = Pid::new(PidConfig::nominal());
        // error -2: P -2, I 0.1 * -2, D 0.05 * -2
        assert_relative_eq!(pid.compute(2.0), -2.3, epsilon = 1e-12);
        // error -2 again: integral -4, no derivative
        assert_relative_eq!(pid.compute(2.0), -2.4, epsilon = 1e-12);
    }

    #[test]
    fn integral_is_bounded() {
        let mut pid = Pid::new(PidConfig::nominal());
        for _ in 0..1000 {
            pid.compute(-7.5);
            assert!(pid.integral().abs() <= 100.0);
        }
        assert_relative_eq!(pid.integral(), 100.0);
        for _ in 0..1000 {
            pid.compute(50.0);
        }
        assert_relative_eq!(pid.integral(), -100.0);
    }

    #[test]
    fn reset_keeps_gains() {
        let cfg = PidConfig::nominal().with_gains(2.0, 0.0, 0.0);
        let mut pid = Pid::new(cfg);
        pid.set_setpoint(1.0);
        pid.compute(0.0);
        pid.reset();
        assert_relative_eq!(pid.integral(), 0.0);
        assert_relative_eq!(pid.compute(0.0), 2.0);
        assert_relative_eq!(pid.config().setpoint, 1.0);
    }
}
