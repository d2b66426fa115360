// Software stepper with trapezoidal speed ramping
//
// Tracks position the way a step/dir driven motor would, without touching any
// pins. Step timing follows the classic per-step interval recurrence
// (cn = cn - 2cn / (4n + 1)), so `run()` must be polled faster than the
// target step rate for the ramp to be honoured.

use std::time::Instant;

use super::{EngineFactory, MotionEngine, StepperConfig};

const MICROS_PER_SEC: f32 = 1_000_000.0;

// Rate limits, in steps/s and steps/s^2. The fastest ramp must still give a
// first-step interval of at least one microsecond, the clock resolution.
pub const MIN_STEP_RATE: f32 = 1.0e-3;
pub const MAX_STEP_RATE: f32 = 1.0e6;
pub const MIN_ACCELERATION: f32 = 1.0e-3;
pub const MAX_ACCELERATION: f32 = 1.0e11;

// Ramp counters never exceed the largest reachable distance
const MAX_RAMP_STEPS: f32 = i32::MAX as f32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Ccw,
    Cw,
}

#[derive(Debug)]
pub struct VirtualStepper {
    config: StepperConfig,
    origin: Instant,

    current_pos: i32,
    target_pos: i32,
    speed: f32,        // steps per second, signed
    max_speed: f32,    // steps per second
    acceleration: f32, // steps per second^2
    step_interval: u64, // microseconds, 0 = not stepping
    last_step_time: u64,

    n: i64,   // step counter within the current ramp, negative while decelerating
    c0: f32,  // initial step interval
    cn: f32,  // last step interval
    cmin: f32, // interval at max speed
    direction: Direction,
    outputs_enabled: bool,
}

impl VirtualStepper {
    pub fn new(config: StepperConfig) -> Self {
        let mut stepper = Self {
            config,
            origin: Instant::now(),
            current_pos: 0,
            target_pos: 0,
            speed: 0.0,
            max_speed: 0.0,
            acceleration: 0.0,
            step_interval: 0,
            last_step_time: 0,
            n: 0,
            c0: 0.0,
            cn: 0.0,
            cmin: 1.0,
            direction: Direction::Ccw,
            outputs_enabled: false,
        };
        stepper.enable_outputs();
        stepper.set_acceleration(1.0);
        stepper.set_max_speed(1.0);
        stepper
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    pub fn outputs_enabled(&self) -> bool {
        self.outputs_enabled
    }

    fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    /// `run` against an explicit timestamp in microseconds
    pub fn run_at(&mut self, now_us: u64) -> bool {
        if self.run_speed_at(now_us) {
            self.compute_new_speed();
        }
        self.speed != 0.0 || self.distance_to_go() != 0
    }

    /// `run_speed` against an explicit timestamp in microseconds
    pub fn run_speed_at(&mut self, now_us: u64) -> bool {
        if self.step_interval == 0 {
            return false;
        }
        if now_us.wrapping_sub(self.last_step_time) < self.step_interval {
            return false;
        }
        self.current_pos = match self.direction {
            Direction::Cw => self.current_pos.wrapping_add(1),
            Direction::Ccw => self.current_pos.wrapping_sub(1),
        };
        self.last_step_time = now_us;
        true
    }

    fn steps_to_stop(&self) -> i64 {
        ((self.speed * self.speed) / (2.0 * self.acceleration)).min(MAX_RAMP_STEPS) as i64
    }

    fn compute_new_speed(&mut self) {
        let distance_to = self.distance_to_go() as i64;
        let steps_to_stop = self.steps_to_stop();

        if distance_to == 0 && steps_to_stop <= 1 {
            // At target and slow enough to stop on the spot
            self.step_interval = 0;
            self.speed = 0.0;
            self.n = 0;
            return;
        }

        if distance_to > 0 {
            if self.n > 0 {
                if steps_to_stop >= distance_to || self.direction == Direction::Ccw {
                    self.n = -steps_to_stop; // start decelerating
                }
            } else if self.n < 0 && steps_to_stop < distance_to && self.direction == Direction::Cw {
                self.n = -self.n; // accelerate again
            }
        } else if distance_to < 0 {
            if self.n > 0 {
                if steps_to_stop >= -distance_to || self.direction == Direction::Cw {
                    self.n = -steps_to_stop;
                }
            } else if self.n < 0 && steps_to_stop < -distance_to && self.direction == Direction::Ccw {
                self.n = -self.n;
            }
        }

        if self.n == 0 {
            // First step from standstill
            self.cn = self.c0;
            self.direction = if distance_to > 0 {
                Direction::Cw
            } else {
                Direction::Ccw
            };
        } else {
            self.cn -= (2.0 * self.cn) / (4.0 * self.n as f32 + 1.0);
            self.cn = self.cn.max(self.cmin);
        }
        self.n = self.n.saturating_add(1);
        self.step_interval = self.cn as u64;
        self.speed = MICROS_PER_SEC / self.cn;
        if self.direction == Direction::Ccw {
            self.speed = -self.speed;
        }
    }
}

impl MotionEngine for VirtualStepper {
    fn move_to(&mut self, absolute: i32) {
        if self.target_pos != absolute {
            self.target_pos = absolute;
            self.compute_new_speed();
        }
    }

    fn move_by(&mut self, relative: i32) {
        self.move_to(self.current_pos.wrapping_add(relative));
    }

    fn set_max_speed(&mut self, speed: f32) {
        if speed.is_nan() || speed == 0.0 {
            return;
        }
        let speed = speed.abs().clamp(MIN_STEP_RATE, MAX_STEP_RATE);
        if self.max_speed != speed {
            self.max_speed = speed;
            self.cmin = MICROS_PER_SEC / speed;
            // Already moving: recompute where the ramp should be
            if self.n > 0 {
                self.n = self.steps_to_stop();
                self.compute_new_speed();
            }
        }
    }

    fn max_speed(&self) -> f32 {
        self.max_speed
    }

    fn set_acceleration(&mut self, acceleration: f32) {
        if acceleration.is_nan() || acceleration == 0.0 {
            return;
        }
        let acceleration = acceleration.abs().clamp(MIN_ACCELERATION, MAX_ACCELERATION);
        if self.acceleration != acceleration {
            // Rescale the ramp position to the new acceleration
            self.n = (self.n as f32 * (self.acceleration / acceleration))
                .clamp(-MAX_RAMP_STEPS, MAX_RAMP_STEPS) as i64;
            // Equation 15 with the 0.676 first-step correction
            self.c0 = 0.676 * (2.0 / acceleration).sqrt() * MICROS_PER_SEC;
            self.acceleration = acceleration;
            self.compute_new_speed();
        }
    }

    fn acceleration(&self) -> f32 {
        self.acceleration
    }

    fn set_speed(&mut self, speed: f32) {
        if speed.is_nan() || speed == self.speed {
            return;
        }
        let mut speed = speed.clamp(-self.max_speed, self.max_speed);
        if speed.abs() < MIN_STEP_RATE {
            speed = 0.0;
            self.step_interval = 0;
        } else {
            self.step_interval = (MICROS_PER_SEC / speed).abs() as u64;
            self.direction = if speed > 0.0 {
                Direction::Cw
            } else {
                Direction::Ccw
            };
        }
        self.speed = speed;
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn distance_to_go(&self) -> i32 {
        self.target_pos.wrapping_sub(self.current_pos)
    }

    fn target_position(&self) -> i32 {
        self.target_pos
    }

    fn current_position(&self) -> i32 {
        self.current_pos
    }

    fn set_current_position(&mut self, position: i32) {
        self.target_pos = position;
        self.current_pos = position;
        self.n = 0;
        self.step_interval = 0;
        self.speed = 0.0;
    }

    fn stop(&mut self) {
        if self.speed != 0.0 {
            let steps_to_stop = (self.steps_to_stop() + 1).min(i32::MAX as i64) as i32;
            if self.speed > 0.0 {
                self.move_by(steps_to_stop);
            } else {
                self.move_by(-steps_to_stop);
            }
        }
    }

    fn disable_outputs(&mut self) {
        self.outputs_enabled = false;
    }

    fn enable_outputs(&mut self) {
        self.outputs_enabled = true;
    }

    fn is_running(&self) -> bool {
        !(self.speed == 0.0 && self.target_pos == self.current_pos)
    }

    fn run(&mut self) -> bool {
        let now = self.micros();
        self.run_at(now)
    }

    fn run_speed(&mut self) -> bool {
        let now = self.micros();
        self.run_speed_at(now)
    }
}

/// Factory handing out `VirtualStepper`s
#[derive(Debug, Default, Clone, Copy)]
pub struct VirtualStepperFactory;

impl EngineFactory for VirtualStepperFactory {
    type Engine = VirtualStepper;

    fn create(&mut self, config: &StepperConfig) -> VirtualStepper {
        VirtualStepper::new(*config)
    }
}
