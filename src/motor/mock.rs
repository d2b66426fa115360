// Call-counting engine for tests
use std::cell::RefCell;
use std::rc::Rc;

use super::{EngineFactory, MotionEngine, StepperConfig};

#[derive(Debug, Default)]
pub struct Calls {
    pub created: Vec<StepperConfig>,
    pub dropped: usize,
    pub run: usize,
    pub run_speed: usize,
    pub other: usize,
}

impl Calls {
    /// Every engine call except construction and drop
    pub fn engine_calls(&self) -> usize {
        self.run + self.run_speed + self.other
    }
}

pub type CallLog = Rc<RefCell<Calls>>;

#[derive(Debug)]
pub struct MockEngine {
    calls: CallLog,
    pub current: i32,
    pub target: i32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub speed: f32,
    pub outputs_enabled: bool,
}

impl MockEngine {
    fn touch(&self) {
        self.calls.borrow_mut().other += 1;
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        self.calls.borrow_mut().dropped += 1;
    }
}

impl MotionEngine for MockEngine {
    fn move_to(&mut self, absolute: i32) {
        self.touch();
        self.target = absolute;
    }

    fn move_by(&mut self, relative: i32) {
        self.touch();
        self.target = self.current.wrapping_add(relative);
    }

    fn set_max_speed(&mut self, speed: f32) {
        self.touch();
        self.max_speed = speed;
    }

    fn max_speed(&self) -> f32 {
        self.touch();
        self.max_speed
    }

    fn set_acceleration(&mut self, acceleration: f32) {
        self.touch();
        self.acceleration = acceleration;
    }

    fn acceleration(&self) -> f32 {
        self.touch();
        self.acceleration
    }

    fn set_speed(&mut self, speed: f32) {
        self.touch();
        self.speed = speed;
    }

    fn speed(&self) -> f32 {
        self.touch();
        self.speed
    }

    fn distance_to_go(&self) -> i32 {
        self.touch();
        self.target.wrapping_sub(self.current)
    }

    fn target_position(&self) -> i32 {
        self.touch();
        self.target
    }

    fn current_position(&self) -> i32 {
        self.touch();
        self.current
    }

    fn set_current_position(&mut self, position: i32) {
        self.touch();
        self.current = position;
        self.target = position;
        self.speed = 0.0;
    }

    fn stop(&mut self) {
        self.touch();
        self.target = self.current;
    }

    fn disable_outputs(&mut self) {
        self.touch();
        self.outputs_enabled = false;
    }

    fn enable_outputs(&mut self) {
        self.touch();
        self.outputs_enabled = true;
    }

    fn is_running(&self) -> bool {
        self.touch();
        self.target != self.current
    }

    fn run(&mut self) -> bool {
        self.calls.borrow_mut().run += 1;
        if self.current != self.target {
            self.current += (self.target - self.current).signum();
        }
        self.current != self.target
    }

    fn run_speed(&mut self) -> bool {
        self.calls.borrow_mut().run_speed += 1;
        false
    }
}

#[derive(Debug, Default)]
pub struct MockFactory {
    pub calls: CallLog,
}

impl MockFactory {
    pub fn new() -> (Self, CallLog) {
        let calls = CallLog::default();
        (
            Self {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl EngineFactory for MockFactory {
    type Engine = MockEngine;

    fn create(&mut self, config: &StepperConfig) -> MockEngine {
        self.calls.borrow_mut().created.push(*config);
        MockEngine {
            calls: self.calls.clone(),
            current: 0,
            target: 0,
            max_speed: 1.0,
            acceleration: 1.0,
            speed: 0.0,
            outputs_enabled: true,
        }
    }
}
