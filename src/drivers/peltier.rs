//! Peltier plate driver (H-bridge with PWM magnitude and a direction pin).
//!
//! Signed duty in, PWM + direction out. Positive duty heats, negative
//! cools.
//!
//! ## Safety contract
//!
//! The bridge is never reversed under load: the PWM is dropped to zero
//! before the direction pin changes. Any HAL error forces the bridge
//! neutral and is logged; the supervisor and governor decide when the
//! plate may run, this driver is a dumb actuator.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::{error, warn};

use crate::app::ports::ActuatorPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Heat,
    Cool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeltierState {
    Neutral,
    Driving { duty: u16, dir: Direction },
}

pub struct PeltierDriver<P: SetDutyCycle, D: OutputPin> {
    pwm: P,
    dir_pin: D,
    direction: Direction,
    state: PeltierState,
    fault_count: u32,
}

impl<P: SetDutyCycle, D: OutputPin> PeltierDriver<P, D> {
    /// Take ownership of the pins and drive the bridge neutral.
    pub fn new(pwm: P, dir_pin: D) -> Self {
        let mut driver = Self {
            pwm,
            dir_pin,
            direction: Direction::Heat,
            state: PeltierState::Neutral,
            fault_count: 0,
        };
        driver.stop();
        driver
    }

    /// Zero duty and park the direction pin on Heat.
    pub fn stop(&mut self) {
        if let Err(e) = self.pwm.set_duty_cycle_fully_off() {
            self.fault_count += 1;
            error!("peltier: PWM off failed: {e:?}");
        }
        if let Err(e) = self.dir_pin.set_high() {
            self.fault_count += 1;
            warn!("peltier: direction reset failed: {e:?}");
        }
        self.direction = Direction::Heat;
        self.state = PeltierState::Neutral;
    }

    fn drive(&mut self, duty: u16, dir: Direction) -> Result<(), ()> {
        if dir != self.direction {
            self.pwm.set_duty_cycle_fully_off().map_err(|e| {
                error!("peltier: PWM off before reversal failed: {e:?}");
            })?;
            let res = match dir {
                Direction::Heat => self.dir_pin.set_high(),
                Direction::Cool => self.dir_pin.set_low(),
            };
            res.map_err(|e| error!("peltier: direction change failed: {e:?}"))?;
            self.direction = dir;
        }
        self.pwm
            .set_duty_cycle(duty)
            .map_err(|e| error!("peltier: PWM write failed: {e:?}"))?;
        self.state = PeltierState::Driving { duty, dir };
        Ok(())
    }

    pub fn state(&self) -> PeltierState {
        self.state
    }

    pub fn is_driving(&self) -> bool {
        !matches!(self.state, PeltierState::Neutral)
    }

    /// HAL errors seen since construction.
    pub fn fault_count(&self) -> u32 {
        self.fault_count
    }

    /// Release the pins.
    pub fn release(mut self) -> (P, D) {
        self.stop();
        (self.pwm, self.dir_pin)
    }
}

impl<P: SetDutyCycle, D: OutputPin> ActuatorPort for PeltierDriver<P, D> {
    fn max_duty(&self) -> u16 {
        self.pwm.max_duty_cycle()
    }

    fn set_output(&mut self, duty: i16) {
        if duty == 0 {
            self.stop();
            return;
        }
        let dir = if duty > 0 {
            Direction::Heat
        } else {
            Direction::Cool
        };
        let magnitude = duty.unsigned_abs().min(self.pwm.max_duty_cycle());
        if self.drive(magnitude, dir).is_err() {
            self.fault_count += 1;
            self.stop();
        }
    }

    fn neutral(&mut self) {
        self.stop();
    }
}
