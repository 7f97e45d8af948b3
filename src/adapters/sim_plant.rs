//! Simulated thermal plate.
//!
//! First-order model: the plate relaxes toward ambient with time
//! constant `tau` and the Peltier adds `drive × full_scale_rate` °C/s.
//!
//! ```text
//! dT/dt = (T_ambient − T) / tau + (duty / max_duty) · full_scale_rate
//! ```
//!
//! Implements both [`SensorPort`] and [`ActuatorPort`] so it can stand in
//! for the whole hardware side of [`AppService::tick`](crate::app::service::AppService::tick).

use crate::app::ports::{ActuatorPort, SensorPort};

#[derive(Debug, Clone)]
pub struct SimPlant {
    temperature: f32,
    ambient: f32,
    time_constant_s: f32,
    full_scale_rate: f32,
    max_duty: u16,
    duty: i16,
    sensor_fault: bool,
    duty_writes: u64,
}

impl SimPlant {
    /// Plate at `initial` °C in a room at `ambient` °C.
    pub fn new(initial: f32, ambient: f32) -> Self {
        Self {
            temperature: initial,
            ambient,
            time_constant_s: 120.0,
            full_scale_rate: 0.4,
            max_duty: 1000,
            duty: 0,
            sensor_fault: false,
            duty_writes: 0,
        }
    }

    pub fn with_dynamics(mut self, time_constant_s: f32, full_scale_rate: f32) -> Self {
        self.time_constant_s = time_constant_s.max(1.0);
        self.full_scale_rate = full_scale_rate;
        self
    }

    /// Integrate the model forward by `dt_s` seconds.
    pub fn advance(&mut self, dt_s: f32) {
        if dt_s <= 0.0 {
            return;
        }
        let drive = f32::from(self.duty) / f32::from(self.max_duty);
        let dtemp = (self.ambient - self.temperature) / self.time_constant_s
            + drive * self.full_scale_rate;
        self.temperature += dtemp * dt_s;
    }

    /// Make the next reads return NaN (open thermistor).
    pub fn set_sensor_fault(&mut self, fault: bool) {
        self.sensor_fault = fault;
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn duty(&self) -> i16 {
        self.duty
    }

    pub fn duty_writes(&self) -> u64 {
        self.duty_writes
    }
}

impl SensorPort for SimPlant {
    fn read_plate_temperature(&mut self) -> f32 {
        if self.sensor_fault {
            f32::NAN
        } else {
            self.temperature
        }
    }
}

impl ActuatorPort for SimPlant {
    fn max_duty(&self) -> u16 {
        self.max_duty
    }

    fn set_output(&mut self, duty: i16) {
        let max = i16::try_from(self.max_duty).unwrap_or(i16::MAX);
        self.duty = duty.clamp(-max, max);
        self.duty_writes += 1;
    }
}
