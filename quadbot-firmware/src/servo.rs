//! LEDC-backed servo driver.
//!
//! Wraps one PWM channel per servo and converts an angle in degrees into
//! the matching pulse width. This is the last stage before the hardware:
//! whatever the motion core computed, the angle is clamped to the servo's
//! mechanical range here.
use embedded_hal::pwm::SetDutyCycle;
use esp_hal::ledc::{channel::Channel, HighSpeed, LowSpeed};
use fugit::Hertz;
use log::error;

use quadbot_motion::robot::{joint::Joint, leg::Leg};

// Default pulse calibration of the stock micro servos.
const MIN_PULSE_US: u32 = 544;
const MAX_PULSE_US: u32 = 2400;

pub struct Servo<PWM> {
    pwm: PWM,
    angle: u8,
    max_duty: u32,
    frequency: Hertz<u32>,
    leg_id: Leg,
    joint_id: Joint,
}

impl<PWM> Servo<PWM>
where
    PWM: SetDutyCycle,
{
    pub fn new(pwm: PWM, max_duty: u32, frequency: Hertz<u32>, leg_id: Leg, joint_id: Joint) -> Self {
        Self {
            pwm,
            angle: 0,
            max_duty,
            frequency,
            leg_id,
            joint_id,
        }
    }

    /// Sets the servo angle in degrees, clamped to 0..=180. Writing the
    /// angle the servo already holds is skipped.
    pub fn set_angle(&mut self, angle: u8) {
        let angle = angle.clamp(0, 180);
        if self.angle == angle {
            return;
        }
        self.angle = angle;

        // Linearly interpolate the pulse width, then scale it to the PWM
        // register resolution. The width of the pulse drives the angle,
        // not the frequency.
        let pulse = MIN_PULSE_US + (angle as u32 * (MAX_PULSE_US - MIN_PULSE_US)) / 180;
        let period_us = 1_000_000 / self.frequency.raw();
        let duty = ((pulse * self.max_duty) / period_us).min(self.max_duty) as u16;

        if let Err(e) = self.pwm.set_duty_cycle(duty) {
            error!(
                "[SERVO_TASK] {} {}: error writing angle ({e:?})",
                self.leg_id, self.joint_id
            );
        }
    }
}

/// Wrapper over servos driven by either LEDC speed domain, so the whole
/// bank can live in one array.
pub enum AnyServo {
    Low(Servo<Channel<'static, LowSpeed>>),
    High(Servo<Channel<'static, HighSpeed>>),
}

impl AnyServo {
    pub fn set_angle(&mut self, angle: u8) {
        match self {
            AnyServo::Low(servo) => servo.set_angle(angle),
            AnyServo::High(servo) => servo.set_angle(angle),
        }
    }
}
