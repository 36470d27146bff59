use core::convert::Infallible;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use shaker_motor::*;

/// Bridge input that prints every command it receives.
struct PrintChannel {
    name: &'static str,
}

impl digital::ErrorType for PrintChannel {
    type Error = Infallible;
}

impl OutputPin for PrintChannel {
    fn set_low(&mut self) -> Result<(), Infallible> {
        println!("    {}: LOW", self.name);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        println!("    {}: HIGH", self.name);
        Ok(())
    }
}

impl pwm::ErrorType for PrintChannel {
    type Error = Infallible;
}

impl SetDutyCycle for PrintChannel {
    fn max_duty_cycle(&self) -> u16 {
        DUTY_RESOLUTION
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        println!("    {}: PWM {}/{}", self.name, duty, DUTY_RESOLUTION);
        Ok(())
    }
}

fn main() -> Result<(), MotorError> {
    let mut motor = Drv8833::new(
        PrintChannel { name: "IN1" },
        PrintChannel { name: "IN2" },
        Drv8833Config::default(),
    );
    println!("Threshold: {}%", motor.speed_threshold());

    println!("init");
    motor.init()?;

    for decay in [DecayMode::SlowDecay, DecayMode::FastDecay] {
        motor.set_decay(decay);
        println!("\n{}:", decay);

        println!("  forward(60)");
        motor.forward(60)?;
        println!("  invert_direction()");
        motor.invert_direction()?;
        println!("  set_speed(5)  (raised to the threshold)");
        motor.set_speed(5)?;
        println!("  halt()");
        motor.halt()?;
    }

    println!("\nFinal state: {:?}", motor.state());
    Ok(())
}
