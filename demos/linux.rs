use bme280::i2c::BME280;
use bme280::{Configuration, IIRFilter, Oversampling};
use linux_embedded_hal::{Delay, I2cdev};
use std::thread;
use std::time::Duration;

fn main() {
    let i2c_bus = I2cdev::new("/dev/i2c-1").unwrap();
    let mut delay = Delay;
    let mut bme280 = BME280::new_primary(i2c_bus);
    bme280
        .init_with_config(
            &mut delay,
            Configuration::default()
                .with_pressure_oversampling(Oversampling::Oversampling16X)
                .with_temperature_oversampling(Oversampling::Oversampling2X)
                .with_iir_filter(IIRFilter::Coefficient16),
        )
        .unwrap();
    loop {
        match bme280.measure(&mut delay) {
            Ok(measurements) => {
                println!("Relative Humidity = {}%", measurements.humidity);
                println!("Temperature = {} deg C", measurements.temperature);
                println!("Pressure = {} pascals", measurements.pressure);
            }
            Err(e) => println!("Could not read bme280: {}", e),
        }
        thread::sleep(Duration::from_secs(1));
    }
}
