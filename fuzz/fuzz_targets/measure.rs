#![no_main]
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal_fuzz::{i2c::I2cFuzz, shared_data::FuzzData};
use libfuzzer_sys::fuzz_target;

type Error = ();

struct DelayNop;

impl DelayMs<u8> for DelayNop {
    fn delay_ms(&mut self, _ms: u8) {}
}

fuzz_target!(|data: &[u8]| {
    let data = FuzzData::new(data);
    let i2c: I2cFuzz<'_, Error> = I2cFuzz::new(data);
    let mut bme280 = bme280::i2c::BME280::new_primary(i2c);
    // We only care about panics, garbage readings and errors are expected.
    if bme280.init(&mut DelayNop).is_ok() {
        let _ = bme280.measure(&mut DelayNop);
    }
});
