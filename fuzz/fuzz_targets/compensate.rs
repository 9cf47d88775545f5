#![no_main]
use bme280::compensation::{compensate, Components, RawMeasurement, BME280_HUMIDITY_MAX};
use bme280::CalibrationData;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 26 + 7 calibration bytes followed by an 8 byte data block
    if data.len() < 41 {
        return;
    }
    let calibration = match CalibrationData::from_slices::<()>(&data[..26], &data[26..33]) {
        Ok(calibration) => calibration,
        Err(_) => return,
    };
    let mut block = [0u8; 8];
    block.copy_from_slice(&data[33..41]);
    let raw = RawMeasurement::parse(&block);
    let compensated = compensate(&raw, &calibration, Components::ALL);
    assert!(compensated.humidity <= BME280_HUMIDITY_MAX);
});
