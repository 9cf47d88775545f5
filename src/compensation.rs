//! Conversion of raw ADC counts into physical units.
//!
//! The integer formulas follow the Bosch reference driver: temperature and
//! humidity use 32-bit arithmetic, pressure uses 64-bit arithmetic. Shifts of
//! signed intermediates are written as truncating divisions, like the reference.
//! Arithmetic that may overflow for out-of-range calibration data wraps instead
//! of panicking, which is what the reference computes on two's-complement
//! targets.

use super::calibration::CalibrationData;
use super::Measurements;

/// Length of the pressure/temperature/humidity data block at `0xF7`.
pub const BME280_P_T_H_DATA_LEN: usize = 8;

/// Lowest temperature reported, in 0.01 °C.
pub const BME280_TEMP_MIN: i32 = -4000;
/// Highest temperature reported, in 0.01 °C.
pub const BME280_TEMP_MAX: i32 = 8500;

/// Lowest pressure reported, in 0.01 Pa (300 hPa).
pub const BME280_PRESSURE_MIN: u32 = 3_000_000;
/// Highest pressure reported, in 0.01 Pa (1100 hPa).
pub const BME280_PRESSURE_MAX: u32 = 11_000_000;

/// Highest humidity reported, in 1/1024 %RH (100 %RH).
pub const BME280_HUMIDITY_MAX: u32 = 102_400;
/// Upper bound of the Q22.12 humidity intermediate (`v_x1_u32r` in the datasheet).
const BME280_HUMIDITY_VAR_MAX: i32 = 419_430_400;

/// `t_fine` value the pressure formula is centred on.
const T_FINE_PRESSURE_OFFSET: i64 = 128_000;
/// `t_fine` value the humidity formula is centred on.
const T_FINE_HUMIDITY_OFFSET: i32 = 76_800;
/// Full scale of the 20-bit pressure ADC.
const PRESSURE_ADC_RANGE: i64 = 1 << 20;

/// Float clamps, in the units of [`Measurements`].
const TEMP_MIN_F32: f32 = -40.0;
const TEMP_MAX_F32: f32 = 85.0;
const PRESSURE_MIN_F32: f32 = 30000.0;
const PRESSURE_MAX_F32: f32 = 110000.0;
const HUMIDITY_MIN_F32: f32 = 0.0;
const HUMIDITY_MAX_F32: f32 = 100.0;

/// Uncompensated ADC counts as read from the data registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt-impl", derive(ufmt::derive::uDebug))]
pub struct RawMeasurement {
    /// 20-bit pressure count
    pub pressure: u32,
    /// 20-bit temperature count
    pub temperature: u32,
    /// 16-bit humidity count
    pub humidity: u32,
}

impl RawMeasurement {
    /// Unpacks `press_msb..hum_lsb` (`0xF7..=0xFE`).
    pub fn parse(data: &[u8; BME280_P_T_H_DATA_LEN]) -> Self {
        let data_msb: u32 = (data[0] as u32) << 12;
        let data_lsb: u32 = (data[1] as u32) << 4;
        let data_xlsb: u32 = (data[2] as u32) >> 4;
        let pressure = data_msb | data_lsb | data_xlsb;

        let data_msb: u32 = (data[3] as u32) << 12;
        let data_lsb: u32 = (data[4] as u32) << 4;
        let data_xlsb: u32 = (data[5] as u32) >> 4;
        let temperature = data_msb | data_lsb | data_xlsb;

        let data_msb: u32 = (data[6] as u32) << 8;
        let data_lsb: u32 = data[7] as u32;
        let humidity = data_msb | data_lsb;

        RawMeasurement {
            pressure,
            temperature,
            humidity,
        }
    }
}

/// Temperature compensation intermediate (`t_fine`) shared by the pressure and
/// humidity formulas. One unit is 1/5120 °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FineTemperature(pub i32);

/// Compensated values in the fixed-point units of the reference driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt-impl", derive(ufmt::derive::uDebug))]
pub struct CompensatedMeasurement {
    /// 0.01 °C
    pub temperature: i32,
    /// 0.01 Pa
    pub pressure: u32,
    /// 1/1024 %RH
    pub humidity: u32,
}

impl CompensatedMeasurement {
    /// Converts to °C, Pa and %RH.
    pub fn to_measurements(&self) -> Measurements {
        Measurements {
            temperature: self.temperature as f32 / 100.0,
            pressure: self.pressure as f32 / 100.0,
            humidity: self.humidity as f32 / 1024.0,
        }
    }
}

/// Selects which quantities [`compensate`] computes.
///
/// Temperature is always evaluated when anything is selected since the other
/// two formulas depend on [`FineTemperature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Components {
    pub pressure: bool,
    pub temperature: bool,
    pub humidity: bool,
}

impl Components {
    pub const ALL: Components = Components {
        pressure: true,
        temperature: true,
        humidity: true,
    };

    /// Bit 0 selects pressure, bit 1 temperature and bit 2 humidity.
    pub const fn from_bits(bits: u8) -> Self {
        Components {
            pressure: bits & 0b001 != 0,
            temperature: bits & 0b010 != 0,
            humidity: bits & 0b100 != 0,
        }
    }

    fn any(&self) -> bool {
        self.pressure || self.temperature || self.humidity
    }
}

impl Default for Components {
    fn default() -> Self {
        Components::ALL
    }
}

/// Compensates the selected quantities. Unselected quantities are left at zero.
pub fn compensate(
    raw: &RawMeasurement,
    calibration: &CalibrationData,
    components: Components,
) -> CompensatedMeasurement {
    let mut compensated = CompensatedMeasurement::default();
    if !components.any() {
        return compensated;
    }

    let (temperature, t_fine) = compensate_temperature(raw.temperature, calibration);
    compensated.temperature = temperature;
    if components.pressure {
        compensated.pressure = compensate_pressure(raw.pressure, t_fine, calibration);
    }
    if components.humidity {
        compensated.humidity = compensate_humidity(raw.humidity, t_fine, calibration);
    }
    compensated
}

/// Returns the temperature in 0.01 °C and the `t_fine` intermediate.
pub fn compensate_temperature(
    adc_t: u32,
    calibration: &CalibrationData,
) -> (i32, FineTemperature) {
    let adc_t = adc_t as i32;
    let dig_t1 = calibration.dig_t1 as i32;
    let dig_t2 = calibration.dig_t2 as i32;
    let dig_t3 = calibration.dig_t3 as i32;

    let var1 = (adc_t / 8).wrapping_sub(dig_t1 * 2);
    let var1 = var1.wrapping_mul(dig_t2) / 2048;
    let var2 = (adc_t / 16).wrapping_sub(dig_t1);
    let var2 = (var2.wrapping_mul(var2) / 4096).wrapping_mul(dig_t3) / 16384;
    let t_fine = var1.wrapping_add(var2);

    let temperature = t_fine.wrapping_mul(5).wrapping_add(128) / 256;
    (
        temperature.clamp(BME280_TEMP_MIN, BME280_TEMP_MAX),
        FineTemperature(t_fine),
    )
}

/// Returns the pressure in 0.01 Pa, or 0 if the calibration makes the
/// formula's divisor vanish.
pub fn compensate_pressure(
    adc_p: u32,
    t_fine: FineTemperature,
    calibration: &CalibrationData,
) -> u32 {
    let dig_p1 = calibration.dig_p1 as i64;
    let dig_p2 = calibration.dig_p2 as i64;
    let dig_p3 = calibration.dig_p3 as i64;
    let dig_p4 = calibration.dig_p4 as i64;
    let dig_p5 = calibration.dig_p5 as i64;
    let dig_p6 = calibration.dig_p6 as i64;
    let dig_p7 = calibration.dig_p7 as i64;
    let dig_p8 = calibration.dig_p8 as i64;
    let dig_p9 = calibration.dig_p9 as i64;

    let var1 = t_fine.0 as i64 - T_FINE_PRESSURE_OFFSET;
    let var2 = var1.wrapping_mul(var1).wrapping_mul(dig_p6);
    let var2 = var2.wrapping_add(var1.wrapping_mul(dig_p5).wrapping_mul(1 << 17));
    let var2 = var2.wrapping_add(dig_p4 * (1 << 35));
    let var1 = (var1.wrapping_mul(var1).wrapping_mul(dig_p3) / 256)
        .wrapping_add(var1.wrapping_mul(dig_p2).wrapping_mul(1 << 12));
    let var1 = ((1i64 << 47).wrapping_add(var1)).wrapping_mul(dig_p1) / (1 << 33);

    if var1 == 0 {
        return 0;
    }

    let var4 = PRESSURE_ADC_RANGE - adc_p as i64;
    let var4 = var4
        .wrapping_mul(1 << 31)
        .wrapping_sub(var2)
        .wrapping_mul(3125)
        .wrapping_div(var1);
    let var1 = dig_p9.wrapping_mul(var4 / 8192).wrapping_mul(var4 / 8192) / (1 << 25);
    let var2 = dig_p8.wrapping_mul(var4) / (1 << 19);
    let var4 = var4.wrapping_add(var1).wrapping_add(var2) / 256 + dig_p7 * 16;

    let pressure = ((var4 / 2).wrapping_mul(100) / 128) as u32;
    pressure.clamp(BME280_PRESSURE_MIN, BME280_PRESSURE_MAX)
}

/// Returns the relative humidity in 1/1024 %RH, within `0..=102400`.
pub fn compensate_humidity(
    adc_h: u32,
    t_fine: FineTemperature,
    calibration: &CalibrationData,
) -> u32 {
    let dig_h1 = calibration.dig_h1 as i32;
    let dig_h2 = calibration.dig_h2 as i32;
    let dig_h3 = calibration.dig_h3 as i32;
    let dig_h4 = calibration.dig_h4 as i32;
    let dig_h5 = calibration.dig_h5 as i32;
    let dig_h6 = calibration.dig_h6 as i32;

    let var1 = t_fine.0.wrapping_sub(T_FINE_HUMIDITY_OFFSET);
    let var2 = (adc_h as i32).wrapping_mul(16384);
    let var3 = dig_h4.wrapping_mul(1 << 20);
    let var4 = dig_h5.wrapping_mul(var1);
    let var5 = var2
        .wrapping_sub(var3)
        .wrapping_sub(var4)
        .wrapping_add(16384)
        / 32768;
    let var2 = var1.wrapping_mul(dig_h6) / 1024;
    let var3 = var1.wrapping_mul(dig_h3) / 2048;
    let var4 = (var2.wrapping_mul(var3.wrapping_add(32768)) / 1024).wrapping_add(2_097_152);
    let var2 = var4.wrapping_mul(dig_h2).wrapping_add(8192) / 16384;
    let var3 = var5.wrapping_mul(var2);
    let var4 = (var3 / 32768).wrapping_mul(var3 / 32768) / 128;
    let var5 = var3.wrapping_sub(var4.wrapping_mul(dig_h1) / 16);
    let var5 = var5.clamp(0, BME280_HUMIDITY_VAR_MAX);

    ((var5 / 4096) as u32).min(BME280_HUMIDITY_MAX)
}

/// Compensates all three quantities with the datasheet floating point formulas.
pub fn compensate_float(raw: &RawMeasurement, calibration: &CalibrationData) -> Measurements {
    let (temperature, t_fine) = compensate_temperature_f32(raw.temperature, calibration);
    Measurements {
        temperature,
        pressure: compensate_pressure_f32(raw.pressure, t_fine, calibration),
        humidity: compensate_humidity_f32(raw.humidity, t_fine, calibration),
    }
}

fn compensate_temperature_f32(
    uncompensated: u32,
    calibration: &CalibrationData,
) -> (f32, FineTemperature) {
    let var1: f32 = uncompensated as f32 / 16384.0 - calibration.dig_t1 as f32 / 1024.0;
    let var1 = var1 * calibration.dig_t2 as f32;

    let var2 = uncompensated as f32 / 131072.0 - calibration.dig_t1 as f32 / 8192.0;
    let var2 = var2 * var2 * calibration.dig_t3 as f32;

    let t_fine = FineTemperature((var1 + var2) as i32);
    let temperature = (var1 + var2) / 5120.0;

    (temperature.max(TEMP_MIN_F32).min(TEMP_MAX_F32), t_fine)
}

fn compensate_pressure_f32(
    uncompensated: u32,
    t_fine: FineTemperature,
    calibration: &CalibrationData,
) -> f32 {
    let var1: f32 = t_fine.0 as f32 / 2.0 - 64000.0;
    let var2: f32 = var1 * var1 * calibration.dig_p6 as f32 / 32768.0;
    let var2: f32 = var2 + var1 * calibration.dig_p5 as f32 * 2.0;
    let var2: f32 = var2 / 4.0 + calibration.dig_p4 as f32 * 65536.0;
    let var3: f32 = calibration.dig_p3 as f32 * var1 * var1 / 524288.0;
    let var1: f32 = (var3 + calibration.dig_p2 as f32 * var1) / 524288.0;
    let var1: f32 = (1.0 + var1 / 32768.0) * calibration.dig_p1 as f32;

    if var1 <= 0.0 {
        return 0.0;
    }

    let pressure: f32 = 1048576.0 - uncompensated as f32;
    let pressure: f32 = (pressure - (var2 / 4096.0)) * 6250.0 / var1;
    let var1: f32 = calibration.dig_p9 as f32 * pressure * pressure / 2147483648.0;
    let var2: f32 = pressure * calibration.dig_p8 as f32 / 32768.0;
    let pressure: f32 = pressure + (var1 + var2 + calibration.dig_p7 as f32) / 16.0;
    pressure.max(PRESSURE_MIN_F32).min(PRESSURE_MAX_F32)
}

fn compensate_humidity_f32(
    uncompensated: u32,
    t_fine: FineTemperature,
    calibration: &CalibrationData,
) -> f32 {
    let var1: f32 = t_fine.0 as f32 - 76800.0;
    let var2: f32 =
        calibration.dig_h4 as f32 * 64.0 + (calibration.dig_h5 as f32 / 16384.0) * var1;
    let var3: f32 = uncompensated as f32 - var2;
    let var4: f32 = calibration.dig_h2 as f32 / 65536.0;
    let var5: f32 = 1.0 + (calibration.dig_h3 as f32 / 67108864.0) * var1;
    let var6: f32 = 1.0 + (calibration.dig_h6 as f32 / 67108864.0) * var1 * var5;
    let var6: f32 = var3 * var4 * (var5 * var6);
    let humidity: f32 = var6 * (1.0 - calibration.dig_h1 as f32 * var6 / 524288.0);
    humidity.max(HUMIDITY_MIN_F32).min(HUMIDITY_MAX_F32)
}
