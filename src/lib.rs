//! A platform agnostic Rust driver for the Bosch BME280, based on the
//! [`embedded-hal`](https://github.com/rust-embedded/embedded-hal) traits.
//!
//! ## The Device
//!
//! The Bosch BME280 is a highly accurate sensor for atmospheric temperature,
//! pressure, and relative humidity.
//!
//! The device has I²C and SPI interfaces; this driver talks I²C.
//!
//! - [Details and datasheet](https://www.bosch-sensortec.com/products/environmental-sensors/humidity-sensors-bme280/)
//!
//! ## Compensation
//!
//! Raw readings are converted with the integer formulas of the datasheet, so no
//! FPU is required. [`BME280::measure_compensated`](i2c::BME280::measure_compensated)
//! returns the fixed-point values (0.01 °C, 0.01 Pa, 1/1024 %RH),
//! [`BME280::measure`](i2c::BME280::measure) converts them to `f32`. The pure
//! functions live in [`compensation`] and can be used without a bus.
//!
//! ## Usage
//!
//! ```no_run
//! use linux_embedded_hal::{Delay, I2cdev};
//! use bme280::i2c::BME280;
//!
//! // using Linux I2C Bus #1 in this example
//! let i2c_bus = I2cdev::new("/dev/i2c-1").unwrap();
//! let mut delay = Delay;
//!
//! // initialize the BME280 using the primary I2C address 0x76
//! let mut bme280 = BME280::new_primary(i2c_bus);
//!
//! // or, initialize the BME280 using the secondary I2C address 0x77
//! // let mut bme280 = BME280::new_secondary(i2c_bus);
//!
//! // or, initialize the BME280 using a custom I2C address
//! // let bme280_i2c_addr = 0x88;
//! // let mut bme280 = BME280::new(i2c_bus, bme280_i2c_addr);
//!
//! // initialize the sensor
//! bme280.init(&mut delay).unwrap();
//!
//! // measure temperature, pressure, and humidity
//! let measurements = bme280.measure(&mut delay).unwrap();
//!
//! println!("Relative Humidity = {}%", measurements.humidity);
//! println!("Temperature = {} deg C", measurements.temperature);
//! println!("Pressure = {} pascals", measurements.pressure);
//! ```
#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

use core::fmt;

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, trace, warn};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod calibration;
pub mod compensation;
pub mod i2c;
pub mod registers;

pub use calibration::{
    CalibrationData, BME280_H_CALIB_DATA_LEN, BME280_P_T_CALIB_DATA_LEN,
};
pub use compensation::{
    CompensatedMeasurement, Components, FineTemperature, RawMeasurement, BME280_P_T_H_DATA_LEN,
};
pub use registers::{
    Configuration, CtrlHum, CtrlMeas, ConfigRegister, IIRFilter, Oversampling, PowerMode,
    StandbyTime, Status,
};

const BME280_RESET_ADDR: u8 = 0xE0;
const BME280_SOFT_RESET_CMD: u8 = 0xB6;

const BME280_CHIP_ID: u8 = 0x60;
const BME280_CHIP_ID_ADDR: u8 = 0xD0;

const BME280_P_T_CALIB_DATA_ADDR: u8 = 0x88;
const BME280_H_CALIB_DATA_ADDR: u8 = 0xE1;

const BME280_CTRL_HUM_ADDR: u8 = 0xF2;
const BME280_STATUS_ADDR: u8 = 0xF3;
const BME280_CTRL_MEAS_ADDR: u8 = 0xF4;
const BME280_CONFIG_ADDR: u8 = 0xF5;

const BME280_DATA_ADDR: u8 = 0xF7;

/// Start-up time after a soft reset.
const BME280_STARTUP_DELAY_MS: u8 = 2;
/// Interval between status polls while a conversion runs.
const BME280_STATUS_POLL_MS: u8 = 1;

/// BME280 errors
#[derive(Debug, Clone, Copy)]
pub enum Error<E> {
    /// Bus error
    Bus(E),
    /// Chip ID doesn't match expected value
    InvalidIdentifier(u8),
    /// The conversion did not finish within the configured timeout
    MeasurementTimeout,
    /// A register block had the wrong size
    InvalidBufferLength { expected: usize, actual: usize },
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {:?}", e),
            Error::InvalidIdentifier(id) => {
                write!(f, "unexpected chip id {:#04x}, expected {:#04x}", id, BME280_CHIP_ID)
            }
            Error::MeasurementTimeout => f.write_str("measurement timed out"),
            Error::InvalidBufferLength { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
        }
    }
}

/// Temperature in °C, pressure in Pa and relative humidity in %.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurements {
    pub temperature: f32,
    pub pressure: f32,
    pub humidity: f32,
}

/// Register level access to the sensor.
///
/// `register` is the first register of a burst; the device auto-increments the
/// address while reading.
pub trait Interface {
    type Error;

    /// Reads `data.len()` consecutive registers starting at `register`.
    fn read_registers(&mut self, register: u8, data: &mut [u8]) -> Result<(), Error<Self::Error>>;

    /// Writes a single register.
    fn write_register(&mut self, register: u8, payload: u8) -> Result<(), Error<Self::Error>>;

    /// Reads a single register.
    fn read_register(&mut self, register: u8) -> Result<u8, Error<Self::Error>> {
        let mut data: [u8; 1] = [0];
        self.read_registers(register, &mut data)?;
        Ok(data[0])
    }

    /// Reads the pressure, temperature and humidity data block.
    fn read_data(
        &mut self,
        register: u8,
    ) -> Result<[u8; BME280_P_T_H_DATA_LEN], Error<Self::Error>> {
        let mut data: [u8; BME280_P_T_H_DATA_LEN] = [0; BME280_P_T_H_DATA_LEN];
        self.read_registers(register, &mut data)?;
        Ok(data)
    }

    /// Reads the temperature and pressure calibration block.
    fn read_pt_calib_data(
        &mut self,
        register: u8,
    ) -> Result<[u8; BME280_P_T_CALIB_DATA_LEN], Error<Self::Error>> {
        let mut data: [u8; BME280_P_T_CALIB_DATA_LEN] = [0; BME280_P_T_CALIB_DATA_LEN];
        self.read_registers(register, &mut data)?;
        Ok(data)
    }

    /// Reads the humidity calibration block.
    fn read_h_calib_data(
        &mut self,
        register: u8,
    ) -> Result<[u8; BME280_H_CALIB_DATA_LEN], Error<Self::Error>> {
        let mut data: [u8; BME280_H_CALIB_DATA_LEN] = [0; BME280_H_CALIB_DATA_LEN];
        self.read_registers(register, &mut data)?;
        Ok(data)
    }
}

/// Common driver code independent of the bus.
#[derive(Debug, Default)]
struct BME280Common<I> {
    /// concrete interface implementation
    interface: I,
    /// cached calibration data, dropped on reset
    calibration: Option<CalibrationData>,
    /// settings applied to every measurement
    config: Configuration,
}

impl<I> BME280Common<I>
where
    I: Interface,
{
    fn new(interface: I) -> Self {
        BME280Common {
            interface,
            calibration: None,
            config: Configuration::default(),
        }
    }

    fn release(self) -> I {
        self.interface
    }

    fn init<D: DelayMs<u8>>(
        &mut self,
        delay: &mut D,
        config: Configuration,
    ) -> Result<(), Error<I::Error>> {
        self.check_identity()?;
        self.reset(delay)?;
        self.configure(config)
    }

    fn check_identity(&mut self) -> Result<(), Error<I::Error>> {
        let chip_id = self.interface.read_register(BME280_CHIP_ID_ADDR)?;
        if chip_id == BME280_CHIP_ID {
            debug!("found BME280 (chip id {:#04x})", chip_id);
            Ok(())
        } else {
            warn!("unexpected chip id {:#04x}", chip_id);
            Err(Error::InvalidIdentifier(chip_id))
        }
    }

    fn reset<D: DelayMs<u8>>(&mut self, delay: &mut D) -> Result<(), Error<I::Error>> {
        self.interface
            .write_register(BME280_RESET_ADDR, BME280_SOFT_RESET_CMD)?;
        delay.delay_ms(BME280_STARTUP_DELAY_MS);
        self.calibration = None;
        debug!("soft reset done");
        Ok(())
    }

    fn configure(&mut self, config: Configuration) -> Result<(), Error<I::Error>> {
        let current = CtrlMeas(self.interface.read_register(BME280_CTRL_MEAS_ADDR)?);
        // config writes are only guaranteed to land in sleep mode
        if current.mode() != PowerMode::Sleep {
            self.interface.write_register(
                BME280_CTRL_MEAS_ADDR,
                current.with_mode(PowerMode::Sleep).0,
            )?;
        }

        self.interface
            .write_register(BME280_CTRL_HUM_ADDR, config.ctrl_hum().0)?;

        let register = ConfigRegister(self.interface.read_register(BME280_CONFIG_ADDR)?);
        self.interface
            .write_register(BME280_CONFIG_ADDR, config.config_register(register).0)?;

        // ctrl_hum only takes effect after ctrl_meas is written; this also
        // restores the previous power mode
        self.interface
            .write_register(BME280_CTRL_MEAS_ADDR, config.ctrl_meas(current).0)?;

        self.config = config;
        debug!("applied {:?}", config);
        Ok(())
    }

    fn power_mode(&mut self) -> Result<PowerMode, Error<I::Error>> {
        let ctrl_meas = CtrlMeas(self.interface.read_register(BME280_CTRL_MEAS_ADDR)?);
        Ok(ctrl_meas.mode())
    }

    fn set_power_mode(&mut self, mode: PowerMode) -> Result<(), Error<I::Error>> {
        let ctrl_meas = CtrlMeas(self.interface.read_register(BME280_CTRL_MEAS_ADDR)?);
        self.interface
            .write_register(BME280_CTRL_MEAS_ADDR, ctrl_meas.with_mode(mode).0)?;
        debug!("power mode {:?}", mode);
        Ok(())
    }

    fn calibration(&mut self) -> Result<CalibrationData, Error<I::Error>> {
        if let Some(calibration) = self.calibration {
            return Ok(calibration);
        }
        let pt = self
            .interface
            .read_pt_calib_data(BME280_P_T_CALIB_DATA_ADDR)?;
        let h = self.interface.read_h_calib_data(BME280_H_CALIB_DATA_ADDR)?;
        let calibration = CalibrationData::parse(&pt, &h);
        trace!("calibration {:?}", calibration);
        self.calibration = Some(calibration);
        Ok(calibration)
    }

    fn measure_compensated<D: DelayMs<u8>>(
        &mut self,
        delay: &mut D,
    ) -> Result<CompensatedMeasurement, Error<I::Error>> {
        let calibration = self.calibration()?;

        self.interface
            .write_register(BME280_CTRL_HUM_ADDR, self.config.ctrl_hum().0)?;
        let current = CtrlMeas(self.interface.read_register(BME280_CTRL_MEAS_ADDR)?);
        let ctrl_meas = self.config.ctrl_meas(current).with_mode(PowerMode::Forced);
        self.interface
            .write_register(BME280_CTRL_MEAS_ADDR, ctrl_meas.0)?;

        self.wait_for_measurement(delay)?;
        self.read_compensated(&calibration)
    }

    fn start_continuous(&mut self) -> Result<(), Error<I::Error>> {
        self.set_power_mode(PowerMode::Normal)
    }

    fn read_latest(&mut self) -> Result<CompensatedMeasurement, Error<I::Error>> {
        let calibration = self.calibration()?;
        self.read_compensated(&calibration)
    }

    fn read_compensated(
        &mut self,
        calibration: &CalibrationData,
    ) -> Result<CompensatedMeasurement, Error<I::Error>> {
        let data = self.interface.read_data(BME280_DATA_ADDR)?;
        let raw = RawMeasurement::parse(&data);
        trace!("raw {:?}", raw);
        Ok(compensation::compensate(&raw, calibration, Components::ALL))
    }

    fn wait_for_measurement<D: DelayMs<u8>>(
        &mut self,
        delay: &mut D,
    ) -> Result<(), Error<I::Error>> {
        let timeout_ms = self.config.measurement_timeout_ms();
        let mut waited_ms: u16 = 0;
        loop {
            let status = Status(self.interface.read_register(BME280_STATUS_ADDR)?);
            if !status.is_busy() {
                trace!("conversion done after {} ms", waited_ms);
                return Ok(());
            }
            if waited_ms >= timeout_ms {
                warn!("conversion still running after {} ms", waited_ms);
                return Err(Error::MeasurementTimeout);
            }
            delay.delay_ms(BME280_STATUS_POLL_MS);
            waited_ms = waited_ms.saturating_add(BME280_STATUS_POLL_MS as u16);
        }
    }
}
