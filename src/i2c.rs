//! BME280 driver for sensors attached via I2C.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

use super::{
    BME280Common, CalibrationData, CompensatedMeasurement, Configuration, Error, Interface,
    Measurements, PowerMode,
};

const BME280_I2C_ADDR_PRIMARY: u8 = 0x76;
const BME280_I2C_ADDR_SECONDARY: u8 = 0x77;

/// Representation of a BME280
#[derive(Debug, Default)]
pub struct BME280<I2C> {
    common: BME280Common<I2CInterface<I2C>>,
}

impl<I2C, E> BME280<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    /// Create a new BME280 struct using the primary I²C address `0x76`
    pub fn new_primary(i2c: I2C) -> Self {
        Self::new(i2c, BME280_I2C_ADDR_PRIMARY)
    }

    /// Create a new BME280 struct using the secondary I²C address `0x77`
    pub fn new_secondary(i2c: I2C) -> Self {
        Self::new(i2c, BME280_I2C_ADDR_SECONDARY)
    }

    /// Create a new BME280 struct using a custom I²C address
    pub fn new(i2c: I2C, address: u8) -> Self {
        BME280 {
            common: BME280Common::new(I2CInterface { i2c, address }),
        }
    }

    /// Destroys the driver and returns the bus
    pub fn release(self) -> I2C {
        self.common.release().i2c
    }

    /// Initializes the BME280 with 1x oversampling for every quantity and the
    /// IIR filter off.
    pub fn init<D: DelayMs<u8>>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.common.init(delay, Configuration::default())
    }

    /// Initializes the BME280, applying the given configuration.
    pub fn init_with_config<D: DelayMs<u8>>(
        &mut self,
        delay: &mut D,
        config: Configuration,
    ) -> Result<(), Error<E>> {
        self.common.init(delay, config)
    }

    /// Fails with [`Error::InvalidIdentifier`] unless the chip id register reads `0x60`
    pub fn check_identity(&mut self) -> Result<(), Error<E>> {
        self.common.check_identity()
    }

    /// Soft resets the device and forgets the cached calibration data
    pub fn reset<D: DelayMs<u8>>(&mut self, delay: &mut D) -> Result<(), Error<E>> {
        self.common.reset(delay)
    }

    /// Writes oversampling, filter and standby settings, keeping the power mode
    ///
    /// A device in normal or forced mode is put to sleep while the settings are
    /// written and then returned to its previous mode.
    pub fn configure(&mut self, config: Configuration) -> Result<(), Error<E>> {
        self.common.configure(config)
    }

    /// Reads the current power mode
    pub fn power_mode(&mut self) -> Result<PowerMode, Error<E>> {
        self.common.power_mode()
    }

    /// Switches the power mode, keeping the oversampling settings
    pub fn set_power_mode(&mut self, mode: PowerMode) -> Result<(), Error<E>> {
        self.common.set_power_mode(mode)
    }

    /// Returns the calibration data, reading it from the device on first use
    pub fn calibration(&mut self) -> Result<CalibrationData, Error<E>> {
        self.common.calibration()
    }

    /// Captures and processes sensor data for temperature, pressure, and humidity
    ///
    /// This triggers a forced conversion, after which the device goes back to
    /// sleep. Calling it in normal mode therefore ends continuous operation; use
    /// [`BME280::read_latest`] to sample a device started with
    /// [`BME280::start_continuous`].
    pub fn measure<D: DelayMs<u8>>(&mut self, delay: &mut D) -> Result<Measurements, Error<E>> {
        Ok(self.common.measure_compensated(delay)?.to_measurements())
    }

    /// Like [`BME280::measure`], but returns the fixed-point values. It also
    /// leaves the device in sleep mode.
    pub fn measure_compensated<D: DelayMs<u8>>(
        &mut self,
        delay: &mut D,
    ) -> Result<CompensatedMeasurement, Error<E>> {
        self.common.measure_compensated(delay)
    }

    /// Enters normal mode; conversions repeat every standby period
    pub fn start_continuous(&mut self) -> Result<(), Error<E>> {
        self.common.start_continuous()
    }

    /// Reads the most recent conversion without triggering a new one
    pub fn read_latest(&mut self) -> Result<Measurements, Error<E>> {
        Ok(self.common.read_latest()?.to_measurements())
    }
}

/// Register access functions for I2C
#[derive(Debug, Default)]
struct I2CInterface<I2C> {
    /// concrete I²C device implementation
    i2c: I2C,
    /// I²C device address
    address: u8,
}

impl<I2C, E> Interface for I2CInterface<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    type Error = E;

    fn read_registers(&mut self, register: u8, data: &mut [u8]) -> Result<(), Error<E>> {
        self.i2c
            .write_read(self.address, &[register], data)
            .map_err(Error::Bus)
    }

    fn write_register(&mut self, register: u8, payload: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[register, payload])
            .map_err(Error::Bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::tests::{datasheet_calibration, DATASHEET_H, DATASHEET_PT};
    use crate::{IIRFilter, Oversampling, StandbyTime};
    use embedded_hal_mock::delay::MockNoop as MockDelay;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal_mock::MockError;
    use std::io::ErrorKind;
    use std::vec::Vec;

    const ADDR: u8 = BME280_I2C_ADDR_PRIMARY;

    /// Raw block for the datasheet example: adc_P 415148, adc_T 519888, adc_H 30000.
    const DATASHEET_DATA: [u8; 8] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x75, 0x30];

    fn calibration_reads() -> Vec<I2cTransaction> {
        vec![
            I2cTransaction::write_read(ADDR, vec![0x88], DATASHEET_PT.to_vec()),
            I2cTransaction::write_read(ADDR, vec![0xE1], DATASHEET_H.to_vec()),
        ]
    }

    fn forced_conversion(ctrl_meas_before: u8, ctrl_meas_after: u8) -> Vec<I2cTransaction> {
        vec![
            I2cTransaction::write(ADDR, vec![0xF2, 0b001]),
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![ctrl_meas_before]),
            I2cTransaction::write(ADDR, vec![0xF4, ctrl_meas_after]),
        ]
    }

    #[test]
    fn check_identity() {
        let i2c = I2cMock::new(&[I2cTransaction::write_read(ADDR, vec![0xD0], vec![0x60])]);
        let mut bme280 = BME280::new_primary(i2c);
        bme280.check_identity().unwrap();
        bme280.release().done();

        let i2c = I2cMock::new(&[I2cTransaction::write_read(ADDR, vec![0xD0], vec![0x58])]);
        let mut bme280 = BME280::new_primary(i2c);
        assert!(matches!(
            bme280.check_identity(),
            Err(Error::InvalidIdentifier(0x58))
        ));
        bme280.release().done();
    }

    #[test]
    fn secondary_address() {
        let i2c = I2cMock::new(&[I2cTransaction::write_read(0x77, vec![0xD0], vec![0x60])]);
        let mut bme280 = BME280::new_secondary(i2c);
        bme280.check_identity().unwrap();
        bme280.release().done();
    }

    #[test]
    fn reset_writes_magic() {
        let i2c = I2cMock::new(&[I2cTransaction::write(ADDR, vec![0xE0, 0xB6])]);
        let mut bme280 = BME280::new_primary(i2c);
        bme280.reset(&mut MockDelay::new()).unwrap();
        bme280.release().done();
    }

    #[test]
    fn bus_errors_propagate() {
        let i2c = I2cMock::new(&[I2cTransaction::write(ADDR, vec![0xE0, 0xB6])
            .with_error(MockError::Io(ErrorKind::Other))]);
        let mut bme280 = BME280::new_primary(i2c);
        assert!(matches!(
            bme280.reset(&mut MockDelay::new()),
            Err(Error::Bus(MockError::Io(ErrorKind::Other)))
        ));
        bme280.release().done();
    }

    #[test]
    fn init_with_config() {
        let i2c = I2cMock::new(&[
            I2cTransaction::write_read(ADDR, vec![0xD0], vec![0x60]),
            I2cTransaction::write(ADDR, vec![0xE0, 0xB6]),
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0x00]),
            I2cTransaction::write(ADDR, vec![0xF2, 0b001]),
            I2cTransaction::write_read(ADDR, vec![0xF5], vec![0x00]),
            I2cTransaction::write(ADDR, vec![0xF5, 0b100_100_00]),
            I2cTransaction::write(ADDR, vec![0xF4, 0b010_101_00]),
        ]);
        let mut bme280 = BME280::new_primary(i2c);
        bme280
            .init_with_config(
                &mut MockDelay::new(),
                Configuration::default()
                    .with_humidity_oversampling(Oversampling::Oversampling1X)
                    .with_pressure_oversampling(Oversampling::Oversampling16X)
                    .with_temperature_oversampling(Oversampling::Oversampling2X)
                    .with_iir_filter(IIRFilter::Coefficient16)
                    .with_standby_time(StandbyTime::Millis500),
            )
            .unwrap();
        bme280.release().done();
    }

    #[test]
    fn init_stops_on_wrong_chip() {
        let i2c = I2cMock::new(&[I2cTransaction::write_read(ADDR, vec![0xD0], vec![0xFF])]);
        let mut bme280 = BME280::new_primary(i2c);
        assert!(matches!(
            bme280.init(&mut MockDelay::new()),
            Err(Error::InvalidIdentifier(0xFF))
        ));
        bme280.release().done();
    }

    #[test]
    fn power_mode_read_modify_write() {
        let i2c = I2cMock::new(&[
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0b010_101_00]),
            I2cTransaction::write(ADDR, vec![0xF4, 0b010_101_11]),
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0b010_101_11]),
        ]);
        let mut bme280 = BME280::new_primary(i2c);
        bme280.set_power_mode(PowerMode::Normal).unwrap();
        assert_eq!(bme280.power_mode().unwrap(), PowerMode::Normal);
        bme280.release().done();
    }

    #[test]
    fn measure_datasheet_example() {
        let mut expectations = calibration_reads();
        expectations.extend(forced_conversion(0x00, 0b001_001_01));
        expectations.extend(vec![
            // conversion running, then calibration copy, then done
            I2cTransaction::write_read(ADDR, vec![0xF3], vec![0b1000]),
            I2cTransaction::write_read(ADDR, vec![0xF3], vec![0b0001]),
            I2cTransaction::write_read(ADDR, vec![0xF3], vec![0b0000]),
            I2cTransaction::write_read(ADDR, vec![0xF7], DATASHEET_DATA.to_vec()),
        ]);
        let i2c = I2cMock::new(&expectations);
        let mut bme280 = BME280::new_primary(i2c);

        let compensated = bme280.measure_compensated(&mut MockDelay::new()).unwrap();
        assert_eq!(
            compensated,
            CompensatedMeasurement {
                temperature: 2508,
                pressure: 10065328,
                humidity: 56317,
            }
        );
        bme280.release().done();
    }

    #[test]
    fn measure_reuses_calibration_until_reset() {
        let mut expectations = calibration_reads();
        for _ in 0..2 {
            expectations.extend(forced_conversion(0x00, 0b001_001_01));
            expectations.push(I2cTransaction::write_read(ADDR, vec![0xF3], vec![0x00]));
            expectations.push(I2cTransaction::write_read(
                ADDR,
                vec![0xF7],
                DATASHEET_DATA.to_vec(),
            ));
        }
        expectations.push(I2cTransaction::write(ADDR, vec![0xE0, 0xB6]));
        expectations.extend(calibration_reads());

        let i2c = I2cMock::new(&expectations);
        let mut bme280 = BME280::new_primary(i2c);
        let mut delay = MockDelay::new();

        let first = bme280.measure(&mut delay).unwrap();
        let second = bme280.measure(&mut delay).unwrap();
        assert_eq!(first, second);
        assert!((first.temperature - 25.08).abs() < 1e-4);
        assert!((first.pressure - 100653.28).abs() < 0.01);
        assert!((first.humidity - 54.997).abs() < 1e-3);

        bme280.reset(&mut delay).unwrap();
        assert_eq!(bme280.calibration().unwrap(), datasheet_calibration());
        bme280.release().done();
    }

    #[test]
    fn measure_keeps_configured_oversampling() {
        let mut expectations = vec![
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0x00]),
            I2cTransaction::write(ADDR, vec![0xF2, 0b101]),
            I2cTransaction::write_read(ADDR, vec![0xF5], vec![0x01]),
            I2cTransaction::write(ADDR, vec![0xF5, 0x01]),
            I2cTransaction::write(ADDR, vec![0xF4, 0b011_100_00]),
        ];
        expectations.extend(calibration_reads());
        expectations.extend(vec![
            I2cTransaction::write(ADDR, vec![0xF2, 0b101]),
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0b011_100_00]),
            I2cTransaction::write(ADDR, vec![0xF4, 0b011_100_01]),
            I2cTransaction::write_read(ADDR, vec![0xF3], vec![0x00]),
            I2cTransaction::write_read(ADDR, vec![0xF7], DATASHEET_DATA.to_vec()),
        ]);
        let i2c = I2cMock::new(&expectations);
        let mut bme280 = BME280::new_primary(i2c);
        bme280
            .configure(
                Configuration::default()
                    .with_humidity_oversampling(Oversampling::Oversampling16X)
                    .with_pressure_oversampling(Oversampling::Oversampling8X)
                    .with_temperature_oversampling(Oversampling::Oversampling4X),
            )
            .unwrap();
        bme280.measure(&mut MockDelay::new()).unwrap();
        bme280.release().done();
    }

    #[test]
    fn measure_times_out() {
        let mut expectations = calibration_reads();
        expectations.extend(forced_conversion(0x00, 0b001_001_01));
        for _ in 0..3 {
            expectations.push(I2cTransaction::write_read(ADDR, vec![0xF3], vec![0b1000]));
        }
        let i2c = I2cMock::new(&expectations);
        let mut bme280 = BME280::new_primary(i2c);
        bme280.common.config = Configuration::default().with_measurement_timeout_ms(2);

        assert!(matches!(
            bme280.measure(&mut MockDelay::new()),
            Err(Error::MeasurementTimeout)
        ));
        bme280.release().done();
    }

    #[test]
    fn continuous_mode() {
        let mut expectations = vec![
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0b001_001_00]),
            I2cTransaction::write(ADDR, vec![0xF4, 0b001_001_11]),
        ];
        expectations.extend(calibration_reads());
        expectations.push(I2cTransaction::write_read(
            ADDR,
            vec![0xF7],
            DATASHEET_DATA.to_vec(),
        ));
        let i2c = I2cMock::new(&expectations);
        let mut bme280 = BME280::new_primary(i2c);
        bme280.start_continuous().unwrap();
        let measurements = bme280.read_latest().unwrap();
        assert!((measurements.temperature - 25.08).abs() < 1e-4);
        bme280.release().done();
    }

    #[test]
    fn configure_in_normal_mode_sleeps_first() {
        let i2c = I2cMock::new(&[
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0b001_001_00]),
            I2cTransaction::write(ADDR, vec![0xF4, 0b001_001_11]),
            // configure
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0b001_001_11]),
            I2cTransaction::write(ADDR, vec![0xF4, 0b001_001_00]),
            I2cTransaction::write(ADDR, vec![0xF2, 0b001]),
            I2cTransaction::write_read(ADDR, vec![0xF5], vec![0x00]),
            I2cTransaction::write(ADDR, vec![0xF5, 0b100_100_00]),
            I2cTransaction::write(ADDR, vec![0xF4, 0b010_101_11]),
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0b010_101_11]),
        ]);
        let mut bme280 = BME280::new_primary(i2c);
        bme280.start_continuous().unwrap();
        bme280
            .configure(
                Configuration::default()
                    .with_pressure_oversampling(Oversampling::Oversampling16X)
                    .with_temperature_oversampling(Oversampling::Oversampling2X)
                    .with_iir_filter(IIRFilter::Coefficient16)
                    .with_standby_time(StandbyTime::Millis500),
            )
            .unwrap();
        assert_eq!(bme280.power_mode().unwrap(), PowerMode::Normal);
        bme280.release().done();
    }

    #[test]
    fn measure_in_normal_mode_switches_to_forced() {
        let mut expectations = vec![
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0b001_001_00]),
            I2cTransaction::write(ADDR, vec![0xF4, 0b001_001_11]),
        ];
        expectations.extend(calibration_reads());
        expectations.extend(forced_conversion(0b001_001_11, 0b001_001_01));
        expectations.extend(vec![
            I2cTransaction::write_read(ADDR, vec![0xF3], vec![0x00]),
            I2cTransaction::write_read(ADDR, vec![0xF7], DATASHEET_DATA.to_vec()),
            I2cTransaction::write_read(ADDR, vec![0xF4], vec![0b001_001_00]),
        ]);
        let i2c = I2cMock::new(&expectations);
        let mut bme280 = BME280::new_primary(i2c);
        bme280.start_continuous().unwrap();
        bme280.measure(&mut MockDelay::new()).unwrap();
        assert_eq!(bme280.power_mode().unwrap(), PowerMode::Sleep);
        bme280.release().done();
    }
}
