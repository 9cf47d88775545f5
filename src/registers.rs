//! Control register contents and the user facing configuration.
//!
//! Every register the driver modifies is wrapped in a small value type so the
//! bit fields are named instead of masked by hand at the call site.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Oversampling applied to a single quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    /// The quantity is not measured; its data registers read `0x80000` (`0x8000` for humidity).
    Skipped = 0b000,
    Oversampling1X = 0b001,
    Oversampling2X = 0b010,
    Oversampling4X = 0b011,
    Oversampling8X = 0b100,
    Oversampling16X = 0b101,
}

impl Oversampling {
    /// Decodes a 3-bit `osrs_x` field. `0b110` and `0b111` also mean 16x.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Oversampling::Skipped,
            0b001 => Oversampling::Oversampling1X,
            0b010 => Oversampling::Oversampling2X,
            0b011 => Oversampling::Oversampling4X,
            0b100 => Oversampling::Oversampling8X,
            _ => Oversampling::Oversampling16X,
        }
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }
}

impl Default for Oversampling {
    fn default() -> Self {
        Oversampling::Oversampling1X
    }
}

/// Sensor power mode (`mode[1:0]` of `ctrl_meas`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerMode {
    /// No conversions, lowest power. The state after reset.
    Sleep = 0b00,
    /// A single conversion, then back to sleep.
    Forced = 0b01,
    /// Continuous conversions separated by the standby time.
    Normal = 0b11,
}

impl PowerMode {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => PowerMode::Sleep,
            0b11 => PowerMode::Normal,
            _ => PowerMode::Forced,
        }
    }
}

impl Default for PowerMode {
    fn default() -> Self {
        PowerMode::Sleep
    }
}

/// IIR filter coefficient applied to temperature and pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IIRFilter {
    Off = 0b000,
    Coefficient2 = 0b001,
    Coefficient4 = 0b010,
    Coefficient8 = 0b011,
    Coefficient16 = 0b100,
}

impl IIRFilter {
    /// Decodes the 3-bit `filter` field. Values above `0b100` also mean 16.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => IIRFilter::Off,
            0b001 => IIRFilter::Coefficient2,
            0b010 => IIRFilter::Coefficient4,
            0b011 => IIRFilter::Coefficient8,
            _ => IIRFilter::Coefficient16,
        }
    }
}

impl Default for IIRFilter {
    fn default() -> Self {
        IIRFilter::Off
    }
}

/// Inactive time between conversions in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StandbyTime {
    Millis0_5 = 0b000,
    Millis62_5 = 0b001,
    Millis125 = 0b010,
    Millis250 = 0b011,
    Millis500 = 0b100,
    Millis1000 = 0b101,
    Millis10 = 0b110,
    Millis20 = 0b111,
}

impl StandbyTime {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => StandbyTime::Millis0_5,
            0b001 => StandbyTime::Millis62_5,
            0b010 => StandbyTime::Millis125,
            0b011 => StandbyTime::Millis250,
            0b100 => StandbyTime::Millis500,
            0b101 => StandbyTime::Millis1000,
            0b110 => StandbyTime::Millis10,
            _ => StandbyTime::Millis20,
        }
    }
}

impl Default for StandbyTime {
    fn default() -> Self {
        StandbyTime::Millis0_5
    }
}

/// `ctrl_meas` (`0xF4`): `osrs_t[7:5] | osrs_p[4:2] | mode[1:0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CtrlMeas(pub u8);

impl CtrlMeas {
    pub const fn with_temperature_oversampling(self, os: Oversampling) -> Self {
        CtrlMeas((self.0 & 0b0001_1111) | (os.bits() << 5))
    }

    pub const fn with_pressure_oversampling(self, os: Oversampling) -> Self {
        CtrlMeas((self.0 & 0b1110_0011) | (os.bits() << 2))
    }

    pub const fn with_mode(self, mode: PowerMode) -> Self {
        CtrlMeas((self.0 & 0b1111_1100) | mode as u8)
    }

    pub const fn temperature_oversampling(&self) -> Oversampling {
        Oversampling::from_bits(self.0 >> 5)
    }

    pub const fn pressure_oversampling(&self) -> Oversampling {
        Oversampling::from_bits(self.0 >> 2)
    }

    pub const fn mode(&self) -> PowerMode {
        PowerMode::from_bits(self.0)
    }
}

/// `ctrl_hum` (`0xF2`): `osrs_h[2:0]`. Only takes effect after the next
/// `ctrl_meas` write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CtrlHum(pub u8);

impl CtrlHum {
    pub const fn with_humidity_oversampling(self, os: Oversampling) -> Self {
        CtrlHum((self.0 & 0b1111_1000) | os.bits())
    }

    pub const fn humidity_oversampling(&self) -> Oversampling {
        Oversampling::from_bits(self.0)
    }
}

/// `config` (`0xF5`): `t_sb[7:5] | filter[4:2] | spi3w_en[0]`. Writes may be
/// ignored in normal mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigRegister(pub u8);

impl ConfigRegister {
    pub const fn with_standby_time(self, standby: StandbyTime) -> Self {
        ConfigRegister((self.0 & 0b0001_1111) | ((standby as u8) << 5))
    }

    pub const fn with_iir_filter(self, filter: IIRFilter) -> Self {
        ConfigRegister((self.0 & 0b1110_0011) | ((filter as u8) << 2))
    }

    pub const fn standby_time(&self) -> StandbyTime {
        StandbyTime::from_bits(self.0 >> 5)
    }

    pub const fn iir_filter(&self) -> IIRFilter {
        IIRFilter::from_bits(self.0 >> 2)
    }
}

/// `status` (`0xF3`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    const MEASURING: u8 = 1 << 3;
    const IM_UPDATE: u8 = 1 << 0;

    /// A conversion is running.
    pub const fn measuring(&self) -> bool {
        self.0 & Self::MEASURING != 0
    }

    /// NVM calibration data is being copied to the image registers.
    pub const fn im_update(&self) -> bool {
        self.0 & Self::IM_UPDATE != 0
    }

    pub const fn is_busy(&self) -> bool {
        self.measuring() || self.im_update()
    }
}

/// Default bound on the wait for a forced conversion. The slowest setting
/// (16x on all three quantities) takes at most 113 ms.
pub const DEFAULT_MEASUREMENT_TIMEOUT_MS: u16 = 200;

/// Sampling settings applied by `init_with_config` and used by every measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Configuration {
    temperature_oversampling: Oversampling,
    pressure_oversampling: Oversampling,
    humidity_oversampling: Oversampling,
    iir_filter: IIRFilter,
    standby_time: StandbyTime,
    measurement_timeout_ms: u16,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            temperature_oversampling: Oversampling::default(),
            pressure_oversampling: Oversampling::default(),
            humidity_oversampling: Oversampling::default(),
            iir_filter: IIRFilter::default(),
            standby_time: StandbyTime::default(),
            measurement_timeout_ms: DEFAULT_MEASUREMENT_TIMEOUT_MS,
        }
    }
}

impl Configuration {
    pub fn with_temperature_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.temperature_oversampling = oversampling;
        self
    }

    pub fn with_pressure_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.pressure_oversampling = oversampling;
        self
    }

    pub fn with_humidity_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.humidity_oversampling = oversampling;
        self
    }

    pub fn with_iir_filter(mut self, filter: IIRFilter) -> Self {
        self.iir_filter = filter;
        self
    }

    /// Standby time between conversions in normal mode.
    pub fn with_standby_time(mut self, standby_time: StandbyTime) -> Self {
        self.standby_time = standby_time;
        self
    }

    /// How long `measure` waits for a forced conversion before giving up.
    pub fn with_measurement_timeout_ms(mut self, timeout_ms: u16) -> Self {
        self.measurement_timeout_ms = timeout_ms;
        self
    }

    pub fn temperature_oversampling(&self) -> Oversampling {
        self.temperature_oversampling
    }

    pub fn pressure_oversampling(&self) -> Oversampling {
        self.pressure_oversampling
    }

    pub fn humidity_oversampling(&self) -> Oversampling {
        self.humidity_oversampling
    }

    pub fn iir_filter(&self) -> IIRFilter {
        self.iir_filter
    }

    pub fn standby_time(&self) -> StandbyTime {
        self.standby_time
    }

    pub fn measurement_timeout_ms(&self) -> u16 {
        self.measurement_timeout_ms
    }

    pub(crate) fn ctrl_hum(&self) -> CtrlHum {
        CtrlHum::default().with_humidity_oversampling(self.humidity_oversampling)
    }

    pub(crate) fn config_register(&self, current: ConfigRegister) -> ConfigRegister {
        current
            .with_standby_time(self.standby_time)
            .with_iir_filter(self.iir_filter)
    }

    pub(crate) fn ctrl_meas(&self, current: CtrlMeas) -> CtrlMeas {
        current
            .with_temperature_oversampling(self.temperature_oversampling)
            .with_pressure_oversampling(self.pressure_oversampling)
    }
}
