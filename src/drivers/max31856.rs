//! MAX31856 thermocouple-to-digital converter over `embedded-hal` SPI.
//!
//! Runs in automatic conversion mode with open-circuit detection and a
//! K-type thermocouple.  Every sample reads three things: the cold-junction
//! register, the linearised thermocouple register and the fault status
//! register.
//!
//! ## Register access
//!
//! Reads send the address with bit 7 clear and clock out the data bytes;
//! writes set bit 7.

use embedded_hal::spi::{Error as _, Operation, SpiDevice};
use log::{info, warn};

use crate::app::ports::{SensorError, ThermocouplePort, ThermocoupleSample};

// ── Registers ─────────────────────────────────────────────────

const REG_CR0: u8 = 0x00;
const REG_CR1: u8 = 0x01;
const REG_MASK: u8 = 0x02;
const REG_CJTH: u8 = 0x0A;
const REG_LTCBH: u8 = 0x0C;
const REG_SR: u8 = 0x0F;

const WRITE_BIT: u8 = 0x80;

/// CR0: automatic conversion, open-circuit detection enabled.
const CR0_AUTO_OCFAULT: u8 = 0x90;
/// CR1: single-sample averaging, K-type.
const CR1_TYPE_K: u8 = 0x03;

/// °C per LSB of the 19-bit thermocouple value.
const TC_LSB_C: f32 = 0.007_812_5;
/// °C per LSB of the 16-bit cold-junction register pair.
const CJ_LSB_C: f32 = 1.0 / 256.0;

pub struct Max31856<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Max31856<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Configure conversion mode, thermocouple type and fault mask.
    pub fn init(&mut self) -> Result<(), SPI::Error> {
        self.write_register(REG_MASK, 0x00)?;
        self.write_register(REG_CR0, CR0_AUTO_OCFAULT)?;
        self.write_register(REG_CR1, CR1_TYPE_K)?;
        info!("MAX31856: K-type, automatic conversion");
        Ok(())
    }

    pub fn cold_junction_c(&mut self) -> Result<f32, SPI::Error> {
        let mut buf = [0u8; 2];
        self.read_registers(REG_CJTH, &mut buf)?;
        Ok(f32::from(i16::from_be_bytes(buf)) * CJ_LSB_C)
    }

    pub fn thermocouple_c(&mut self) -> Result<f32, SPI::Error> {
        let mut buf = [0u8; 3];
        self.read_registers(REG_LTCBH, &mut buf)?;
        // Left-align the 24 bits so the arithmetic shift sign-extends.
        let raw = i32::from_be_bytes([buf[0], buf[1], buf[2], 0]) >> 13;
        Ok(raw as f32 * TC_LSB_C)
    }

    /// Raw fault status register.
    pub fn fault_register(&mut self) -> Result<u8, SPI::Error> {
        let mut buf = [0u8; 1];
        self.read_registers(REG_SR, &mut buf)?;
        Ok(buf[0])
    }

    /// Cold junction, thermocouple and fault status in one go.
    pub fn sample(&mut self) -> Result<ThermocoupleSample, SPI::Error> {
        Ok(ThermocoupleSample {
            cold_junction_c: self.cold_junction_c()?,
            thermocouple_c: self.thermocouple_c()?,
            fault_bits: self.fault_register()?,
        })
    }

    pub fn release(self) -> SPI {
        self.spi
    }

    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SPI::Error> {
        self.spi
            .transaction(&mut [Operation::Write(&[reg & !WRITE_BIT]), Operation::Read(buf)])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), SPI::Error> {
        self.spi.write(&[reg | WRITE_BIT, value])
    }
}

impl<SPI: SpiDevice> ThermocouplePort for Max31856<SPI> {
    fn read_sample(&mut self) -> Result<ThermocoupleSample, SensorError> {
        self.sample().map_err(|e| {
            warn!("MAX31856: SPI transfer failed ({:?})", e.kind());
            SensorError::Bus
        })
    }
}
