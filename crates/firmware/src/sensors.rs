//! BME280 and VEML6040 sensor glue
//!
//! Thin register wrappers that end in the fixed datastring formats from
//! [`crate::readings`]. The BME280 compensation math follows the vendor's
//! integer reference implementation; the VEML6040 is four plain 16-bit
//! colour counts.

use embedded_hal::i2c::I2c;
use embedded_hal::spi::SpiDevice;

use platform::sensors::{
    EnvDatastring, EnvironmentalSensor, LightDatastring, LightSensor,
};

use crate::readings::{format_env_datastring, format_light_datastring};

/// Sensor failure (bus transfer error or missing calibration).
#[derive(Debug, thiserror_no_std::Error)]
#[error("sensor bus transfer failed")]
pub struct SensorError;

// ── BME280 (SPI) ────────────────────────────────────────────────────────────

const BME_REG_CALIB00: u8 = 0x88;
const BME_REG_CALIB26: u8 = 0xE1;
const BME_REG_CTRL_HUM: u8 = 0xF2;
const BME_REG_CTRL_MEAS: u8 = 0xF4;
const BME_REG_PRESS_MSB: u8 = 0xF7;

/// Temperature/pressure/humidity calibration words, per the datasheet's
/// register map.
#[derive(Debug, Default, Clone, Copy)]
struct Calibration {
    t1: u16,
    t2: i16,
    t3: i16,
    p1: u16,
    p2: i16,
    p3: i16,
    p4: i16,
    p5: i16,
    p6: i16,
    p7: i16,
    p8: i16,
    p9: i16,
    h1: u8,
    h2: i16,
    h3: u8,
    h4: i16,
    h5: i16,
    h6: i8,
}

/// BME280 humidity/pressure/temperature sensor on SPI.
pub struct Bme280<SPI> {
    spi: SPI,
    calib: Calibration,
}

impl<SPI: SpiDevice> Bme280<SPI> {
    /// Wrap the sensor's SPI device; calibration is read during `setup`.
    pub fn new(spi: SPI) -> Self {
        Self {
            spi,
            calib: Calibration::default(),
        }
    }

    /// SPI read: address with the read bit, then `buf.len()` data bytes.
    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        use embedded_hal::spi::Operation;
        let addr = [reg | 0x80];
        self.spi
            .transaction(&mut [Operation::Write(&addr), Operation::Read(buf)])
            .map_err(|_| SensorError)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        // Write bit: address MSB clear.
        self.spi.write(&[reg & 0x7F, value]).map_err(|_| SensorError)
    }

    #[allow(clippy::indexing_slicing)] // fixed burst reads, constant indices
    fn read_calibration(&mut self) -> Result<(), SensorError> {
        let mut lo = [0u8; 26];
        self.read_regs(BME_REG_CALIB00, &mut lo)?;
        let mut hi = [0u8; 7];
        self.read_regs(BME_REG_CALIB26, &mut hi)?;

        let u16le = |a: u8, b: u8| u16::from_le_bytes([a, b]);
        let i16le = |a: u8, b: u8| i16::from_le_bytes([a, b]);

        self.calib = Calibration {
            t1: u16le(lo[0], lo[1]),
            t2: i16le(lo[2], lo[3]),
            t3: i16le(lo[4], lo[5]),
            p1: u16le(lo[6], lo[7]),
            p2: i16le(lo[8], lo[9]),
            p3: i16le(lo[10], lo[11]),
            p4: i16le(lo[12], lo[13]),
            p5: i16le(lo[14], lo[15]),
            p6: i16le(lo[16], lo[17]),
            p7: i16le(lo[18], lo[19]),
            p8: i16le(lo[20], lo[21]),
            p9: i16le(lo[22], lo[23]),
            h1: lo[25],
            h2: i16le(hi[0], hi[1]),
            h3: hi[2],
            // H4/H5 share a nibble-packed register pair.
            h4: (i16::from(hi[3] as i8) << 4) | i16::from(hi[4] & 0x0F),
            h5: (i16::from(hi[5] as i8) << 4) | i16::from(hi[4] >> 4),
            h6: hi[6] as i8,
        };
        Ok(())
    }

    /// Vendor integer compensation (datasheet §4.2.3, same widths as the
    /// reference implementation). Returns (temp 1/100 °C, pressure Pa,
    /// humidity Q22.10 %RH).
    #[allow(clippy::arithmetic_side_effects)] // vendor reference arithmetic, in range for valid calibration
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn compensate(&self, adc_t: i32, adc_p: i32, adc_h: i32) -> (i32, u32, u32) {
        let c = &self.calib;

        // Temperature: 32-bit fixed point.
        let var1 = (((adc_t >> 3) - (i32::from(c.t1) << 1)) * i32::from(c.t2)) >> 11;
        let var2 = (((((adc_t >> 4) - i32::from(c.t1)) * ((adc_t >> 4) - i32::from(c.t1)))
            >> 12)
            * i32::from(c.t3))
            >> 14;
        let t_fine = var1 + var2;
        let temp_centi = (t_fine * 5 + 128) >> 8;

        // Pressure: 64-bit fixed point, Pa in Q24.8 reduced to integer.
        let mut v1 = i64::from(t_fine) - 128_000;
        let mut v2 = v1 * v1 * i64::from(c.p6);
        v2 += (v1 * i64::from(c.p5)) << 17;
        v2 += i64::from(c.p4) << 35;
        v1 = ((v1 * v1 * i64::from(c.p3)) >> 8) + ((v1 * i64::from(c.p2)) << 12);
        v1 = (((1i64 << 47) + v1) * i64::from(c.p1)) >> 33;
        let pressure_pa = if v1 == 0 {
            // Division-by-zero guard from the reference implementation.
            0u32
        } else {
            let mut p = 1_048_576 - i64::from(adc_p);
            p = (((p << 31) - v2) * 3125) / v1;
            let v1 = (i64::from(c.p9) * (p >> 13) * (p >> 13)) >> 25;
            let v2 = (i64::from(c.p8) * p) >> 19;
            p = ((p + v1 + v2) >> 8) + (i64::from(c.p7) << 4);
            ((p >> 8) & 0xFFFF_FFFF) as u32
        };

        // Humidity: 32-bit fixed point, %RH in Q22.10.
        let h = t_fine - 76_800;
        let lhs = ((adc_h << 14) - (i32::from(c.h4) << 20) - (i32::from(c.h5) * h) + 16_384) >> 15;
        let inner = ((h * i32::from(c.h6)) >> 10) * (((h * i32::from(c.h3)) >> 11) + 32_768);
        let rhs = (((inner >> 10) + 2_097_152) * i32::from(c.h2) + 8_192) >> 14;
        let mut h = lhs * rhs;
        h -= ((((h >> 15) * (h >> 15)) >> 7) * i32::from(c.h1)) >> 4;
        let humidity_q10 = (h.clamp(0, 419_430_400) >> 12) as u32;

        (temp_centi, pressure_pa, humidity_q10)
    }
}

impl<SPI: SpiDevice> EnvironmentalSensor for Bme280<SPI> {
    type Error = SensorError;

    async fn setup(&mut self) -> Result<(), Self::Error> {
        self.read_calibration()?;
        // Humidity x1 oversampling; must precede ctrl_meas.
        self.write_reg(BME_REG_CTRL_HUM, 0b001)?;
        // Temperature x1, pressure x1, normal mode.
        self.write_reg(BME_REG_CTRL_MEAS, 0b001_001_11)
    }

    #[allow(clippy::indexing_slicing)] // eight-byte burst read, constant indices
    async fn read_datastring(&mut self) -> Result<EnvDatastring, Self::Error> {
        let mut raw = [0u8; 8];
        self.read_regs(BME_REG_PRESS_MSB, &mut raw)?;
        let adc_p =
            (i32::from(raw[0]) << 12) | (i32::from(raw[1]) << 4) | (i32::from(raw[2]) >> 4);
        let adc_t =
            (i32::from(raw[3]) << 12) | (i32::from(raw[4]) << 4) | (i32::from(raw[5]) >> 4);
        let adc_h = (i32::from(raw[6]) << 8) | i32::from(raw[7]);

        let (temp_centi, pressure_pa, humidity_q10) = self.compensate(adc_t, adc_p, adc_h);
        Ok(format_env_datastring(humidity_q10, pressure_pa, temp_centi))
    }
}

// ── VEML6040 (I²C) ──────────────────────────────────────────────────────────

const VEML_ADDR: u8 = 0x10;
const VEML_REG_CONF: u8 = 0x00;
const VEML_REG_R: u8 = 0x08;
const VEML_REG_G: u8 = 0x09;
const VEML_REG_B: u8 = 0x0A;
const VEML_REG_W: u8 = 0x0B;

/// Integration-time code written to the config register, reported in the
/// datastring's trailing sensitivity field.
const VEML_SENSITIVITY: u8 = 40;

/// VEML6040 RGBW light sensor, sharing the RTC's I²C bus.
pub struct Veml6040<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Veml6040<I2C> {
    /// Wrap the sensor's (shared) bus device.
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    fn read_channel(&mut self, reg: u8) -> Result<u16, SensorError> {
        let mut raw = [0u8; 2];
        self.i2c
            .write_read(VEML_ADDR, &[reg], &mut raw)
            .map_err(|_| SensorError)?;
        Ok(u16::from_le_bytes(raw))
    }
}

impl<I2C: I2c> LightSensor for Veml6040<I2C> {
    type Error = SensorError;

    async fn setup(&mut self) -> Result<(), Self::Error> {
        // 40 ms integration, auto mode, enabled. 16-bit config, LSB first.
        self.i2c
            .write(VEML_ADDR, &[VEML_REG_CONF, 0x00, 0x00])
            .map_err(|_| SensorError)
    }

    async fn read_datastring(&mut self) -> Result<LightDatastring, Self::Error> {
        let r = self.read_channel(VEML_REG_R)?;
        let g = self.read_channel(VEML_REG_G)?;
        let b = self.read_channel(VEML_REG_B)?;
        let w = self.read_channel(VEML_REG_W)?;
        Ok(format_light_datastring(r, g, b, w, VEML_SENSITIVITY))
    }
}
