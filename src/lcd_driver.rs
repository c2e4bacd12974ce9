use std::{thread, time::Duration};

use rppal::{
    gpio::{Gpio, Level, OutputPin},
    i2c::I2c,
};
use thiserror::Error;

// HD44780 timing. The enable strobe and the post-byte settle time are well
// above the datasheet minimums so the same numbers work for every clone
// panel out there.
const ENABLE_PULSE_US: u64 = 500;
const POST_BYTE_US: u64 = 100;
const CLEAR_SETTLE_US: u64 = 2000;

// DDRAM start address of each row on 16x2/20x4 panels.
const ROW_ADDR: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

#[derive(Debug, Error)]
pub(crate) enum LcdError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),
}

/**
 * One half-byte transfer to the panel, enable strobe included. Everything
 * above this seam is bus-agnostic; the two implementations below cover
 * direct GPIO wiring and the PCF8574 backpack.
 */
pub(crate) trait LcdBus {
    fn write_nibble(&mut self, nibble: u8, rs_data: bool) -> Result<(), LcdError>;
}

/**
 * HD44780 wired straight to GPIO in 4-bit mode: rs, en and d4..d7.
 * The rw line is assumed tied to ground; the driver never reads back.
 */
pub(crate) struct GpioBus {
    rs_pin: OutputPin,
    en_pin: OutputPin,
    data_pins: [OutputPin; 4],
}

impl GpioBus {
    pub(crate) fn new(rs: u8, en: u8, d4: u8, d5: u8, d6: u8, d7: u8) -> Result<Self, LcdError> {
        let gpio = Gpio::new()?;
        let mut rs_pin = gpio.get(rs)?.into_output();
        let mut en_pin = gpio.get(en)?.into_output();
        let mut data_pins = [
            gpio.get(d4)?.into_output(),
            gpio.get(d5)?.into_output(),
            gpio.get(d6)?.into_output(),
            gpio.get(d7)?.into_output(),
        ];

        rs_pin.set_low();
        en_pin.set_low();
        for pin in data_pins.iter_mut() {
            pin.set_low();
        }

        Ok(Self {
            rs_pin,
            en_pin,
            data_pins,
        })
    }

    fn _pulse_enable(&mut self) {
        self.en_pin.set_high();
        thread::sleep(Duration::from_micros(ENABLE_PULSE_US));
        self.en_pin.set_low();
        thread::sleep(Duration::from_micros(ENABLE_PULSE_US));
    }
}

impl LcdBus for GpioBus {
    fn write_nibble(&mut self, nibble: u8, rs_data: bool) -> Result<(), LcdError> {
        self.rs_pin
            .write(if rs_data { Level::High } else { Level::Low });
        for (bit, pin) in self.data_pins.iter_mut().enumerate() {
            pin.write(if (nibble >> bit) & 1 == 1 {
                Level::High
            } else {
                Level::Low
            });
        }
        self._pulse_enable();
        Ok(())
    }
}

// PCF8574 backpack bit assignments.
const I2C_RS: u8 = 0x01;
const I2C_EN: u8 = 0x04;
const I2C_BACKLIGHT: u8 = 0x08;

/**
 * PCF8574 I2C backpack. The expander's low bits carry rs/rw/en/backlight
 * and the high nibble carries the data lines, so a nibble transfer is two
 * writes of the same byte with enable toggled.
 */
pub(crate) struct I2cBus {
    i2c: I2c,
    backlight_on: bool,
}

impl I2cBus {
    pub(crate) fn new(addr: u16) -> Result<Self, LcdError> {
        let mut i2c = I2c::new()?;
        i2c.set_slave_address(addr)?;
        Ok(Self {
            i2c,
            backlight_on: true,
        })
    }

    fn _frame_byte(nibble: u8, rs_data: bool, backlight_on: bool) -> u8 {
        let mut byte = (nibble & 0x0F) << 4;
        if rs_data {
            byte |= I2C_RS;
        }
        if backlight_on {
            byte |= I2C_BACKLIGHT;
        }
        byte
    }
}

impl LcdBus for I2cBus {
    fn write_nibble(&mut self, nibble: u8, rs_data: bool) -> Result<(), LcdError> {
        let byte = I2cBus::_frame_byte(nibble, rs_data, self.backlight_on);
        self.i2c.write(&[byte | I2C_EN])?;
        thread::sleep(Duration::from_micros(ENABLE_PULSE_US));
        self.i2c.write(&[byte])?;
        thread::sleep(Duration::from_micros(ENABLE_PULSE_US));
        Ok(())
    }
}

pub(crate) struct Lcd<B: LcdBus> {
    bus: B,
}

impl<B: LcdBus> Lcd<B> {
    pub(crate) fn new(bus: B) -> Self {
        Self { bus }
    }

    /**
     * Forces the controller into 4-bit mode (the 0x03/0x03/0x03/0x02 dance
     * works from any power-on state), then: 2 lines 5x8 font, display on
     * with cursor off, left-to-right entry, clear.
     */
    pub(crate) fn init(&mut self) -> Result<(), LcdError> {
        thread::sleep(Duration::from_millis(50));

        self.bus.write_nibble(0x03, false)?;
        thread::sleep(Duration::from_micros(4500));
        self.bus.write_nibble(0x03, false)?;
        thread::sleep(Duration::from_micros(4500));
        self.bus.write_nibble(0x03, false)?;
        thread::sleep(Duration::from_micros(150));
        self.bus.write_nibble(0x02, false)?;

        self._send_byte(0x28, false)?;
        self._send_byte(0x0C, false)?;
        self._send_byte(0x06, false)?;
        self.clear()?;
        Ok(())
    }

    pub(crate) fn clear(&mut self) -> Result<(), LcdError> {
        self._send_byte(0x01, false)?;
        thread::sleep(Duration::from_micros(CLEAR_SETTLE_US));
        Ok(())
    }

    pub(crate) fn set_cursor(&mut self, row: usize, col: usize) -> Result<(), LcdError> {
        self._send_byte(0x80 + ROW_ADDR[row] + col as u8, false)
    }

    /**
     * Writes text at the current cursor. The panel's character ROM is
     * ASCII-ish; anything else is replaced with '?' rather than letting
     * stray bytes select random glyphs.
     */
    pub(crate) fn print(&mut self, text: &str) -> Result<(), LcdError> {
        for c in text.chars() {
            let byte = if c.is_ascii() { c as u8 } else { b'?' };
            self._send_byte(byte, true)?;
        }
        Ok(())
    }

    fn _send_byte(&mut self, byte: u8, rs_data: bool) -> Result<(), LcdError> {
        self.bus.write_nibble(byte >> 4, rs_data)?;
        self.bus.write_nibble(byte & 0x0F, rs_data)?;
        thread::sleep(Duration::from_micros(POST_BYTE_US));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * Records every nibble transfer instead of touching hardware.
     */
    struct RecordingBus {
        writes: Vec<(u8, bool)>,
    }

    impl RecordingBus {
        fn new() -> Self {
            Self { writes: Vec::new() }
        }
    }

    impl LcdBus for RecordingBus {
        fn write_nibble(&mut self, nibble: u8, rs_data: bool) -> Result<(), LcdError> {
            self.writes.push((nibble, rs_data));
            Ok(())
        }
    }

    #[test]
    fn bytes_are_sent_high_nibble_first() {
        let mut lcd = Lcd::new(RecordingBus::new());
        lcd.print("A").unwrap(); // 0x41
        assert_eq!(lcd.bus.writes, vec![(0x4, true), (0x1, true)]);
    }

    #[test]
    fn set_cursor_addresses_the_second_row() {
        let mut lcd = Lcd::new(RecordingBus::new());
        lcd.set_cursor(1, 3).unwrap(); // 0x80 + 0x40 + 3 = 0xC3
        assert_eq!(lcd.bus.writes, vec![(0xC, false), (0x3, false)]);
    }

    #[test]
    fn init_starts_with_the_4bit_dance() {
        let mut lcd = Lcd::new(RecordingBus::new());
        lcd.init().unwrap();
        assert_eq!(
            &lcd.bus.writes[..4],
            &[(0x03, false), (0x03, false), (0x03, false), (0x02, false)]
        );
        // Function set 0x28 follows as two command nibbles.
        assert_eq!(&lcd.bus.writes[4..6], &[(0x2, false), (0x8, false)]);
    }

    #[test]
    fn non_ascii_is_replaced() {
        let mut lcd = Lcd::new(RecordingBus::new());
        lcd.print("é").unwrap();
        assert_eq!(lcd.bus.writes, vec![(0x3, true), (0xF, true)]); // '?'
    }

    #[test]
    fn i2c_frame_places_data_in_the_high_nibble() {
        assert_eq!(I2cBus::_frame_byte(0x4, false, false), 0x40);
        assert_eq!(I2cBus::_frame_byte(0x4, true, true), 0x40 | 0x01 | 0x08);
        // Data nibble is masked to four bits.
        assert_eq!(I2cBus::_frame_byte(0xFF, false, false), 0xF0);
    }
}
