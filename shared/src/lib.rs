#![no_std]

// https://github.com/todbot/blink1/blob/main/docs/blink1-hid-commands.md
pub const DEVICE_VENDOR_ID: u16 = 0x27B8;
pub const DEVICE_PRODUCT_ID: u16 = 0x01ED;

pub const REPORT_ID: u8 = 1;
pub const REPORT_LEN: usize = 9;
/// Bytes after the report id and the command byte.
pub const MAX_ARGS: usize = REPORT_LEN - 2;

pub const CMD_VERSION: u8 = b'v';
pub const CMD_EEPROM_READ: u8 = b'e';
pub const CMD_EEPROM_WRITE: u8 = b'E';
pub const CMD_FADE_TO_RGB: u8 = b'c';
pub const CMD_SET_RGB: u8 = b'n';
pub const CMD_READ_RGB: u8 = b'r';
pub const CMD_SERVER_DOWN: u8 = b'D';
pub const CMD_PLAY: u8 = b'p';
pub const CMD_WRITE_PATTERN_LINE: u8 = b'P';
pub const CMD_READ_PATTERN_LINE: u8 = b'R';
pub const CMD_SET_LED_N: u8 = b'l';
pub const CMD_SAVE_PATTERN: u8 = b'W';
pub const CMD_READ_PLAY_STATE: u8 = b'S';

/// Guards the flash write against stray `W` reports.
pub const SAVE_PATTERN_MAGIC: [u8; 4] = [0xBE, 0xEF, 0xCA, 0xFE];

/// The device counts durations in 10ms ticks, stored as a big endian u16.
pub const MILLIS_PER_TICK: u32 = 10;
pub const MAX_MILLIS: u32 = u16::MAX as u32 * MILLIS_PER_TICK;

pub const PATTERN_SLOTS: u8 = 12;
pub const MAX_POSITION: u8 = PATTERN_SLOTS - 1;

/// Highest EEPROM address an `e`/`E` report can carry, the address is a single byte.
pub const MAX_EEPROM_ADDRESS: u8 = u8::MAX;

pub const LED_ALL: u8 = 0;
pub const LED_TOP: u8 = 1;
pub const LED_BOTTOM: u8 = 2;
pub const MAX_LED_INDEX: u8 = LED_BOTTOM;

/// Lookup table for [`degamma`], identical to the curve the firmware uses for its own patterns.
pub const DEGAMMA: [u8; 256] = degamma_table();

const fn degamma_table() -> [u8; 256] {
	let mut table = [0u8; 256];
	let mut n = 0;
	while n < 256 {
		let band = 1u32 << (n / 32);
		let step = (n % 32) as u32 + 1;
		table[n] = ((band - 1) + (band * step + 15) / 32) as u8;
		n += 1;
	}
	table
}

/// Maps a perceptually linear channel value to the PWM value the LED has to be driven with.
///
/// The input is split into 8 bands of 32 values, each band doubling the slope of the previous one.
#[inline]
pub const fn degamma(n: u8) -> u8 {
	DEGAMMA[n as usize]
}
