//! Encoding of commands into 9 byte feature reports and decoding of the device's answers.
//!
//! Every report looks like `[REPORT_ID, command, arg0 .. arg6]`, unused arguments are zero.
//! Durations travel as a big endian count of 10ms ticks.

use blink1_hid_shared::{
	degamma,
	CMD_EEPROM_READ,
	CMD_EEPROM_WRITE,
	CMD_FADE_TO_RGB,
	CMD_PLAY,
	CMD_READ_PATTERN_LINE,
	CMD_READ_PLAY_STATE,
	CMD_READ_RGB,
	CMD_SAVE_PATTERN,
	CMD_SERVER_DOWN,
	CMD_SET_LED_N,
	CMD_SET_RGB,
	CMD_VERSION,
	CMD_WRITE_PATTERN_LINE,
	MAX_ARGS,
	MILLIS_PER_TICK,
	REPORT_ID,
	REPORT_LEN,
	SAVE_PATTERN_MAGIC,
};
use tracing::warn;

use crate::validate::{
	validate_address,
	validate_block,
	validate_count,
	validate_fade_millis,
	validate_index,
	validate_millis,
	validate_position,
	validate_range,
	validate_rgb,
	validate_value,
	ValidationError,
};

pub type Frame = [u8; REPORT_LEN];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

impl Rgb {
	pub const BLACK: Rgb = Rgb::new(0, 0, 0);

	pub const fn new(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b }
	}

	fn degamma(self, enabled: bool) -> Self {
		if !enabled {
			return self;
		}
		Self::new(degamma(self.r), degamma(self.g), degamma(self.b))
	}
}

impl From<(u8, u8, u8)> for Rgb {
	fn from((r, g, b): (u8, u8, u8)) -> Self {
		Self::new(r, g, b)
	}
}

/// Parameters of a fade, `delay` is the fade duration in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FadeToRgb {
	pub delay: u32,
	pub color: Rgb,
	/// 0 addresses all LEDs, 1 and 2 the individual LEDs of multi LED devices.
	pub index: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WritePatternLine {
	pub delay:    u32,
	pub color:    Rgb,
	pub position: u8,
}

/// Loops the pattern table between `start` and `end`, `count` 0 repeats forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayLoop {
	pub start: u8,
	pub end:   u8,
	pub count: u8,
}

/// A slot of the pattern table as read back from the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternLine {
	pub color: Rgb,
	pub delay: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayState {
	pub playing:  bool,
	pub start:    u8,
	pub end:      u8,
	pub count:    u8,
	pub position: u8,
}

/// Carves the EEPROM into fixed size notes so they can be addressed by id.
///
/// The firmware knows nothing about notes, note `id` is simply the `len` bytes starting at
/// `base + id * len`. Shorter notes are padded with zeros when written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteLayout {
	pub base: u8,
	pub len:  u8,
}

impl NoteLayout {
	pub const fn new(base: u8, len: u8) -> Self {
		Self { base, len }
	}

	/// First EEPROM address of note `id`, the whole note has to fit the address space.
	pub fn address(&self, id: u8) -> Result<u16, ValidationError> {
		let start = u32::from(self.base) + u32::from(id) * u32::from(self.len);
		validate_range(start, "address", 0, u8::MAX.into())?;

		let start = start as u16;
		validate_block(start, self.len.into())?;

		Ok(start)
	}

	/// `data` zero padded to the note size.
	pub fn pad(&self, data: &[u8]) -> Result<Vec<u8>, ValidationError> {
		validate_range(data.len() as f64, "note", 0, self.len.into())?;

		let mut note = data.to_vec();
		note.resize(self.len.into(), 0);
		Ok(note)
	}
}

/// One request understood by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	Version,
	EepromRead { address: u16 },
	EepromWrite { address: u16, value: u8 },
	SetRgb(Rgb),
	FadeToRgb(FadeToRgb),
	ReadRgb { index: u8 },
	ServerDown { on: bool, millis: u32 },
	Play { position: u8 },
	Pause,
	PlayLoop(PlayLoop),
	WritePatternLine(WritePatternLine),
	ReadPatternLine { position: u8 },
	SetLedN { index: u8 },
	SavePattern,
	ReadPlayState,
}

impl Command {
	pub fn command_byte(&self) -> u8 {
		match self {
			Command::Version => CMD_VERSION,
			Command::EepromRead { .. } => CMD_EEPROM_READ,
			Command::EepromWrite { .. } => CMD_EEPROM_WRITE,
			Command::SetRgb(_) => CMD_SET_RGB,
			Command::FadeToRgb(_) => CMD_FADE_TO_RGB,
			Command::ReadRgb { .. } => CMD_READ_RGB,
			Command::ServerDown { .. } => CMD_SERVER_DOWN,
			Command::Play { .. } | Command::Pause | Command::PlayLoop(_) => CMD_PLAY,
			Command::WritePatternLine(_) => CMD_WRITE_PATTERN_LINE,
			Command::ReadPatternLine { .. } => CMD_READ_PATTERN_LINE,
			Command::SetLedN { .. } => CMD_SET_LED_N,
			Command::SavePattern => CMD_SAVE_PATTERN,
			Command::ReadPlayState => CMD_READ_PLAY_STATE,
		}
	}

	/// Whether the device answers this command with a report that has to be read back.
	pub fn expects_response(&self) -> bool {
		matches!(
			self,
			Command::Version
				| Command::EepromRead { .. }
				| Command::ReadRgb { .. }
				| Command::ReadPatternLine { .. }
				| Command::ReadPlayState
		)
	}

	pub fn validate(&self) -> Result<(), ValidationError> {
		match *self {
			Command::Version | Command::Pause | Command::SavePattern | Command::ReadPlayState => Ok(()),
			Command::EepromRead { address } => validate_address(address),
			Command::EepromWrite { address, value } => {
				validate_address(address)?;
				validate_value(value)
			}
			Command::SetRgb(color) => validate_rgb(color),
			Command::FadeToRgb(FadeToRgb { delay, color, index }) => {
				validate_fade_millis(delay)?;
				validate_rgb(color)?;
				validate_index(index)
			}
			Command::ReadRgb { index } | Command::SetLedN { index } => validate_index(index),
			Command::ServerDown { millis, .. } => validate_millis(millis),
			Command::Play { position } | Command::ReadPatternLine { position } => {
				validate_position(position)
			}
			Command::PlayLoop(PlayLoop { start, end, count }) => {
				validate_position(start)?;
				validate_position(end)?;
				validate_count(count)
			}
			Command::WritePatternLine(WritePatternLine {
				delay,
				color,
				position,
			}) => {
				validate_fade_millis(delay)?;
				validate_rgb(color)?;
				validate_position(position)
			}
		}
	}

	/// Validates the command and builds its report, colors are gamma corrected when `degamma` is set.
	pub fn encode(&self, degamma: bool) -> Result<Frame, ValidationError> {
		self.validate()?;

		let cmd = self.command_byte();
		let frame = match *self {
			Command::Version | Command::ReadPlayState => build_frame(cmd, &[]),
			Command::EepromRead { address } => build_frame(cmd, &[eeprom_address(address)]),
			Command::EepromWrite { address, value } => {
				build_frame(cmd, &[eeprom_address(address), value])
			}
			Command::SetRgb(color) => {
				let Rgb { r, g, b } = color.degamma(degamma);
				build_frame(cmd, &[r, g, b])
			}
			Command::FadeToRgb(FadeToRgb { delay, color, index }) => {
				let Rgb { r, g, b } = color.degamma(degamma);
				let [hi, lo] = millis_to_ticks(delay);
				build_frame(cmd, &[r, g, b, hi, lo, index])
			}
			Command::ReadRgb { index } => build_frame(cmd, &[index, 0, 0, 0, 0, index]),
			Command::ServerDown { on, millis } => {
				let [hi, lo] = millis_to_ticks(millis);
				build_frame(cmd, &[on as u8, hi, lo])
			}
			Command::Play { position } => build_frame(cmd, &[1, position]),
			Command::Pause => build_frame(cmd, &[0, 0]),
			Command::PlayLoop(PlayLoop { start, end, count }) => {
				build_frame(cmd, &[1, start, end, count])
			}
			Command::WritePatternLine(WritePatternLine {
				delay,
				color,
				position,
			}) => {
				let Rgb { r, g, b } = color.degamma(degamma);
				let [hi, lo] = millis_to_ticks(delay);
				build_frame(cmd, &[r, g, b, hi, lo, position, 0])
			}
			Command::ReadPatternLine { position } => {
				build_frame(cmd, &[0, 0, 0, 0, 0, position, 0])
			}
			Command::SetLedN { index } => build_frame(cmd, &[index]),
			Command::SavePattern => build_frame(cmd, &SAVE_PATTERN_MAGIC),
		};

		Ok(frame)
	}
}

/// Lays out `[REPORT_ID, command, args..]`, zero padded. Arguments past the 7th are dropped.
pub fn build_frame(command: u8, args: &[u8]) -> Frame {
	let mut frame = [0u8; REPORT_LEN];
	frame[0] = REPORT_ID;
	frame[1] = command;

	let len = args.len().min(MAX_ARGS);
	frame[2..2 + len].copy_from_slice(&args[..len]);

	frame
}

/// Splits a validated duration into big endian 10ms ticks.
pub fn millis_to_ticks(millis: u32) -> [u8; 2] {
	let ticks = millis / MILLIS_PER_TICK;
	[(ticks >> 8) as u8, (ticks % 256) as u8]
}

pub fn ticks_to_millis(hi: u8, lo: u8) -> u32 {
	u32::from(u16::from_be_bytes([hi, lo])) * MILLIS_PER_TICK
}

fn eeprom_address(address: u16) -> u8 {
	// firmware only decodes the low byte
	if address > u16::from(u8::MAX) {
		warn!("eeprom address {:#06x} truncated to {:#04x}", address, address as u8);
	}
	address as u8
}

/// Version reports carry two ASCII digits, e.g. `[1, 'v', 0, '1', '0', ..]` is "1.0".
pub fn decode_version(frame: &Frame) -> String {
	format!("{}.{}", char::from(frame[3]), char::from(frame[4]))
}

pub fn decode_eeprom_value(frame: &Frame) -> u8 {
	frame[3]
}

pub fn decode_rgb(frame: &Frame) -> Rgb {
	Rgb::new(frame[2], frame[3], frame[4])
}

pub fn decode_pattern_line(frame: &Frame) -> PatternLine {
	PatternLine {
		color: decode_rgb(frame),
		delay: ticks_to_millis(frame[5], frame[6]),
	}
}

/// Note bytes up to the first NUL, invalid UTF-8 is replaced.
pub fn decode_note_string(note: &[u8]) -> String {
	let end = note.iter().position(|&b| b == 0).unwrap_or(note.len());
	String::from_utf8_lossy(&note[..end]).into_owned()
}

pub fn decode_play_state(frame: &Frame) -> PlayState {
	PlayState {
		playing:  frame[2] != 0,
		start:    frame[3],
		end:      frame[4],
		count:    frame[5],
		position: frame[6],
	}
}
