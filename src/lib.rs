//! Driver for blink(1) USB RGB lights.
//!
//! The device is controlled exclusively through 9 byte HID feature reports, see [`protocol`] for
//! the wire format. [`Blink1`] is the blocking driver, `tokio::Blink1` (behind the `tokio` feature)
//! the async one.

use std::thread;
use std::time::{Duration, Instant};

use blink1_hid_shared::PATTERN_SLOTS;
use hidapi::{HidApi, HidDevice};
use thiserror::Error;
use tracing::info;

pub mod protocol;
pub mod transport;
pub mod validate;

mod session;
#[cfg(feature = "tokio")]
pub mod tokio;

pub use blink1_hid_shared::{degamma, LED_ALL, LED_BOTTOM, LED_TOP};
pub use protocol::{FadeToRgb, NoteLayout, PatternLine, PlayLoop, PlayState, Rgb, WritePatternLine};
pub use transport::{check_report_len, list_devices, Backend, DeviceInfo, FeatureReport};
pub use validate::ValidationError;

use protocol::{
	decode_eeprom_value,
	decode_note_string,
	decode_pattern_line,
	decode_play_state,
	decode_rgb,
	decode_version,
	Command,
};
use session::Session;
use validate::validate_block;

#[derive(Error, Debug)]
pub enum Error {
	#[error("no blink(1) devices could be found")]
	NoDeviceFound,
	#[error("no blink(1) with serial number {0} could be found")]
	SerialNumberNotFound(String),
	#[error(transparent)]
	Validation(#[from] ValidationError),
	#[error("transport error: {0}")]
	Transport(#[from] hidapi::HidError),
	#[error("short feature report: expected {expected} bytes, received {received}")]
	ShortResponse { expected: usize, received: usize },
	#[error("the device session is closed")]
	SessionClosed,
	#[error("command '{0}' has no response to read")]
	NoResponse(char),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
	/// Gamma correct colors before they are sent, read backs are never corrected.
	pub degamma: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self { degamma: true }
	}
}

/// The result of a command whose effect plays out on the device over time.
///
/// The device has no "done" report, the command counts as complete once its duration has passed.
/// The device carries the command out whether or not this is waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Completion<T> {
	value:    T,
	deadline: Instant,
}

impl<T> Completion<T> {
	fn after(value: T, millis: u32) -> Self {
		Self {
			value,
			deadline: Instant::now() + Duration::from_millis(millis.into()),
		}
	}

	pub fn deadline(&self) -> Instant {
		self.deadline
	}

	pub fn is_complete(&self) -> bool {
		Instant::now() >= self.deadline
	}

	/// Blocks until the deadline has passed.
	pub fn wait(self) -> T {
		if let Some(remaining) = self.deadline.checked_duration_since(Instant::now()) {
			thread::sleep(remaining);
		}
		self.value
	}

	/// Returns the value without waiting.
	pub fn into_inner(self) -> T {
		self.value
	}
}

pub struct Blink1<D = HidDevice> {
	session: Session<D>,
}

impl Blink1<HidDevice> {
	/// Serial numbers of all connected devices.
	pub fn devices() -> Result<Vec<String>> {
		let mut api = HidApi::new()?;
		list_devices(&mut api)
	}

	/// Opens the device with the given serial number, or the first one the OS lists.
	pub fn open(serial_number: Option<&str>) -> Result<Self> {
		Self::open_with_config(serial_number, Config::default())
	}

	pub fn open_with_config(serial_number: Option<&str>, config: Config) -> Result<Self> {
		let mut api = HidApi::new()?;
		Self::open_with(&mut api, serial_number, config)
	}
}

impl<D: FeatureReport> Blink1<D> {
	/// Opens a device through any [`Backend`].
	pub fn open_with<B>(backend: &mut B, serial_number: Option<&str>, config: Config) -> Result<Self>
	where
		B: Backend<Device = D>,
	{
		Ok(Self {
			session: Session::open(backend, serial_number, config)?,
		})
	}

	pub fn serial_number(&self) -> &str {
		self.session.serial_number()
	}

	pub fn config(&self) -> Config {
		self.session.config
	}

	pub fn set_config(&mut self, config: Config) {
		self.session.config = config;
	}

	pub fn set_degamma(&mut self, enabled: bool) {
		self.session.config.degamma = enabled;
	}

	pub fn is_closed(&self) -> bool {
		self.session.is_closed()
	}

	/// Firmware version as "major.minor".
	pub fn version(&mut self) -> Result<String> {
		let response = self.session.query(Command::Version)?;
		Ok(decode_version(&response))
	}

	pub fn ee_read(&mut self, address: u16) -> Result<u8> {
		let response = self.session.query(Command::EepromRead { address })?;
		Ok(decode_eeprom_value(&response))
	}

	pub fn ee_write(&mut self, address: u16, value: u8) -> Result<()> {
		self.session.send(Command::EepromWrite { address, value })
	}

	/// Reads `len` bytes of non-volatile memory starting at `address`.
	pub fn ee_read_block(&mut self, address: u16, len: usize) -> Result<Vec<u8>> {
		self.session.ensure_open()?;
		validate_block(address, len)?;

		(0..len)
			.map(|offset| self.ee_read(address + offset as u16))
			.collect()
	}

	/// Writes `data` to non-volatile memory starting at `address`. The whole block is checked
	/// against the address space before the first byte is written.
	pub fn ee_write_block(&mut self, address: u16, data: &[u8]) -> Result<()> {
		self.session.ensure_open()?;
		validate_block(address, data.len())?;

		for (offset, value) in data.iter().enumerate() {
			self.ee_write(address + offset as u16, *value)?;
		}

		Ok(())
	}

	/// Writes note `id` of `layout`, zero padded to the note size.
	pub fn write_note(&mut self, layout: NoteLayout, id: u8, note: &[u8]) -> Result<()> {
		self.session.ensure_open()?;
		let address = layout.address(id)?;
		let note = layout.pad(note)?;

		self.ee_write_block(address, &note)
	}

	/// Reads the raw bytes of note `id`, padding included.
	pub fn read_note(&mut self, layout: NoteLayout, id: u8) -> Result<Vec<u8>> {
		self.session.ensure_open()?;
		let address = layout.address(id)?;

		self.ee_read_block(address, layout.len.into())
	}

	/// Reads note `id` as text, up to the first NUL.
	pub fn read_note_string(&mut self, layout: NoteLayout, id: u8) -> Result<String> {
		let note = self.read_note(layout, id)?;
		Ok(decode_note_string(&note))
	}

	pub fn set_rgb(&mut self, color: Rgb) -> Result<Rgb> {
		self.session.send(Command::SetRgb(color))?;
		Ok(color)
	}

	/// Starts a fade, the returned [`Completion`] finishes after `fade.delay` milliseconds.
	pub fn fade_to_rgb(&mut self, fade: FadeToRgb) -> Result<Completion<FadeToRgb>> {
		self.session.send(Command::FadeToRgb(fade))?;
		Ok(Completion::after(fade, fade.delay))
	}

	/// Current color of the LED at `index` (0 for all), as the device reports it.
	pub fn get_rgb(&mut self, index: u8) -> Result<Rgb> {
		let response = self.session.query(Command::ReadRgb { index })?;
		Ok(decode_rgb(&response))
	}

	pub fn rgb(&mut self, index: u8) -> Result<Rgb> {
		self.get_rgb(index)
	}

	pub fn off(&mut self) -> Result<Rgb> {
		self.set_rgb(Rgb::BLACK)
	}

	/// Arms the server down timer, the device plays its pattern if it hears nothing for `millis`.
	pub fn enable_server_down(&mut self, millis: u32) -> Result<Completion<()>> {
		self.server_down(true, millis)
	}

	pub fn disable_server_down(&mut self, millis: u32) -> Result<Completion<()>> {
		self.server_down(false, millis)
	}

	fn server_down(&mut self, on: bool, millis: u32) -> Result<Completion<()>> {
		self.session.send(Command::ServerDown { on, millis })?;
		Ok(Completion::after((), millis))
	}

	/// Plays the pattern table starting at `position`.
	pub fn play(&mut self, position: u8) -> Result<()> {
		self.session.send(Command::Play { position })
	}

	pub fn play_loop(&mut self, play_loop: PlayLoop) -> Result<()> {
		self.session.send(Command::PlayLoop(play_loop))
	}

	pub fn pause(&mut self) -> Result<()> {
		self.session.send(Command::Pause)
	}

	pub fn read_play_state(&mut self) -> Result<PlayState> {
		let response = self.session.query(Command::ReadPlayState)?;
		Ok(decode_play_state(&response))
	}

	pub fn write_pattern_line(&mut self, line: WritePatternLine) -> Result<()> {
		self.session.send(Command::WritePatternLine(line))
	}

	pub fn read_pattern_line(&mut self, position: u8) -> Result<PatternLine> {
		let response = self.session.query(Command::ReadPatternLine { position })?;
		Ok(decode_pattern_line(&response))
	}

	/// Sets every slot of the RAM pattern table to black with no fade.
	pub fn clear_pattern(&mut self) -> Result<()> {
		for position in 0..PATTERN_SLOTS {
			self.write_pattern_line(WritePatternLine {
				delay: 0,
				color: Rgb::BLACK,
				position,
			})?;
		}
		Ok(())
	}

	/// Selects the LED that following [`Blink1::write_pattern_line`] calls apply to.
	pub fn set_led_n(&mut self, index: u8) -> Result<()> {
		self.session.send(Command::SetLedN { index })
	}

	/// Persists the RAM pattern table to flash.
	///
	/// The device drops off the bus for a moment while writing flash, so this can report a
	/// transport error even though the pattern was saved.
	pub fn save_pattern(&mut self) -> Result<()> {
		self.session.send(Command::SavePattern)?;
		info!("saved pattern on {}", self.session.serial_number());
		Ok(())
	}

	pub fn close(&mut self) -> Result<()> {
		self.session.close()
	}
}
