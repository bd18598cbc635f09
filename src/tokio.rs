use std::time::Duration;

use blink1_hid_shared::PATTERN_SLOTS;
use hidapi::{HidApi, HidDevice};
use tokio::{sync::Mutex, time::sleep};
use tracing::info;

use crate::protocol::{
	decode_eeprom_value,
	decode_note_string,
	decode_pattern_line,
	decode_play_state,
	decode_rgb,
	decode_version,
	Command,
};
use crate::session::Session;
use crate::transport::{Backend, FeatureReport};
use crate::validate::validate_block;
use crate::{
	Config,
	FadeToRgb,
	NoteLayout,
	PatternLine,
	PlayLoop,
	PlayState,
	Result,
	Rgb,
	WritePatternLine,
};

/// Async driver, can be shared between tasks.
///
/// Calls are serialized on an internal lock, only the report exchange holds it. Fades and the
/// server down timer release it before waiting out their duration, so other calls can be made in
/// the meantime (a new color interrupts a running fade, the pending call still finishes on time).
pub struct Blink1<D = HidDevice> {
	session: Mutex<Session<D>>,
}

impl Blink1<HidDevice> {
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
	pub fn open_with<B>(backend: &mut B, serial_number: Option<&str>, config: Config) -> Result<Self>
	where
		B: Backend<Device = D>,
	{
		Ok(Self {
			session: Mutex::new(Session::open(backend, serial_number, config)?),
		})
	}

	pub async fn serial_number(&self) -> String {
		self.session.lock().await.serial_number().to_string()
	}

	pub async fn config(&self) -> Config {
		self.session.lock().await.config
	}

	pub async fn set_config(&self, config: Config) {
		self.session.lock().await.config = config;
	}

	pub async fn set_degamma(&self, enabled: bool) {
		self.session.lock().await.config.degamma = enabled;
	}

	pub async fn is_closed(&self) -> bool {
		self.session.lock().await.is_closed()
	}

	pub async fn version(&self) -> Result<String> {
		let response = self.session.lock().await.query(Command::Version)?;
		Ok(decode_version(&response))
	}

	pub async fn ee_read(&self, address: u16) -> Result<u8> {
		let response = self
			.session
			.lock()
			.await
			.query(Command::EepromRead { address })?;
		Ok(decode_eeprom_value(&response))
	}

	pub async fn ee_write(&self, address: u16, value: u8) -> Result<()> {
		self.session
			.lock()
			.await
			.send(Command::EepromWrite { address, value })
	}

	/// Reads a block of non-volatile memory, other calls wait until the whole block is read.
	pub async fn ee_read_block(&self, address: u16, len: usize) -> Result<Vec<u8>> {
		let mut session = self.session.lock().await;
		session.ensure_open()?;
		validate_block(address, len)?;

		(0..len)
			.map(|offset| -> Result<u8> {
				let address = address + offset as u16;
				let response = session.query(Command::EepromRead { address })?;
				Ok(decode_eeprom_value(&response))
			})
			.collect()
	}

	pub async fn ee_write_block(&self, address: u16, data: &[u8]) -> Result<()> {
		let mut session = self.session.lock().await;
		session.ensure_open()?;
		validate_block(address, data.len())?;

		for (offset, value) in data.iter().enumerate() {
			session.send(Command::EepromWrite {
				address: address + offset as u16,
				value:   *value,
			})?;
		}

		Ok(())
	}

	pub async fn write_note(&self, layout: NoteLayout, id: u8, note: &[u8]) -> Result<()> {
		self.session.lock().await.ensure_open()?;
		let address = layout.address(id)?;
		let note = layout.pad(note)?;

		self.ee_write_block(address, &note).await
	}

	pub async fn read_note(&self, layout: NoteLayout, id: u8) -> Result<Vec<u8>> {
		self.session.lock().await.ensure_open()?;
		let address = layout.address(id)?;

		self.ee_read_block(address, layout.len.into()).await
	}

	pub async fn read_note_string(&self, layout: NoteLayout, id: u8) -> Result<String> {
		let note = self.read_note(layout, id).await?;
		Ok(decode_note_string(&note))
	}

	pub async fn set_rgb(&self, color: Rgb) -> Result<Rgb> {
		self.session.lock().await.send(Command::SetRgb(color))?;
		Ok(color)
	}

	/// Starts a fade and resolves once `fade.delay` milliseconds have passed.
	pub async fn fade_to_rgb(&self, fade: FadeToRgb) -> Result<FadeToRgb> {
		self.session.lock().await.send(Command::FadeToRgb(fade))?;
		sleep(Duration::from_millis(fade.delay.into())).await;
		Ok(fade)
	}

	pub async fn get_rgb(&self, index: u8) -> Result<Rgb> {
		let response = self.session.lock().await.query(Command::ReadRgb { index })?;
		Ok(decode_rgb(&response))
	}

	pub async fn rgb(&self, index: u8) -> Result<Rgb> {
		self.get_rgb(index).await
	}

	pub async fn off(&self) -> Result<Rgb> {
		self.set_rgb(Rgb::BLACK).await
	}

	pub async fn enable_server_down(&self, millis: u32) -> Result<()> {
		self.server_down(true, millis).await
	}

	pub async fn disable_server_down(&self, millis: u32) -> Result<()> {
		self.server_down(false, millis).await
	}

	async fn server_down(&self, on: bool, millis: u32) -> Result<()> {
		self.session
			.lock()
			.await
			.send(Command::ServerDown { on, millis })?;
		sleep(Duration::from_millis(millis.into())).await;
		Ok(())
	}

	pub async fn play(&self, position: u8) -> Result<()> {
		self.session.lock().await.send(Command::Play { position })
	}

	pub async fn play_loop(&self, play_loop: PlayLoop) -> Result<()> {
		self.session.lock().await.send(Command::PlayLoop(play_loop))
	}

	pub async fn pause(&self) -> Result<()> {
		self.session.lock().await.send(Command::Pause)
	}

	pub async fn read_play_state(&self) -> Result<PlayState> {
		let response = self.session.lock().await.query(Command::ReadPlayState)?;
		Ok(decode_play_state(&response))
	}

	pub async fn write_pattern_line(&self, line: WritePatternLine) -> Result<()> {
		self.session
			.lock()
			.await
			.send(Command::WritePatternLine(line))
	}

	pub async fn read_pattern_line(&self, position: u8) -> Result<PatternLine> {
		let response = self
			.session
			.lock()
			.await
			.query(Command::ReadPatternLine { position })?;
		Ok(decode_pattern_line(&response))
	}

	pub async fn clear_pattern(&self) -> Result<()> {
		let mut session = self.session.lock().await;
		for position in 0..PATTERN_SLOTS {
			session.send(Command::WritePatternLine(WritePatternLine {
				delay: 0,
				color: Rgb::BLACK,
				position,
			}))?;
		}
		Ok(())
	}

	pub async fn set_led_n(&self, index: u8) -> Result<()> {
		self.session.lock().await.send(Command::SetLedN { index })
	}

	/// Persists the RAM pattern table to flash, see [`crate::Blink1::save_pattern`].
	pub async fn save_pattern(&self) -> Result<()> {
		let mut session = self.session.lock().await;
		session.send(Command::SavePattern)?;
		info!("saved pattern on {}", session.serial_number());
		Ok(())
	}

	pub async fn close(&self) -> Result<()> {
		self.session.lock().await.close()
	}
}
