use blink1_hid_shared::REPORT_ID;
use tracing::{debug, info};

use crate::protocol::{Command, Frame};
use crate::transport::{select_device, Backend, FeatureReport};
use crate::{Config, Error, Result};

/// The open handle of one device. All traffic goes through [`Session::send`] and [`Session::query`],
/// which validate before touching the handle and fail with [`Error::SessionClosed`] once closed.
pub(crate) struct Session<D> {
	device:        Option<D>,
	serial_number: String,
	pub(crate) config: Config,
}

impl<D: FeatureReport> Session<D> {
	pub(crate) fn open<B>(backend: &mut B, serial_number: Option<&str>, config: Config) -> Result<Self>
	where
		B: Backend<Device = D>,
	{
		let info = select_device(backend, serial_number)?;
		let device = backend.open_path(&info.path)?;

		info!("opened device {} at {:?}", info.serial_number, info.path);

		Ok(Self {
			device: Some(device),
			serial_number: info.serial_number,
			config,
		})
	}

	pub(crate) fn serial_number(&self) -> &str {
		&self.serial_number
	}

	pub(crate) fn is_closed(&self) -> bool {
		self.device.is_none()
	}

	pub(crate) fn ensure_open(&self) -> Result<()> {
		if self.is_closed() {
			return Err(Error::SessionClosed);
		}
		Ok(())
	}

	/// Sends a command, its answer (if the command has one) is read and dropped.
	pub(crate) fn send(&mut self, command: Command) -> Result<()> {
		self.exchange(&command)?;
		Ok(())
	}

	/// Sends a command and returns the report the device answers with.
	pub(crate) fn query(&mut self, command: Command) -> Result<Frame> {
		self.ensure_open()?;
		if !command.expects_response() {
			return Err(Error::NoResponse(char::from(command.command_byte())));
		}

		self.exchange(&command)?
			.ok_or(Error::NoResponse(char::from(command.command_byte())))
	}

	/// One report out and, for commands the device answers, exactly one report back.
	fn exchange(&mut self, command: &Command) -> Result<Option<Frame>> {
		let device = self.device.as_mut().ok_or(Error::SessionClosed)?;
		let frame = command.encode(self.config.degamma)?;

		debug!("sending {:02x?}", frame);
		device.send_feature_report(&frame)?;

		if !command.expects_response() {
			return Ok(None);
		}

		let response = device.get_feature_report(REPORT_ID)?;
		debug!("received {:02x?}", response);

		Ok(Some(response))
	}

	/// Releases the handle, a second close fails like any other call on a closed session.
	pub(crate) fn close(&mut self) -> Result<()> {
		let device = self.device.take().ok_or(Error::SessionClosed)?;
		drop(device);

		info!("closed device {}", self.serial_number);

		Ok(())
	}
}
