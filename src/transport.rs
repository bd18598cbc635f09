//! The HID side of the driver: finding devices and moving feature reports.
//!
//! [`Backend`] and [`FeatureReport`] are implemented for `hidapi`, other implementations can be
//! plugged in to drive the protocol over something else (or nothing, in tests).

use std::ffi::{CStr, CString};

use blink1_hid_shared::{DEVICE_PRODUCT_ID, DEVICE_VENDOR_ID, REPORT_LEN};
use hidapi::{HidApi, HidDevice};
use tracing::debug;

use crate::protocol::Frame;
use crate::{Error, Result};

/// A device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
	pub serial_number: String,
	pub path:          CString,
}

pub trait Backend {
	type Device: FeatureReport;

	/// Lists the attached devices with the given ids in the order the OS reports them.
	fn enumerate(&mut self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceInfo>>;

	fn open_path(&self, path: &CStr) -> Result<Self::Device>;
}

/// An open device handle, closed when dropped.
pub trait FeatureReport {
	fn send_feature_report(&mut self, frame: &Frame) -> Result<()>;

	fn get_feature_report(&mut self, report_id: u8) -> Result<Frame>;
}

impl Backend for HidApi {
	type Device = HidDevice;

	fn enumerate(&mut self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceInfo>> {
		self.refresh_devices()?;

		let devices = self
			.device_list()
			.filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
			.map(|d| DeviceInfo {
				serial_number: d.serial_number().unwrap_or_default().to_string(),
				path:          d.path().to_owned(),
			})
			.collect();

		Ok(devices)
	}

	fn open_path(&self, path: &CStr) -> Result<HidDevice> {
		Ok(HidApi::open_path(self, path)?)
	}
}

impl FeatureReport for HidDevice {
	fn send_feature_report(&mut self, frame: &Frame) -> Result<()> {
		HidDevice::send_feature_report(self, frame)?;
		Ok(())
	}

	fn get_feature_report(&mut self, report_id: u8) -> Result<Frame> {
		let mut frame = [0u8; REPORT_LEN];
		frame[0] = report_id;

		let received = HidDevice::get_feature_report(self, &mut frame)?;
		check_report_len(received)?;

		Ok(frame)
	}
}

/// Fails with [`Error::ShortResponse`] when a read returned fewer than [`REPORT_LEN`] bytes.
///
/// A [`FeatureReport`] implementation that learns the size of what it read calls this before
/// handing the frame out.
pub fn check_report_len(received: usize) -> Result<()> {
	if received < REPORT_LEN {
		return Err(Error::ShortResponse {
			expected: REPORT_LEN,
			received,
		});
	}

	Ok(())
}

/// Serial numbers of all attached devices, empty when there are none.
pub fn list_devices<B: Backend>(backend: &mut B) -> Result<Vec<String>> {
	let devices = backend.enumerate(DEVICE_VENDOR_ID, DEVICE_PRODUCT_ID)?;
	Ok(devices.into_iter().map(|d| d.serial_number).collect())
}

/// Picks the device with `serial_number`, or the first one the OS lists when `None`.
pub fn select_device<B: Backend>(backend: &mut B, serial_number: Option<&str>) -> Result<DeviceInfo> {
	let devices = backend.enumerate(DEVICE_VENDOR_ID, DEVICE_PRODUCT_ID)?;
	debug!("found {} device(s)", devices.len());

	if devices.is_empty() {
		return Err(Error::NoDeviceFound);
	}

	let Some(serial_number) = serial_number else {
		return devices.into_iter().next().ok_or(Error::NoDeviceFound);
	};

	devices
		.into_iter()
		.find(|d| d.serial_number == serial_number)
		.ok_or_else(|| Error::SerialNumberNotFound(serial_number.to_string()))
}
