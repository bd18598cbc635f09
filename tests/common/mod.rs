#![allow(dead_code)]

use std::ffi::{CStr, CString};
use std::sync::{Arc, Mutex, MutexGuard};

use blink1_hid::protocol::Frame;
use blink1_hid::{check_report_len, Backend, DeviceInfo, Error, FeatureReport, Result};
use blink1_hid_shared::{DEVICE_PRODUCT_ID, DEVICE_VENDOR_ID, PATTERN_SLOTS, REPORT_ID, REPORT_LEN};
use tracing_subscriber::EnvFilter;

pub const SERIAL_1: &str = "1A001407";
pub const SERIAL_2: &str = "1A001408";

pub fn init() {
	let _ = color_eyre::install();
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// What the emulated firmware remembers, shared between the backend, the device handle and the test.
#[derive(Debug)]
pub struct DeviceState {
	pub sent:         Vec<Frame>,
	pub reads:        usize,
	pub drops:        usize,
	pub fail_io:      bool,
	pub version:      [u8; 2],
	pub rgb:          [u8; 3],
	pub pattern:      [[u8; 5]; PATTERN_SLOTS as usize],
	pub play:         [u8; 5],
	pub eeprom:       [u8; 256],
	pub server_down:  [u8; 3],
	/// Number of bytes the next reads claim to have received.
	pub response_len: usize,
	response:         Frame,
}

impl Default for DeviceState {
	fn default() -> Self {
		Self {
			sent:         Vec::new(),
			reads:        0,
			drops:        0,
			fail_io:      false,
			version:      [b'1', b'0'],
			rgb:          [0; 3],
			pattern:      [[0; 5]; PATTERN_SLOTS as usize],
			play:         [0; 5],
			eeprom:       [0; 256],
			server_down:  [0; 3],
			response_len: REPORT_LEN,
			response:     [0; REPORT_LEN],
		}
	}
}

impl DeviceState {
	fn handle(&mut self, frame: &Frame) {
		self.sent.push(*frame);

		let mut response = [0u8; REPORT_LEN];
		response[0] = REPORT_ID;
		response[1] = frame[1];

		match frame[1] {
			b'v' => response[3..5].copy_from_slice(&self.version),
			b'n' | b'c' => self.rgb.copy_from_slice(&frame[2..5]),
			b'r' => response[2..5].copy_from_slice(&self.rgb),
			b'P' => self.pattern[frame[7] as usize].copy_from_slice(&frame[2..7]),
			b'R' => {
				response[2..7].copy_from_slice(&self.pattern[frame[7] as usize]);
				response[7] = frame[7];
			}
			b'e' => {
				response[2] = frame[2];
				response[3] = self.eeprom[frame[2] as usize];
			}
			b'E' => self.eeprom[frame[2] as usize] = frame[3],
			b'p' => {
				let [playing, start, end, count] = [frame[2], frame[3], frame[4], frame[5]];
				self.play = [playing, start, end, count, start];
			}
			b'S' => response[2..7].copy_from_slice(&self.play),
			b'D' => self.server_down.copy_from_slice(&frame[2..5]),
			_ => {}
		}

		self.response = response;
	}
}

fn io_error() -> Error {
	Error::Transport(hidapi::HidError::HidApiError {
		message: "device disconnected".to_string(),
	})
}

pub struct MockDevice {
	state: Arc<Mutex<DeviceState>>,
}

impl FeatureReport for MockDevice {
	fn send_feature_report(&mut self, frame: &Frame) -> Result<()> {
		let mut state = self.state.lock().unwrap();
		if state.fail_io {
			return Err(io_error());
		}
		state.handle(frame);
		Ok(())
	}

	fn get_feature_report(&mut self, report_id: u8) -> Result<Frame> {
		assert_eq!(report_id, REPORT_ID);

		let mut state = self.state.lock().unwrap();
		if state.fail_io {
			return Err(io_error());
		}
		state.reads += 1;
		check_report_len(state.response_len)?;
		Ok(state.response)
	}
}

impl Drop for MockDevice {
	fn drop(&mut self) {
		self.state.lock().unwrap().drops += 1;
	}
}

pub struct MockBackend {
	pub devices: Vec<DeviceInfo>,
	state:       Arc<Mutex<DeviceState>>,
}

impl MockBackend {
	pub fn new(serial_numbers: &[&str]) -> Self {
		let devices = serial_numbers
			.iter()
			.map(|serial_number| DeviceInfo {
				serial_number: serial_number.to_string(),
				path:          CString::new(format!("path_{}", serial_number)).unwrap(),
			})
			.collect();

		Self {
			devices,
			state: Arc::new(Mutex::new(DeviceState::default())),
		}
	}

	pub fn state(&self) -> MutexGuard<'_, DeviceState> {
		self.state.lock().unwrap()
	}

	pub fn sent(&self) -> Vec<Frame> {
		self.state().sent.clone()
	}

	pub fn last_sent(&self) -> Option<Frame> {
		self.state().sent.last().copied()
	}
}

impl Backend for MockBackend {
	type Device = MockDevice;

	fn enumerate(&mut self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceInfo>> {
		if vendor_id != DEVICE_VENDOR_ID || product_id != DEVICE_PRODUCT_ID {
			return Ok(Vec::new());
		}
		Ok(self.devices.clone())
	}

	fn open_path(&self, path: &CStr) -> Result<MockDevice> {
		assert!(self.devices.iter().any(|d| d.path.as_c_str() == path));

		Ok(MockDevice {
			state: self.state.clone(),
		})
	}
}
