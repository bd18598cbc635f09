//! Range checks run on every parameter before a frame is built.

use blink1_hid_shared::{MAX_EEPROM_ADDRESS, MAX_LED_INDEX, MAX_MILLIS, MAX_POSITION};
use thiserror::Error;

use crate::protocol::Rgb;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
	#[error("{name} must be a number")]
	NotANumber { name: &'static str },
	#[error("{name} must be between {min} and {max}")]
	OutOfRange {
		name: &'static str,
		min:  u32,
		max:  u32,
	},
}

/// Accepts any integer in `min..=max`.
///
/// NaN and infinities are rejected as [`ValidationError::NotANumber`], fractional values and
/// anything outside the interval as [`ValidationError::OutOfRange`].
pub fn validate_range<T: Into<f64>>(
	value: T,
	name: &'static str,
	min: u32,
	max: u32,
) -> Result<(), ValidationError> {
	let value = value.into();

	if !value.is_finite() {
		return Err(ValidationError::NotANumber { name });
	}

	if value.fract() != 0.0 || value < f64::from(min) || value > f64::from(max) {
		return Err(ValidationError::OutOfRange { name, min, max });
	}

	Ok(())
}

pub fn validate_address<T: Into<f64>>(address: T) -> Result<(), ValidationError> {
	validate_range(address, "address", 0, u16::MAX.into())
}

pub fn validate_value<T: Into<f64>>(value: T) -> Result<(), ValidationError> {
	validate_range(value, "value", 0, u8::MAX.into())
}

pub fn validate_count<T: Into<f64>>(count: T) -> Result<(), ValidationError> {
	validate_range(count, "count", 0, u8::MAX.into())
}

pub fn validate_fade_millis<T: Into<f64>>(fade_millis: T) -> Result<(), ValidationError> {
	validate_range(fade_millis, "fade_millis", 0, MAX_MILLIS)
}

pub fn validate_millis<T: Into<f64>>(millis: T) -> Result<(), ValidationError> {
	validate_range(millis, "millis", 0, MAX_MILLIS)
}

pub fn validate_position<T: Into<f64>>(position: T) -> Result<(), ValidationError> {
	validate_range(position, "position", 0, MAX_POSITION.into())
}

pub fn validate_index<T: Into<f64>>(index: T) -> Result<(), ValidationError> {
	validate_range(index, "index", 0, MAX_LED_INDEX.into())
}

/// Checks that `len` bytes starting at `address` stay inside the EEPROM range the single address
/// byte of a report reaches, so a block never wraps around onto address 0.
pub fn validate_block(address: u16, len: usize) -> Result<(), ValidationError> {
	let max = MAX_EEPROM_ADDRESS.into();

	validate_range(address, "address", 0, max)?;
	if len == 0 {
		return Ok(());
	}
	validate_range(f64::from(address) + len as f64 - 1.0, "address", 0, max)
}

pub fn validate_rgb(color: Rgb) -> Result<(), ValidationError> {
	validate_range(color.r, "r", 0, u8::MAX.into())?;
	validate_range(color.g, "g", 0, u8::MAX.into())?;
	validate_range(color.b, "b", 0, u8::MAX.into())
}
