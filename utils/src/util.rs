//! This module implements utility functions shared by the ext2 tools.

use std::fmt;
use std::mem::size_of;
use std::slice;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns the current timestamp since the Unix epoch, in seconds.
pub fn get_timestamp() -> u32 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or(Duration::ZERO)
		.as_secs() as u32
}

/// Integer division rounding up.
pub fn ceil_division(n: u64, d: u64) -> u64 {
	if n % d == 0 {
		n / d
	} else {
		n / d + 1
	}
}

/// Rounds `n` up to the next multiple of `m`.
pub fn round_up(n: u64, m: u64) -> u64 {
	ceil_division(n, m) * m
}

/// Returns `2^n`.
pub fn pow2(n: u32) -> u64 {
	1u64 << n
}

/// Performs the log2 operation on the given integer.
///
/// If the result is undefined (`n == 0`), the function returns `None`.
pub fn log2(n: u64) -> Option<u64> {
	let num_bits = (size_of::<u64>() * 8) as u64;

	let n = num_bits - n.leading_zeros() as u64;
	if n > 0 {
		Some(n - 1)
	} else {
		None
	}
}

/// Reinterprets a reference to `T` as a byte slice.
///
/// `T` must be a plain, packed, fixed-layout record (no padding bytes relied upon, no
/// pointers). Safe to call on any `#[repr(C, packed)]` on-disk structure defined in this
/// workspace.
pub fn reinterpret<T>(val: &T) -> &[u8] {
	unsafe { slice::from_raw_parts(val as *const T as *const u8, size_of::<T>()) }
}

/// Reinterprets a mutable reference to `T` as a mutable byte slice. See [`reinterpret`].
pub fn reinterpret_mut<T>(val: &mut T) -> &mut [u8] {
	unsafe { slice::from_raw_parts_mut(val as *mut T as *mut u8, size_of::<T>()) }
}

/// Casts a byte slice to a reference of `T`.
///
/// The slice must be at least `size_of::<T>()` bytes long and `T` must have no alignment
/// requirement stronger than `1` (true of every `#[repr(C, packed)]` structure in this
/// workspace).
pub fn cast<T>(buf: &[u8]) -> &T {
	debug_assert!(buf.len() >= size_of::<T>());
	unsafe { &*(buf.as_ptr() as *const T) }
}

/// Casts a mutable byte slice to a mutable reference of `T`. See [`cast`].
pub fn cast_mut<T>(buf: &mut [u8]) -> &mut T {
	debug_assert!(buf.len() >= size_of::<T>());
	unsafe { &mut *(buf.as_mut_ptr() as *mut T) }
}

/// Structure representing a number of bytes, for human-readable display.
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
	fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut order = log2(self.0.max(1)).unwrap_or(0) / log2(1024).unwrap();

		let suffix = match order {
			0 => "bytes",
			1 => "KiB",
			2 => "MiB",
			3 => "GiB",

			_ => {
				order = 0;
				"bytes"
			}
		};

		let unit = 1024u64.pow(order as u32);
		let nbr = self.0 / unit;

		write!(fmt, "{} {}", nbr, suffix)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn bytesize() {
		assert_eq!(format!("{}", ByteSize(0)).as_str(), "0 bytes");
		assert_eq!(format!("{}", ByteSize(1)).as_str(), "1 bytes");
		assert_eq!(format!("{}", ByteSize(1023)).as_str(), "1023 bytes");
		assert_eq!(format!("{}", ByteSize(1024)).as_str(), "1 KiB");
		assert_eq!(format!("{}", ByteSize(1025)).as_str(), "1 KiB");
		assert_eq!(format!("{}", ByteSize(2048)).as_str(), "2 KiB");
		assert_eq!(format!("{}", ByteSize(1024 * 1024)).as_str(), "1 MiB");
		assert_eq!(
			format!("{}", ByteSize(1024 * 1024 * 1024)).as_str(),
			"1 GiB"
		);
	}

	#[test]
	fn ceil_division_exact() {
		assert_eq!(ceil_division(1024, 1024), 1);
		assert_eq!(ceil_division(0, 1024), 0);
	}

	#[test]
	fn ceil_division_rounds_up() {
		assert_eq!(ceil_division(1025, 1024), 2);
		assert_eq!(ceil_division(1500, 1024), 2);
		assert_eq!(ceil_division(1, 1024), 1);
	}

	#[test]
	fn log2_powers() {
		assert_eq!(log2(1), Some(0));
		assert_eq!(log2(1024), Some(10));
		assert_eq!(log2(0), None);
	}
}
