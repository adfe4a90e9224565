//! Maps a host image file into memory so the rest of this crate can treat it as a plain
//! `&[u8]`/`&mut [u8]` buffer, following the project's own use of `memmap2` over raw file
//! descriptors in its integration test harness.

use crate::error::Result;
use crate::layout::IMAGE_SIZE;
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::ops::Deref;
use std::ops::DerefMut;
use std::path::Path;

/// A memory-mapped ext2 image file, opened read-write.
pub struct Image {
	map: MmapMut,
}

impl Image {
	/// Opens and maps `path`. The file must already exist and be at least [`IMAGE_SIZE`] bytes;
	/// this workspace never creates or grows an image, it only edits one in place.
	pub fn open(path: &Path) -> Result<Self> {
		let file = OpenOptions::new().read(true).write(true).open(path)?;
		let len = file.metadata()?.len();
		if (len as usize) < IMAGE_SIZE {
			return Err(crate::error::Error::CorruptImage(format!(
				"{}: image is {} bytes, smaller than the expected {} bytes",
				path.display(),
				len,
				IMAGE_SIZE
			)));
		}
		let map = unsafe { MmapMut::map_mut(&file)? };
		Ok(Self { map })
	}

	/// Flushes pending writes back to the host file.
	pub fn flush(&self) -> Result<()> {
		self.map.flush()?;
		Ok(())
	}
}

impl Deref for Image {
	type Target = [u8];

	fn deref(&self) -> &[u8] {
		&self.map
	}
}

impl DerefMut for Image {
	fn deref_mut(&mut self) -> &mut [u8] {
		&mut self.map
	}
}
