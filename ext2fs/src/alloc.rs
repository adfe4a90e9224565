//! Inode and block allocation over the single block group's bitmaps.
//!
//! Mirrors the kernel driver's `Superblock::get_free_inode`/`mark_inode_used`/`free_inode` and
//! `get_free_block`/`mark_block_used`/`free_block`, specialized to the one-group, fixed-layout
//! image this workspace operates on.

use crate::bitmap::BitmapMut;
use crate::error::Error;
use crate::error::Result;
use crate::layout::block_mut;
use crate::layout::GroupDescriptor;
use crate::layout::Superblock;

/// Scans the inode bitmap and block bitmap to hand out and reclaim inodes and blocks.
pub struct Allocator;

impl Allocator {
	/// Allocates the first free inode, starting the scan at `first_ino` (inode 11, the first
	/// inode after the reserved ones). Returns the new inode's 1-based number.
	pub fn allocate_inode(image: &mut [u8]) -> Result<u32> {
		let sb = Superblock::view(image);
		let first_ino = sb.first_ino;
		let inodes_count = sb.inodes_count;
		let gd = GroupDescriptor::view(image);
		let inode_bitmap_block = gd.inode_bitmap;

		let bit = {
			let bm = BitmapMut::new(block_mut(image, inode_bitmap_block));
			bm.first_clear_from(first_ino - 1, inodes_count)
		};
		let bit = bit.ok_or(Error::NoSpace)?;

		let mut bm = BitmapMut::new(block_mut(image, inode_bitmap_block));
		bm.set(bit, true);

		let sb = Superblock::view_mut(image);
		sb.free_inodes_count -= 1;
		let gd = GroupDescriptor::view_mut(image);
		gd.free_inodes_count -= 1;

		Ok(bit + 1)
	}

	/// Marks inode `n` (1-based) free again. Does not zero the inode record: its content is
	/// left in place as a tombstone for `restore`.
	pub fn free_inode(image: &mut [u8], n: u32) -> Result<()> {
		let gd = GroupDescriptor::view(image);
		let inode_bitmap_block = gd.inode_bitmap;

		let mut bm = BitmapMut::new(block_mut(image, inode_bitmap_block));
		bm.set(n - 1, false);

		let sb = Superblock::view_mut(image);
		sb.free_inodes_count += 1;
		let gd = GroupDescriptor::view_mut(image);
		gd.free_inodes_count += 1;

		Ok(())
	}

	/// Allocates the first free block. Bit `i` of the block bitmap corresponds to block `i + 1`:
	/// block 0 (the boot block) is permanently reserved and carries no bit of its own. Returns
	/// the new block's number.
	pub fn allocate_block(image: &mut [u8]) -> Result<u32> {
		let sb = Superblock::view(image);
		let addressable = sb.blocks_count - 1;
		let gd = GroupDescriptor::view(image);
		let block_bitmap_block = gd.block_bitmap;

		let bit = {
			let bm = BitmapMut::new(block_mut(image, block_bitmap_block));
			bm.first_clear_from(0, addressable)
		};
		let bit = bit.ok_or(Error::NoSpace)?;

		let mut bm = BitmapMut::new(block_mut(image, block_bitmap_block));
		bm.set(bit, true);

		let sb = Superblock::view_mut(image);
		sb.free_blocks_count -= 1;
		let gd = GroupDescriptor::view_mut(image);
		gd.free_blocks_count -= 1;

		Ok(bit + 1)
	}

	/// Marks block `n` free again. Does not zero its content, which survives as a tombstone.
	pub fn free_block(image: &mut [u8], n: u32) -> Result<()> {
		let gd = GroupDescriptor::view(image);
		let block_bitmap_block = gd.block_bitmap;

		let mut bm = BitmapMut::new(block_mut(image, block_bitmap_block));
		bm.set(n - 1, false);

		let sb = Superblock::view_mut(image);
		sb.free_blocks_count += 1;
		let gd = GroupDescriptor::view_mut(image);
		gd.free_blocks_count += 1;

		Ok(())
	}
}
