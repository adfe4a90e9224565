//! Test-only image builder.
//!
//! Not part of the public CLI surface: every tool in this workspace operates on a
//! pre-existing image file, so there is no `mkfs`-equivalent binary here. Tests need *some*
//! valid starting image though, so this module assembles one directly, the way `mkfs`'s own
//! `Ext2Factory` lays out a fresh filesystem: superblock, group descriptor, bitmaps with the
//! metadata blocks and reserved inodes pre-marked, and a root directory containing `.`/`..`.

use crate::alloc::Allocator;
use crate::bitmap::BitmapMut;
use crate::layout::block_mut;
use crate::layout::GroupDescriptor;
use crate::layout::Inode;
use crate::layout::Superblock;
use crate::layout::BLOCK_SIZE;
use crate::layout::DEFAULT_DIR_PERM;
use crate::layout::IMAGE_SIZE;
use crate::layout::MODE_DIR;
use crate::layout::ROOT_INODE;

/// Number of reserved inodes (1 through `first_ino - 1`), pre-marked used.
const RESERVED_INODES: u32 = 10;
/// Blocks 1 through this one (inclusive) are metadata: superblock, group descriptor, block
/// bitmap, inode bitmap, inode table.
const RESERVED_BLOCKS: u32 = 20;

/// Builds a fresh, valid, empty 128 KiB image: root directory only, no other entries.
pub fn new_fresh_image() -> Vec<u8> {
	let mut image = vec![0u8; IMAGE_SIZE];
	Superblock::init(&mut image, 0);
	GroupDescriptor::init(&mut image);

	{
		let gd = GroupDescriptor::view(&image);
		let inode_bitmap_block = gd.inode_bitmap;
		let block_bitmap_block = gd.block_bitmap;

		let mut bm = BitmapMut::new(block_mut(&mut image, inode_bitmap_block));
		for bit in 0..RESERVED_INODES {
			bm.set(bit, true);
		}

		let mut bm = BitmapMut::new(block_mut(&mut image, block_bitmap_block));
		for bit in 0..RESERVED_BLOCKS {
			bm.set(bit, true);
		}
	}

	let (inodes_count, blocks_count) = {
		let sb = Superblock::view(&image);
		(sb.inodes_count, sb.blocks_count)
	};
	let free_inodes = inodes_count - RESERVED_INODES;
	let free_blocks = blocks_count - 1 - RESERVED_BLOCKS;

	let sb = Superblock::view_mut(&mut image);
	sb.free_inodes_count = free_inodes;
	sb.free_blocks_count = free_blocks;
	let gd = GroupDescriptor::view_mut(&mut image);
	gd.free_inodes_count = free_inodes as u16;
	gd.free_blocks_count = free_blocks as u16;
	gd.used_dirs_count = 1;

	let root_block = Allocator::allocate_block(&mut image).expect("fresh image has room for a root block");

	crate::dirent::init_block(block_mut(&mut image, root_block), ROOT_INODE, ROOT_INODE);

	let root = Inode::view_mut(&mut image, ROOT_INODE);
	root.i_mode = MODE_DIR | DEFAULT_DIR_PERM;
	root.i_links_count = 2;
	root.set_size(BLOCK_SIZE as u64);
	root.i_block[0] = root_block;

	image
}
