//! Offline consistency checker: walks the tree from the root inode and repairs drift between
//! the bitmaps, the group descriptor/superblock counters, directory entry types, and inode
//! deletion state. Idempotent — running it twice in a row performs zero repairs the second
//! time.

use crate::bitmap::Bitmap;
use crate::bitmap::BitmapMut;
use crate::dirent;
use crate::error::Result;
use crate::layout::block;
use crate::layout::block_mut;
use crate::layout::FileType;
use crate::layout::GroupDescriptor;
use crate::layout::Inode;
use crate::layout::Superblock;
use crate::layout::ROOT_INODE;

/// A tally of repairs made by one [`check`] run, one counter per rule class.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
	/// Absolute delta applied to the free-inode counters (rule 1).
	pub inode_counter_delta: u32,
	/// Absolute delta applied to the free-block counters (rule 1).
	pub block_counter_delta: u32,
	/// Directory entries whose `file_type` was corrected to match the inode's mode (rule 2).
	pub entry_type_fixes: u32,
	/// Inodes whose bitmap bit was set because a live entry referenced them (rule 3).
	pub inode_allocation_fixes: u32,
	/// Inodes whose stale `i_dtime` was cleared because a live entry referenced them (rule 4).
	pub dtime_fixes: u32,
	/// Blocks whose bitmap bit was set because a live inode referenced them (rule 5).
	pub block_allocation_fixes: u32,
}

impl Report {
	/// The total number of individual repairs made.
	pub fn total(&self) -> u32 {
		self.inode_counter_delta
			+ self.block_counter_delta
			+ self.entry_type_fixes
			+ self.inode_allocation_fixes
			+ self.dtime_fixes
			+ self.block_allocation_fixes
	}
}

/// Runs the full check-and-repair pass over `image`, returning a tally of what was fixed.
pub fn check(image: &mut [u8]) -> Result<Report> {
	let mut report = Report::default();

	reconcile_bitmap_counters(image, &mut report);

	let mut live_inodes = Vec::new();
	walk_tree(image, ROOT_INODE, &mut live_inodes, &mut report)?;

	for inode_num in live_inodes {
		allocate_inode_bit(image, inode_num, &mut report);
		clear_stale_dtime(image, inode_num, &mut report);

		let direct_blocks: Vec<u32> = Inode::view(image, inode_num).direct_blocks().collect();
		for block_num in direct_blocks {
			allocate_block_bit(image, block_num, &mut report);
		}
	}

	Ok(report)
}

/// Rule 1: the bitmaps are authoritative. Recompute both free counters from the bitmaps and
/// overwrite the superblock/descriptor if they disagree.
fn reconcile_bitmap_counters(image: &mut [u8], report: &mut Report) {
	let sb = Superblock::view(image);
	let inodes_count = sb.inodes_count;
	let blocks_count = sb.blocks_count;
	let gd = GroupDescriptor::view(image);
	let inode_bitmap_block = gd.inode_bitmap;
	let block_bitmap_block = gd.block_bitmap;

	let set_inodes = Bitmap::new(block(image, inode_bitmap_block)).count_set(inodes_count);
	let set_blocks = Bitmap::new(block(image, block_bitmap_block)).count_set(blocks_count - 1);

	let free_inodes = inodes_count - set_inodes;
	let free_blocks = blocks_count - 1 - set_blocks;

	let sb = Superblock::view(image);
	let sb_inode_delta = (sb.free_inodes_count as i64 - free_inodes as i64).unsigned_abs() as u32;
	let sb_block_delta = (sb.free_blocks_count as i64 - free_blocks as i64).unsigned_abs() as u32;
	let gd = GroupDescriptor::view(image);
	let gd_inode_delta = (gd.free_inodes_count as i64 - free_inodes as i64).unsigned_abs() as u32;
	let gd_block_delta = (gd.free_blocks_count as i64 - free_blocks as i64).unsigned_abs() as u32;

	report.inode_counter_delta += sb_inode_delta + gd_inode_delta;
	report.block_counter_delta += sb_block_delta + gd_block_delta;

	let sb = Superblock::view_mut(image);
	sb.free_inodes_count = free_inodes;
	sb.free_blocks_count = free_blocks;
	let gd = GroupDescriptor::view_mut(image);
	gd.free_inodes_count = free_inodes as u16;
	gd.free_blocks_count = free_blocks as u16;
}

/// Walks the tree depth-first from `inode_num`, collecting every reachable inode number into
/// `live_inodes` and applying rule 2 (entry type vs. inode mode) along the way.
fn walk_tree(image: &mut [u8], inode_num: u32, live_inodes: &mut Vec<u32>, report: &mut Report) -> Result<()> {
	live_inodes.push(inode_num);

	let file_type = Inode::view(image, inode_num).file_type();
	if file_type != Some(FileType::Directory) {
		return Ok(());
	}

	let direct_blocks: Vec<u32> = Inode::view(image, inode_num).direct_blocks().collect();
	let mut children = Vec::new();
	for block_num in &direct_blocks {
		let entries = dirent::iter_block(block(image, *block_num))?;
		for entry in entries {
			if entry.is_free() || entry.name == b"." || entry.name == b".." {
				continue;
			}
			let expected_type = Inode::view(image, entry.inode).file_type();
			if let Some(expected) = expected_type {
				if entry.file_type != expected.dirent_byte() {
					let buf = block_mut(image, *block_num);
					buf[entry.offset + 7] = expected.dirent_byte();
					report.entry_type_fixes += 1;
				}
			}
			children.push(entry.inode);
		}
	}

	for child in children {
		walk_tree(image, child, live_inodes, report)?;
	}
	Ok(())
}

/// Rule 3: a live entry implies its inode must be marked allocated.
fn allocate_inode_bit(image: &mut [u8], inode_num: u32, report: &mut Report) {
	let gd = GroupDescriptor::view(image);
	let inode_bitmap_block = gd.inode_bitmap;
	let already_set = BitmapMut::new(block_mut(image, inode_bitmap_block)).test(inode_num - 1);
	if already_set {
		return;
	}

	let mut bm = BitmapMut::new(block_mut(image, inode_bitmap_block));
	bm.set(inode_num - 1, true);
	let sb = Superblock::view_mut(image);
	sb.free_inodes_count -= 1;
	let gd = GroupDescriptor::view_mut(image);
	gd.free_inodes_count -= 1;
	report.inode_allocation_fixes += 1;
}

/// Rule 4: a live entry's inode should never carry a stale deletion timestamp.
fn clear_stale_dtime(image: &mut [u8], inode_num: u32, report: &mut Report) {
	let inode = Inode::view_mut(image, inode_num);
	if inode.i_dtime != 0 {
		inode.i_dtime = 0;
		report.dtime_fixes += 1;
	}
}

/// Rule 5: a live inode's direct blocks must be marked allocated.
fn allocate_block_bit(image: &mut [u8], block_num: u32, report: &mut Report) {
	let gd = GroupDescriptor::view(image);
	let block_bitmap_block = gd.block_bitmap;
	let already_set = BitmapMut::new(block_mut(image, block_bitmap_block)).test(block_num - 1);
	if already_set {
		return;
	}

	let mut bm = BitmapMut::new(block_mut(image, block_bitmap_block));
	bm.set(block_num - 1, true);
	let sb = Superblock::view_mut(image);
	sb.free_blocks_count -= 1;
	let gd = GroupDescriptor::view_mut(image);
	gd.free_blocks_count -= 1;
	report.block_allocation_fixes += 1;
}
