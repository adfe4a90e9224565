//! The file operations behind every tool's CLI surface: `mkdir`, `cp`, `ln`, `rm`, `restore`.
//!
//! Each function takes the whole image buffer and an absolute image-side path, and leaves the
//! image in a consistent state on success. None of them touch the host filesystem beyond
//! `copy_in`'s source file.

use crate::alloc::Allocator;
use crate::bitmap::BitmapMut;
use crate::dirent;
use crate::error::Error;
use crate::error::Result;
use crate::layout::block;
use crate::layout::block_mut;
use crate::layout::FileType;
use crate::layout::GroupDescriptor;
use crate::layout::Inode;
use crate::layout::BLOCK_SIZE;
use crate::layout::DEFAULT_DIR_PERM;
use crate::layout::DEFAULT_FILE_PERM;
use crate::layout::DIRECT_BLOCKS;
use crate::layout::MODE_DIR;
use crate::layout::MODE_LNK;
use crate::layout::MODE_REG;
use crate::path;
use std::path::Path;
use utils::util::ceil_division;
use utils::util::get_timestamp;

/// Inserts `(inode, name, file_type)` as a new entry of the directory at `dir_inode`.
///
/// Tries each of the directory's existing blocks for slack first; if none has room, allocates a
/// fresh block, appends it to the directory's `i_block` array, and grows `i_size` by one block.
fn insert_entry(image: &mut [u8], dir_inode: u32, inode: u32, name: &[u8], file_type: FileType) -> Result<()> {
	let existing_blocks: Vec<u32> = Inode::view(image, dir_inode).direct_blocks().collect();

	for block_num in &existing_blocks {
		if dirent::insert_into_block(block_mut(image, *block_num), inode, name, file_type)? {
			return Ok(());
		}
	}

	let new_block = Allocator::allocate_block(image)?;
	{
		let buf = block_mut(image, new_block);
		buf.fill(0);
		dirent::write_entry(buf, inode, BLOCK_SIZE as u16, file_type.dirent_byte(), name);
	}

	let dir = Inode::view_mut(image, dir_inode);
	let slot = existing_blocks.len();
	if slot >= DIRECT_BLOCKS {
		return Err(Error::NoSpace);
	}
	dir.i_block[slot] = new_block;
	let new_size = dir.size() + BLOCK_SIZE as u64;
	dir.set_size(new_size);
	Ok(())
}

/// Unlinks the directory block at direct-block position `slot` from `dir_inode`'s block list,
/// compacting the remaining blocks down to keep them contiguous from index 0, shrinks `i_size`
/// by one block, and frees the block in the bitmap.
fn unlink_directory_block(image: &mut [u8], dir_inode: u32, slot: usize) -> Result<()> {
	let inode = Inode::view_mut(image, dir_inode);
	let freed_block = inode.i_block[slot];
	for i in slot..DIRECT_BLOCKS - 1 {
		inode.i_block[i] = inode.i_block[i + 1];
	}
	inode.i_block[DIRECT_BLOCKS - 1] = 0;
	let new_size = inode.size().saturating_sub(BLOCK_SIZE as u64);
	inode.set_size(new_size);

	Allocator::free_block(image, freed_block)
}

/// Resolves `path`'s parent, requiring it to exist and be a directory, and requiring the leaf
/// to be absent.
fn resolve_parent_for_create(image: &[u8], path: &Path) -> Result<(u32, Vec<u8>)> {
	let (parent, leaf) = path::resolve_parent(image, path)?;
	if path::resolve(image, path).is_ok() {
		return Err(Error::AlreadyExists(path.to_path_buf()));
	}
	Ok((parent, leaf))
}

/// Creates a new, empty directory at `path`.
pub fn make_directory(image: &mut [u8], path: &Path) -> Result<()> {
	let (parent, leaf) = resolve_parent_for_create(image, path)?;

	let child = Allocator::allocate_inode(image)?;
	let child_block = Allocator::allocate_block(image)?;
	dirent::init_block(block_mut(image, child_block), child, parent);

	let now = get_timestamp();
	let inode = Inode::view_mut(image, child);
	inode.reset();
	inode.i_mode = MODE_DIR | DEFAULT_DIR_PERM;
	inode.i_links_count = 2;
	inode.i_ctime = now;
	inode.i_mtime = now;
	inode.i_atime = now;
	inode.i_blocks = 1;
	inode.set_size(BLOCK_SIZE as u64);
	inode.i_block[0] = child_block;

	insert_entry(image, parent, child, &leaf, FileType::Directory)?;

	let parent_inode = Inode::view_mut(image, parent);
	parent_inode.i_links_count += 1;

	let gd = GroupDescriptor::view_mut(image);
	gd.used_dirs_count += 1;

	Ok(())
}

/// Copies a regular host file into the image at `image_path`.
pub fn copy_in(image: &mut [u8], host_path: &Path, image_path: &Path) -> Result<()> {
	let (parent, leaf) = resolve_parent_for_create(image, image_path)?;

	let meta = std::fs::metadata(host_path)?;
	if !meta.is_file() {
		return Err(Error::InvalidArgument(format!("{}: not a regular file", host_path.display())));
	}
	let data = std::fs::read(host_path)?;
	let blocks_needed = ceil_division(data.len().max(1) as u64, BLOCK_SIZE as u64).max(1) as usize;
	if blocks_needed > DIRECT_BLOCKS {
		return Err(Error::NoSpace);
	}

	let child = Allocator::allocate_inode(image)?;
	let mut block_nums = Vec::with_capacity(blocks_needed);
	for _ in 0..blocks_needed {
		block_nums.push(Allocator::allocate_block(image)?);
	}
	for (i, &block_num) in block_nums.iter().enumerate() {
		let buf = block_mut(image, block_num);
		buf.fill(0);
		let start = i * BLOCK_SIZE as usize;
		let end = (start + BLOCK_SIZE as usize).min(data.len());
		if start < data.len() {
			buf[..end - start].copy_from_slice(&data[start..end]);
		}
	}

	let now = get_timestamp();
	let inode = Inode::view_mut(image, child);
	inode.reset();
	inode.i_mode = MODE_REG | DEFAULT_FILE_PERM;
	inode.i_links_count = 1;
	inode.i_ctime = now;
	inode.i_mtime = now;
	inode.i_atime = now;
	inode.set_size(data.len() as u64);
	inode.i_blocks = blocks_needed as u32;
	for (i, &block_num) in block_nums.iter().enumerate() {
		inode.i_block[i] = block_num;
	}

	insert_entry(image, parent, child, &leaf, FileType::Regular)?;
	Ok(())
}

/// Links `src` at `dst`: symbolically, storing `src`'s path as the new inode's content, or by
/// hard-linking `src`'s inode directly.
pub fn link(image: &mut [u8], src: &Path, dst: &Path, symbolic: bool) -> Result<()> {
	let src_inode_num = path::resolve(image, src)?;
	let (dst_parent, dst_leaf) = resolve_parent_for_create(image, dst)?;

	if symbolic {
		let target = src.to_string_lossy().into_owned().into_bytes();
		let blocks_needed = ceil_division(target.len().max(1) as u64, BLOCK_SIZE as u64).max(1) as usize;
		if blocks_needed > DIRECT_BLOCKS {
			return Err(Error::NoSpace);
		}

		let child = Allocator::allocate_inode(image)?;
		let mut block_nums = Vec::with_capacity(blocks_needed);
		for _ in 0..blocks_needed {
			block_nums.push(Allocator::allocate_block(image)?);
		}
		for (i, &block_num) in block_nums.iter().enumerate() {
			let buf = block_mut(image, block_num);
			buf.fill(0);
			let start = i * BLOCK_SIZE as usize;
			let end = (start + BLOCK_SIZE as usize).min(target.len());
			if start < target.len() {
				buf[..end - start].copy_from_slice(&target[start..end]);
			}
		}

		let now = get_timestamp();
		let inode = Inode::view_mut(image, child);
		inode.reset();
		inode.i_mode = MODE_LNK | DEFAULT_FILE_PERM;
		inode.i_links_count = 1;
		inode.i_ctime = now;
		inode.i_mtime = now;
		inode.i_atime = now;
		inode.set_size(target.len() as u64);
		inode.i_blocks = blocks_needed as u32;
		for (i, &block_num) in block_nums.iter().enumerate() {
			inode.i_block[i] = block_num;
		}

		insert_entry(image, dst_parent, child, &dst_leaf, FileType::Symlink)?;
	} else {
		if Inode::view(image, src_inode_num).file_type() == Some(FileType::Directory) {
			return Err(Error::IsADirectory(src.to_path_buf()));
		}
		insert_entry(image, dst_parent, src_inode_num, &dst_leaf, FileType::Regular)?;
		let src_inode = Inode::view_mut(image, src_inode_num);
		src_inode.i_links_count += 1;
	}

	Ok(())
}

/// Removes a regular file or symbolic link at `path`, freeing its inode and blocks once its
/// link count reaches zero. Data blocks are not zeroed, so `restore` can bring them back.
pub fn remove(image: &mut [u8], path: &Path) -> Result<()> {
	let (parent, leaf) = path::resolve_parent(image, path)?;
	let target_inode_num = path::resolve(image, path)?;

	let file_type = Inode::view(image, target_inode_num).file_type();
	if file_type == Some(FileType::Directory) {
		return Err(Error::IsADirectory(path.to_path_buf()));
	}

	let parent_blocks: Vec<u32> = Inode::view(image, parent).direct_blocks().collect();
	let mut removed = false;
	for (slot, block_num) in parent_blocks.iter().enumerate() {
		let Some(outcome) = dirent::delete_from_block(block_mut(image, *block_num), &leaf)? else {
			continue;
		};
		removed = true;
		if outcome.block_now_empty {
			unlink_directory_block(image, parent, slot)?;
		}
		break;
	}
	if !removed {
		return Err(Error::CorruptImage(format!("{}: directory entry vanished mid-removal", path.display())));
	}

	let inode = Inode::view_mut(image, target_inode_num);
	inode.i_links_count -= 1;
	let links_left = inode.i_links_count;

	if links_left == 0 {
		let now = get_timestamp();
		let direct_blocks: Vec<u32> = Inode::view(image, target_inode_num).direct_blocks().collect();

		let inode = Inode::view_mut(image, target_inode_num);
		inode.i_dtime = now;

		Allocator::free_inode(image, target_inode_num)?;
		for block_num in direct_blocks {
			Allocator::free_block(image, block_num)?;
		}
	}

	Ok(())
}

/// Recovers a previously removed regular file or symbolic link at `path`, reversing `remove`.
pub fn restore(image: &mut [u8], path: &Path) -> Result<()> {
	if path::resolve(image, path).is_ok() {
		return Err(Error::AlreadyExists(path.to_path_buf()));
	}
	let (parent, leaf) = path::resolve_parent(image, path)?;

	let parent_blocks: Vec<u32> = Inode::view(image, parent).direct_blocks().collect();
	let mut found = None;
	for block_num in parent_blocks {
		let tombstones = dirent::find_tombstones(block(image, block_num), &leaf)?;
		if let Some(tombstone) = tombstones.into_iter().next() {
			found = Some((block_num, tombstone));
			break;
		}
	}
	let (host_block, tombstone) = found.ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
	let recovered_inode_num = tombstone.entry.inode;

	{
		let gd = GroupDescriptor::view(image);
		let inode_bitmap_block = gd.inode_bitmap;
		let bm = BitmapMut::new(block_mut(image, inode_bitmap_block));
		if bm.test(recovered_inode_num - 1) {
			return Err(Error::InvalidArgument(format!(
				"{}: inode {} already reused, not recoverable",
				path.display(),
				recovered_inode_num
			)));
		}
	}
	let dtime = Inode::view(image, recovered_inode_num).i_dtime;
	if dtime == 0 {
		return Err(Error::InvalidArgument(format!(
			"{}: inode {} was never deleted, not recoverable",
			path.display(),
			recovered_inode_num
		)));
	}

	let gd = GroupDescriptor::view(image);
	let inode_bitmap_block = gd.inode_bitmap;
	let mut bm = BitmapMut::new(block_mut(image, inode_bitmap_block));
	bm.set(recovered_inode_num - 1, true);
	let sb = crate::layout::Superblock::view_mut(image);
	sb.free_inodes_count -= 1;
	let gd = GroupDescriptor::view_mut(image);
	gd.free_inodes_count -= 1;

	let direct_blocks: Vec<u32> = Inode::view(image, recovered_inode_num).direct_blocks().collect();
	for block_num in direct_blocks {
		let gd = GroupDescriptor::view(image);
		let block_bitmap_block = gd.block_bitmap;
		let mut bm = BitmapMut::new(block_mut(image, block_bitmap_block));
		bm.set(block_num - 1, true);
		let sb = crate::layout::Superblock::view_mut(image);
		sb.free_blocks_count -= 1;
		let gd = GroupDescriptor::view_mut(image);
		gd.free_blocks_count -= 1;
	}

	let now = get_timestamp();
	let inode = Inode::view_mut(image, recovered_inode_num);
	inode.i_links_count += 1;
	inode.i_dtime = 0;
	inode.i_mtime = now;

	dirent::restore_tombstone(block_mut(image, host_block), &tombstone);

	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::fixture::new_fresh_image;
	use std::io::Write;

	#[test]
	fn mkdir_on_fresh_image_creates_dot_entries_and_bumps_root_links() {
		let mut image = new_fresh_image();
		let root_links_before = Inode::view(&image, crate::layout::ROOT_INODE).i_links_count;

		make_directory(&mut image, Path::new("/foo")).unwrap();

		let foo = path::resolve(&image, Path::new("/foo")).unwrap();
		let inode = Inode::view(&image, foo);
		assert_eq!(inode.file_type(), Some(FileType::Directory));
		assert_eq!(inode.i_links_count, 2);
		assert_eq!(inode.size(), BLOCK_SIZE as u64);
		assert_eq!(inode.i_blocks, 1);

		let root_links_after = Inode::view(&image, crate::layout::ROOT_INODE).i_links_count;
		assert_eq!(root_links_after, root_links_before + 1);

		let gd = GroupDescriptor::view(&image);
		assert_eq!(gd.used_dirs_count, 2);
	}

	#[test]
	fn mkdir_on_existing_leaf_fails() {
		let mut image = new_fresh_image();
		make_directory(&mut image, Path::new("/foo")).unwrap();
		assert!(matches!(make_directory(&mut image, Path::new("/foo")), Err(Error::AlreadyExists(_))));
	}

	#[test]
	fn copy_in_small_file_then_dump_matches_host_bytes() {
		let mut image = new_fresh_image();
		let mut tmp = tempfile_with_contents(b"hello world");

		copy_in(&mut image, tmp.path(), Path::new("/hello.txt")).unwrap();
		tmp.flush().unwrap();

		let inode_num = path::resolve(&image, Path::new("/hello.txt")).unwrap();
		let inode = Inode::view(&image, inode_num);
		assert_eq!(inode.size(), 11);
		assert_eq!(inode.i_blocks, 1);
		let block_num = inode.i_block[0];
		assert_eq!(&block(&image, block_num)[..11], b"hello world");
	}

	#[test]
	fn copy_in_spanning_two_blocks_reports_block_count_not_sectors() {
		let mut image = new_fresh_image();
		let data = vec![0x42u8; 1500];
		let tmp = tempfile_with_contents(&data);

		copy_in(&mut image, tmp.path(), Path::new("/spans")).unwrap();

		let inode_num = path::resolve(&image, Path::new("/spans")).unwrap();
		let inode = Inode::view(&image, inode_num);
		assert_eq!(inode.size(), 1500);
		assert_eq!(inode.i_blocks, 2);
	}

	#[test]
	fn copy_in_oversized_file_reports_no_space() {
		let mut image = new_fresh_image();
		let data = vec![0xAAu8; (BLOCK_SIZE as usize) * (DIRECT_BLOCKS + 1)];
		let tmp = tempfile_with_contents(&data);
		assert!(matches!(
			copy_in(&mut image, tmp.path(), Path::new("/big")),
			Err(Error::NoSpace)
		));
	}

	#[test]
	fn hard_link_bumps_link_count_and_shares_inode() {
		let mut image = new_fresh_image();
		let tmp = tempfile_with_contents(b"data");
		copy_in(&mut image, tmp.path(), Path::new("/a")).unwrap();

		link(&mut image, Path::new("/a"), Path::new("/b"), false).unwrap();

		let a = path::resolve(&image, Path::new("/a")).unwrap();
		let b = path::resolve(&image, Path::new("/b")).unwrap();
		assert_eq!(a, b);
		assert_eq!(Inode::view(&image, a).i_links_count, 2);
	}

	#[test]
	fn hard_link_to_directory_is_rejected() {
		let mut image = new_fresh_image();
		make_directory(&mut image, Path::new("/dir")).unwrap();
		assert!(matches!(
			link(&mut image, Path::new("/dir"), Path::new("/alias"), false),
			Err(Error::IsADirectory(_))
		));
	}

	#[test]
	fn symlink_stores_target_path_as_body() {
		let mut image = new_fresh_image();
		make_directory(&mut image, Path::new("/dir")).unwrap();
		link(&mut image, Path::new("/dir"), Path::new("/dirlink"), true).unwrap();

		let inode_num = path::resolve(&image, Path::new("/dirlink")).unwrap();
		let inode = Inode::view(&image, inode_num);
		assert_eq!(inode.file_type(), Some(FileType::Symlink));
		let block_num = inode.i_block[0];
		assert_eq!(&block(&image, block_num)[..inode.size() as usize], b"/dir");
	}

	#[test]
	fn remove_then_restore_round_trips_a_file() {
		let mut image = new_fresh_image();
		let tmp = tempfile_with_contents(b"precious");
		copy_in(&mut image, tmp.path(), Path::new("/a")).unwrap();
		let inode_num = path::resolve(&image, Path::new("/a")).unwrap();

		remove(&mut image, Path::new("/a")).unwrap();
		assert!(path::resolve(&image, Path::new("/a")).is_err());
		assert_eq!(Inode::view(&image, inode_num).i_links_count, 0);

		restore(&mut image, Path::new("/a")).unwrap();
		let restored_num = path::resolve(&image, Path::new("/a")).unwrap();
		assert_eq!(restored_num, inode_num);
		assert_eq!(Inode::view(&image, inode_num).i_links_count, 1);
		assert_eq!(Inode::view(&image, inode_num).i_dtime, 0);
	}

	#[test]
	fn restore_without_a_prior_removal_is_not_found() {
		let mut image = new_fresh_image();
		assert!(matches!(restore(&mut image, Path::new("/never-existed")), Err(Error::NotFound(_))));
	}

	#[test]
	fn restore_after_slot_reuse_is_rejected() {
		let mut image = new_fresh_image();
		let tmp = tempfile_with_contents(b"first");
		copy_in(&mut image, tmp.path(), Path::new("/a")).unwrap();
		remove(&mut image, Path::new("/a")).unwrap();

		// Reuse the freed inode for something else before attempting restore.
		let tmp2 = tempfile_with_contents(b"second");
		copy_in(&mut image, tmp2.path(), Path::new("/b")).unwrap();

		assert!(matches!(restore(&mut image, Path::new("/a")), Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn remove_on_a_directory_is_rejected() {
		let mut image = new_fresh_image();
		make_directory(&mut image, Path::new("/dir")).unwrap();
		assert!(matches!(remove(&mut image, Path::new("/dir")), Err(Error::IsADirectory(_))));
	}

	#[test]
	fn removing_the_sole_entry_of_an_overflow_block_frees_it() {
		let mut image = new_fresh_image();
		let tmp = tempfile_with_contents(b"x");
		copy_in(&mut image, tmp.path(), Path::new("/src")).unwrap();

		// Pack the root directory's first block with short-named symlinks until an overflow
		// block is allocated to hold the next one.
		let mut names = Vec::new();
		assert_eq!(Inode::view(&image, crate::layout::ROOT_INODE).i_block[1], 0);
		let mut n = 0u32;
		loop {
			let name = format!("/{}", n);
			link(&mut image, Path::new("/src"), Path::new(&name), true).unwrap();
			names.push(name);
			n += 1;
			if Inode::view(&image, crate::layout::ROOT_INODE).i_block[1] != 0 {
				break;
			}
			assert!(n < 1000, "root directory never overflowed into a second block");
		}

		let last_name = names.last().unwrap().clone();

		remove(&mut image, Path::new(&last_name)).unwrap();

		// The overflow block held exactly one symlink (the last one created), so removing it
		// should free the whole block and compact the root's block list back down.
		assert_eq!(Inode::view(&image, crate::layout::ROOT_INODE).i_block[1], 0);
		assert!(path::resolve(&image, Path::new(&last_name)).is_err());
	}

	/// Writes `contents` to a fresh temp file and returns a handle keeping it alive.
	fn tempfile_with_contents(contents: &[u8]) -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(contents).unwrap();
		file
	}
}
