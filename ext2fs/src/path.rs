//! Absolute path resolution, one component at a time.
//!
//! The project's own path-walking code resolves a path by recursively searching the whole
//! tree for the leaf name, which can return the wrong inode when two directories share a leaf
//! name elsewhere in the tree. This instead walks component by component from the root,
//! descending through exactly the directories the path names, the way the kernel driver's own
//! `Path::components` + per-directory `get_dirent` lookup does it.

use crate::dirent;
use crate::error::Error;
use crate::error::Result;
use crate::layout::block;
use crate::layout::FileType;
use crate::layout::Inode;
use crate::layout::ROOT_INODE;
use std::path::Path;
use std::path::PathBuf;

/// Splits an absolute path into its non-empty components.
///
/// Returns `InvalidArgument` if the path is not absolute.
pub fn split_path(path: &Path) -> Result<Vec<Vec<u8>>> {
	if !path.is_absolute() {
		return Err(Error::InvalidArgument(format!("{}: path must be absolute", path.display())));
	}
	Ok(path
		.components()
		.filter_map(|c| match c {
			std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned().into_bytes()),
			_ => None,
		})
		.collect())
}

/// Looks up `name` among the directory entries reachable from `dir_inode`'s direct blocks.
fn lookup_one(image: &[u8], dir_inode: u32, name: &[u8]) -> Result<Option<u32>> {
	let inode = Inode::view(image, dir_inode);
	for block_num in inode.direct_blocks() {
		if let Some(entry) = dirent::find_in_block(block(image, block_num), name)? {
			return Ok(Some(entry.inode));
		}
	}
	Ok(None)
}

/// Resolves an absolute path to its inode number, descending component by component from the
/// root. Every non-final component must exist and be a directory.
pub fn resolve(image: &[u8], path: &Path) -> Result<u32> {
	let components = split_path(path)?;
	let mut current = ROOT_INODE;
	for (i, name) in components.iter().enumerate() {
		let inode = Inode::view(image, current);
		if inode.file_type() != Some(FileType::Directory) {
			return Err(Error::NotADirectory(path_prefix(&components, i)));
		}
		current = lookup_one(image, current, name)?.ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
	}
	Ok(current)
}

/// Resolves all but the last component, returning the parent directory's inode number and the
/// leaf's raw name. The parent must exist and be a directory; the leaf itself is not required
/// to exist.
pub fn resolve_parent(image: &[u8], path: &Path) -> Result<(u32, Vec<u8>)> {
	let mut components = split_path(path)?;
	let leaf = components.pop().ok_or_else(|| Error::InvalidArgument("path has no leaf component".into()))?;

	let mut current = ROOT_INODE;
	for (i, name) in components.iter().enumerate() {
		let inode = Inode::view(image, current);
		if inode.file_type() != Some(FileType::Directory) {
			return Err(Error::NotADirectory(path_prefix(&components, i)));
		}
		current = lookup_one(image, current, name)?.ok_or_else(|| Error::NotFound(path.to_path_buf()))?;
	}
	let parent_inode = Inode::view(image, current);
	if parent_inode.file_type() != Some(FileType::Directory) {
		return Err(Error::NotADirectory(path_prefix(&components, components.len())));
	}
	Ok((current, leaf))
}

/// Rebuilds a display path out of the first `n` raw components, for error messages.
fn path_prefix(components: &[Vec<u8>], n: usize) -> PathBuf {
	let mut out = PathBuf::from("/");
	for c in components.iter().take(n + 1) {
		out.push(String::from_utf8_lossy(c).into_owned());
	}
	out
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::fixture::new_fresh_image;
	use crate::layout::MODE_DIR;
	use crate::layout::DEFAULT_DIR_PERM;
	use crate::alloc::Allocator;
	use std::path::Path;

	fn mkdir_raw(image: &mut Vec<u8>, parent: u32, name: &[u8]) -> u32 {
		let child = Allocator::allocate_inode(image).unwrap();
		let block_num = Allocator::allocate_block(image).unwrap();
		dirent::init_block(crate::layout::block_mut(image, block_num), child, parent);

		let inode = Inode::view_mut(image, child);
		inode.i_mode = MODE_DIR | DEFAULT_DIR_PERM;
		inode.i_links_count = 2;
		inode.set_size(crate::layout::BLOCK_SIZE as u64);
		inode.i_block[0] = block_num;

		let parent_inode = Inode::view(image, parent);
		let parent_block = parent_inode.i_block[0];
		dirent::insert_into_block(crate::layout::block_mut(image, parent_block), child, name, FileType::Directory).unwrap();

		child
	}

	#[test]
	fn resolves_root() {
		let image = new_fresh_image();
		assert_eq!(resolve(&image, Path::new("/")).unwrap(), ROOT_INODE);
	}

	#[test]
	fn resolves_nested_component_by_component() {
		let mut image = new_fresh_image();
		let foo = mkdir_raw(&mut image, ROOT_INODE, b"foo");
		let _bar = mkdir_raw(&mut image, foo, b"bar");
		assert_eq!(resolve(&image, Path::new("/foo")).unwrap(), foo);
		assert_eq!(resolve(&image, Path::new("/foo/bar")).unwrap(), _bar);
	}

	#[test]
	fn missing_component_is_not_found() {
		let image = new_fresh_image();
		assert!(matches!(resolve(&image, Path::new("/nope")), Err(Error::NotFound(_))));
	}

	#[test]
	fn non_directory_intermediate_component_errors() {
		let mut image = new_fresh_image();
		// Put a file-shaped inode at /foo by hand, then try to resolve through it.
		let file_inode = Allocator::allocate_inode(&mut image).unwrap();
		{
			let inode = Inode::view_mut(&mut image, file_inode);
			inode.i_mode = crate::layout::MODE_REG | 0o644;
			inode.i_links_count = 1;
		}
		let root = Inode::view(&image, ROOT_INODE);
		let root_block = root.i_block[0];
		dirent::insert_into_block(crate::layout::block_mut(&mut image, root_block), file_inode, b"foo", FileType::Regular).unwrap();

		assert!(matches!(resolve(&image, Path::new("/foo/bar")), Err(Error::NotADirectory(_))));
	}
}
