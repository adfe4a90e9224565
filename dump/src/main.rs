//! `dump` prints an ext2 image's metadata: superblock counters, group descriptor fields, both
//! bitmaps, and every inode of interest along with its directory entries if it is a directory.

use ext2fs::bitmap::Bitmap;
use ext2fs::dirent;
use ext2fs::image::Image;
use ext2fs::layout::block;
use ext2fs::layout::FileType;
use ext2fs::layout::GroupDescriptor;
use ext2fs::layout::Inode;
use ext2fs::layout::Superblock;
use ext2fs::layout::ROOT_INODE;
use std::env;
use std::path::PathBuf;
use std::process::exit;
use utils::util::ByteSize;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,

	/// If true, print command line help.
	help: bool,

	/// The image file to dump.
	image: Option<PathBuf>,
}

impl Args {
	/// Tells whether arguments are valid.
	fn is_valid(&self) -> bool {
		self.help || self.image.is_some()
	}
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();
	args.prog = iter.next().unwrap_or("dump".to_owned());

	let mut positional = Vec::new();
	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			_ => positional.push(arg),
		}
	}

	args.image = positional.into_iter().next().map(PathBuf::from);
	args
}

/// Prints command usage.
fn print_usage(prog: &str) {
	eprintln!("{}: bad usage", prog);
	eprintln!("Try '{} --help' for more information.", prog);
}

/// Prints command help.
fn print_help(prog: &str) {
	println!();
	println!("Usage:");
	println!(" {} IMAGE", prog);
	println!();
	println!("Prints an ext2 IMAGE's superblock, group descriptor, bitmaps and inodes.");
	println!();
	println!("Options:");
	println!(" -h, --help\tPrints help.");
}

/// Prints a bitmap, bit 0 leftmost, with a space every 8 bits.
fn print_bitmap(bitmap: &[u8], bit_count: u32) {
	let bm = Bitmap::new(bitmap);
	let mut line = String::new();
	for i in 0..bit_count {
		if i > 0 && i % 8 == 0 {
			line.push(' ');
		}
		line.push(if bm.test(i) { '1' } else { '0' });
	}
	println!("{}", line);
}

/// Prints one inode's summary line and, if it's a directory, its parsed entries.
fn print_inode(image: &[u8], n: u32) {
	let inode = Inode::view(image, n);
	let Some(file_type) = inode.file_type() else {
		return;
	};
	let size = inode.size();
	let links_count = inode.i_links_count;
	let blocks = inode.i_blocks;
	println!(
		"inode {}: type={} size={} ({}) links={} blocks={} direct={:?}",
		n,
		file_type.letter(),
		size,
		ByteSize(size),
		links_count,
		blocks,
		inode.direct_blocks().collect::<Vec<_>>(),
	);

	if file_type == FileType::Directory {
		for block_num in inode.direct_blocks() {
			match dirent::iter_block(block(image, block_num)) {
				Ok(entries) => {
					for entry in entries {
						if entry.is_free() {
							continue;
						}
						println!(
							"  block {}: inode={} type={} name={:?} rec_len={}",
							block_num,
							entry.inode,
							entry.file_type,
							String::from_utf8_lossy(&entry.name),
							entry.rec_len,
						);
					}
				}
				Err(e) => println!("  block {}: {}", block_num, e),
			}
		}
	}
}

fn main() {
	let args = parse_args();

	if !args.is_valid() {
		print_usage(&args.prog);
		exit(1);
	}
	if args.help {
		print_help(&args.prog);
		exit(0);
	}

	let image_path = args.image.unwrap();
	let image = Image::open(&image_path).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	});

	let sb = Superblock::view(&image);
	let inodes_count = sb.inodes_count;
	let blocks_count = sb.blocks_count;
	let sb_free_inodes_count = sb.free_inodes_count;
	let sb_free_blocks_count = sb.free_blocks_count;
	let first_ino = sb.first_ino;
	let inode_size = sb.inode_size;
	println!("superblock:");
	println!("  inodes_count       = {}", inodes_count);
	println!("  blocks_count       = {}", blocks_count);
	println!("  free_inodes_count  = {}", sb_free_inodes_count);
	println!("  free_blocks_count  = {}", sb_free_blocks_count);
	println!("  first_ino          = {}", first_ino);
	println!("  inode_size         = {}", inode_size);
	println!("  image size         = {}", ByteSize(blocks_count as u64 * ext2fs::layout::BLOCK_SIZE as u64));

	let gd = GroupDescriptor::view(&image);
	let block_bitmap_block = gd.block_bitmap;
	let inode_bitmap_block = gd.inode_bitmap;
	let inode_table_block = gd.inode_table;
	let gd_free_blocks_count = gd.free_blocks_count;
	let gd_free_inodes_count = gd.free_inodes_count;
	let used_dirs_count = gd.used_dirs_count;
	println!("group descriptor:");
	println!("  block_bitmap       = {}", block_bitmap_block);
	println!("  inode_bitmap       = {}", inode_bitmap_block);
	println!("  inode_table        = {}", inode_table_block);
	println!("  free_blocks_count  = {}", gd_free_blocks_count);
	println!("  free_inodes_count  = {}", gd_free_inodes_count);
	println!("  used_dirs_count    = {}", used_dirs_count);

	println!("inode bitmap:");
	print_bitmap(block(&image, inode_bitmap_block), inodes_count);
	println!("block bitmap:");
	print_bitmap(block(&image, block_bitmap_block), blocks_count - 1);

	println!("inodes:");
	for n in 1..=inodes_count {
		let inode = Inode::view(&image, n);
		let interesting = n == ROOT_INODE || (n >= 10 && inode.size() != 0);
		if interesting {
			print_inode(&image, n);
		}
	}
}
