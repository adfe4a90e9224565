//! `check` scans an ext2 image for drift between its bitmaps, superblock/descriptor counters,
//! directory entry types and inode deletion state, repairing what it finds.

use ext2fs::check;
use ext2fs::image::Image;
use std::env;
use std::path::PathBuf;
use std::process::exit;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,

	/// If true, print command line help.
	help: bool,

	/// The image file to check.
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
	args.prog = iter.next().unwrap_or("check".to_owned());

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
	println!("Checks and repairs an ext2 IMAGE's metadata consistency.");
	println!();
	println!("Options:");
	println!(" -h, --help\tPrints help.");
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

	let mut image = Image::open(&image_path).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	});

	let report = check::check(&mut image).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	});

	if report.inode_counter_delta > 0 {
		println!("free inode counters corrected by {}", report.inode_counter_delta);
	}
	if report.block_counter_delta > 0 {
		println!("free block counters corrected by {}", report.block_counter_delta);
	}
	if report.entry_type_fixes > 0 {
		println!("{} directory entry type(s) corrected", report.entry_type_fixes);
	}
	if report.inode_allocation_fixes > 0 {
		println!("{} inode(s) marked allocated", report.inode_allocation_fixes);
	}
	if report.dtime_fixes > 0 {
		println!("{} stale deletion timestamp(s) cleared", report.dtime_fixes);
	}
	if report.block_allocation_fixes > 0 {
		println!("{} block(s) marked allocated", report.block_allocation_fixes);
	}

	let total = report.total();
	if total > 0 {
		println!("{} file system inconsistencies repaired!", total);
	} else {
		println!("No file system inconsistencies detected!");
	}

	if let Err(e) = image.flush() {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	}
}
