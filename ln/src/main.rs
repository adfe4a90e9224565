//! `ln` creates a hard or symbolic link inside an ext2 image file.

use ext2fs::image::Image;
use ext2fs::ops;
use std::env;
use std::path::Path;
use std::path::PathBuf;
use std::process::exit;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
	/// The name of the current program used in command line.
	prog: String,

	/// If true, print command line help.
	help: bool,
	/// If true, create a symbolic link instead of a hard link.
	symbolic: bool,

	/// The image file to operate on.
	image: Option<PathBuf>,
	/// The absolute path of the existing entry, on the image.
	src: Option<PathBuf>,
	/// The absolute path of the new entry, on the image.
	dst: Option<PathBuf>,
}

impl Args {
	/// Tells whether arguments are valid.
	fn is_valid(&self) -> bool {
		self.help || (self.image.is_some() && self.src.is_some() && self.dst.is_some())
	}
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();
	args.prog = iter.next().unwrap_or("ln".to_owned());

	let mut positional = Vec::new();
	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			"-s" | "--symbolic" => args.symbolic = true,
			_ => positional.push(arg),
		}
	}

	let mut positional = positional.into_iter();
	args.image = positional.next().map(PathBuf::from);
	args.src = positional.next().map(PathBuf::from);
	args.dst = positional.next().map(PathBuf::from);

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
	println!(" {} [-s] IMAGE SRC DST", prog);
	println!();
	println!("Links SRC at DST inside the ext2 IMAGE.");
	println!();
	println!("Options:");
	println!(" -h, --help\tPrints help.");
	println!(" -s, --symbolic\tCreates a symbolic link instead of a hard link.");
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
	let src = args.src.unwrap();
	let dst = args.dst.unwrap();

	let mut image = Image::open(&image_path).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	});

	if let Err(e) = ops::link(&mut image, Path::new(&src), Path::new(&dst), args.symbolic) {
		eprintln!("{}: {}: {}", args.prog, dst.display(), e);
		exit(e.exit_code());
	}

	if let Err(e) = image.flush() {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	}
}
