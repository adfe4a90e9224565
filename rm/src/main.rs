//! `rm` removes a regular file or symbolic link from an ext2 image file.

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

	/// The image file to operate on.
	image: Option<PathBuf>,
	/// The absolute path of the entry to remove, on the image.
	target: Option<PathBuf>,
}

impl Args {
	/// Tells whether arguments are valid.
	fn is_valid(&self) -> bool {
		self.help || (self.image.is_some() && self.target.is_some())
	}
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();
	args.prog = iter.next().unwrap_or("rm".to_owned());

	let mut positional = Vec::new();
	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			_ => positional.push(arg),
		}
	}

	let mut positional = positional.into_iter();
	args.image = positional.next().map(PathBuf::from);
	args.target = positional.next().map(PathBuf::from);

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
	println!(" {} IMAGE PATH", prog);
	println!();
	println!("Removes the regular file or symbolic link at the absolute PATH inside the ext2 IMAGE.");
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
	let target = args.target.unwrap();

	let mut image = Image::open(&image_path).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	});

	if let Err(e) = ops::remove(&mut image, Path::new(&target)) {
		eprintln!("{}: {}: {}", args.prog, target.display(), e);
		exit(e.exit_code());
	}

	if let Err(e) = image.flush() {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	}
}
