//! `cp` copies a regular file from the host filesystem into an ext2 image file.

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
	/// The host file to copy in.
	host_path: Option<PathBuf>,
	/// The absolute destination path, on the image.
	image_path: Option<PathBuf>,
}

impl Args {
	/// Tells whether arguments are valid.
	fn is_valid(&self) -> bool {
		self.help || (self.image.is_some() && self.host_path.is_some() && self.image_path.is_some())
	}
}

fn parse_args() -> Args {
	let mut args: Args = Default::default();
	let mut iter = env::args();
	args.prog = iter.next().unwrap_or("cp".to_owned());

	let mut positional = Vec::new();
	for arg in iter {
		match arg.as_str() {
			"-h" | "--help" => args.help = true,
			_ => positional.push(arg),
		}
	}

	let mut positional = positional.into_iter();
	args.image = positional.next().map(PathBuf::from);
	args.host_path = positional.next().map(PathBuf::from);
	args.image_path = positional.next().map(PathBuf::from);

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
	println!(" {} IMAGE HOST_PATH IMAGE_PATH", prog);
	println!();
	println!("Copies the regular file at HOST_PATH into the ext2 IMAGE at IMAGE_PATH.");
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
	let host_path = args.host_path.unwrap();
	let target = args.image_path.unwrap();

	let mut image = Image::open(&image_path).unwrap_or_else(|e| {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	});

	if let Err(e) = ops::copy_in(&mut image, &host_path, Path::new(&target)) {
		eprintln!("{}: {}: {}", args.prog, target.display(), e);
		exit(e.exit_code());
	}

	if let Err(e) = image.flush() {
		eprintln!("{}: {}: {}", args.prog, image_path.display(), e);
		exit(e.exit_code());
	}
}
