//! Command-line driver exercising the same scenario as the original design's
//! `tinyFSDemo.c`: format a volume, mount it, write two files, read them
//! back, then list and tear down.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::error;
use tinyfs::{TfsResult, TinyFs};

#[derive(Parser)]
#[command(name = "tinyfsdemo", about = "Exercises a TinyFS volume from the command line")]
struct Cli {
	/// Path to the volume's host file.
	#[arg(short, long, default_value = tinyfs::volume::DEFAULT_DISK_NAME)]
	disk: PathBuf,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Formats a new volume and runs the two-file write/read scenario.
	Demo {
		/// Total size of the volume in bytes, rounded down to a block multiple.
		#[arg(long, default_value_t = tinyfs::volume::DEFAULT_DISK_SIZE)]
		size: u64,
	},
	/// Formats a blank volume without mounting it.
	Format {
		/// Total size of the volume in bytes, rounded down to a block multiple.
		#[arg(long, default_value_t = tinyfs::volume::DEFAULT_DISK_SIZE)]
		size: u64,
	},
	/// Lists the names of every file currently open on a freshly mounted
	/// volume (always empty, since mounting never repopulates the table).
	Ls,
}

fn run_demo(tfs: &mut TinyFs, disk: &std::path::Path, size: u64) -> TfsResult<()> {
	println!("Creating and mounting the file system...");
	tfs.format(disk, size)?;
	tfs.mount(disk)?;

	let phrase1 = "I am file. A very good file. ";
	let iamfile_content: Vec<u8> = phrase1
		.bytes()
		.cycle()
		.take(200)
		.enumerate()
		.map(|(i, b)| if i == 199 { 0 } else { b })
		.collect();

	let phrase2 = "silly file time ";
	let sillyfile_content: Vec<u8> = phrase2
		.bytes()
		.cycle()
		.take(1000)
		.enumerate()
		.map(|(i, b)| if i == 999 { 0 } else { b })
		.collect();

	println!("Opening or creating file \"iamfile\"...");
	let a_fd = tfs.open_file("iamfile")?;
	println!("Writing to file \"iamfile\"...");
	tfs.write_file(a_fd, &iamfile_content)?;
	println!("Reading from file \"iamfile\"...");
	tfs.seek(a_fd, 0)?;
	print!("\"");
	while let Ok(b) = tfs.read_byte(a_fd) {
		print!("{}", b as char);
	}
	println!("\"");
	println!("Closing file \"iamfile\"...");
	tfs.close_file(a_fd)?;

	println!("Opening or creating file \"sillyfile\"...");
	let b_fd = tfs.open_file("sillyfile")?;
	println!("Writing to file \"sillyfile\"...");
	tfs.write_file(b_fd, &sillyfile_content)?;
	println!("Reading from file \"sillyfile\"...");
	tfs.seek(b_fd, 0)?;
	print!("\"");
	while let Ok(b) = tfs.read_byte(b_fd) {
		print!("{}", b as char);
	}
	println!("\"");
	println!("Closing file \"sillyfile\"...");
	tfs.close_file(b_fd)?;

	println!("Unmounting the file system...");
	tfs.unmount()?;
	Ok(())
}

fn main() {
	env_logger::init();
	let cli = Cli::parse();
	let mut tfs = TinyFs::new();

	let result = match cli.command {
		Command::Demo { size } => run_demo(&mut tfs, &cli.disk, size),
		Command::Format { size } => tfs.format(&cli.disk, size),
		Command::Ls => tfs.mount(&cli.disk).and_then(|()| {
			for name in tfs.readdir()? {
				println!("{name}");
			}
			tfs.unmount()
		}),
	};

	if let Err(err) = result {
		error!("{err}");
		std::process::exit(1);
	}
}
