mod logger;

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{ArgAction, Parser};
use libxboxpart::{DriveInfo, FileSource, XboxPartError, XboxPartition, read_drive_info, scan};

#[derive(Debug, Parser)]
#[command(version, about = "Identify the fixed partition layout of Xbox 360 hard drives")]
struct Args {
    /// Increase logging verbosity, repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Also print the drive identification strings
    #[arg(short, long)]
    info: bool,

    /// Print only the start and end offset of each partition
    #[arg(short, long)]
    offsets: bool,

    /// Open devices read-write so partitions report as writable.
    /// Needs write permission on the device, nothing is ever written
    #[arg(long)]
    rw: bool,

    /// Devices or image files to scan
    #[arg(required = true)]
    devices: Vec<PathBuf>,
}

fn format_partition(device: &Path, part: &XboxPartition) -> String {
    return format!(
        "{}: PARTNO=\"{}\" NAME=\"{}\" TYPE=\"{}\" OFFSET=\"{}\" SIZE=\"{}\" BLOCK_SIZE=\"{}\" RW=\"{}\"",
        device.display(),
        part.location(),
        part.name,
        part.content,
        part.offset,
        part.size,
        part.block_size,
        u8::from(part.writable),
    );
}

fn format_offsets(part: &XboxPartition) -> String {
    return format!("{:#X} {:#X}", part.offset, part.end());
}

fn format_drive_info(device: &Path, info: &DriveInfo) -> String {
    return format!(
        "{}: SERIAL=\"{}\" FIRMWARE=\"{}\" MODEL=\"{}\"",
        device.display(),
        info.serial,
        info.firmware,
        info.model,
    );
}

/// How a single device was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Xbox,
    NotXbox,
    Failed,
}

/// Output collected for one device.
///
/// `lines` go to stdout and `errors` to stderr. A drive-info failure keeps the
/// partition lines and marks the device as failed.
#[derive(Debug)]
struct Report {
    outcome: Outcome,
    lines: Vec<String>,
    errors: Vec<String>,
}

impl Report {
    fn failed(device: &Path, err: XboxPartError) -> Report {
        return Report {
            outcome: Outcome::Failed,
            lines: Vec::new(),
            errors: vec![format!("{}: {err}", device.display())],
        };
    }
}

fn open_source(device: &Path, rw: bool) -> Result<FileSource, XboxPartError> {
    if rw {
        return FileSource::from_filename_rw(device);
    }
    return FileSource::from_filename(device);
}

fn run(device: &Path, args: &Args) -> Report {
    let mut source = match open_source(device, args.rw) {
        Ok(source) => source,
        Err(e) => return Report::failed(device, e),
    };

    let partitions = match scan(&mut source) {
        Ok(partitions) => partitions,
        Err(e) => {
            log::debug!("run - DEVICE: {}, CAUSE: {:?}", device.display(), e.cause());
            return Report {
                outcome: Outcome::NotXbox,
                lines: Vec::new(),
                errors: vec![format!("{}: {e}: {}", device.display(), e.cause())],
            };
        }
    };

    let mut report = Report {
        outcome: Outcome::Xbox,
        lines: Vec::with_capacity(partitions.len() + 1),
        errors: Vec::new(),
    };

    if args.info {
        match read_drive_info(&mut source) {
            Ok(info) => report.lines.push(format_drive_info(device, &info)),
            Err(e) => {
                report.outcome = Outcome::Failed;
                report
                    .errors
                    .push(format!("{}: {}", device.display(), XboxPartError::from(e)));
            }
        }
    }

    for part in &partitions {
        if args.offsets {
            report.lines.push(format_offsets(part));
        } else {
            report.lines.push(format_partition(device, part));
        }
    }

    return report;
}

/// Folds per-device outcomes into the process exit status.
///
/// Any failure gives `1`. Otherwise a device that is not an Xbox disk gives
/// `2`, and `0` means every device was an Xbox disk.
fn exit_status<I: IntoIterator<Item = Outcome>>(outcomes: I) -> u8 {
    let mut status = 0;

    for outcome in outcomes {
        match outcome {
            Outcome::Failed => return 1,
            Outcome::NotXbox => status = 2,
            Outcome::Xbox => {}
        }
    }

    return status;
}

fn main() -> ExitCode {
    let args = Args::parse();
    logger::init_logger(args.verbose);

    let mut outcomes = Vec::with_capacity(args.devices.len());

    for device in &args.devices {
        let report = run(device, &args);

        for line in &report.lines {
            println!("{line}");
        }
        for error in &report.errors {
            eprintln!("{error}");
        }

        outcomes.push(report.outcome);
    }

    return ExitCode::from(exit_status(outcomes));
}
