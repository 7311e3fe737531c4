//! Intcode program runner.
//!
//! Loads a program file, runs it to completion and prints every output value
//! on its own line.
//!
//! # Usage
//! ```text
//! intcode <program.txt> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program.txt`: Comma-separated Intcode program
//!
//! # Options
//! - `-i, --input <n[,n...]>`: Queue input values (repeatable)
//! - `-s, --set <addr>=<value>`: Patch a memory cell before running (repeatable)
//! - `-c, --capacity <cells>`: Memory capacity in cells
//! - `-p, --peek <addr>`: Print a memory cell after the program halts (repeatable)
//! - `--interactive`: Prompt on stdin whenever the program needs input
//! - `--trace`: Log every executed instruction
//!
//! # Examples
//! ```text
//! intcode day2.txt -s 1=12 -s 2=2 -p 0
//! intcode day5.txt -i 5
//! intcode day9.txt --interactive
//! ```

use intcode::utils::log::{Level, set_min_level};
use intcode::virtual_machine::errors::VMError;
use intcode::virtual_machine::program::Program;
use intcode::virtual_machine::vm::{DEFAULT_CAPACITY, Event, VM, VmConfig};
use intcode::{error, info, warn};
use std::env;
use std::io::{self, BufRead, Write};
use std::process;

/// Settings collected from the command line.
#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    path: String,
    inputs: Vec<i64>,
    patches: Vec<(usize, i64)>,
    capacity: Option<usize>,
    peeks: Vec<usize>,
    interactive: bool,
    trace: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Run(Options),
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program_name = args.first().map(String::as_str).unwrap_or("intcode");

    let options = match parse_args(args.get(1..).unwrap_or_default()) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            print_usage(program_name);
            process::exit(0);
        }
        Err(message) => {
            error!("{message}\n");
            print_usage(program_name);
            process::exit(1);
        }
    };

    if options.trace {
        set_min_level(Level::Trace);
    }

    if let Err(e) = run(&options) {
        error!("{e}");
        process::exit(1);
    }
}

/// Parses everything after the binary name.
fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(first) = args.first() else {
        return Err("missing program file".to_string());
    };
    if first == "--help" || first == "-h" {
        return Ok(Command::Help);
    }

    let mut options = Options {
        path: first.clone(),
        ..Options::default()
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--input" | "-i") => {
                let value = flag_value(args, &mut i, k)?;
                for token in value.split(',') {
                    options.inputs.push(parse_number(token.trim(), "input")?);
                }
            }
            k @ ("--set" | "-s") => {
                let value = flag_value(args, &mut i, k)?;
                let (addr, cell) = value
                    .split_once('=')
                    .ok_or_else(|| format!("{k} expects <addr>=<value>, got '{value}'"))?;
                options.patches.push((
                    parse_number(addr.trim(), "address")?,
                    parse_number(cell.trim(), "value")?,
                ));
            }
            k @ ("--capacity" | "-c") => {
                let value = flag_value(args, &mut i, k)?;
                options.capacity = Some(parse_number(value, "capacity")?);
            }
            k @ ("--peek" | "-p") => {
                let value = flag_value(args, &mut i, k)?;
                options.peeks.push(parse_number(value, "address")?);
            }
            "--interactive" => {
                options.interactive = true;
                i += 1;
            }
            "--trace" => {
                options.trace = true;
                i += 1;
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(format!("Unexpected argument: {other}")),
        }
    }

    Ok(Command::Run(options))
}

/// Returns the argument following flag `k` and moves past both.
fn flag_value<'a>(args: &'a [String], i: &mut usize, k: &str) -> Result<&'a str, String> {
    *i += 1;
    let value = args
        .get(*i)
        .ok_or_else(|| format!("{k} requires an argument"))?;
    *i += 1;
    Ok(value.as_str())
}

fn parse_number<T: std::str::FromStr>(token: &str, what: &str) -> Result<T, String> {
    token
        .parse::<T>()
        .map_err(|_| format!("Invalid {what}: '{token}' is not a valid number"))
}

/// Failures that end a run.
#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error(transparent)]
    Vm(#[from] VMError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Loads, patches and runs the program, printing outputs as they appear.
fn run(options: &Options) -> Result<(), RunError> {
    let capacity = options.capacity.unwrap_or(DEFAULT_CAPACITY);

    let mut program = Program::from_file(&options.path)?;
    for &(addr, value) in &options.patches {
        program.patch_within(addr, value, capacity)?;
    }

    let config = VmConfig::default()
        .with_capacity(capacity)
        .with_trace(options.trace);
    let mut vm = VM::with_config(&program, config)?;
    vm.extend_input(options.inputs.iter().copied());

    info!("Loaded {} ({} cells)", options.path, program.len());

    drive(
        &mut vm,
        options,
        &mut io::stdout().lock(),
        &mut io::stdin().lock(),
    )
}

/// Runs `vm` until it halts, writing outputs and peeked cells to `out`.
///
/// Stops at the first failed write.
fn drive<W: Write, R: BufRead>(
    vm: &mut VM,
    options: &Options,
    out: &mut W,
    input: &mut R,
) -> Result<(), RunError> {
    loop {
        match vm.resume()? {
            Event::Output(value) => writeln!(out, "{value}")?,
            Event::NeedsInput => {
                if !options.interactive {
                    return Err(VMError::StarvedInput { ip: vm.ip() }.into());
                }
                out.flush()?;
                match prompt_input(input) {
                    Some(value) => vm.push_input(value),
                    None => return Err(VMError::StarvedInput { ip: vm.ip() }.into()),
                }
            }
            Event::Halted => break,
        }
    }

    info!("Halted after {} instructions", vm.instructions_executed());

    for &addr in &options.peeks {
        let value = vm.read(addr)?;
        writeln!(out, "[{addr}] = {value}")?;
    }
    out.flush()?;
    Ok(())
}

/// Reads one integer from `reader`, prompting again on bad lines.
///
/// Returns `None` once the reader is exhausted.
fn prompt_input<R: BufRead>(reader: &mut R) -> Option<i64> {
    let mut line = String::new();
    loop {
        eprint!("input> ");
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => match line.trim().parse::<i64>() {
                Ok(value) => return Some(value),
                Err(_) => warn!("Not an integer: '{}'", line.trim()),
            },
        }
    }
}

const USAGE: &str = "\
Intcode Runner

USAGE:
    {program} <program.txt> [OPTIONS]

ARGS:
    <program.txt>    Comma-separated Intcode program

OPTIONS:
    -i, --input <n[,n...]>     Queue input values (repeatable)
    -s, --set <addr>=<value>   Patch a memory cell before running (repeatable)
    -c, --capacity <cells>     Memory capacity in cells
    -p, --peek <addr>          Print a memory cell after the program halts (repeatable)
        --interactive          Prompt on stdin whenever the program needs input
        --trace                Log every executed instruction
    -h, --help                 Print this help message

EXAMPLES:
    # Restore the gravity assist program and inspect cell 0
    {program} day2.txt -s 1=12 -s 2=2 -p 0

    # Run a diagnostic with one input
    {program} day5.txt -i 5

    # Feed input by hand
    {program} day9.txt --interactive
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run_options(list: &[&str]) -> Options {
        match parse_args(&args(list)).expect("parse failed") {
            Command::Run(options) => options,
            Command::Help => panic!("expected run options"),
        }
    }

    #[test]
    fn program_only() {
        let options = run_options(&["prog.txt"]);
        assert_eq!(options.path, "prog.txt");
        assert!(options.inputs.is_empty());
        assert!(!options.interactive);
    }

    #[test]
    fn help_flags() {
        assert_eq!(parse_args(&args(&["-h"])), Ok(Command::Help));
        assert_eq!(parse_args(&args(&["p.txt", "--help"])), Ok(Command::Help));
    }

    #[test]
    fn missing_program() {
        assert!(parse_args(&[]).is_err());
    }

    #[test]
    fn inputs_accumulate_in_order() {
        let options = run_options(&["p.txt", "-i", "1", "--input", "-5,7", "-i", " 9"]);
        assert_eq!(options.inputs, vec![1, -5, 7, 9]);
    }

    #[test]
    fn patches_and_peeks() {
        let options = run_options(&["p.txt", "-s", "1=12", "--set", "2 = -2", "-p", "0"]);
        assert_eq!(options.patches, vec![(1, 12), (2, -2)]);
        assert_eq!(options.peeks, vec![0]);
    }

    #[test]
    fn capacity_and_switches() {
        let options = run_options(&["p.txt", "-c", "4096", "--interactive", "--trace"]);
        assert_eq!(options.capacity, Some(4096));
        assert!(options.interactive);
        assert!(options.trace);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse_args(&args(&["p.txt", "-i", "x"])).is_err());
        assert!(parse_args(&args(&["p.txt", "-s", "12"])).is_err());
        assert!(parse_args(&args(&["p.txt", "-s", "-1=3"])).is_err());
        assert!(parse_args(&args(&["p.txt", "-c", "-1"])).is_err());
    }

    #[test]
    fn rejects_missing_flag_value() {
        let err = parse_args(&args(&["p.txt", "-p"])).unwrap_err();
        assert_eq!(err, "-p requires an argument");
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(parse_args(&args(&["p.txt", "--verbose"])).is_err());
    }

    /// Writer whose every write fails, like a closed pipe.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    fn vm_for(cells: &[i64]) -> VM {
        VM::new(&Program::new(cells.to_vec()))
    }

    fn program_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
        file.write_all(contents.as_bytes())
            .expect("failed to write temp file");
        file
    }

    #[test]
    fn drive_writes_outputs_and_peeks() {
        let mut vm = vm_for(&[1101, 2, 3, 7, 4, 7, 99, 0]);
        let options = Options {
            peeks: vec![7],
            ..Options::default()
        };
        let mut out = Vec::new();
        drive(&mut vm, &options, &mut out, &mut io::empty()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "5\n[7] = 5\n");
    }

    #[test]
    fn drive_stops_on_failed_write() {
        let mut vm = vm_for(&[104, 1, 104, 2, 99]);
        let result = drive(&mut vm, &Options::default(), &mut ClosedPipe, &mut io::empty());
        assert!(matches!(result, Err(RunError::Output(_))));
        assert_eq!(vm.instructions_executed(), 1);
        assert!(!vm.is_halted());
    }

    #[test]
    fn drive_prompts_when_interactive() {
        let mut vm = vm_for(&[3, 0, 4, 0, 99]);
        let options = Options {
            interactive: true,
            ..Options::default()
        };
        let mut out = Vec::new();
        let mut input = io::Cursor::new("x\n12\n");
        drive(&mut vm, &options, &mut out, &mut input).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "12\n");
    }

    #[test]
    fn drive_starves_without_input() {
        let mut vm = vm_for(&[3, 0, 4, 0, 99]);
        let mut out = Vec::new();
        let result = drive(&mut vm, &Options::default(), &mut out, &mut io::empty());
        assert!(matches!(
            result,
            Err(RunError::Vm(VMError::StarvedInput { ip: 0 }))
        ));
    }

    #[test]
    fn run_rejects_patch_past_capacity() {
        let file = program_file("99\n");
        let path = file.path().display().to_string();

        let options = Options {
            path: path.clone(),
            patches: vec![(usize::MAX, 1)],
            ..Options::default()
        };
        assert!(matches!(
            run(&options),
            Err(RunError::Vm(VMError::OutOfBoundsAddress { .. }))
        ));

        let options = Options {
            path,
            patches: vec![(10, 1)],
            capacity: Some(10),
            ..Options::default()
        };
        assert!(matches!(
            run(&options),
            Err(RunError::Vm(VMError::OutOfBoundsAddress {
                address: 10,
                capacity: 10
            }))
        ));
    }

    #[test]
    fn prompt_skips_bad_lines() {
        let mut reader = io::Cursor::new("abc\n\n42\n7\n");
        assert_eq!(prompt_input(&mut reader), Some(42));
        assert_eq!(prompt_input(&mut reader), Some(7));
        assert_eq!(prompt_input(&mut reader), None);
    }
}
