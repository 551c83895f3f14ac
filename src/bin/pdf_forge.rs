//! Command-line front end.
//!
//! Usage:
//!   pdf_forge merge <out.pdf> <in.pdf>...
//!   pdf_forge split <in.pdf> <start> <end> <out.pdf>
//!   pdf_forge rotate <in.pdf> <page|all> <degrees> <out.pdf>
//!   pdf_forge extract <in.pdf> <pages> <out.pdf>     (pages: 1,3,5-7)
//!   pdf_forge compress <in.pdf> <out.pdf>
//!   pdf_forge info <in.pdf>
//!
//! Options:
//!   --compress       write object streams and compress streams
//!   --strict         reject wrong stream lengths instead of recovering
//!   --clamp          clamp a split end past the last page
//!   -v, --verbose    debug logging (RUST_LOG overrides)

use pdf_forge::api::{self, OperationOptions};
use pdf_forge::{PageTarget, ParseOptions, WriteOptions};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "usage: pdf_forge <merge|split|rotate|extract|compress|info> [options] <args>...
  merge <out.pdf> <in.pdf>...
  split <in.pdf> <start> <end> <out.pdf>
  rotate <in.pdf> <page|all> <degrees> <out.pdf>
  extract <in.pdf> <pages> <out.pdf>
  compress <in.pdf> <out.pdf>
  info <in.pdf>
options: --compress --strict --clamp -v/--verbose";

struct CliConfig {
    command: String,
    args: Vec<String>,
    options: OperationOptions,
    verbose: bool,
}

impl CliConfig {
    fn from_args() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let command = args.next().ok_or("missing command")?;
        let mut positional = Vec::new();
        let mut options = OperationOptions::default();
        let mut verbose = false;

        for arg in args {
            match arg.as_str() {
                "--compress" => options.write = WriteOptions::compressed(),
                "--strict" => options.parse = ParseOptions::strict(),
                "--clamp" => options.clamp_split_end = true,
                "--verbose" | "-v" => verbose = true,
                flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
                _ => positional.push(arg),
            }
        }

        Ok(Self {
            command,
            args: positional,
            options,
            verbose,
        })
    }

    fn expect_args(&self, count: usize) -> Result<(), String> {
        if self.args.len() != count {
            return Err(format!(
                "{} takes {} arguments, got {}",
                self.command,
                count,
                self.args.len()
            ));
        }
        Ok(())
    }
}

enum Failure {
    Usage(String),
    Operation(pdf_forge::Error),
}

impl From<pdf_forge::Error> for Failure {
    fn from(e: pdf_forge::Error) -> Self {
        Failure::Operation(e)
    }
}

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Failure::Operation(e.into())
    }
}

impl From<String> for Failure {
    fn from(e: String) -> Self {
        Failure::Usage(e)
    }
}

/// Parse `1,3,5-7` into page numbers.
fn parse_page_list(list: &str) -> Result<Vec<u32>, String> {
    let mut pages = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let number = |s: &str| s.trim().parse::<u32>().map_err(|_| format!("bad page number '{}'", s));
        match part.split_once('-') {
            Some((a, b)) => {
                let (a, b) = (number(a)?, number(b)?);
                if a > b {
                    return Err(format!("bad page range '{}'", part));
                }
                pages.extend(a..=b);
            },
            None => pages.push(number(part)?),
        }
    }
    Ok(pages)
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T, String> {
    value.parse().map_err(|_| format!("bad {} '{}'", what, value))
}

fn read(path: &str) -> Result<Vec<u8>, Failure> {
    Ok(fs::read(PathBuf::from(path))?)
}

fn write(path: &str, bytes: &[u8]) -> Result<(), Failure> {
    fs::write(PathBuf::from(path), bytes)?;
    println!("Wrote {} ({} bytes)", path, bytes.len());
    Ok(())
}

fn run(config: &CliConfig) -> Result<(), Failure> {
    let a = &config.args;
    let options = &config.options;

    match config.command.as_str() {
        "merge" => {
            if a.len() < 2 {
                return Err(Failure::Usage("merge takes an output and at least one input".into()));
            }
            let inputs = a[1..].iter().map(|p| read(p)).collect::<Result<Vec<_>, _>>()?;
            write(&a[0], &api::merge_with_options(&inputs, options)?)
        },
        "split" => {
            config.expect_args(4)?;
            let start = parse_number(&a[1], "start page")?;
            let end = parse_number(&a[2], "end page")?;
            write(&a[3], &api::split_with_options(&read(&a[0])?, start, end, options)?)
        },
        "rotate" => {
            config.expect_args(4)?;
            let target: PageTarget = a[1].parse()?;
            let degrees = parse_number(&a[2], "rotation")?;
            write(&a[3], &api::rotate_with_options(&read(&a[0])?, target, degrees, options)?)
        },
        "extract" => {
            config.expect_args(3)?;
            let pages = parse_page_list(&a[1])?;
            write(&a[2], &api::extract_with_options(&read(&a[0])?, &pages, options)?)
        },
        "compress" => {
            config.expect_args(2)?;
            let options = OperationOptions {
                write: WriteOptions::compressed(),
                ..options.clone()
            };
            write(&a[1], &api::compress_with_options(&read(&a[0])?, &options)?)
        },
        "info" => {
            config.expect_args(1)?;
            let info = api::inspect_with_options(&read(&a[0])?, &options.parse)?;
            let json = serde_json::to_string_pretty(&info).map_err(|e| Failure::Usage(e.to_string()))?;
            println!("{}", json);
            Ok(())
        },
        other => Err(Failure::Usage(format!("unknown command '{}'", other))),
    }
}

fn main() -> ExitCode {
    let config = match CliConfig::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}\n{}", e, USAGE);
            return ExitCode::from(2);
        },
    };

    let default_level = if config.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Usage(e)) => {
            eprintln!("Error: {}\n{}", e, USAGE);
            ExitCode::from(2)
        },
        Err(Failure::Operation(e)) => {
            eprintln!("Error ({:?}): {}", e.kind(), e);
            ExitCode::from(1)
        },
    }
}
