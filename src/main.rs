//! polylearn Command Line Interface
//!
//! Usage:
//!   polylearn [OPTIONS] <input-file>
//!   polylearn --help
//!
//! Examples:
//!   polylearn jacobi.scop                       # C code for the file's schedule
//!   polylearn --interchange 0,1 gemm.scop        # Swap the two outer loops
//!   polylearn --skew 1,0,1 --emit ast seidel.scop  # Skew, then dump the AST
//!   polylearn --emit scop gemm.scop              # JSON view of the SCoP

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, error, info};
use polylearn::codegen::{CodeGenerator, CodegenOptions};
use polylearn::schedule::{format_union_map, BandTransform};
use polylearn::utils::errors::PolyLearnError;
use polylearn::utils::location::SourceMap;
use std::fs;
use std::path::{Path, PathBuf};

/// polylearn - polyhedral code generation
#[derive(Parser, Debug)]
#[command(name = "polylearn")]
#[command(author = "polylearn Contributors")]
#[command(version)]
#[command(about = "Generates C loop nests from a SCoP and a schedule", long_about = None)]
struct Cli {
    /// Input file (.scop format)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// What to emit
    #[arg(long, default_value = "code")]
    emit: EmitKind,

    /// Emit #defines for floord, ceild, min and max
    #[arg(long)]
    macros: bool,

    /// Spaces per indentation level
    #[arg(long, default_value = "2")]
    indent: usize,

    /// Interchange two band members: D1,D2
    #[arg(long, value_name = "D1,D2", value_parser = parse_interchange)]
    interchange: Vec<BandTransform>,

    /// Skew a band member: TARGET,SOURCE,FACTOR adds FACTOR * SOURCE to TARGET
    #[arg(long, value_name = "T,S,F", value_parser = parse_skew, allow_hyphen_values = true)]
    skew: Vec<BandTransform>,

    /// Shift a band member: D,OFFSET
    #[arg(long, value_name = "D,OFFSET", value_parser = parse_shift, allow_hyphen_values = true)]
    shift: Vec<BandTransform>,

    /// Reverse a band member
    #[arg(long, value_name = "D")]
    reverse: Vec<usize>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitKind {
    /// Generated C code
    Code,
    /// The generated AST, before printing
    Ast,
    /// The flattened schedule (isl format)
    Schedule,
    /// The SCoP as JSON
    Scop,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("polylearn v{}", polylearn::VERSION);
    debug!("Input file: {:?}", cli.input);

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read input file: {:?}", cli.input))?;

    info!("Parsing...");
    let program = match polylearn::frontend::parse_scop(&source, &scop_name(&cli.input)) {
        Ok(program) => program,
        Err(PolyLearnError::Parse(e)) => {
            if let Some(snippet) = SourceMap::new(&source).snippet(&e.span) {
                eprintln!("{}", snippet);
            }
            return Err(e).with_context(|| format!("Failed to parse {:?}", cli.input));
        }
        Err(e) => return Err(e).with_context(|| format!("Invalid SCoP in {:?}", cli.input)),
    };

    let transforms = band_transforms(&cli);
    debug!("Band transformations: {:?}", transforms);
    let schedule = polylearn::transform(&program.schedule, &transforms)?;

    let options = CodegenOptions { indent: cli.indent, emit_macros: cli.macros };
    let generator = CodeGenerator::new(&program.scop, &schedule).with_options(options);

    let output = match cli.emit {
        EmitKind::Code => {
            info!("Generating code...");
            match generator.generate() {
                Ok(code) => code.into_string(),
                Err(e) => {
                    error!("Code generation failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        EmitKind::Ast => generator.build_ast()?.dump(),
        EmitKind::Schedule => format!("{}\n", format_union_map(&schedule.to_union_map()?)),
        EmitKind::Scop => serde_json::to_string_pretty(&program.scop).context("Failed to serialize SCoP")? + "\n",
    };

    write_output(&cli.output, &output)
}

/// Transformations in a fixed order: interchanges, skews, shifts, reversals.
fn band_transforms(cli: &Cli) -> Vec<BandTransform> {
    cli.interchange
        .iter()
        .chain(&cli.skew)
        .chain(&cli.shift)
        .copied()
        .chain(cli.reverse.iter().map(|&d| BandTransform::Reverse(d)))
        .collect()
}

fn scop_name(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "scop".to_string())
}

fn parse_list<T: std::str::FromStr>(s: &str, n: usize, what: &str) -> Result<Vec<T>, String> {
    let values: Vec<T> = s
        .split(',')
        .map(|v| v.trim().parse::<T>().map_err(|_| format!("invalid number '{}' in {}", v.trim(), what)))
        .collect::<Result<_, _>>()?;
    if values.len() != n {
        return Err(format!("{} takes {} comma-separated values, got {}", what, n, values.len()));
    }
    Ok(values)
}

fn parse_interchange(s: &str) -> Result<BandTransform, String> {
    let v = parse_list::<usize>(s, 2, "--interchange")?;
    Ok(BandTransform::Interchange(v[0], v[1]))
}

fn parse_skew(s: &str) -> Result<BandTransform, String> {
    let v = parse_list::<i64>(s, 3, "--skew")?;
    let dim = |x: i64| usize::try_from(x).map_err(|_| format!("negative band member {} in --skew", x));
    Ok(BandTransform::Skew { target: dim(v[0])?, source: dim(v[1])?, factor: v[2] })
}

fn parse_shift(s: &str) -> Result<BandTransform, String> {
    let v = parse_list::<i64>(s, 2, "--shift")?;
    let dim = usize::try_from(v[0]).map_err(|_| format!("negative band member {} in --shift", v[0]))?;
    Ok(BandTransform::Shift { dim, offset: v[1] })
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)
                .with_context(|| format!("Failed to write output file: {:?}", p))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_flags() {
        let cli = Cli::parse_from([
            "polylearn",
            "--interchange",
            "0,1",
            "--skew",
            "1,0,-2",
            "--shift",
            "0,-1",
            "--reverse",
            "1",
            "in.scop",
        ]);
        assert_eq!(
            band_transforms(&cli),
            vec![
                BandTransform::Interchange(0, 1),
                BandTransform::Skew { target: 1, source: 0, factor: -2 },
                BandTransform::Shift { dim: 0, offset: -1 },
                BandTransform::Reverse(1),
            ]
        );
        assert_eq!(scop_name(&cli.input), "in");
    }

    #[test]
    fn test_bad_flag_values() {
        assert!(parse_interchange("0").is_err());
        assert!(parse_skew("-1,0,1").is_err());
        assert!(parse_shift("0,x").is_err());
    }
}
