use crate::{
    constants::*, error::MnvxError, io::vcf_writer::OutputType, utils::util::file_name_or_path,
};
use chrono::Datelike;
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

type ArgResult<T> = std::result::Result<T, MnvxError>;

/// Full version string including the crate version and git description.
///
/// # Examples
/// * `0.1.0-1ba958a-dirty` - while on a dirty branch
/// * `0.1.0-1ba958a` - with a fresh commit
pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    let git_describe = env!("VERGEN_GIT_DESCRIBE");
    if git_describe.is_empty() {
        env!("CARGO_PKG_VERSION").to_string()
    } else {
        format!("{}-{}", env!("CARGO_PKG_VERSION"), git_describe)
    }
});

#[derive(Parser, Debug)]
#[command(name="mnvx",
          version=&**FULL_VERSION,
          propagate_version = true,
          about="Rebuilds multi-nucleotide variants from phased adjacent SNVs",
          long_about = None,
          after_help = format!("Copyright (C) 2021-{}
          This program comes with ABSOLUTELY NO WARRANTY.", chrono::Utc::now().year()),
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true
    )]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write BED windows of adjacent SNVs for the phasing tool
    GenerateBed(GenerateBedArgs),
    /// Merge phased adjacent SNVs into MNV records
    MergeMnvs(MergeMnvsArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GenerateBed(_) => "generate-bed",
            Command::MergeMnvs(_) => "merge-mnvs",
        }
    }
}

#[derive(Args, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct GenerateBedArgs {
    /// Input VCF of SNV calls, sorted by position
    #[arg(
        short = 'f',
        long = "vcfin",
        value_name = "VCF",
        value_parser = check_file_exists
    )]
    pub vcfin: PathBuf,

    /// Write BED output to a file [default: standard output]
    #[arg(
        short = 'o',
        long = "output",
        value_name = "BED",
        value_parser = check_prefix_path
    )]
    pub output: Option<PathBuf>,

    /// Mark homozygous adjacent SNVs in the BED output
    #[arg(long = "markhz", default_value_t = DEFAULT_MARK_HOMOZYGOUS)]
    pub mark_homozygous: bool,

    /// Sample whose genotype decides zygosity with --markhz
    #[arg(
        long = "sample",
        value_name = "NAME",
        default_value = DEFAULT_ZYGOSITY_SAMPLE,
        help_heading = "Advanced"
    )]
    pub sample: String,
}

#[derive(Args, Debug, Clone)]
#[command(arg_required_else_help(true))]
pub struct MergeMnvsArgs {
    /// Input VCF of SNV calls, sorted by position
    #[arg(
        short = 'f',
        long = "vcfin",
        value_name = "VCF",
        value_parser = check_file_exists
    )]
    pub vcfin: PathBuf,

    /// Output VCF with MNVs merged
    #[arg(
        short = 'o',
        long = "output",
        value_name = "VCF",
        default_value = DEFAULT_MERGED_OUTPUT,
        value_parser = check_prefix_path
    )]
    pub output: PathBuf,

    /// Phasing report for the candidate regions
    #[arg(
        short = 'p',
        long = "smart-phased-output",
        value_name = "REPORT",
        value_parser = check_file_exists
    )]
    pub smart_phased_output: PathBuf,

    /// Exclude any MNVs with a phased score < cutoff
    #[arg(
        short = 'c',
        long = "cutoff",
        value_name = "FLOAT",
        default_value_t = DEFAULT_CUTOFF,
        value_parser = cutoff_in_range
    )]
    pub cutoff: f64,

    /// Exclude phased MNV if it matches any of the exclude flag bits
    #[arg(
        short = 'x',
        long = "exclude",
        value_name = "INT",
        default_value_t = DEFAULT_EXCLUDE_FLAGS
    )]
    pub exclude: u32,

    /// BED of adjacent SNVs; entries marked 'hom' are merged without phasing evidence
    #[arg(
        short = 'b',
        long = "bed",
        value_name = "BED",
        value_parser = check_file_exists
    )]
    pub bed: Option<PathBuf>,

    /// Output type: u|b|v|z, u/b: un/compressed BCF, v/z: un/compressed VCF
    #[arg(
        short = 'O',
        long = "output-type",
        value_name = "OUTPUT_TYPE",
        value_parser = validate_output_type,
        help_heading = "Advanced"
    )]
    pub output_type: Option<OutputType>,
}

impl MergeMnvsArgs {
    /// Arguments as `key=value` pairs for the provenance header line; paths are reduced to
    /// their file name.
    pub fn arg_string(&self) -> String {
        let mut pairs = vec![
            format!("vcfin={}", file_name_or_path(&self.vcfin)),
            format!("output={}", file_name_or_path(&self.output)),
            format!(
                "smart_phased_output={}",
                file_name_or_path(&self.smart_phased_output)
            ),
            format!("cutoff={}", self.cutoff),
            format!("exclude={}", self.exclude),
        ];
        if let Some(bed) = &self.bed {
            pairs.push(format!("bed={}", file_name_or_path(bed)));
        }
        if let Some(output_type) = &self.output_type {
            pairs.push(format!("output_type={}", output_type_code(output_type)));
        }
        pairs.join(",")
    }
}

fn output_type_code(output_type: &OutputType) -> &'static str {
    match output_type {
        OutputType::Bcf {
            is_uncompressed: true,
        } => "u",
        OutputType::Bcf {
            is_uncompressed: false,
        } => "b",
        OutputType::Vcf {
            is_uncompressed: true,
        } => "v",
        OutputType::Vcf {
            is_uncompressed: false,
        } => "z",
    }
}

/// Initializes the verbosity level for logging based on the command-line arguments.
///
/// Sets up the logger with a specific verbosity level that is determined
/// by the number of occurrences of the `-v` or `--verbose` flag in the command-line arguments.
pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.module_path().unwrap_or("unknown_module"),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

/// Checks if the provided file path exists.
fn check_file_exists(s: &str) -> ArgResult<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        return Err(crate::mnvx_error!("File does not exist: {}", path.display()));
    }
    Ok(path.to_path_buf())
}

fn check_prefix_path(s: &str) -> ArgResult<PathBuf> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(crate::mnvx_error!(
                "Path does not exist: {}",
                parent_dir.display()
            ));
        }
    }
    Ok(path.to_path_buf())
}

fn cutoff_in_range(s: &str) -> ArgResult<f64> {
    let cutoff: f64 = s
        .parse::<f64>()
        .map_err(|_| crate::mnvx_error!("`{}` is not a valid cutoff", s))?;
    if !cutoff.is_finite() {
        return Err(crate::mnvx_error!("Cutoff must be a finite number"));
    }
    Ok(cutoff)
}

fn validate_output_type(s: &str) -> ArgResult<OutputType> {
    match s {
        "u" => Ok(OutputType::Bcf {
            is_uncompressed: true,
        }),
        "v" => Ok(OutputType::Vcf {
            is_uncompressed: true,
        }),
        "b" => Ok(OutputType::Bcf {
            is_uncompressed: false,
        }),
        "z" => Ok(OutputType::Vcf {
            is_uncompressed: false,
        }),
        _ => Err(crate::mnvx_error!(
            "Invalid output type: {}. Must be one of u, b, v, z.",
            s
        )),
    }
}
