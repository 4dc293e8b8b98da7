use std::{
    ffi::OsStr,
    fs::File,
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
};

use located_error::*;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;
use serde::{Deserialize, Serialize};

mod error;
pub use error::ParserError;

/// kMLST: kmer-based Multi-Locus Sequence Typing
#[derive(Parser, Debug, Serialize, Deserialize)]
#[clap(name="kmlst", version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    ///Set the verbosity level (-v -vv -vvv)
    ///
    /// Set the verbosity level of this program. Multiple levels allowed {n}
    ///
    /// -v: Info  |  -vv: Debug  | -vvv: Trace {n}
    ///
    /// Note that the program will still output warnings by default, even when this flag is off.
    /// Use The --quiet/-q to disable them
    #[clap(short='v', long, parse(from_occurrences), global=true)]
    pub verbose: u8,

    /// Disable warnings.
    ///
    /// By default, warnings are emmited and redirected to the console, even when verbose mode is off.
    /// Use this argument to disable this. Only errors will be displayed.
    #[clap(short='q', long, global=true)]
    pub quiet: bool,

    #[clap(subcommand)]
    pub commands: Commands,
}

impl Cli {
    /// Serialize command line arguments within a `.yaml` file.
    ///
    /// # Behavior
    /// - File naming follows the convention '{current time}-{module name}.yaml'. current time
    ///   follows the format `YYYY`-`MM`-`DD`T`hhmmss`
    /// - File is written at the root of the user-provided `--output-dir` folder.
    ///
    /// # Errors
    /// Sends an unrecoverable error if `serde_yaml` fails to parse `Self` to a string.
    pub fn serialize(&self) -> Result<()> {
        use ParserError::SerializeArgs;

        // Parse arguments to yaml and print to console.
        let serialized = serde_yaml::to_string(&self).map_err(SerializeArgs)
            .loc("While serializing command line arguments")?;

        debug!("\n---- Command line args ----\n{}\n---", serialized);

        // Fetch the appropriate output-directory and parse the name of the output file.
        let current_time = chrono::offset::Local::now().format("%Y-%m-%dT%H%M%S").to_string();

        let output_file = match &self.commands {
            Commands::Call {common, ..} => {
                std::fs::create_dir_all(&common.output_dir)
                    .with_loc(|| format!("Unable to create output directory {}", common.output_dir.display()))?;
                common.output_dir.join(format!("{current_time}-call.yaml"))
            },
            Commands::FromYaml {..} => return Ok(()),
        };

        // Write arguments
        std::fs::write(&output_file, serialized)
            .with_loc(|| format!("Unable to serialize arguments into {}", output_file.display()))
    }

    /// Deserialize a `.yaml` file into Command line arguments.
    ///
    /// # Errors
    ///
    /// - Returns `FileNotFound` or `PermissionDenied` if the provided `.yaml` is invalid,
    ///   or does not carry read permissions
    /// - Sends an unrecoverable error if `serde_yaml` fails to parse the provided file to `Self`.
    pub fn deserialize(yaml: &Path) -> Result<Self> {
        use ParserError::DeserializeArgs;
        let loc_msg = || format!("While deserializing arguments from {}", yaml.display());
        let file = File::open(yaml).with_loc(loc_msg)?;
        serde_yaml::from_reader(file).map_err(DeserializeArgs).with_loc(loc_msg)
    }
}

#[derive(Subcommand, Debug, Serialize, Deserialize)]
pub enum Commands {
    /// Call MLST alleles from short-read sequencing samples.
    ///
    /// Count the canonical kmers of every provided sample against a precompiled
    /// typing database, vote for candidate alleles at each locus, and call the
    /// present allele (or reconstruct a novel one) per locus.
    Call {
        #[clap(flatten)]
        common: Common,
        #[clap(flatten)]
        call: Box<CallArgs>, // Box<T> to mitigate the large size difference between variants.
    },

    /// Run kmlst using a previously generated .yaml configuration file.
    ///
    /// This allows users to easily re-apply a kmlst command using the exact same parameters
    /// and arguments.
    FromYaml {
        yaml: PathBuf,
    },
}

#[derive(Parser, Debug, Default, Serialize, Deserialize)]
pub struct Common {
    /// Output directory where results will be written.
    ///
    /// Note that kmlst will create the specified directory if it is not present.
    #[clap(short, long, default_value("kmlst-output"))]
    pub output_dir: PathBuf,

    /// Overwrite existing output files.
    ///
    /// By default, kmlst does not allow itself from overwriting existing results files.
    /// Use this flag to force this behaviour.
    #[clap(short='w', long)]
    pub overwrite: bool,

    /// Number of worker threads used for per-locus allele calling.
    #[clap(short='@', long, default_value("1"))]
    pub threads: usize,
}

impl Common {
    /// Ensure the provided values are sane before running anything expensive.
    ///
    /// # Errors
    /// - `ParserError::InvalidThreadCount` when `--threads` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(ParserError::InvalidThreadCount).loc("While validating arguments")
        }
        Ok(())
    }
}

/// Call MLST alleles from short-read sequencing samples.
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug, Default, Serialize, Deserialize)]
pub struct CallArgs {
    /// Precompiled kmer typing database (gzip-compressed).
    #[clap(short='d', long, required(true), parse(try_from_os_str=valid_input_file))]
    pub db: PathBuf,

    /// Forward (or single-end) read files, one per sample. fastq / fastq.gz
    ///
    /// Sample names are derived from the file names, stripping the usual
    /// extensions and any trailing '_1' / '_R1' mate suffix.
    #[clap(short='1', long="forward", multiple_values(true), required(true))]
    pub forward: Vec<PathBuf>,

    /// Reverse read files, one per sample, in the same order as --forward.
    ///
    /// Optional. When provided, the number of files must match --forward.
    /// Note that no read-pairing logic is applied: both mates simply feed the
    /// same kmer count table.
    #[clap(short='2', long="reverse", multiple_values(true))]
    pub reverse: Vec<PathBuf>,

    /// Directory holding the per-locus allele FASTA files of the scheme.
    ///
    /// Defaults to the directory containing the database.
    #[clap(long)]
    pub fasta_dir: Option<PathBuf>,

    /// Minimal kmer depth required to consider a kmer position covered.
    #[clap(short='k', long, default_value("6"))]
    pub kmer_thr: u32,

    /// Maximal number of mutations allowed when reconstructing a novel allele
    /// from its closest template.
    #[clap(short='m', long, default_value("6"))]
    pub max_mutations: usize,

    /// Output the voting details (vote-only calls, per-allele votes, ties).
    #[clap(long)]
    pub output_votes: bool,

    /// Output a FASTA file with the sequences of special-case calls
    /// (novel alleles, multiple present alleles, low-coverage templates).
    #[clap(long)]
    pub output_special_cases: bool,
}

impl CallArgs {
    /// Ensure the provided values are sane before running anything expensive.
    ///
    /// # Errors
    /// - `ParserError::InvalidKmerThreshold` when `--kmer-thr` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.kmer_thr == 0 {
            return Err(ParserError::InvalidKmerThreshold).loc("While validating arguments")
        }
        Ok(())
    }

    /// Directory against which per-locus FASTA paths are resolved:
    /// `--fasta-dir` when provided, the database's parent directory otherwise.
    pub fn resolve_fasta_dir(&self) -> PathBuf {
        match &self.fasta_dir {
            Some(dir) => dir.clone(),
            None      => self.db.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
        }
    }
}

/// Simple enum discriminating files from directories within error messages.
#[derive(Debug, Clone, Copy)]
pub enum FileEntity {
    File,
    Directory,
}

impl Display for FileEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::File      => write!(f, "File"),
            Self::Directory => write!(f, "Directory"),
        }
    }
}

/// clap validator: ensure the provided path exists and points to a file.
fn valid_input_file(os_str: &OsStr) -> Result<PathBuf, String> {
    let path = PathBuf::from(os_str);
    if !path.exists() {
        return Err(ParserError::MissingFileEntity(FileEntity::File, path.display().to_string()).to_string())
    }
    if !path.is_file() {
        return Err(ParserError::InvalidFileEntity(FileEntity::File, path.display().to_string()).to_string())
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_cli(output_dir: &Path) -> Cli {
        Cli {
            verbose: 2,
            quiet: false,
            commands: Commands::Call {
                common: Common {
                    output_dir: output_dir.to_path_buf(),
                    overwrite: true,
                    threads: 2,
                },
                call: Box::new(CallArgs {
                    db: PathBuf::from("scheme.db"),
                    forward: vec![PathBuf::from("toy_1.fq")],
                    reverse: vec![PathBuf::from("toy_2.fq")],
                    fasta_dir: None,
                    kmer_thr: 6,
                    max_mutations: 6,
                    output_votes: true,
                    output_special_cases: false,
                }),
            },
        }
    }

    #[test]
    fn yaml_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cli = mock_cli(dir.path());
        cli.serialize()?;

        let yaml = std::fs::read_dir(dir.path())?
            .map(|entry| entry.unwrap().path())
            .find(|path| path.extension() == Some(OsStr::new("yaml")))
            .expect("No serialized yaml file");

        let reloaded = Cli::deserialize(&yaml)?;
        let Commands::Call { common, call } = reloaded.commands else {
            panic!("Deserialized into the wrong subcommand")
        };
        assert_eq!(common.threads, 2);
        assert_eq!(call.kmer_thr, 6);
        assert_eq!(call.forward, vec![PathBuf::from("toy_1.fq")]);
        Ok(())
    }

    #[test]
    fn fasta_dir_defaults_to_db_parent() {
        let mut args = CallArgs { db: PathBuf::from("/schemes/senterica/scheme.db"), ..Default::default() };
        assert_eq!(args.resolve_fasta_dir(), PathBuf::from("/schemes/senterica"));

        args.fasta_dir = Some(PathBuf::from("/elsewhere"));
        assert_eq!(args.resolve_fasta_dir(), PathBuf::from("/elsewhere"));
    }

    #[test]
    fn zero_threads_is_invalid() {
        let common = Common { threads: 0, ..Default::default() };
        assert!(common.validate().is_err());
    }

    #[test]
    fn zero_kmer_thr_is_invalid() {
        let call = CallArgs { kmer_thr: 0, ..Default::default() };
        assert!(call.validate().is_err());
    }

    #[test]
    fn input_file_validator() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scheme.db");

        assert!(valid_input_file(path.as_os_str()).is_err());     // missing
        std::fs::write(&path, "db")?;
        assert!(valid_input_file(path.as_os_str()).is_ok());      // file
        assert!(valid_input_file(dir.path().as_os_str()).is_err()); // directory
        Ok(())
    }
}
