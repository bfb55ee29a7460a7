use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::pack::PackOptions;

#[derive(Parser, Debug)]
#[command(name = "storezip")]
#[command(version)]
#[command(about = "Build and check uncompressed ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  storezip pack -o site.zip public/          archive a directory tree\n  \
  storezip pack -o logs.zip logs -x '*.tmp'  skip temporary files\n  \
  storezip list -v site.zip                  show sizes and CRCs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Print debug logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an archive from files and directories
    Pack(PackArgs),

    /// List files in an archive
    List {
        /// ZIP file path
        #[arg(value_name = "ZIPFILE")]
        archive: PathBuf,

        /// List verbosely
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Test the CRC of every entry in an archive
    Test {
        /// ZIP file path
        #[arg(value_name = "ZIPFILE")]
        archive: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Archive to write
    #[arg(short = 'o', long = "output", value_name = "ZIPFILE")]
    pub output: PathBuf,

    /// Files and directories to add
    #[arg(value_name = "INPUTS", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "PATTERN", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Junk paths (store file names only)
    #[arg(short = 'j')]
    pub junk_paths: bool,
}

impl PackArgs {
    pub fn options(&self) -> PackOptions {
        PackOptions {
            junk_paths: self.junk_paths,
            exclude: self.exclude.clone(),
        }
    }
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.is_very_quiet() {
            "off"
        } else if self.is_quiet() {
            "error"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pack() {
        let cli = Cli::parse_from(["storezip", "pack", "-o", "out.zip", "a", "b", "-j"]);
        match &cli.command {
            Command::Pack(args) => {
                assert_eq!(args.output, PathBuf::from("out.zip"));
                assert_eq!(args.inputs, [PathBuf::from("a"), PathBuf::from("b")]);
                assert!(args.options().junk_paths);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn pack_requires_inputs() {
        assert!(Cli::try_parse_from(["storezip", "pack", "-o", "out.zip"]).is_err());
    }

    #[test]
    fn global_flags() {
        let cli = Cli::parse_from(["storezip", "list", "-v", "a.zip", "-qq"]);
        assert!(cli.is_very_quiet());
        assert_eq!(cli.log_filter(), "off");

        let cli = Cli::parse_from(["storezip", "--debug", "test", "a.zip"]);
        assert_eq!(cli.log_filter(), "debug");
        assert!(matches!(cli.command, Command::Test { .. }));
    }
}
