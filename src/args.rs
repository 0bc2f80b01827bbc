use clap::{Parser, Subcommand};

const CMD_NAME: &str = "nmb";
const DEFAULT_QSUB: &str = "qsub";

/// Stores our command-line args format.
///
/// Every setting except the backend and model list is optional here,
/// so that values from the config file apply unless overridden.
#[derive(Parser, Debug)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Config file (YAML); defaults to nmbatch.yml in the current directory, if present
    #[arg(short, long, value_name = "FILE", global = true)]
    #[arg(env = "NMBATCH_CONFIG")]
    pub config: Option<String>,

    /// Print additional info (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print all debugging info
    #[arg(long, global = true)]
    pub debug: bool,

    /// Number of models to run at once
    #[arg(short, long, value_name = "N", global = true)]
    pub threads: Option<usize>,

    /// Clean up NONMEM files in the output directory, up to this level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub clean_lvl: Option<u8>,

    /// Copy NONMEM files back next to the model, up to this level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub copy_lvl: Option<u8>,

    /// Write a .gitignore for scratch files into each output directory
    #[arg(long, global = true)]
    pub git: bool,

    /// Replace output directories that already exist
    #[arg(long, global = true)]
    pub overwrite: bool,

    /// Only one estimation step per model
    #[arg(long, global = true)]
    pub one_est: bool,

    /// NONMEM executable to run, by name or path
    #[arg(long, value_name = "EXE", global = true)]
    pub nm_executable: Option<String>,

    /// Directory for cached NONMEM builds
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<String>,

    /// Name of the cached NONMEM build
    #[arg(long, value_name = "NAME", global = true)]
    pub cache_exe: Option<String>,

    /// Output directory, relative to each model ('{name}' is the model name)
    #[arg(short, long, value_name = "TEMPLATE", global = true)]
    pub output_dir: Option<String>,

    #[command(subcommand)]
    pub backend: BackendArgs,
}

/// Where models run.
#[derive(Subcommand, Debug)]
pub enum BackendArgs {
    /// Run models on this machine
    Local {
        /// Model files, directories, or sequences like run[001:006].mod
        #[arg(required = true, value_name = "MODELS")]
        models: Vec<String>,
    },
    /// Submit models to Sun Grid Engine
    Sge {
        /// Submission binary
        #[arg(long, value_name = "BIN", default_value = DEFAULT_QSUB)]
        qsub: String,

        /// Model files, directories, or sequences like run[001:006].mod
        #[arg(required = true, value_name = "MODELS")]
        models: Vec<String>,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_local() {
        let args = Args::parse_from(["nmb", "-vv", "--copy-lvl", "1", "local", "run001.mod", "."]);
        assert_eq!(2, args.verbose);
        assert_eq!(Some(1), args.copy_lvl);
        assert_eq!(None, args.clean_lvl);
        match args.backend {
            BackendArgs::Local { models } => assert_eq!(vec!["run001.mod", "."], models),
            other => panic!("wrong backend: {other:?}"),
        }
    }

    #[test]
    fn test_parse_sge() {
        let args = Args::parse_from(["nmb", "sge", "--threads", "8", "run[001:003].mod"]);
        assert_eq!(Some(8), args.threads);
        match args.backend {
            BackendArgs::Sge { qsub, models } => {
                assert_eq!("qsub", qsub);
                assert_eq!(vec!["run[001:003].mod"], models);
            }
            other => panic!("wrong backend: {other:?}"),
        }
    }

    #[test]
    fn test_models_required() {
        assert!(Args::try_parse_from(["nmb", "local"]).is_err());
    }
}
