use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use satchel_core::CodecId;

#[derive(Parser, Debug)]
#[command(author, version, about = "satchel: edit archives held in a blob store", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// JSON configuration file (store backend and engine settings)
    #[arg(long, global = true, env = "SATCHEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory of a local blob store; overrides the configured store
    #[arg(long, global = true, env = "SATCHEL_STORE_ROOT")]
    pub store_root: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecArg {
    Store,
    Zstd,
}

impl From<CodecArg> for CodecId {
    fn from(c: CodecArg) -> Self {
        match c {
            CodecArg::Store => CodecId::Store,
            CodecArg::Zstd => CodecId::Zstd,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pack a directory into an archive file on disk
    Pack {
        dir: PathBuf,
        out: PathBuf,
        #[arg(long)]
        deterministic: bool,
        #[arg(long, value_enum, default_value_t = CodecArg::Zstd)]
        codec: CodecArg,
    },

    /// Publish a directory (packed on the fly) or an archive file under a new key
    Upload {
        source: PathBuf,
        #[arg(long)]
        deterministic: bool,
    },

    /// List entries of an archive
    Ls {
        key: String,
        #[arg(long, default_value = "")]
        prefix: String,
        /// show size, mode and mtime
        #[arg(long)]
        long: bool,
    },

    /// Print one entry to stdout
    Cat { key: String, path: String },

    /// Print archive statistics as JSON
    Stat { key: String },

    /// Apply a JSON batch of {file, action, content} instructions ("-" reads stdin)
    Apply {
        key: String,
        batch: String,
        /// only apply if the archive is still at this generation
        #[arg(long = "if-match")]
        if_match: Option<String>,
    },

    /// Create an entry; an existing entry is left untouched
    Create {
        key: String,
        path: String,
        #[arg(long, default_value = "")]
        content: String,
    },

    /// Replace an entry's content ("-" reads stdin)
    Edit {
        key: String,
        path: String,
        content: String,
    },

    /// Append to an entry ("-" reads stdin)
    Append {
        key: String,
        path: String,
        content: String,
    },

    /// Delete an entry; deleting a missing entry succeeds
    Rm { key: String, path: String },

    /// Extract all entries below a destination directory
    Extract { key: String, dest: PathBuf },

    /// Remove an archive from the store
    Remove { key: String },

    /// Serve tool calls as JSON lines on stdin/stdout
    Tools {
        /// print the tool descriptors and exit
        #[arg(long)]
        describe: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_apply_with_precondition() {
        let cli = Cli::try_parse_from([
            "satchelctl",
            "--store-root",
            "/tmp/blobs",
            "apply",
            "k.sat",
            "-",
            "--if-match",
            "abc",
        ])
        .unwrap();
        assert_eq!(cli.global.store_root, Some(PathBuf::from("/tmp/blobs")));
        match cli.command {
            Commands::Apply {
                key,
                batch,
                if_match,
            } => {
                assert_eq!(key, "k.sat");
                assert_eq!(batch, "-");
                assert_eq!(if_match.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn pack_codec_defaults_to_zstd() {
        let cli = Cli::try_parse_from(["satchelctl", "pack", "src", "out.sat"]).unwrap();
        match cli.command {
            Commands::Pack { codec, .. } => assert_eq!(CodecId::from(codec), CodecId::Zstd),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
