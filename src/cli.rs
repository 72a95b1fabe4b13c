use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use thiserror::Error;

use warc::EnvelopeConfig;

#[derive(Parser)]
#[command(name = "weavebox")]
#[command(about = "Encrypted file bundles for a single recipient, published as chunked blobs")]
#[command(author, version, long_about = None)]
pub struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Seal files and directories into an artifact
    Pack {
        /// Files or directories to include
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Recipient public key (PEM)
        #[arg(long, value_name = "PUB.pem")]
        to: PathBuf,

        /// Defaults to the name of the first path
        #[arg(long)]
        title: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long, default_value = "")]
        memo: String,

        /// Where to write the artifact
        #[arg(long)]
        out: PathBuf,
    },

    /// Decrypt an artifact file into a directory
    Unpack {
        file: PathBuf,

        /// Recipient private key (PEM)
        #[arg(long, value_name = "PRIV.pem")]
        key: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// Show the manifest of an artifact file
    List {
        file: PathBuf,

        /// Recipient private key (PEM)
        #[arg(long, value_name = "PRIV.pem")]
        key: PathBuf,
    },

    /// Publish an artifact file to the store
    Push {
        file: PathBuf,

        /// Public key of the recipient the artifact was sealed for
        #[arg(long, value_name = "PUB.pem")]
        owner: PathBuf,
    },

    /// Fetch a published artifact and unpack it
    Fetch {
        /// Blob id printed by push
        id: String,

        /// Recipient private key (PEM)
        #[arg(long, value_name = "PRIV.pem")]
        key: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Sqlite file backing the blob store
    pub store: PathBuf,

    /// Bytes discovery hands over with each descriptor
    pub leading_chunk: usize,

    pub follow_links: bool,
    pub app_tag: String,

    pub envelope: EnvelopeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: PathBuf::from("weavebox.sqlite"),
            leading_chunk: 256 * 1024,
            follow_links: false,
            app_tag: "weavebox-v0".to_string(),
            envelope: EnvelopeConfig::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
    #[error("no artifact {0} for this key")]
    NotFound(String),
    #[error("refusing to write {0} outside of the output directory")]
    UnsafePath(String),
    #[error("artifact is not complete")]
    Incomplete,
}

pub fn parse_config(text: &str) -> Result<Config, CliError> {
    Ok(toml::from_str(text)?)
}

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

pub fn format_size(size: u64) -> String {
    if size < KB {
        format!("{}B", size)
    } else if size < MB {
        format!("{:.2}KB", size as f64 / KB as f64)
    } else {
        format!("{:.2}MB", size as f64 / MB as f64)
    }
}
