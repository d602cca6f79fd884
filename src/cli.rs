use clap::Parser;
use std::path::PathBuf;

use s3upload::utils::version;

#[derive(Parser, Debug)]
#[command(author, version = version(), about)]
pub struct Cli {
    /// Destination bucket, overrides `default_bucket` from config.toml
    #[arg(short, long, value_name = "BUCKET")]
    pub bucket: Option<String>,

    /// Credentials file to use instead of the `creds` data folder
    #[arg(short, long, value_name = "FILE")]
    pub creds: Option<PathBuf>,

    /// Credentials profile (file name in the `creds` data folder)
    #[arg(short, long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Print every snapshot as a JSON line instead of a progress bar
    #[arg(long)]
    pub json: bool,

    /// Files to upload
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
}
