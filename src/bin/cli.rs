// src/bin/cli.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Command line front end for `S3Hook`.
//!
//! Examples:
//! ```bash
//! s3hook check-bucket   my-bucket
//! s3hook list-keys      my-bucket --prefix data/ --delimiter /
//! s3hook read-key       s3://my-bucket/data/file.csv
//! s3hook put            s3://my-bucket/data/new.csv --file ./new.csv --replace
//! s3hook delete         data/a.csv data/b.csv --bucket my-bucket
//! s3hook wildcard       's3://my-bucket/data/*.csv'
//!
//! # Omitting the bucket falls back to the connection's default bucket:
//! S3HOOK_CONN_AWS_DEFAULT_BUCKET=my-bucket s3hook list-prefixes --delimiter /
//! ```

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use s3hook::{
    EnvConnectionResolver, HookConfig, ListOptions, PutOptions, S3Hook, SelectRequest,
};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    /// Connection id to resolve (defaults to S3HOOK_CONN_ID, then aws_default).
    #[arg(long = "conn-id", value_name = "ID")]
    conn_id: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args)]
struct ListArgs {
    /// Bucket name; the connection's default bucket when omitted.
    bucket: Option<String>,

    #[arg(long, default_value = "")]
    prefix: String,

    #[arg(long, default_value = "")]
    delimiter: String,

    #[arg(long = "page-size")]
    page_size: Option<usize>,

    #[arg(long = "max-items")]
    max_items: Option<usize>,
}

impl ListArgs {
    fn options(&self) -> ListOptions {
        let mut opts = ListOptions::new()
            .prefix(&self.prefix)
            .delimiter(&self.delimiter);
        opts.page_size = self.page_size;
        opts.max_items = self.max_items;
        opts
    }
}

#[derive(Subcommand)]
enum Command {
    /// Exit 0 if the bucket exists, 1 otherwise.
    CheckBucket {
        bucket: Option<String>,
    },

    /// Create a bucket in the given region (client region by default).
    CreateBucket {
        bucket: Option<String>,

        #[arg(long)]
        region: Option<String>,
    },

    /// Delete a bucket; `--force` removes its objects first.
    DeleteBucket {
        bucket: Option<String>,

        #[arg(short, long)]
        force: bool,
    },

    /// List object keys.
    ListKeys(ListArgs),

    /// List common prefixes.
    ListPrefixes(ListArgs),

    /// Exit 0 if the key exists, 1 otherwise. KEY may be a full s3:// URL.
    CheckKey {
        key: String,

        #[arg(long)]
        bucket: Option<String>,
    },

    /// Print an object's body as UTF-8.
    ReadKey {
        key: String,

        #[arg(long)]
        bucket: Option<String>,
    },

    /// Run an S3 Select expression against one object.
    Select {
        key: String,

        #[arg(long)]
        bucket: Option<String>,

        #[arg(short, long, default_value = s3hook::constants::DEFAULT_SELECT_EXPRESSION)]
        expression: String,
    },

    /// Upload a local file or a literal string.
    Put {
        key: String,

        #[arg(long)]
        bucket: Option<String>,

        #[arg(long, conflicts_with = "string")]
        file: Option<PathBuf>,

        #[arg(long)]
        string: Option<String>,

        /// Overwrite an existing object.
        #[arg(long)]
        replace: bool,

        /// Request AES256 server-side encryption.
        #[arg(long)]
        encrypt: bool,
    },

    /// Download an object into DIR (system temp dir by default) and print the path.
    Download {
        key: String,

        #[arg(long)]
        bucket: Option<String>,

        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Delete keys in batches; failed keys are reported together.
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,

        #[arg(long)]
        bucket: Option<String>,
    },

    /// Print the first key matching a `*` pattern.
    Wildcard {
        pattern: String,

        #[arg(long)]
        bucket: Option<String>,

        #[arg(long, default_value = "")]
        delimiter: String,
    },
}

fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = HookConfig::from_env();
    if let Some(id) = cli.conn_id {
        config.conn_id = id;
    }
    info!("Using connection '{}'", config.conn_id);
    let hook = S3Hook::new(config, Arc::new(EnvConnectionResolver::new()))?;

    match cli.cmd {
        Command::CheckBucket { bucket } => {
            if !hook.check_for_bucket(bucket.as_deref())? {
                std::process::exit(1);
            }
        }

        Command::CreateBucket { bucket, region } => {
            hook.create_bucket(bucket.as_deref(), region.as_deref())?;
            safe_println!("Created bucket");
        }

        Command::DeleteBucket { bucket, force } => {
            hook.delete_bucket(bucket.as_deref(), force)?;
            safe_println!("Deleted bucket");
        }

        Command::ListKeys(args) => {
            for key in hook.list_keys(args.bucket.as_deref(), &args.options())? {
                safe_println!("{}", key);
            }
        }

        Command::ListPrefixes(args) => {
            for prefix in hook.list_prefixes(args.bucket.as_deref(), &args.options())? {
                safe_println!("{}", prefix);
            }
        }

        Command::CheckKey { key, bucket } => {
            if !hook.check_for_key(&key, bucket.as_deref())? {
                std::process::exit(1);
            }
        }

        Command::ReadKey { key, bucket } => {
            let body = hook.read_key(&key, bucket.as_deref())?;
            safe_println!("{}", body);
        }

        Command::Select { key, bucket, expression } => {
            let out = hook.select_key(&key, bucket.as_deref(), &SelectRequest::new(expression))?;
            safe_println!("{}", out);
        }

        Command::Put { key, bucket, file, string, replace, encrypt } => {
            let opts = PutOptions { replace, encrypt };
            match (file, string) {
                (Some(path), None) => hook
                    .load_file(&path, &key, bucket.as_deref(), opts)
                    .with_context(|| format!("uploading {}", path.display()))?,
                (None, Some(data)) => hook.load_string(&data, &key, bucket.as_deref(), opts)?,
                _ => bail!("put needs exactly one of --file or --string"),
            }
            safe_println!("Uploaded {}", key);
        }

        Command::Download { key, bucket, dir } => {
            let path = hook.download_file(&key, bucket.as_deref(), dir.as_deref())?;
            safe_println!("{}", path.display());
        }

        Command::Delete { keys, bucket } => {
            hook.delete_objects(bucket.as_deref(), &keys)?;
            safe_println!("Deleted {} object(s)", keys.len());
        }

        Command::Wildcard { pattern, bucket, delimiter } => {
            match hook.get_wildcard_key(&pattern, bucket.as_deref(), &delimiter)? {
                Some(obj) => safe_println!("s3://{}/{}\t{}", obj.bucket, obj.key, obj.size),
                None => std::process::exit(1),
            }
        }
    }

    Ok(())
}
