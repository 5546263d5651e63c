use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rsftp",
    version,
    about = "Copy files and directory trees to and from a remote host over SFTP",
    long_about = "`rsftp` copies a single file or a whole directory tree between the local machine and a remote host, using the SFTP subsystem of an SSH server.

The last component of the source path is recreated inside the destination directory, which is created (including any missing parents) if needed. Existing files are overwritten.

EXAMPLES:
    # Upload a directory tree, authenticating with a password
    rsftp --host example.com -u me -p secret -r -s /home/me/proj -d /srv/backup

    # Download a single file, authenticating with a key pair
    rsftp --download --host example.com -u me --private-key ~/.ssh/id_ed25519 -s /srv/backup/notes.txt -d ."
)]
struct Args {
    // Transfer options
    /// Copy from the remote host to the local machine
    #[arg(long, conflicts_with = "upload", help_heading = "Transfer options")]
    download: bool,

    /// Copy from the local machine to the remote host (default)
    #[arg(long, help_heading = "Transfer options")]
    upload: bool,

    /// Descend into subdirectories; without it only the top level of a directory is copied
    #[arg(short, long, help_heading = "Transfer options")]
    recursive: bool,

    /// File or directory to copy
    #[arg(short, long, value_name = "PATH", help_heading = "Transfer options")]
    source: String,

    /// Directory that will receive the copy
    #[arg(short, long, value_name = "PATH", help_heading = "Transfer options")]
    destination: String,

    /// Exit on first error
    ///
    /// By default a failed file or directory is reported and the transfer moves on to the next
    /// entry; the exit status is non-zero either way.
    #[arg(short = 'e', long = "fail-early", help_heading = "Transfer options")]
    fail_early: bool,

    /// Bytes moved per read/write request, e.g. "32KiB" (max 255KiB)
    ///
    /// Each request must fit in one SFTP packet; 255KiB is the limit of OpenSSH's sftp-server.
    /// Use a smaller value for servers with a lower write limit.
    #[arg(
        long,
        default_value = "32KiB",
        value_name = "SIZE",
        help_heading = "Transfer options"
    )]
    chunk_size: bytesize::ByteSize,

    // Connection options
    /// Remote host name or address
    #[arg(long, help_heading = "Connection options")]
    host: String,

    /// Remote SSH port
    #[arg(long, default_value_t = remote::DEFAULT_PORT, help_heading = "Connection options")]
    port: u16,

    /// User to log in as
    #[arg(short, long, help_heading = "Connection options")]
    user: String,

    /// Password, or the passphrase of the private key when --private-key is given
    #[arg(short, long, help_heading = "Connection options")]
    password: Option<String>,

    /// Private key file for public key authentication
    #[arg(long, value_name = "PATH", help_heading = "Connection options")]
    private_key: Option<std::path::PathBuf>,

    /// Public key file, checked against --private-key
    #[arg(
        long,
        value_name = "PATH",
        requires = "private_key",
        help_heading = "Connection options"
    )]
    public_key: Option<std::path::PathBuf>,

    /// Seconds to wait for the SSH connection to be established
    #[arg(
        long,
        default_value = "15",
        value_name = "SEC",
        help_heading = "Connection options"
    )]
    conn_timeout_sec: u64,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Toggles the type of progress to show
    ///
    /// If specified, --progress flag is implied.
    ///
    /// Options are: `ProgressBar` (animated progress bar), `TextUpdates` (appropriate for logging), Auto (default, will
    /// choose between `ProgressBar` or `TextUpdates` depending on the type of terminal attached to stderr)
    #[arg(long, value_name = "TYPE", help_heading = "Progress & output")]
    progress_type: Option<common::ProgressType>,

    /// Sets the delay between progress updates
    ///
    /// - For the interactive (--progress-type=ProgressBar), the default is 200ms.
    /// - For the non-interactive (--progress-type=TextUpdates), the default is 10s.
    ///
    /// If specified, --progress flag is implied.
    ///
    /// This option accepts a human readable duration, e.g. "200ms", "10s", "5min" etc.
    #[arg(long, value_name = "DELAY", help_heading = "Progress & output")]
    progress_delay: Option<String>,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    /// Write a TRACE level log, including the SSH protocol exchange, to this file
    #[arg(long, value_name = "PATH", help_heading = "Progress & output")]
    debug_log_file: Option<std::path::PathBuf>,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,
}

impl Args {
    fn direction(&self) -> common::Direction {
        if self.download {
            common::Direction::Download
        } else {
            common::Direction::Upload
        }
    }

    fn session_config(&self) -> remote::SessionConfig {
        let auth = match &self.private_key {
            Some(private_key) => remote::AuthMethod::KeyPair {
                private_key: private_key.clone(),
                public_key: self.public_key.clone(),
                passphrase: self.password.clone(),
            },
            None => remote::AuthMethod::Password(self.password.clone().unwrap_or_default()),
        };
        remote::SessionConfig {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            auth,
            conn_timeout: std::time::Duration::from_secs(self.conn_timeout_sec),
        }
    }
}

#[instrument(skip(args))]
async fn async_main(args: Args) -> Result<common::Summary> {
    let direction = args.direction();
    let config =
        common::TransferConfig::new(direction, args.recursive, &args.source, &args.destination)?
            .with_fail_early(args.fail_early)
            .with_chunk_size(args.chunk_size.as_u64())?;
    let session_config = args.session_config();
    session_config.validate()?;
    let session = remote::connect(&session_config).await?;
    let local = common::LocalFs::new();
    let result = match direction {
        common::Direction::Upload => common::transfer(&local, session.fs(), &config).await,
        common::Direction::Download => common::transfer(session.fs(), &local, &config).await,
    };
    if let Err(error) = session.close().await {
        tracing::warn!("{:#}", &error);
    }
    match result {
        Ok(summary) => Ok(summary),
        Err(error) => {
            tracing::error!("{:#}", &error);
            if args.summary {
                return Err(anyhow!("{}\n\n{}", error, &error.summary));
            }
            Err(anyhow!("{}", error))
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let tracing = common::TracingConfig {
        debug_log_file: args.debug_log_file.clone(),
    };
    let res = common::run(
        if args.progress || args.progress_type.is_some() || args.progress_delay.is_some() {
            Some(common::ProgressSettings {
                progress_type: args.progress_type.unwrap_or_default(),
                progress_delay: args.progress_delay,
            })
        } else {
            None
        },
        output,
        runtime,
        tracing,
        func,
    );
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
