use anyhow::Result;
use clap::{Parser, Subcommand};
mod auth;
mod telemetry;
use filecrypt::{CodecError, Filecrypt, Storage, format};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, clap::Args)]
struct OutputArgs {
    /// Path to the file to read
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Save the result to this file instead of printing it
    #[arg(short, long = "new-file", value_name = "NEW_FILE")]
    new_file: Option<PathBuf>,

    /// Replace NEW_FILE if it already exists
    #[arg(short, long = "overwrite", default_value_t = false)]
    overwrite: bool,
}

impl OutputArgs {
    /// Runs the safety checks before any key handling or crypto.
    fn resolve(&self) -> Result<(Storage, Option<Storage>)> {
        let source = Storage::new(self.file.clone());
        source.check_source()?;

        let destination = self.new_file.clone().map(Storage::new);
        if let Some(dest) = &destination {
            dest.check_destination(self.overwrite)?;
        }

        Ok((source, destination))
    }
}

#[derive(Debug, Parser)]
#[command(name = "filecrypt")]
#[command(
    version,
    about = "Encrypt and decrypt files into tamper-evident tokens for storing them remotely."
)]
struct Cli {
    /// url-safe base64 key (32 bytes)
    #[arg(
        short,
        long,
        global = true,
        value_name = "KEY",
        env = "FILECRYPT_KEY",
        hide_env_values = true
    )]
    key: Option<String>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Encrypts a file into token text
    #[command(arg_required_else_help = true)]
    Encrypt {
        #[command(flatten)]
        io: OutputArgs,
    },

    /// Decrypts a file holding token text
    #[command(arg_required_else_help = true)]
    Decrypt {
        #[command(flatten)]
        io: OutputArgs,

        /// Reject tokens older than this many seconds
        #[arg(long, value_name = "SECONDS", env = "FILECRYPT_TTL")]
        ttl: Option<u64>,
    },

    /// Shows the unauthenticated header of a token file; needs no key
    #[command(arg_required_else_help = true)]
    Inspect {
        /// Path to the token file
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,
    },
}

fn emit(destination: Option<&Storage>, data: &[u8]) -> Result<()> {
    match destination {
        Some(dest) => {
            dest.save(data)?;
            tracing::info!(path = %dest.path().display(), bytes = data.len(), "output written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    telemetry::init(args.verbose);

    match args.command {
        Commands::Encrypt { io } => {
            let (source, destination) = io.resolve()?;
            let fc = Filecrypt::new(auth::read_key(args.key)?);

            let token = fc.encrypt_file(&source)?;
            match destination {
                Some(dest) => emit(Some(&dest), token.as_bytes())?,
                None => println!("{token}"),
            }
        }
        Commands::Decrypt { io, ttl } => {
            let (source, destination) = io.resolve()?;
            let fc = Filecrypt::new(auth::read_key(args.key)?);

            let plaintext = fc.decrypt_file(&source, ttl)?;
            emit(destination.as_ref(), &plaintext)?;
        }
        Commands::Inspect { file } => {
            let source = Storage::new(file);
            source.check_source()?;
            let data = source.load()?;
            let text = std::str::from_utf8(&data).map_err(|_| CodecError::Malformed)?;
            let token = format::decode(text)?;

            let issued = token
                .issued_at()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "out of range".to_string());
            let iv = token
                .iv()
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<String>();

            println!("version     0x{:02x}", token.version());
            println!("issued      {issued} ({})", token.timestamp());
            println!("iv          {iv}");
            println!("ciphertext  {} bytes", token.ciphertext().len());
            println!("unauthenticated: decrypt with the key to verify");
        }
    }

    Ok(())
}
