//! duplex-ftp interactive client

use clap::Parser;
use log::error;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use duplex_ftp::FtpClient;
use duplex_ftp::error::ClientError;

#[derive(Parser, Debug)]
#[command(name = "duplex-ftp-client", about = "Interactive active-mode FTP client.")]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server control port
    #[arg(short, long, default_value_t = 2121)]
    port: u16,

    #[arg(short, long)]
    user: String,

    #[arg(long)]
    password: String,

    /// Seconds to wait for the server to open each data connection
    #[arg(long, default_value_t = 10)]
    accept_timeout: u64,
}

const HELP: &str = "commands: ls [path] | download <remote> <local> | upload <local> <remote> | quit";

fn prompt() {
    print!("ftp> ");
    let _ = std::io::stdout().flush();
}

/// Runs one console line. Returns `false` once the user asked to quit.
async fn execute(client: &mut FtpClient, line: &str) -> Result<bool, ClientError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => {}
        ["ls" | "list"] => print_listing(client.list(None).await?),
        ["ls" | "list", path] => print_listing(client.list(Some(*path)).await?),
        ["download", remote, local] => {
            let bytes = client.download(remote, Path::new(local)).await?;
            println!("{} bytes received", bytes);
        }
        ["upload", local, remote] => {
            let bytes = client.upload(Path::new(local), remote).await?;
            println!("{} bytes sent", bytes);
        }
        ["quit" | "exit"] => return Ok(false),
        _ => println!("{}", HELP),
    }
    Ok(true)
}

fn print_listing(entries: Vec<String>) {
    for entry in entries {
        println!("{}", entry);
    }
}

async fn run(args: Args) -> Result<(), ClientError> {
    let mut client = FtpClient::connect((args.host.as_str(), args.port))
        .await?
        .with_accept_timeout(Duration::from_secs(args.accept_timeout));
    client.login(&args.user, &args.password).await?;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        match execute(&mut client, line.trim()).await {
            Ok(true) => {}
            Ok(false) => break,
            // Server refusals leave the session usable.
            Err(ClientError::UnexpectedReply { code, text }) => {
                println!("{} {}", code, text);
            }
            Err(e) => return Err(e),
        }
        prompt();
    }

    client.quit().await
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
