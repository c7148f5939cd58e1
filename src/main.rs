use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use dir_fuzz_rs::aggregator;
use dir_fuzz_rs::classify::StatusPolicy;
use dir_fuzz_rs::config::{Config, OutputFormat, DEFAULT_USER_AGENT};
use dir_fuzz_rs::progress::Console;
use dir_fuzz_rs::types::{format_elapsed, RunResult};
use dir_fuzz_rs::{scanner, wordlist, FuzzError};

/// dir-fuzz-rs — probe a web server for paths from a wordlist.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dir-fuzz-rs",
    version,
    about = "Fast async HTTP path fuzzer: probe wordlist candidates against a web server.",
    long_about = None
)]
struct Cli {
    /// Target base URL, e.g. http://10.0.0.5/app
    #[arg(short = 'u', long)]
    url: String,

    /// Wordlist file, one keyword per line (`#` comments and blank lines are skipped).
    #[arg(short = 'w', long)]
    wordlist: PathBuf,

    /// Max concurrent requests.
    #[arg(short = 't', long, default_value_t = 10)]
    threads: usize,

    /// Extensions to append to every keyword, comma separated (php,html).
    #[arg(short = 'x', long, value_delimiter = ',')]
    extensions: Vec<String>,

    /// Write hits to this file after the run (overwrites).
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Write the output file as JSON instead of plain lines.
    #[arg(long, default_value_t = false, requires = "output")]
    json: bool,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Print failed requests and debug logging.
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// User-Agent header sent with every request.
    #[arg(long = "user-agent", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Only report these status codes (comma separated) instead of everything but 404.
    #[arg(short = 's', long = "status-codes", value_delimiter = ',')]
    status_codes: Vec<u16>,

    /// Do not draw the progress bar.
    #[arg(long = "no-progress", default_value_t = false)]
    no_progress: bool,
}

impl Cli {
    fn to_config(&self) -> Config {
        let mut cfg = Config::new(self.url.clone(), self.wordlist.clone());
        cfg.concurrency = self.threads;
        cfg.extensions = wordlist::normalize_extensions(&self.extensions);
        cfg.timeout = Duration::from_secs(self.timeout);
        cfg.verbose = self.verbose;
        cfg.output = self.output.clone();
        cfg.output_format = if self.json { OutputFormat::Json } else { OutputFormat::Lines };
        cfg.user_agent = self.user_agent.clone();
        if !self.status_codes.is_empty() {
            cfg.status_policy = StatusPolicy::Only(self.status_codes.clone());
        }
        cfg.show_progress = !self.no_progress;
        cfg
    }
}

fn init_tracing(verbose: bool, console: Console) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(console)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = cli.to_config();
    let console = Console::stdout(config.show_progress);
    init_tracing(cli.verbose, console.clone());

    match run(&config, console).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            if e.downcast_ref::<FuzzError>().is_some_and(FuzzError::is_usage_error) {
                eprintln!();
                let _ = Cli::command().print_help();
            }
            ExitCode::FAILURE
        }
    }
}

/// The first interrupt cancels the run; a second one calls `force_quit`.
async fn watch_interrupts<S, F>(mut next_signal: S, cancel: CancellationToken, force_quit: impl FnOnce())
where
    S: FnMut() -> F,
    F: Future<Output = io::Result<()>>,
{
    if next_signal().await.is_err() {
        return;
    }
    cancel.cancel();
    warn!("interrupted, waiting for in-flight requests (Ctrl-C again to quit now)");
    if next_signal().await.is_ok() {
        force_quit();
    }
}

async fn run(config: &Config, console: Console) -> Result<()> {
    config.validate()?;
    print_banner(config);

    // Partial results are still reported below after an interrupt.
    let cancel = CancellationToken::new();
    tokio::spawn(watch_interrupts(tokio::signal::ctrl_c, cancel.clone(), || {
        std::process::exit(130);
    }));

    let results = scanner::run(config, console, cancel).await?;
    print_summary(&results);

    if let Some(path) = config.output.as_deref() {
        let written = match config.output_format {
            OutputFormat::Lines => aggregator::write_lines(path, &results),
            OutputFormat::Json => aggregator::write_json(path, &results),
        };
        match written {
            Ok(()) => println!("Results saved to {}", path.display()),
            Err(e) => warn!("failed to write results to {}: {e:#}", path.display()),
        }
    }
    Ok(())
}

fn print_banner(config: &Config) {
    println!("=======================================");
    println!("{}", format!("dir-fuzz-rs v{}", env!("CARGO_PKG_VERSION")).cyan());
    println!("=======================================");
    println!("[+] URL:        {}", config.base_url());
    println!("[+] Wordlist:   {}", config.wordlist.display());
    println!("[+] Threads:    {}", config.concurrency);
    if !config.extensions.is_empty() {
        println!("[+] Extensions: {}", config.extensions.join(","));
    }
    println!("[+] Timeout:    {}s", config.timeout.as_secs());
    if let StatusPolicy::Only(codes) = &config.status_policy {
        let codes: Vec<String> = codes.iter().map(u16::to_string).collect();
        println!("[+] Codes:      {}", codes.join(","));
    }
    if config.verbose {
        println!("[+] Verbose:    ON");
    }
    println!();
}

fn print_summary(results: &RunResult) {
    println!();
    if results.cancelled {
        println!("{}", "Interrupted, stopping early.".yellow());
    }
    println!("Finished in {}", format_elapsed(results.elapsed()));
    println!(
        "Processed {}/{} candidates, {} hits",
        results.processed, results.total, results.reported
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("dir-fuzz-rs").chain(args.iter().copied()))
    }

    #[test]
    fn json_requires_output_path() {
        assert!(parse(&["-u", "http://h", "-w", "w.txt", "--json"]).is_err());
        let cli = parse(&["-u", "http://h", "-w", "w.txt", "--json", "-o", "out.json"]).unwrap();
        assert_eq!(cli.to_config().output_format, OutputFormat::Json);
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = parse(&[
            "-u", "http://h/", "-w", "w.txt", "-t", "3", "-x", "php,.html", "-s", "200,401",
            "--timeout", "2",
        ])
        .unwrap();
        let cfg = cli.to_config();
        assert_eq!(cfg.concurrency, 3);
        assert_eq!(cfg.extensions, vec![".php", ".html"]);
        assert_eq!(cfg.status_policy, StatusPolicy::Only(vec![200, 401]));
        assert_eq!(cfg.timeout, Duration::from_secs(2));
    }

    /// Interrupts fed from a channel; a closed channel behaves like a failed signal handler.
    fn signals() -> (
        mpsc::UnboundedSender<()>,
        impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = io::Result<()>> + Send>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let rx = Arc::new(Mutex::new(rx));
        let next = move || {
            let rx = rx.clone();
            Box::pin(async move {
                rx.lock()
                    .await
                    .recv()
                    .await
                    .ok_or_else(|| io::Error::other("signal stream closed"))
            }) as std::pin::Pin<Box<dyn Future<Output = io::Result<()>> + Send>>
        };
        (tx, next)
    }

    #[tokio::test]
    async fn second_interrupt_forces_quit() {
        let (tx, next) = signals();
        let cancel = CancellationToken::new();
        let quit = Arc::new(AtomicBool::new(false));
        let quit_flag = quit.clone();
        let handle = tokio::spawn(watch_interrupts(next, cancel.clone(), move || {
            quit_flag.store(true, Ordering::SeqCst)
        }));

        tx.send(()).unwrap();
        cancel.cancelled().await;
        assert!(!quit.load(Ordering::SeqCst));

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(quit.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn single_interrupt_only_cancels() {
        let (tx, next) = signals();
        let cancel = CancellationToken::new();
        let quit = Arc::new(AtomicBool::new(false));
        let quit_flag = quit.clone();
        let handle = tokio::spawn(watch_interrupts(next, cancel.clone(), move || {
            quit_flag.store(true, Ordering::SeqCst)
        }));

        tx.send(()).unwrap();
        drop(tx);
        handle.await.unwrap();
        assert!(cancel.is_cancelled());
        assert!(!quit.load(Ordering::SeqCst));
    }
}
