use std::fs;
use std::path::PathBuf;

use labrpc::anyhow::{anyhow, Context, Result};
use log::info;
use structopt::StructOpt;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use paxos::{AcceptShortfall, Config};
use paxoskv::{cluster, Client, ReplicaServer};

#[derive(StructOpt, Debug)]
#[structopt(name = env!("CARGO_PKG_NAME"), version = env!("CARGO_PKG_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
/// Runs a replicated KV store in this process and reads commands from stdin:
/// GET <key>, PUT <key> <value>, DELETE <key>, DUMP, QUIT.
struct Opt {
    /// JSON config file, missing fields take their defaults
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Number of replicas
    #[structopt(short = "n", long)]
    cluster_size: Option<usize>,

    /// Learn values that missed a majority of accepts instead of aborting
    #[structopt(long)]
    degraded: bool,

    /// Seed for simulated acceptor crashes
    #[structopt(long)]
    seed: Option<u64>,

    /// Keep every acceptor up
    #[structopt(long)]
    no_crash: bool,

    /// Run a small PUT/GET/DELETE workload before reading stdin
    #[structopt(long)]
    prepopulate: bool,
}

impl Opt {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str::<Config>(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => Config::default(),
        };
        if let Some(n) = self.cluster_size {
            config.cluster_size = n;
        }
        if self.degraded {
            config.accept_shortfall = AcceptShortfall::Degraded;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if self.no_crash {
            config.crash = None;
        }
        config.validate()?;
        Ok(config)
    }
}

enum Command {
    Get(String),
    Put(String, String),
    Delete(String),
    Dump,
    Quit,
}

fn parse(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let cmd = match words.next() {
        Some(cmd) => cmd.to_ascii_uppercase(),
        None => return Ok(None),
    };
    let args: Vec<&str> = words.collect();
    let cmd = match (cmd.as_str(), args.as_slice()) {
        ("GET", [key]) => Command::Get(key.to_string()),
        ("PUT", [key, value]) => Command::Put(key.to_string(), value.to_string()),
        ("DELETE", [key]) => Command::Delete(key.to_string()),
        ("DUMP", []) => Command::Dump,
        ("QUIT", []) | ("EXIT", []) => Command::Quit,
        _ => return Err(anyhow!("cannot parse '{}'", line.trim())),
    };
    Ok(Some(cmd))
}

/// Runs `cmd` and returns what to print, `None` once asked to quit.
async fn execute(client: &Client<ReplicaServer>, cmd: Command) -> Result<Option<String>> {
    let out = match cmd {
        Command::Get(key) => match client.get(&key).await? {
            Some(value) => value,
            None => "(not found)".to_string(),
        },
        Command::Put(key, value) => ok_or_failed(client.put(&key, &value).await?),
        Command::Delete(key) => ok_or_failed(client.delete(&key).await?),
        Command::Dump => {
            let mut out = String::new();
            for r in client.backends() {
                out.push_str(&format!("replica {}:", r.id()));
                for (k, v) in r.dump() {
                    out.push_str(&format!(" {}={}", k, v));
                }
                out.push('\n');
            }
            out.trim_end().to_string()
        }
        Command::Quit => return Ok(None),
    };
    Ok(Some(out))
}

const SAMPLE: [(&str, &str); 5] = [
    ("name", "paxoskv"),
    ("city", "Boston"),
    ("course", "distributed-systems"),
    ("language", "Rust"),
    ("editor", "vim"),
];

/// Seeds the store: five PUTs keyed by the sample values, five PUTs keyed by
/// the sample keys, then a GET and a DELETE of every sample key. Returns one
/// line per command.
async fn prepopulate(client: &Client<ReplicaServer>) -> Result<Vec<String>> {
    let mut cmds = Vec::new();
    for (k, v) in SAMPLE.iter() {
        cmds.push(Command::Put(v.to_string(), k.to_string()));
    }
    for (k, v) in SAMPLE.iter() {
        cmds.push(Command::Put(k.to_string(), v.to_string()));
    }
    for (k, _) in SAMPLE.iter() {
        cmds.push(Command::Get(k.to_string()));
    }
    for (k, _) in SAMPLE.iter() {
        cmds.push(Command::Delete(k.to_string()));
    }

    let mut out = Vec::new();
    for cmd in cmds {
        let line = describe(&cmd);
        if let Some(result) = execute(client, cmd).await? {
            out.push(format!("{}: {}", line, result));
        }
    }
    Ok(out)
}

fn describe(cmd: &Command) -> String {
    match cmd {
        Command::Get(k) => format!("GET {}", k),
        Command::Put(k, v) => format!("PUT {} {}", k, v),
        Command::Delete(k) => format!("DELETE {}", k),
        Command::Dump => "DUMP".to_string(),
        Command::Quit => "QUIT".to_string(),
    }
}

fn ok_or_failed(committed: bool) -> String {
    let out = if committed { "OK" } else { "FAILED" };
    out.to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let opt = Opt::from_args();
    let config = opt.config()?;
    info!("starting with {:?}", config);

    let replicas = cluster::local(&config)?;
    let client = Client::new(replicas)?;

    if opt.prepopulate {
        info!("prepopulating the store");
        for line in prepopulate(&client).await? {
            println!("{}", line);
        }
    }

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();
    while let Some(line) = lines.next_line().await? {
        let out = match parse(&line) {
            Ok(None) => continue,
            Ok(Some(cmd)) => match execute(&client, cmd).await? {
                Some(out) => out,
                None => break,
            },
            Err(e) => format!("error: {}", e),
        };
        stdout.write_all(out.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}
