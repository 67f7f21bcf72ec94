use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "blocksmith-cli")]
#[command(about = "CLI client for a blocksmith-node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit an unsigned transfer
    Submit {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Decimal amount, e.g. 12.5
        #[arg(long)]
        amount: String,
    },
    /// Mine pending transactions, paying the reward to MINER
    Mine {
        #[arg(long)]
        miner: String,
    },
    /// Show confirmed and available balance
    Balance { address: String },
    /// Ask the node to validate its whole chain
    Validate,
    /// Print a page of blocks
    Chain {
        #[arg(long, default_value_t = 0)]
        from: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Create a wallet held by the node and print its address
    WalletNew,
    /// Sign a transfer with a node-held wallet and submit it
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
    },
}

#[derive(Serialize)]
struct Draft<'a> {
    sender: &'a str,
    recipient: &'a str,
    amount: &'a str,
}

struct Client {
    http: reqwest::Client,
    node: String,
}

impl Client {
    fn new(node: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            node: node.trim_end_matches('/').to_string(),
        }
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let res = self.http.get(format!("{}{path}", self.node)).send().await?;
        Self::read(res).await
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value> {
        let res = self
            .http
            .post(format!("{}{path}", self.node))
            .json(body)
            .send()
            .await?;
        Self::read(res).await
    }

    async fn read(res: reqwest::Response) -> Result<Value> {
        let status = res.status();
        let body: Value = res.json().await?;
        debug!(%status, "node replied");
        if !status.is_success() {
            let reason = body["error"].as_str().unwrap_or("unknown error");
            bail!("node returned {status}: {reason}");
        }
        Ok(body)
    }
}

fn print(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = Client::new(&cli.node);
    match cli.cmd {
        Command::Submit { from, to, amount } => {
            let draft = Draft {
                sender: &from,
                recipient: &to,
                amount: &amount,
            };
            print(&client.post("/tx/draft", &draft).await?)?;
        }
        Command::Mine { miner } => {
            let block = client.post("/mine", &serde_json::json!({ "miner": miner })).await?;
            println!(
                "mined block {} nonce={} hash={}",
                block["index"], block["nonce"], block["hash"]
            );
        }
        Command::Balance { address } => {
            let b = client.get(&format!("/balance/{address}")).await?;
            println!("{address}: {} (available {})", b["display"], b["available"]);
        }
        Command::Validate => {
            let report = client.get("/chain/validate").await?;
            if report["valid"].as_bool() == Some(true) {
                println!("chain is valid");
            } else {
                println!("chain is INVALID: {}", report["message"]);
            }
        }
        Command::Chain { from, limit } => {
            let mut path = format!("/chain?from={from}");
            if let Some(limit) = limit {
                path.push_str(&format!("&limit={limit}"));
            }
            print(&client.get(&path).await?)?;
        }
        Command::WalletNew => {
            let created = client.post("/wallets", &Value::Null).await?;
            println!("{}", created["address"].as_str().unwrap_or_default());
        }
        Command::Transfer { from, to, amount } => {
            let body = serde_json::json!({ "to": to, "amount": amount });
            print(&client.post(&format!("/wallets/{from}/transfer"), &body).await?)?;
        }
    }
    Ok(())
}
