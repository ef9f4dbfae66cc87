//! Shift Swap CLI - Command-line client for the Shift Swap daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9631";

// Error codes whose data carries a refreshed snapshot
const CONFLICT: i32 = 4002;
const NOT_FOUND: i32 = 4001;
const UNAVAILABLE: i32 = 4005;

#[derive(Parser)]
#[command(name = "shiftswap")]
#[command(about = "Offer, claim and pass on work shifts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "SHIFTSWAP_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Act as this worker instead of the identity cached by the daemon
    #[arg(long = "as", global = true)]
    actor: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    All,
    Feed,
    Mine,
    Claimed,
}

impl ViewArg {
    fn as_str(&self) -> &'static str {
        match self {
            ViewArg::All => "all",
            ViewArg::Feed => "feed",
            ViewArg::Mine => "mine",
            ViewArg::Claimed => "claimed",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List shifts
    List {
        /// Which shifts to show
        #[arg(short, long, value_enum, default_value = "all")]
        view: ViewArg,
    },

    /// Offer a shift (times as YYYY-MM-DDTHH:MM)
    Create {
        #[arg(short, long)]
        start: String,

        #[arg(short, long)]
        end: String,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Edit an open shift you own
    Edit {
        /// Shift ID
        shift_id: String,

        #[arg(short, long)]
        start: String,

        #[arg(short, long)]
        end: String,

        #[arg(short, long)]
        notes: Option<String>,

        /// Hand the offer to another worker id
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// Claim an open shift
    Claim {
        /// Shift ID
        shift_id: String,
    },

    /// Pass a shift you claimed on to others
    Reassign {
        /// Shift ID
        shift_id: String,

        #[arg(short, long)]
        start: Option<String>,

        #[arg(short, long)]
        end: Option<String>,

        /// New notes ("" clears them)
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Delete an open shift you own
    Cancel {
        /// Shift ID
        shift_id: String,
    },

    /// Show the worker id cached on this device
    Whoami,

    /// Cache a worker id on this device
    SetId {
        worker_id: String,
    },

    /// Send feedback about the app
    Feedback {
        #[arg(long)]
        email: String,

        #[arg(short, long)]
        message: String,

        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error ({}): {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

#[derive(Deserialize)]
struct ShiftJson {
    id: String,
    starts_at: String,
    ends_at: String,
    #[serde(default)]
    notes: Option<String>,
    owner_id: String,
    status: String,
    #[serde(default)]
    claimer_contact: Option<String>,
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Tabled)]
struct ShiftRow {
    id: String,
    starts: String,
    ends: String,
    length: String,
    owner: String,
    status: String,
    claimer: String,
    notes: String,
}

fn dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

impl From<ShiftJson> for ShiftRow {
    fn from(s: ShiftJson) -> Self {
        Self {
            id: s.id,
            starts: s.starts_at,
            ends: s.ends_at,
            length: dash(s.duration),
            owner: s.owner_id,
            status: s.status,
            claimer: dash(s.claimer_contact),
            notes: dash(s.notes),
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        return Err(error.into());
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn print_shifts(shifts: &Value) -> Result<()> {
    let shifts: Vec<ShiftJson> = serde_json::from_value(shifts.clone())?;
    if shifts.is_empty() {
        println!("{}", "No shifts".yellow());
        return Ok(());
    }
    let rows: Vec<ShiftRow> = shifts.into_iter().map(ShiftRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn print_tier(tier: &Value) {
    if tier.as_str() == Some("fallback") {
        println!(
            "{}",
            "! Primary backend unavailable: using this device's local copy".yellow()
        );
    }
}

/// Print an accepted transition: the record, where it landed, and the fresh list
fn print_transition(headline: &str, result: &Value) -> Result<()> {
    println!("{}", headline.green().bold());
    print_tier(&result["stored_in"]);
    println!();
    print_shifts(&result["snapshot"]["shifts"])
}

/// Explain a rejected call; stale-view rejections also show the refreshed list
fn report_error(err: &anyhow::Error) {
    let Some(rpc) = err.downcast_ref::<JsonRpcError>() else {
        eprintln!("{} {:#}", "✗".red(), err);
        return;
    };

    eprintln!("{} {}", "✗".red(), rpc.message);

    if let Some(data) = &rpc.data {
        if rpc.code == CONFLICT {
            if let Some(claimer) = data["claimer"].as_str() {
                eprintln!("  {} {}", "Claimed by:".bold(), claimer);
            }
        }
        if matches!(rpc.code, CONFLICT | NOT_FOUND | UNAVAILABLE) && data["snapshot"].is_object()
        {
            eprintln!();
            eprintln!("{}", "Current shifts:".cyan().bold());
            if let Err(e) = print_shifts(&data["snapshot"]["shifts"]) {
                eprintln!("  (could not render refreshed list: {})", e);
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let url = cli.rpc_url.as_str();
    let actor = cli.actor;

    match cli.command {
        Commands::List { view } => {
            let params = json!({ "view": view.as_str(), "worker": actor });
            let result = call_rpc(url, "shifts.list.v1", params).await?;

            let title = match result["worker"].as_str() {
                Some(worker) => format!("Shifts ({}, as {})", view.as_str(), worker),
                None => format!("Shifts ({})", view.as_str()),
            };
            println!("{}", title.cyan().bold());
            print_tier(&result["tier"]);
            print_shifts(&result["shifts"])?;
        }

        Commands::Create { start, end, notes } => {
            let params = json!({
                "owner_id": actor,
                "starts_at": start,
                "ends_at": end,
                "notes": notes,
            });
            let result = call_rpc(url, "shifts.create.v1", params).await?;
            let id = result["shift"]["id"].as_str().unwrap_or_default();
            print_transition(&format!("✓ Shift {} offered", id), &result)?;
        }

        Commands::Edit {
            shift_id,
            start,
            end,
            notes,
            owner,
        } => {
            let params = json!({
                "shift_id": shift_id,
                "actor": actor,
                "starts_at": start,
                "ends_at": end,
                "notes": notes,
                "owner_id": owner,
            });
            let result = call_rpc(url, "shifts.edit.v1", params).await?;
            print_transition(&format!("✓ Shift {} updated", shift_id), &result)?;
        }

        Commands::Claim { shift_id } => {
            let params = json!({ "shift_id": shift_id, "actor": actor });
            let result = call_rpc(url, "shifts.claim.v1", params).await?;
            print_transition(&format!("✓ Shift {} is yours", shift_id), &result)?;
        }

        Commands::Reassign {
            shift_id,
            start,
            end,
            notes,
        } => {
            let params = json!({
                "shift_id": shift_id,
                "actor": actor,
                "starts_at": start,
                "ends_at": end,
                "notes": notes,
            });
            let result = call_rpc(url, "shifts.reassign.v1", params).await?;
            print_transition(&format!("✓ Shift {} offered again", shift_id), &result)?;
        }

        Commands::Cancel { shift_id } => {
            let params = json!({ "shift_id": shift_id, "actor": actor });
            let result = call_rpc(url, "shifts.cancel.v1", params).await?;
            print_transition(&format!("✓ Shift {} deleted", shift_id), &result)?;
        }

        Commands::Whoami => {
            let result = call_rpc(url, "identity.get.v1", json!({})).await?;
            match result["worker_id"].as_str() {
                Some(id) => println!("{} {}", "Worker:".bold(), id),
                None => println!("{}", "No worker id cached yet (use set-id)".yellow()),
            }
        }

        Commands::SetId { worker_id } => {
            let result =
                call_rpc(url, "identity.set.v1", json!({ "worker_id": worker_id })).await?;
            println!(
                "{} {}",
                "✓ Worker id set to".green().bold(),
                result["worker_id"].as_str().unwrap_or_default()
            );
        }

        Commands::Feedback {
            email,
            message,
            name,
        } => {
            let params = json!({ "name": name, "email": email, "message": message });
            call_rpc(url, "feedback.submit.v1", params).await?;
            println!("{}", "✓ Thanks for the feedback".green().bold());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        report_error(&e);
        std::process::exit(1);
    }
}
