use std::io::Read;

use tracing::info;
use tracing_subscriber::EnvFilter;
use wallet_agent_coordinator::{
    agent::Coordinator,
    config::Config,
    models::{ExecutionMode, ProcessRequest, ResponseStatus},
};

const USAGE: &str = "usage: coordinator [--mode auto|execution|planning] [--session <id>] <message...>\n\
                     (reads the message from stdin when none is given)";

fn parse_mode(raw: &str) -> Result<ExecutionMode, String> {
    match raw.to_lowercase().as_str() {
        "auto" => Ok(ExecutionMode::Auto),
        "execution" => Ok(ExecutionMode::Execution),
        "planning" => Ok(ExecutionMode::Planning),
        other => Err(format!("unknown mode '{}'\n{}", other, USAGE)),
    }
}

fn parse_args() -> Result<ProcessRequest, String> {
    let mut request = ProcessRequest::default();
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mode" => {
                let raw = args.next().ok_or_else(|| USAGE.to_string())?;
                request.mode = Some(parse_mode(&raw)?);
            }
            "--session" => {
                request.session_id = Some(args.next().ok_or_else(|| USAGE.to_string())?);
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            _ => words.push(arg),
        }
    }

    request.message = if words.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| format!("failed to read stdin: {}", e))?;
        input
    } else {
        words.join(" ")
    };

    Ok(request)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let request = parse_args()?;
    let config = Config::from_env()?;

    info!(
        llm = config.has_llm(),
        wallet_service = config.wallet_api_base_url.is_some(),
        "Wallet Agent Coordinator starting"
    );

    let coordinator = Coordinator::from_config(&config)?;
    let response = coordinator.process_message(request).await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.status == ResponseStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
