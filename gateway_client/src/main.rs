//! FIX Gateway Client Entry Point
//!
//! Reads commands from stdin and sends them to the gateway.

use gateway_client::client::stream_push_events;
use gateway_client::{Command, CommandDefaults, Config, GatewayClient};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

fn prompt() {
    print!("[Command]: ");
    let _ = std::io::stdout().flush();
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Starting FIX gateway client");

    let config = Config::load_or_default();
    config.log_config();

    let mut client = match GatewayClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Client error: {}", e);
            std::process::exit(1);
        }
    };

    if config.stream_market_data {
        let url = config.websocket_url();
        tokio::spawn(async move {
            if let Err(e) = stream_push_events(&url).await {
                log::warn!("Push stream ended: {}", e);
            }
        });
    }

    let defaults = CommandDefaults {
        symbol: config.default_symbol.clone(),
        quantity: config.default_quantity,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            prompt();
            continue;
        }

        match Command::parse(&line, &defaults) {
            Ok(Command::Quit) => break,
            Ok(command) => match client.execute(&command).await {
                Ok(output) if output.is_empty() => {}
                Ok(output) => println!("{}", output),
                Err(e) => println!("Error: {}", e),
            },
            Err(e) => println!("Error: {}", e),
        }
        prompt();
    }

    if client.tracker().total_count() > 0 {
        println!("{}", client.tracker().summary());
    }
    log::info!("Client stopped");
}
