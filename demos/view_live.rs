//! Live market view - prints the top of the book and order notifications
//!
//! Usage:
//!   ORDERBOOK_REST_URL=https://api.example.com ORDERBOOK_WS_URL=wss://api.example.com/ws \
//!   ORDERBOOK_MARKET_ID=1 cargo run --example view_live
//!
//! Optional:
//!   ORDERBOOK_ACCOUNT=0x...  # Also watch this account's orders and fills
//!   RUST_LOG=orderbook_sync=debug

use std::time::Duration;

use orderbook_sync::types::PriceLevel;
use orderbook_sync::{Config, MarketView};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("orderbook_sync=info".parse()?),
        )
        .init();

    let rest_url = std::env::var("ORDERBOOK_REST_URL")
        .map_err(|_| "Set ORDERBOOK_REST_URL environment variable")?;
    let ws_url = std::env::var("ORDERBOOK_WS_URL")
        .map_err(|_| "Set ORDERBOOK_WS_URL environment variable")?;
    let market_id: u64 = std::env::var("ORDERBOOK_MARKET_ID")
        .map_err(|_| "Set ORDERBOOK_MARKET_ID environment variable")?
        .parse()?;
    let account = std::env::var("ORDERBOOK_ACCOUNT").ok();

    println!("=== Live Market View ===\n");
    println!("Market: {}", market_id);
    if let Some(account) = &account {
        println!("Account: {}", account);
    }
    println!();

    let config = Config::new(rest_url, ws_url).with_depth(20);
    let (view, mut notifications) = MarketView::create(config)?;
    view.set_context(Some(market_id), account)?;

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(note) = notifications.recv() => {
                println!("[{:?}] {}", note.level, note.message);
            }
            _ = ticker.tick() => {
                let status = view.status();
                if let Some(error) = &status.loading_error {
                    println!("Orderbook unavailable: {}", error);
                    continue;
                }

                let book = view.book();
                println!(
                    "{:?} / {:?} | bid {} | ask {}",
                    status.connection,
                    status.book_state,
                    describe(book.bids.first()),
                    describe(book.asks.first()),
                );
            }
            _ = &mut shutdown => break,
        }
    }

    println!("\nShutting down...");
    view.teardown().await;
    Ok(())
}

fn describe(level: Option<&PriceLevel>) -> String {
    match level {
        Some(level) => format!("{} @ {}", level.size, level.price),
        None => "-".to_string(),
    }
}
