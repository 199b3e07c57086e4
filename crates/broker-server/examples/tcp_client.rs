use std::env;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use broker_protocol::{format_request, parse_reply_line, parse_request_line, Reply, Request};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

#[tokio::main]
async fn main() -> Result<()> {
    // Where to connect: env override or default.
    let addr = env::var("BROKER_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:9000".to_string());

    println!("Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connecting to {}", addr))?;
    println!("Connected.");
    println!("Type CSV commands like:");
    println!("  R, alice, secret");
    println!("  D, admin, alice, 1000");
    println!("  N, alice, alice, AAPL, B, 10, 5");
    println!("  M, admin, 1");
    println!("  B, alice, alice, -");
    println!("Type 'quit' or 'exit' to leave.\n");

    let (read_half, mut write_half) = stream.into_split();
    let mut replies = BufReader::new(read_half).lines();
    let stdin = io::stdin();

    loop {
        print!(">> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let n = stdin.read_line(&mut line)?;
        if n == 0 {
            println!("\nEOF on stdin, exiting client.");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            println!("Exiting client.");
            break;
        }

        // Validate locally so typos don't cost a round trip.
        let request = match parse_request_line(trimmed) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("Could not parse line: {}", e);
                continue;
            }
        };

        write_half
            .write_all(format!("{}\n", format_request(&request)).as_bytes())
            .await?;

        // List requests answer with lines up to END (or an error),
        // everything else with exactly one line.
        let is_list = matches!(
            request,
            Request::ListOrders { .. } | Request::ListBalances { .. }
        );
        loop {
            let next = match timeout(Duration::from_secs(2), replies.next_line()).await {
                Ok(Ok(Some(l))) => l,
                Ok(Ok(None)) => {
                    println!("Server closed the connection.");
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    eprintln!("Timed out waiting for a reply.");
                    break;
                }
            };
            println!("<< {}", next);

            match parse_reply_line(&next) {
                Ok(Reply::Order(_)) | Ok(Reply::Balance(_)) if is_list => continue,
                _ => break,
            }
        }
    }

    Ok(())
}
