//! Console front-end: reads commands from stdin, dispatches them through
//! the registry as a fixed local invoker, prints the replies to stdout.
//!
//! Input follows the declared command shapes: `config set susChance 0.5`.
//! Positional words fill the command's options in order; the last option
//! takes the rest of the line, so values may contain spaces.
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C) or stdin is closed.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::{DeclaredCommand, OptionKind};
use crate::channel::BufferedChannel;
use crate::commands::Registry;
use crate::config::ConsoleConfig;
use crate::error::AppError;
use crate::guard::{Invocation, Invoker};

/// Parsed console input, before the invoker is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub command: String,
    pub subcommand: Option<String>,
    pub options: BTreeMap<String, String>,
}

/// Split `line` against the declared command shapes.
///
/// Unknown commands are passed through untouched so the registry can answer
/// them; missing trailing options are simply absent.
pub fn parse_line(line: &str, declared: &[DeclaredCommand]) -> Option<ParsedLine> {
    let (command, rest) = split_word(line.trim())?;
    let mut parsed = ParsedLine {
        command: command.to_string(),
        subcommand: None,
        options: BTreeMap::new(),
    };

    let Some(shape) = declared.iter().find(|d| d.name() == command).map(|d| &d.shape) else {
        return Some(parsed);
    };

    let mut rest = rest;
    let mut params = &shape.options;
    if shape.options.iter().any(|o| o.kind == OptionKind::Subcommand) {
        let Some((sub, after)) = split_word(rest) else {
            return Some(parsed);
        };
        parsed.subcommand = Some(sub.to_string());
        rest = after;
        match shape.options.iter().find(|o| o.name == sub) {
            Some(option) => params = &option.options,
            None => return Some(parsed),
        }
    }

    for (i, param) in params.iter().enumerate() {
        let last = i + 1 == params.len();
        let value = if last {
            let value = rest.trim();
            (!value.is_empty()).then_some((value, ""))
        } else {
            split_word(rest)
        };
        let Some((value, after)) = value else {
            break;
        };
        parsed.options.insert(param.name.clone(), value.to_string());
        rest = after;
    }

    Some(parsed)
}

fn split_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(end) => Some((&input[..end], &input[end..])),
        None => Some((input, "")),
    }
}

/// Run the console loop until stdin closes or `shutdown` fires.
pub async fn run(
    registry: Arc<Registry>,
    console: ConsoleConfig,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(tenant = %console.tenant_id, user = %console.user_id, "console channel started");
    println!("─────────────────────────────────");
    println!(" guildkeeper console  (Ctrl-C to quit)");
    println!("─────────────────────────────────");

    let declared = registry.declared();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                info!("console channel shutting down");
                break;
            }

            line = lines.next_line() => {
                let input = match line {
                    Err(e) => {
                        warn!("console read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("console stdin closed");
                        break;
                    }
                    Ok(Some(input)) => input,
                };

                let Some(parsed) = parse_line(&input, &declared) else {
                    continue;
                };
                debug!(command = %parsed.command, "console received line");

                let invocation = Invocation {
                    tenant_id: Some(console.tenant_id.clone()),
                    invoker: Invoker {
                        user_id: console.user_id.clone(),
                        is_bot: false,
                        administrator: console.administrator,
                    },
                    command: parsed.command,
                    subcommand: parsed.subcommand,
                    options: parsed.options,
                };

                let channel = BufferedChannel::new();
                registry.dispatch(invocation, &channel).await;
                for reply in channel.drain() {
                    println!("{}", reply.text);
                }
            }
        }
    }

    Ok(())
}
