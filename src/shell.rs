//! Interactive terminal front end with an assistant tab and a ledger tab.

use crate::advisor::SUGGESTIONS;
use crate::history::Message;
use crate::ledger::ExpenseLedger;
use crate::session::AssistantSession;
use chrono::{DateTime, Local};
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Assistant,
    Ledger,
}

impl Tab {
    fn prompt(self) -> &'static str {
        match self {
            Tab::Assistant => "Ngira Inama> ",
            Tab::Ledger => "Mbarira> ",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    History,
    Clear,
    Suggest,
    SwitchTab(Tab),
    Expense {
        amount: String,
        category: String,
        date: String,
    },
    Income {
        amount: String,
        source: String,
        date: String,
    },
    Production(String),
    Summary,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Splits `<amount> <words...> <date>`; the middle words form the label.
fn parse_entry(rest: &str) -> Option<(String, String, String)> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    let label = tokens[1..tokens.len() - 1].join(" ");
    Some((tokens[0].to_string(), label, tokens[tokens.len() - 1].to_string()))
}

pub fn parse_command(line: &str, tab: Tab) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(command) = line.strip_prefix(':') else {
        return match tab {
            Tab::Assistant => Command::Ask(line.to_string()),
            Tab::Ledger => parse_expense(line),
        };
    };

    let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
    match name {
        "history" => Command::History,
        "clear" => Command::Clear,
        "suggest" => Command::Suggest,
        "assistant" => Command::SwitchTab(Tab::Assistant),
        "ledger" => Command::SwitchTab(Tab::Ledger),
        "tab" => Command::SwitchTab(match tab {
            Tab::Assistant => Tab::Ledger,
            Tab::Ledger => Tab::Assistant,
        }),
        "expense" => parse_expense(rest),
        "income" => match parse_entry(rest) {
            Some((amount, source, date)) => Command::Income {
                amount,
                source,
                date,
            },
            None => Command::Invalid("usage: :income <amount> <source> <date>".to_string()),
        },
        "production" => Command::Production(rest.trim().to_string()),
        "summary" => Command::Summary,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command `:{other}`, try :help")),
    }
}

fn parse_expense(rest: &str) -> Command {
    match parse_entry(rest) {
        Some((amount, category, date)) => Command::Expense {
            amount,
            category,
            date,
        },
        None => Command::Invalid("usage: :expense <amount> <category> <date>".to_string()),
    }
}

pub fn format_amount(currency: &str, amount: Decimal) -> String {
    let mut amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    amount.rescale(2);
    format!("{currency}{amount}")
}

/// `HH:MM  You: ...` in local time.
pub fn format_message(message: &Message) -> String {
    let time = DateTime::from_timestamp_millis(message.timestamp)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let author = if message.from_user { "You" } else { "Assistant" };
    format!("{time}  {author}: {}", message.content)
}

pub fn print_history(messages: &[Message]) {
    if messages.is_empty() {
        println!("No conversation history yet.");
        return;
    }
    for message in messages {
        println!("{}", format_message(message));
    }
}

pub fn print_suggestions() {
    for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
        println!("{}. {suggestion}", i + 1);
    }
}

fn print_summary(ledger: &ExpenseLedger, production: &str, currency: &str) {
    for record in ledger.expenses() {
        println!(
            "{} - {}: {}",
            record.date,
            record.category,
            format_amount(currency, record.amount)
        );
    }
    println!("Total Expense: {}", format_amount(currency, ledger.total_expense()));
    if !ledger.incomes().is_empty() {
        println!("Total Income: {}", format_amount(currency, ledger.total_income()));
        println!("Profit/Loss: {}", format_amount(currency, ledger.profit_loss()));
    }
    if let Some(price) = ledger.minimum_price_per_kg(production) {
        println!("Minimum Price per kg: {}", format_amount(currency, price));
    }
}

fn print_help() {
    println!("Type a question to ask the assistant. Commands:");
    println!("  :history  :clear  :suggest          assistant");
    println!("  :expense <amount> <category> <date> ledger");
    println!("  :income <amount> <source> <date>");
    println!("  :production <kg>  :summary");
    println!("  :assistant  :ledger  :tab  :help  :quit");
}

fn show_prompt(tab: Tab) {
    print!("{}", tab.prompt());
    let _ = std::io::stdout().flush();
}

/// Runs until `:quit`, end of input, or shutdown of the session.
pub async fn run(mut session: AssistantSession, currency: &str) -> std::io::Result<()> {
    let shutdown = session.shutdown_handle();
    let mut ledger = ExpenseLedger::new();
    let mut production = String::new();
    let mut tab = Tab::Assistant;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    session.load_history().await;
    info!("Shell started");
    print_help();

    loop {
        show_prompt(tab);
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.stopped() => None,
        };
        let Some(line) = line else { break };

        let command = parse_command(&line, tab);
        debug!(?command, "Shell command");
        match command {
            Command::Empty => {}
            Command::Ask(query) => {
                println!("Assistant is thinking...");
                let log = session.submit(&query).await;
                if shutdown.is_shutdown() {
                    break;
                }
                if let Some(reply) = log.last().filter(|m| !m.from_user) {
                    println!("{}", format_message(reply));
                }
            }
            Command::History => print_history(session.messages()),
            Command::Clear => {
                session.clear_history().await;
                println!("Conversation history cleared.");
            }
            Command::Suggest => print_suggestions(),
            Command::SwitchTab(next) => tab = next,
            Command::Expense {
                amount,
                category,
                date,
            } => {
                if ledger.add_expense(&amount, &category, &date) {
                    let total = format_amount(currency, ledger.total_expense());
                    println!("Total Expense: {total}");
                } else {
                    println!("Expense needs a positive amount, a category and a date.");
                }
            }
            Command::Income {
                amount,
                source,
                date,
            } => {
                if ledger.add_income(&amount, &source, &date) {
                    let total = format_amount(currency, ledger.total_income());
                    println!("Total Income: {total}");
                } else {
                    println!("Income needs a positive amount, a source and a date.");
                }
            }
            Command::Production(kg) => {
                production = kg;
                match ledger.minimum_price_per_kg(&production) {
                    Some(price) => {
                        println!("Minimum Price per kg: {}", format_amount(currency, price))
                    }
                    None => println!("Production must be a number of kilograms above zero."),
                }
            }
            Command::Summary => print_summary(&ledger, &production, currency),
            Command::Help => print_help(),
            Command::Invalid(message) => println!("{message}"),
            Command::Quit => break,
        }
    }

    info!("Shell finished");
    Ok(())
}
