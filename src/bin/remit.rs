//! Minimal CLI for driving the restitution pipeline.
//!
//! This binary exposes helper commands for replaying transfer logs into
//! balances artifacts, running the full reconciliation and commitment
//! pipeline, and re-verifying individual claims against a persisted
//! distribution artifact.

use restitution::commands::{
    distribute::run_distribute,
    snapshot::run_snapshot,
    verify::run_verify,
};
use std::env;

fn fatal(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn print_usage() {
    println!("Usage: remit <snapshot|distribute|verify> ...");
    println!("  snapshot   --events <file> --output <file> [--exclude <addr>]...");
    println!("  distribute --config <file> --output-dir <dir>");
    println!("             [--current <balances.json>]... [--legacy <balances.json>]...");
    println!("  verify     --distribution <file> --account <addr>");
}

fn expect_value(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    match args.next() {
        Some(value) => value,
        None => fatal(&format!("{flag} requires a value")),
    }
}

fn cmd_snapshot(args: Vec<String>) {
    let mut events = None;
    let mut output = None;
    let mut exclude = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--events" => events = Some(expect_value(&mut iter, "--events")),
            "--output" => output = Some(expect_value(&mut iter, "--output")),
            "--exclude" => exclude.push(expect_value(&mut iter, "--exclude")),
            other => fatal(&format!("unknown snapshot flag '{other}'")),
        }
    }
    let events = events.unwrap_or_else(|| fatal("snapshot requires --events"));
    let output = output.unwrap_or_else(|| fatal("snapshot requires --output"));

    match run_snapshot(&events, &output, &exclude) {
        Ok(summary) => {
            println!(
                "replayed {}: {} accounts, total {}",
                summary.asset, summary.accounts, summary.total
            );
            println!("balances written to {output}");
        }
        Err(err) => fatal(&err),
    }
}

fn cmd_distribute(args: Vec<String>) {
    let mut config = None;
    let mut output_dir = None;
    let mut current = Vec::new();
    let mut legacy = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = Some(expect_value(&mut iter, "--config")),
            "--output-dir" => output_dir = Some(expect_value(&mut iter, "--output-dir")),
            "--current" => current.push(expect_value(&mut iter, "--current")),
            "--legacy" => legacy.push(expect_value(&mut iter, "--legacy")),
            other => fatal(&format!("unknown distribute flag '{other}'")),
        }
    }
    let config = config.unwrap_or_else(|| fatal("distribute requires --config"));
    let output_dir = output_dir.unwrap_or_else(|| fatal("distribute requires --output-dir"));

    match run_distribute(&config, &current, &legacy, &output_dir) {
        Ok(summaries) => {
            for summary in summaries {
                println!(
                    "{}: root {} total {} ({} claims) -> {}",
                    summary.symbol,
                    summary.merkle_root,
                    summary.token_total,
                    summary.claim_count,
                    summary.path
                );
            }
        }
        Err(err) => fatal(&err),
    }
}

fn cmd_verify(args: Vec<String>) {
    let mut distribution = None;
    let mut account = None;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--distribution" => distribution = Some(expect_value(&mut iter, "--distribution")),
            "--account" => account = Some(expect_value(&mut iter, "--account")),
            other => fatal(&format!("unknown verify flag '{other}'")),
        }
    }
    let distribution = distribution.unwrap_or_else(|| fatal("verify requires --distribution"));
    let account = account.unwrap_or_else(|| fatal("verify requires --account"));

    match run_verify(&distribution, &account) {
        Ok(claim) => {
            println!(
                "claim verified: index {} amount {} ({} siblings) against root {}",
                claim.index, claim.amount, claim.proof_len, claim.merkle_root
            );
        }
        Err(err) => fatal(&err),
    }
}

fn main() {
    let mut args = env::args().skip(1);
    let command = args.next();
    match command.as_deref() {
        Some("snapshot") => cmd_snapshot(args.collect()),
        Some("distribute") => cmd_distribute(args.collect()),
        Some("verify") => cmd_verify(args.collect()),
        Some("help") | None => print_usage(),
        Some(other) => {
            eprintln!("unknown command '{other}'");
            print_usage();
            std::process::exit(1);
        }
    }
}
