//! Window Replay Tool
//!
//! Replays a file of recorded windows (one per line, tokens separated by commas or
//! whitespace) through the reconciler and prints one JSON line per window.
//!
//! Usage:
//!   cargo run --bin window_replay -- <windows.txt> [--min-overlap N]

use rolltrack::tracker_core::reconciler::format_window;
use rolltrack::tracker_core::source::parse_window_line;
use rolltrack::tracker_core::{classify, Label, ReconciliationResult, Window, WindowReconciler};
use serde::Serialize;
use std::env;
use std::fs;

#[derive(Debug, Serialize)]
struct ReplayLine {
    line: usize,
    window: String,
    /// Chosen advance, `None` when unaligned or without a baseline
    advance: Option<usize>,
    result: &'static str,
    new_events: Vec<Label>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let path = match args.get(1) {
        Some(path) if !path.starts_with("--") => path.clone(),
        _ => {
            eprintln!("Usage: window_replay <windows.txt> [--min-overlap N]");
            std::process::exit(2);
        }
    };

    let min_overlap = match args.iter().position(|a| a == "--min-overlap") {
        Some(idx) => args
            .get(idx + 1)
            .ok_or("--min-overlap requires a value")?
            .parse::<usize>()?,
        None => 1,
    };

    let reconciler = WindowReconciler::new(min_overlap);
    let contents = fs::read_to_string(&path)?;

    let mut previous: Option<Window> = None;
    let mut total = 0usize;

    for (idx, line) in contents.lines().enumerate() {
        let tokens = parse_window_line(line);
        if tokens.is_empty() {
            continue;
        }

        let current: Window = tokens.iter().map(|t| classify(t)).collect();
        let result = reconciler.reconcile(previous.as_deref(), &current);

        let advance = previous
            .as_deref()
            .filter(|prev| !result.is_unalignable() && *prev != current.as_slice())
            .and_then(|prev| reconciler.align(prev, &current));

        let entry = ReplayLine {
            line: idx + 1,
            window: format_window(&current),
            advance,
            result: match (&previous, &result) {
                (None, _) => "BASELINE",
                (Some(_), ReconciliationResult::Unalignable) => "UNALIGNABLE",
                (Some(_), ReconciliationResult::NewEvents(_)) => "ALIGNED",
            },
            new_events: result.new_events().to_vec(),
        };
        total += entry.new_events.len();
        println!("{}", serde_json::to_string(&entry)?);

        previous = Some(current);
    }

    eprintln!("✅ Replayed {}: {} new rolls", path, total);
    Ok(())
}
