#![warn(clippy::all)]

use rowpick::{
    Arguments, ExitAction, FileType, Picker, RowpickResult, Terminal, default_history_path,
    load_history, load_snapshot, save_history, stdin_to_rows, stdin2_to_rows,
};
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::error;

/*
cargo fmt
cargo test -- --nocapture
cargo run -- --help
cargo run -- data.csv
cargo run -- --generate 500
cargo b -r && cargo install --path=.
*/

fn main() {
    // Initialize the tracing subscriber for logging when requested.
    // Use RUST_LOG environment variable to set logging level, e.g.
    // `RUST_LOG=debug rowpick data.csv 2>rowpick.log`
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .init();
    }

    // Parse command-line arguments.
    let args = Arguments::build();

    match run(&args) {
        Ok(()) => {}
        Err(err) => {
            error!("rowpick failed: {err}");
            eprintln!("rowpick: {err}");
            std::process::exit(1);
        }
    }
}

fn run(args: &Arguments) -> RowpickResult<()> {
    let mut picker = build_picker(args)?;

    // Command history lives in the user config directory and survives
    // sessions.
    let history_path = default_history_path();
    if let Some(path) = &history_path {
        if path.exists() {
            match load_history(path) {
                Ok(histories) => picker.histories = histories,
                Err(err) => tracing::error!("failed to load history: {err}"),
            }
        }
    }

    let mut term = Terminal::new()?;
    // A refresh outcome from a picker without a producer just re-enters
    // the loop after a redraw.
    let outcome = loop {
        match picker.run(&mut term) {
            Ok(outcome) if outcome.action == ExitAction::Refresh => continue,
            other => break other,
        }
    };
    drop(term);

    if let Some(path) = &history_path {
        if let Err(err) = save_history(path, &picker.histories) {
            tracing::error!("failed to save history: {err}");
        }
    }

    let outcome = outcome?;
    match outcome.action {
        ExitAction::Accepted => {
            // Print the accepted rows, tab-separated, for shell pipelines.
            for &index in &outcome.selected {
                if let Some(row) = picker.data.rows.get(index) {
                    println!("{}", row.join("\t"));
                }
            }
        }
        ExitAction::FullExit | ExitAction::Exit | ExitAction::Escape | ExitAction::Refresh => {}
    }
    Ok(())
}

/// Builds the picker from the chosen data source: a snapshot, a generated
/// table, stdin, or a file.
fn build_picker(args: &Arguments) -> RowpickResult<Picker> {
    if let Some(snapshot_path) = &args.load {
        let snapshot = load_snapshot(snapshot_path)?;
        let mut picker = Picker::new(Vec::new(), Vec::new());
        picker.install_snapshot(snapshot);
        return Ok(picker);
    }

    if let Some(count) = args.generate {
        let mut picker = Picker::new(Vec::new(), Vec::new());
        picker.config.title = "Generated".to_string();
        picker.ports.refresh_function = Some(generated_table(count));
        picker.config.get_data_startup = true;
        return Ok(picker);
    }

    if args.stdin || args.stdin2 {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        let rows = if args.stdin2 {
            stdin2_to_rows(&text, args.delimiter)
        } else {
            stdin_to_rows(&text, args.delimiter)
        };
        return Ok(Picker::new(rows, Vec::new()));
    }

    if let Some(path) = args.source() {
        let filetype = match &args.filetype {
            Some(name) => FileType::from_cli_name(name),
            None => FileType::from_path(path),
        };
        let (rows, header) = rowpick::load(path, args.delimiter, filetype)?;
        let mut picker = Picker::new(rows, header);
        picker.config.title = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(picker);
    }

    // No source: start on an empty sheet.
    Ok(Picker::new(Vec::new(), Vec::new()))
}

/// Demo data producer for `--generate N`: each refresh bumps a generation
/// counter so id-tracking across refreshes is visible.
fn generated_table(count: usize) -> rowpick::RefreshFn {
    let generation = Arc::new(AtomicUsize::new(0));
    let producer: rowpick::RefreshFn = Arc::new(move || {
        let generation = generation.fetch_add(1, Ordering::Relaxed);
        let rows = (0..count)
            .map(|i| {
                vec![
                    format!("{i}"),
                    format!("item-{i}"),
                    format!("{}KB", (i * 37) % 4096),
                    format!("generation {generation}"),
                ]
            })
            .collect();
        let header = vec![
            "id".to_string(),
            "name".to_string(),
            "size".to_string(),
            "refreshed".to_string(),
        ];
        (rows, header)
    });
    producer
}
