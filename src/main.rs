use clap::{Arg, ArgAction, Command, value_parser};
use clap_num::maybe_hex;
use log::{debug, error, warn};
use serde_json::json;
use std::path::PathBuf;

use mft_analyzer::MftImage;
use mft_analyzer::shell::Shell;

/// Inputs above this size get an advisory warning; parsing still proceeds.
const LARGE_BODY_BYTES: u64 = 1 << 30;

fn main() {
    let matches = Command::new("mft_analyzer")
        .version("0.2.0")
        .author("CyberYom")
        .about("Carve and analyze MFT entries from a raw NTFS $MFT image.")
        .arg(
            Arg::new("body")
                .short('b')
                .long("body")
                .value_parser(value_parser!(String))
                .required(true)
                .help("The path to the $MFT image to analyze."),
        )
        .arg(
            Arg::new("entry")
                .short('e')
                .long("entry")
                .value_parser(maybe_hex::<u64>)
                .help("Display the metadata of a specific MFT entry number (decimal or hex)."),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_parser(value_parser!(String))
                .help("Display the metadata of every entry whose file name matches (case-insensitive)."),
        )
        .arg(
            Arg::new("shell")
                .short('s')
                .long("shell")
                .action(ArgAction::SetTrue)
                .help("Open an interactive shell over the carved records."),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(value_parser!(String))
                .default_value(".")
                .help("Directory receiving files carved from resident $DATA attributes."),
        )
        .arg(
            Arg::new("mirror")
                .short('m')
                .long("mirror")
                .value_parser(value_parser!(String))
                .help("Also write the report to the given file."),
        )
        .arg(
            Arg::new("json")
                .short('j')
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Output the report in JSON format."),
        )
        .arg(
            Arg::new("log_level")
                .short('l')
                .long("log-level")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("info")
                .help("Set the log verbosity level"),
        )
        .get_matches();

    // Initialize logger.
    let log_level_str = matches.get_one::<String>("log_level").unwrap();
    let level_filter = match log_level_str.as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };
    env_logger::Builder::new().filter_level(level_filter).init();

    let file_path = matches.get_one::<String>("body").unwrap();
    let entry = matches.get_one::<u64>("entry").copied();
    let name = matches.get_one::<String>("name");
    let open_shell = matches.get_flag("shell");
    let output_dir = PathBuf::from(matches.get_one::<String>("output").unwrap());
    let mirror = matches.get_one::<String>("mirror");
    let json_output = matches.get_flag("json");

    let raw = match std::fs::read(file_path) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Could not read '{}': {}", file_path, e);
            return;
        }
    };
    debug!("read {} bytes from '{}'", raw.len(), file_path);
    if raw.len() as u64 > LARGE_BODY_BYTES {
        warn!(
            "'{}' is {} bytes; the whole image is held in memory while it is analyzed",
            file_path,
            raw.len()
        );
    }

    let image = MftImage::from_bytes(&raw);
    if image.records.is_empty() {
        println!("No MFT entries found in '{}'.", file_path);
        return;
    }

    if open_shell {
        Shell::new(&image, output_dir).run();
        return;
    }

    let report = build_report(&image, entry, name, json_output);
    println!("{}", report);
    if let Some(mirror_path) = mirror {
        match std::fs::write(mirror_path, &report) {
            Ok(()) => println!("Output written to file {}", mirror_path),
            Err(e) => error!("An error occurred while writing to '{}': {}", mirror_path, e),
        }
    }
}

/// Render the non-interactive report: one entry, every entry with a matching
/// name, or the whole table.
fn build_report(
    image: &MftImage,
    entry: Option<u64>,
    name: Option<&String>,
    json_output: bool,
) -> String {
    let selected: Vec<_> = match (entry, name) {
        (Some(n), _) => image.record_by_entry(n).into_iter().collect(),
        (None, Some(wanted)) => image
            .records
            .iter()
            .filter(|r| {
                r.file_names()
                    .iter()
                    .any(|f| f.name.eq_ignore_ascii_case(wanted))
            })
            .collect(),
        (None, None) => image.records.iter().collect(),
    };

    if selected.is_empty() {
        return "No matching MFT entry found.".to_string();
    }

    if json_output {
        let arr: Vec<_> = selected.iter().map(|r| r.to_json()).collect();
        let doc = json!({ "entries": arr });
        serde_json::to_string_pretty(&doc).unwrap_or_else(|e| {
            error!("Error serializing entries to JSON: {}", e);
            String::new()
        })
    } else {
        let mut out = String::new();
        for record in selected {
            out.push_str(&format!(
                "Showing MFT entry for file: {} - MFT entry: {}\n",
                record.primary_name().unwrap_or_else(|| "<unnamed>".into()),
                record.header.entry_number
            ));
            out.push_str(&record.to_string());
            out.push('\n');
        }
        out
    }
}
