use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use cmdclient_frame::{Command, CommandKind, EncodedCommand};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FieldOutput {
    field: &'static str,
    size: usize,
    hex: String,
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    kind: &'a str,
    code: u32,
    address: Option<String>,
    wire_size: usize,
    fields: Vec<FieldOutput>,
}

#[derive(Serialize)]
struct SentOutput<'a> {
    server: &'a str,
    sender: &'a str,
    kind: &'a str,
    code: u32,
    wire_size: usize,
    sent: bool,
}

#[derive(Serialize)]
struct KindOutput {
    name: &'static str,
    code: u32,
}

pub fn print_encoded(command: &Command, encoded: &EncodedCommand, format: OutputFormat) {
    let fields: Vec<FieldOutput> = encoded
        .fields()
        .map(|(field, bytes)| FieldOutput {
            field: field.name(),
            size: bytes.len(),
            hex: hex::encode(bytes),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let out = EncodedOutput {
                kind: command.kind().name(),
                code: command.kind().code(),
                address: command.address().map(|addr| addr.to_string()),
                wire_size: encoded.wire_size(),
                fields,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "SIZE", "BYTES"]);
            for field in fields {
                table.add_row(vec![field.field.to_string(), field.size.to_string(), field.hex]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} ({}) wire_size={}",
                command.kind(),
                command.kind().code(),
                encoded.wire_size()
            );
            for field in fields {
                println!("  {:<16} {:>4}  {}", field.field, field.size, field.hex);
            }
        }
        OutputFormat::Raw => print_raw(&encoded.to_bytes()),
    }
}

pub fn print_sent(
    server: &str,
    sender: &str,
    command: &Command,
    wire_size: usize,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&SentOutput {
            server,
            sender,
            kind: command.kind().name(),
            code: command.kind().code(),
            wire_size,
            sent: true,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SERVER", "SENDER", "KIND", "SIZE"])
                .add_row(vec![
                    server.to_string(),
                    sender.to_string(),
                    command.kind().to_string(),
                    wire_size.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "sent {} ({} bytes) to {server} as {sender}",
                command.kind(),
                wire_size
            );
        }
    }
}

pub fn print_kinds(format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let kinds: Vec<KindOutput> = CommandKind::ALL
                .iter()
                .map(|kind| KindOutput {
                    name: kind.name(),
                    code: kind.code(),
                })
                .collect();
            print_json(&kinds);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CODE", "KIND"]);
            for kind in CommandKind::ALL {
                table.add_row(vec![kind.code().to_string(), kind.name().to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for kind in CommandKind::ALL {
                println!("{:>3}  {}", kind.code(), kind.name());
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
