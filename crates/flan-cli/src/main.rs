use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flan_config::{resolve_paths, UnusedKeyPolicy};
use flan_protocol::{
    checksum, map, validate, Outcome, PacketHeader, PacketLimits, RequestType, SealOptions,
    StatusCode, PROTOCOL_VERSION,
};
use serde_json::{json, Value};
use std::fs;

#[derive(Parser)]
#[command(name = "flan")]
#[command(about = "FLAN/1.0 packet and config tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> local -> ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Print the texture checksum of a body
    Checksum {
        /// Protocol version
        #[arg(long, default_value_t = PROTOCOL_VERSION)]
        version: u32,

        /// Request type (HANDSHAKE | ORDER | POLL | PING)
        #[arg(long = "type", value_parser = parse_request_type)]
        request_type: RequestType,

        #[arg(long, default_value = "")]
        body: String,
    },

    /// Print a ready-to-send `{header, body}` packet
    Seal {
        /// Request type (HANDSHAKE | ORDER | POLL | PING)
        #[arg(long = "type", value_parser = parse_request_type)]
        request_type: RequestType,

        #[arg(long, default_value = "")]
        body: String,

        #[arg(long, default_value_t = 30)]
        ttl: u32,

        #[arg(long, default_value_t = 180)]
        temperature: i64,

        #[arg(long, default_value = "127.0.0.1")]
        source: String,

        #[arg(long, default_value = "127.0.0.1")]
        dest: String,
    },

    /// Validate a packet file. Exits non-zero on rejection.
    Validate {
        /// JSON file holding `{header, body}`
        packet: String,

        /// Layered config paths; their `packet` section sets the limits
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Print the status code table
    Codes,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let resolved = resolve_paths(&path_refs, UnusedKeyPolicy::Warn)?;
            println!("config_hash={}", resolved.loaded.config_hash);
            for pointer in &resolved.unused.unused_leaf_pointers {
                println!("unused_key={pointer}");
            }
            println!("{}", resolved.loaded.canonical_json);
        }

        Commands::Checksum {
            version,
            request_type,
            body,
        } => {
            println!("{}", checksum(version, request_type, &body));
        }

        Commands::Seal {
            request_type,
            body,
            ttl,
            temperature,
            source,
            dest,
        } => {
            let header = PacketHeader::seal(
                request_type,
                &body,
                SealOptions {
                    ttl,
                    temperature,
                    source_id: source,
                    dest_id: dest,
                },
            );
            let packet = json!({ "header": header.to_raw(), "body": body });
            println!("{}", serde_json::to_string_pretty(&packet)?);
        }

        Commands::Validate {
            packet,
            config_paths,
        } => {
            let limits = packet_limits(&config_paths)?;
            let (header, body) = load_packet(&packet)?;

            match validate(&header, &body, &limits) {
                Ok(valid) => {
                    let h = valid.header();
                    println!(
                        "ok=true request_type={} size_ml={} ttl={} checksum={}",
                        h.request_type, h.size_ml, h.ttl, h.checksum
                    );
                }
                Err(e) => {
                    let status = map(Outcome::from(&e));
                    bail!(
                        "packet rejected: {} (status {} {})",
                        e,
                        status.code(),
                        status.name()
                    );
                }
            }
        }

        Commands::Codes => {
            for code in StatusCode::ALL {
                println!(
                    "{:<4}{:<20}{:<14}{}",
                    code.code(),
                    code.name(),
                    class_label(code),
                    code.description()
                );
            }
        }
    }

    Ok(())
}

fn parse_request_type(s: &str) -> std::result::Result<RequestType, String> {
    RequestType::parse(s).ok_or_else(|| format!("unknown request type {s:?}"))
}

fn class_label(code: StatusCode) -> &'static str {
    use flan_protocol::StatusClass;
    match code.class() {
        StatusClass::Success => "success",
        StatusClass::Redirect => "redirect",
        StatusClass::ClientError => "client_error",
        StatusClass::ServerError => "server_error",
    }
}

fn packet_limits(config_paths: &[String]) -> Result<PacketLimits> {
    if config_paths.is_empty() {
        return Ok(PacketLimits::default());
    }
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let resolved = resolve_paths(&path_refs, UnusedKeyPolicy::Warn)?;
    Ok(resolved.config.packet)
}

/// Read a `{header, body}` packet file. A missing body is the empty body.
fn load_packet(path: &str) -> Result<(Value, String)> {
    let raw = fs::read_to_string(path).with_context(|| format!("read packet: {path}"))?;
    let v: Value = serde_json::from_str(&raw).context("parse packet json")?;
    let Some(header) = v.get("header").cloned() else {
        bail!("packet file has no header: {path}");
    };
    let body = v
        .get("body")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok((header, body))
}
