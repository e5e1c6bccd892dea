mod config;
mod logging;

use clap::{Parser, Subcommand};
use config::BindingConfig;
use jacklib::{
    ClientHandle, Jack, NativeLibrary, OpenArgs, Options, PortFlags, PropertyRecord, PropertyValue, Status,
    TransportState,
};
use std::ffi::c_int;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "jacklib-cli")]
#[command(author, version, about = "Inspect a JACK server through runtime-loaded libjack", long_about = None)]
struct Args {
    /// TOML file with binding settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// libjack to load instead of the platform default
    #[arg(long)]
    library: Option<PathBuf>,

    /// Client name to open with
    #[arg(long)]
    client_name: Option<String>,

    /// Start a server if none is running
    #[arg(long)]
    start_server: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Library version, generation and symbol counts
    Info,
    /// List resolvable symbols
    Symbols {
        /// Only symbols the loaded library lacks
        #[arg(long)]
        missing: bool,
        #[arg(long)]
        json: bool,
    },
    /// List ports with type, flags and aliases
    Ports {
        #[arg(long)]
        pattern: Option<String>,
        #[arg(long = "type")]
        type_pattern: Option<String>,
    },
    /// Print the transport position
    Transport {
        /// Start a stopped transport, stop a rolling one
        #[arg(long)]
        toggle: bool,
    },
    /// List every metadata property by subject
    Properties {
        #[arg(long)]
        json: bool,
    },
    /// List the metadata properties of one port
    PortProperties { port: String },
    /// Print or set the pretty name of a port
    PrettyName { port: String, value: Option<String> },
    /// Log graph notifications for a while
    Monitor {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);
    if let Err(err) = run(args) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let mut config = BindingConfig::load_or_default(args.config.as_deref())?;
    if let Some(library) = args.library {
        config.library = Some(library);
    }
    if let Some(client_name) = args.client_name {
        config.client_name = client_name;
    }
    config.start_server |= args.start_server;

    let jack = load(&config)?;
    match args.command {
        Command::Info => info_command(&jack),
        Command::Symbols { missing, json } => symbols_command(&jack, missing, json),
        Command::Ports {
            pattern,
            type_pattern,
        } => with_client(jack, &config, |jack, client| {
            ports_command(jack, client, pattern.as_deref(), type_pattern.as_deref())
        }),
        Command::Transport { toggle } => {
            with_client(jack, &config, |jack, client| transport_command(jack, client, toggle))
        }
        Command::Properties { json } => with_client(jack, &config, |jack, _| properties_command(jack, json)),
        Command::PortProperties { port } => with_client(jack, &config, |jack, client| {
            print_records(&jack.port_properties(client, &port));
            Ok(())
        }),
        Command::PrettyName { port, value } => with_client(jack, &config, |jack, client| {
            pretty_name_command(jack, client, &port, value.as_deref())
        }),
        Command::Monitor { seconds } => with_client(jack, &config, |jack, client| {
            monitor_command(jack, client, Duration::from_secs(seconds))
        }),
    }
}

fn load(config: &BindingConfig) -> Result<Jack, String> {
    let native = match &config.library {
        Some(path) => NativeLibrary::load_from(path).map(Arc::new),
        None => NativeLibrary::shared(),
    }
    .map_err(|e| e.to_string())?;
    let mut jack = Jack::new(native);
    jack.set_encoding(config.encoding);
    Ok(jack)
}

/// Opens a client, runs `f` and closes the client again, also when `f` fails.
fn with_client(
    mut jack: Jack,
    config: &BindingConfig,
    f: impl FnOnce(&mut Jack, ClientHandle) -> Result<(), String>,
) -> Result<(), String> {
    let options = if config.start_server {
        Options::empty()
    } else {
        Options::NO_START_SERVER
    };
    let (client, status) = jack.client_open(&config.client_name, options, &OpenArgs::default());
    let Some(client) = client else {
        return Err(format!("Error connecting to JACK server: {status}"));
    };
    if status.contains(Status::NAME_NOT_UNIQUE) {
        warn!("Non-fatal JACK status: {status}");
    } else if status.contains(Status::SERVER_STARTED) {
        info!("JACK server started");
    }

    let result = f(&mut jack, client);
    if jack.client_close(client) != 0 {
        warn!("Closing client '{}' failed", config.client_name);
    }
    result
}

fn info_command(jack: &Jack) -> Result<(), String> {
    let native = jack.native();
    println!("version: {}", jack.version_string().unwrap_or_else(|| "<unknown>".to_string()));
    if let Some((major, minor, micro, proto)) = jack.version() {
        println!("version numbers: {major}.{minor}.{micro} (protocol {proto})");
    }
    println!("generation: {}", jack.generation());
    println!("encoding: {}", jack.encoding());
    println!(
        "symbols: {} of {} resolved",
        native.resolved_count(),
        native.entries().len()
    );
    Ok(())
}

fn symbols_command(jack: &Jack, missing: bool, json: bool) -> Result<(), String> {
    let entries: Vec<_> = jack
        .native()
        .entries()
        .iter()
        .filter(|entry| !missing || !entry.resolved)
        .collect();
    if json {
        let text = serde_json::to_string_pretty(&entries).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }
    for entry in entries {
        let mark = if entry.resolved { '+' } else { '-' };
        println!("{mark} {} {}", entry.name, entry.signature);
    }
    Ok(())
}

fn ports_command(
    jack: &Jack,
    client: ClientHandle,
    pattern: Option<&str>,
    type_pattern: Option<&str>,
) -> Result<(), String> {
    for name in jack.get_ports(client, pattern, type_pattern, PortFlags::empty()) {
        let Some(port) = jack.port_by_name(client, &name) else {
            println!("{name}");
            continue;
        };
        let port_type = jack.port_type(port).unwrap_or_default();
        let flags = jack.port_flags(port).unwrap_or_default();
        println!("{name} [{port_type}] {flags:?}");
        for alias in jack.port_get_aliases(port).unwrap_or_default() {
            println!("    alias: {alias}");
        }
        for peer in jack.port_get_connections(port) {
            println!("    -> {peer}");
        }
    }
    Ok(())
}

fn transport_command(jack: &Jack, client: ClientHandle, toggle: bool) -> Result<(), String> {
    let (state, position) = jack
        .transport_query(client)
        .ok_or("jack_transport_query is not available")?;
    println!("state: {state}");
    println!("frame: {}", position.frame);
    println!("frame_rate: {}", position.frame_rate);
    println!("usecs: {}", position.usecs);
    if let Some(seconds) = position.seconds() {
        println!("seconds: {seconds:.3}");
    }
    if position.has_bbt() {
        println!("bar: {}", position.bar);
        println!("beat: {}", position.beat);
        println!("tick: {}", position.tick);
        println!("beats_per_bar: {}", position.beats_per_bar);
        println!("beat_type: {}", position.beat_type);
        println!("ticks_per_beat: {}", position.ticks_per_beat);
        println!("beats_per_minute: {}", position.beats_per_minute);
    }

    if toggle {
        match state {
            TransportState::Stopped => {
                info!("Transport stopped, starting it");
                jack.transport_start(client);
            }
            TransportState::Rolling => {
                info!("Transport rolling, stopping it");
                jack.transport_stop(client);
            }
            other => info!("Transport {other}, nothing to do"),
        }
    }
    Ok(())
}

fn value_text(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Text(text) => text.clone(),
        PropertyValue::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

fn print_records(records: &[PropertyRecord]) {
    for record in records {
        println!(
            "* {}: {} (type: {})",
            record.key,
            value_text(&record.value),
            record.mime_type.as_deref().unwrap_or("-")
        );
    }
}

fn properties_command(jack: &Jack, json: bool) -> Result<(), String> {
    let all = jack.all_properties();
    if json {
        let text = serde_json::to_string_pretty(&all).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }
    for (subject, records) in &all {
        println!("Subject {subject}:");
        print_records(records);
        println!();
    }
    Ok(())
}

fn pretty_name_command(jack: &Jack, client: ClientHandle, port: &str, value: Option<&str>) -> Result<(), String> {
    if jack.port_by_name(client, port).is_none() {
        return Err(format!("Port '{port}' not found"));
    }
    match value {
        Some(value) => {
            if jack.set_port_pretty_name(client, port, value) != 0 {
                return Err(format!("Setting the pretty name of '{port}' failed"));
            }
            println!("Pretty name for '{port}' set to '{value}'");
        }
        None => {
            let name = jack.port_pretty_name(client, port);
            println!(
                "Pretty name for '{port}': '{}'",
                name.as_deref().unwrap_or("<not set>")
            );
        }
    }
    Ok(())
}

/// Logs a callback registration libjack refused; monitoring goes on without it.
fn check_registration(name: &str, status: c_int) -> bool {
    if status != 0 {
        warn!(callback = name, status, "callback registration failed");
        return false;
    }
    true
}

fn monitor_command(jack: &mut Jack, client: ClientHandle, duration: Duration) -> Result<(), String> {
    let api = jack.api();
    let status = jack.set_client_registration_callback(client, |name, registered| {
        info!(client = %name, registered, "client registration");
    });
    check_registration("jack_set_client_registration_callback", status);
    let status = jack.set_port_registration_callback(client, move |port_id, registered| {
        let name = api.port_by_id(client, port_id).and_then(|port| api.port_name(port));
        info!(port_id, name = name.as_deref().unwrap_or("?"), registered, "port registration");
    });
    check_registration("jack_set_port_registration_callback", status);
    let status = jack.set_port_connect_callback(client, |a, b, connected| {
        info!(a, b, connected, "port connection");
    });
    check_registration("jack_set_port_connect_callback", status);
    let status = jack.set_port_rename_callback(client, |port_id, old, new| {
        info!(port_id, old = %old, new = %new, "port rename");
    });
    check_registration("jack_set_port_rename_callback", status);
    let status = jack.set_xrun_callback(client, || {
        warn!("xrun");
        0
    });
    check_registration("jack_set_xrun_callback", status);
    let status = jack.set_sample_rate_callback(client, |rate| {
        info!(rate, "sample rate");
        0
    });
    check_registration("jack_set_sample_rate_callback", status);
    let status = jack.set_buffer_size_callback(client, |frames| {
        info!(frames, "buffer size");
        0
    });
    check_registration("jack_set_buffer_size_callback", status);
    let status = jack.set_property_change_callback(client, |subject, key, change| {
        info!(subject, key = key.as_deref().unwrap_or("*"), ?change, "property change");
    });
    check_registration("jack_set_property_change_callback", status);
    jack.on_info_shutdown(client, |status, reason| {
        warn!(%status, reason = %reason, "server shut down");
    });

    if jack.activate(client) != 0 {
        return Err("Activating client failed".to_string());
    }
    info!(seconds = duration.as_secs(), "Monitoring");
    std::thread::sleep(duration);
    if jack.deactivate(client) != 0 {
        warn!("Deactivating client failed");
    }
    Ok(())
}
