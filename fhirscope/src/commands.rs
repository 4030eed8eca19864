use clap::{arg, command};
use fhirscope_core::probe::NUMBER_OF_TRIES;
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

fn cert_arg() -> clap::Arg {
    arg!(-c --"cert" <PATH>)
        .required(true)
        .env("FHIR_CLIENT_CERT")
        .help("PEM file holding both the client certificate and its private key")
        .value_parser(clap::value_parser!(PathBuf))
}

fn timeout_arg() -> clap::Arg {
    arg!(--"timeout" <SECONDS>)
        .required(false)
        .help("Per-request timeout in seconds (default: none)")
        .value_parser(clap::value_parser!(u64).range(1..))
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("fhirscope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("fhirscope")
        .about("Diagnostics for FHIR APIs behind mutual TLS")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress progress output and informational logs")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("cursors")
                .about(
                    "Walk every pagination cursor of a contract's Patient search and log each \
                one to a file.",
                )
                .arg(cert_arg())
                .arg(
                    arg!(--"host" <HOST>)
                        .required(true)
                        .env("FHIR_HOST")
                        .help("Target host"),
                )
                .arg(
                    arg!(--"port" <PORT>)
                        .required(true)
                        .env("FHIR_PORT")
                        .help("Target port")
                        .value_parser(clap::value_parser!(u16)),
                )
                .arg(
                    arg!(--"contract-id" <ID>)
                        .required(true)
                        .env("CONTRACT_ID")
                        .help("Part D contract identifier"),
                )
                .arg(
                    arg!(--"contract-month" <MONTH>)
                        .required(true)
                        .env("CONTRACT_MONTH")
                        .help("Contract month, 1 through 12"),
                )
                .arg(
                    arg!(--"reference-year" <YEAR>)
                        .required(false)
                        .env("CONTRACT_YEAR")
                        .help("Optional coverage reference year filter"),
                )
                .arg(
                    arg!(-o --"log-dir" <PATH>)
                        .required(false)
                        .env("CURSOR_LOG_DIR")
                        .help("Directory receiving the timestamped cursor log")
                        .value_parser(clap::value_parser!(PathBuf))
                        .default_value("."),
                )
                .arg(
                    arg!(--"max-pages" <PAGES>)
                        .required(false)
                        .help(
                            "Abort after this many pages without reaching the end \
                        (default: walk until the server stops paging)",
                        )
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(timeout_arg()),
        )
        .subcommand(
            command!("latency")
                .about(
                    "Time repeated requests against every endpoint in an endpoints document \
                and print the average per endpoint.",
                )
                .arg(cert_arg())
                .arg(
                    arg!(-b --"base-url" <URL>)
                        .required(true)
                        .env("FHIR_BASE_URL")
                        .help("Prefix joined to every endpoint path"),
                )
                .arg(
                    arg!(-e --"endpoints" <PATH>)
                        .required(true)
                        .env("ENDPOINTS_FILE")
                        .help("JSON document listing the endpoints to probe")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-t --"tries" <COUNT>)
                        .required(false)
                        .help(format!(
                            "Timed requests per endpoint (default: {})",
                            NUMBER_OF_TRIES
                        ))
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    arg!(--"concurrency" <NUM_WORKERS>)
                        .required(false)
                        .help("Maximum endpoints probed at once (default: all of them)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(timeout_arg()),
        )
}
