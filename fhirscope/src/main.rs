use fhirscope::commands::command_argument_builder;
use fhirscope::handlers::{handle_cursors, handle_latency, init_logging, report_failure};

#[tokio::main]
async fn main() {
    // Settings may come from a .env file; a missing file is fine.
    let _ = dotenvy::dotenv();

    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_logging(quiet);

    let outcome = match chosen_command.subcommand() {
        Some(("cursors", primary_command)) => handle_cursors(primary_command, quiet).await,
        Some(("latency", primary_command)) => handle_latency(primary_command, quiet).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        report_failure(&e);
        std::process::exit(1);
    }
}
