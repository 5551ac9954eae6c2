//! vlm-json entry point.
//!
//! ## CLI Subcommands
//!
//! - `vlm-json analyze [OPTIONS]` - Load a model and run one request
//! - `vlm-json config show|defaults` - Inspect configuration
//! - `vlm-json version` - Print version

use std::process::ExitCode;

use vlm_json::cli::{analyze_cmd, config_cmd};
use vlm_json::config as vlm_config;
use vlm_json::telemetry::init_logging;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "analyze" => {
            let env = vlm_config::load();
            if let Err(e) = init_logging(&env.log) {
                eprintln!("Logging disabled: {e}");
            }
            let code = analyze_cmd::run(&args[2..], &env);
            ExitCode::from(code as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let json = args.get(3).map(|s| s.as_str()) == Some("--json");
                    ExitCode::from(config_cmd::run_show(json) as u8)
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                _ => {
                    eprintln!("Unknown config subcommand: {subcommand}");
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("vlm-json {}", vlm_json::VERSION);
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {command}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!(
        "vlm-json {}

USAGE:
    vlm-json <COMMAND> [OPTIONS]

COMMANDS:
    analyze      Run one greedy JSON generation request
    config       Show configuration (show, defaults)
    version      Show version information
    help         Show this help message

ENVIRONMENT:
    VLM_JSON_MODEL_PATH     GGUF model file
    VLM_JSON_MMPROJ_PATH    Vision projector file
    VLM_JSON_LOG_LEVEL      Log filter (default: info)
    VLM_JSON_LOG_FORMAT     json or pretty (default: pretty)

EXIT CODES:
    0  Success
    1  Failure
    2  Usage error
",
        vlm_json::VERSION
    );
}

fn print_command_help(command: &str) {
    match command {
        "analyze" => {
            eprintln!(
                "vlm-json analyze - Run one request

USAGE:
    vlm-json analyze [OPTIONS]

OPTIONS:
    --model PATH          GGUF model (default: VLM_JSON_MODEL_PATH)
    --mmproj PATH         Vision projector (default: VLM_JSON_MMPROJ_PATH)
    --chat-template NAME  Template name recorded on the session
    --system TEXT         System prompt
    --system-file PATH    Read the system prompt from a file
    --user TEXT           User prompt
    --image PATH          Encoded image (JPEG, PNG, ...)
    --max-tokens N        Token budget (default: VLM_JSON_MAX_TOKENS)
    --temperature F       Accepted and ignored; decoding is greedy
    --ctx N               Context window (0 = default)
    --threads N           Inference threads (0 = auto)
    --extract             Print only the recovered JSON object

DESCRIPTION:
    Loads the model, evaluates the prompt (and image, when a projector is
    available), decodes greedily until the output is one complete JSON
    value, then prints the result to stdout. Prints {{}} when nothing was
    generated. Requires a build with the `gguf` feature.

EXAMPLES:
    vlm-json analyze --model lfm2-vl.gguf --mmproj mmproj.gguf \\
        --image shirt.jpg --system-file prompt.txt --user \"Classify\"
"
            );
        }
        "config" => {
            eprintln!(
                "vlm-json config - Show configuration

USAGE:
    vlm-json config <SUBCOMMAND>

SUBCOMMANDS:
    show [--json]  Show effective configuration
    defaults       Show default configuration
"
            );
        }
        _ => {
            eprintln!("No detailed help available for '{command}'. Use 'vlm-json help' for general usage.");
        }
    }
}
