use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

use crate::{backend::BackendKind, gate::VerificationMode};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn validator_backend() -> ValueParser {
    ValueParser::from(move |backend: &str| -> std::result::Result<BackendKind, String> {
        backend.parse::<BackendKind>()
    })
}

pub fn validator_verification() -> ValueParser {
    ValueParser::from(
        move |mode: &str| -> std::result::Result<VerificationMode, String> {
            mode.parse::<VerificationMode>()
        },
    )
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("atelier")
        .about("Sign-in and admin gating for the atelier community gallery")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("ATELIER_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("backend")
                .short('b')
                .long("backend")
                .help("Identity, profile and OTP backend: memory or firebase")
                .default_value("memory")
                .env("ATELIER_BACKEND")
                .value_parser(validator_backend()),
        )
        .arg(
            Arg::new("firebase-api-key")
                .long("firebase-api-key")
                .help("Web API key of the Firebase project")
                .env("ATELIER_FIREBASE_API_KEY")
                .hide_env_values(true)
                .required_if_eq("backend", "firebase"),
        )
        .arg(
            Arg::new("firebase-project-id")
                .long("firebase-project-id")
                .help("Firebase project id")
                .env("ATELIER_FIREBASE_PROJECT_ID")
                .required_if_eq("backend", "firebase"),
        )
        .arg(
            Arg::new("functions-region")
                .long("functions-region")
                .help("Region the sendOtp and verifyOtp functions are deployed to")
                .default_value("us-central1")
                .env("ATELIER_FUNCTIONS_REGION"),
        )
        .arg(
            Arg::new("firestore-token")
                .long("firestore-token")
                .help("OAuth access token for the Firestore REST API, read once at startup (expires after about an hour)")
                .env("ATELIER_FIRESTORE_TOKEN")
                .hide_env_values(true)
                .required_if_eq("backend", "firebase"),
        )
        .arg(
            Arg::new("verification")
                .long("verification")
                .help("How new accounts verify their email: otp or email-link")
                .default_value("otp")
                .env("ATELIER_VERIFICATION")
                .value_parser(validator_verification()),
        )
        .arg(
            Arg::new("otp-resend-cooldown")
                .long("otp-resend-cooldown")
                .help("Seconds before another one-time passcode can be requested")
                .default_value("60")
                .env("ATELIER_OTP_RESEND_COOLDOWN")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("ATELIER_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
