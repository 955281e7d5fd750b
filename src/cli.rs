//! Command-line interface

use clap::{ArgAction, Parser};

use crate::config::{SessionConfig, DEFAULT_PARSE_LEVEL, DEFAULT_TIMEOUT_MS};

const AFTER_HELP: &str = "\
Preload example:
  --preload '{\"Content-Type\":\"text/html\",\"body\":\"/tmp/fileContents.utf8.html\"}'

Example:
  rfextract --url http://www.google.com";

/// Retrieves and parses the specified HTML page. Returns JSON encoded results
/// of interest, as well as any XMLHttpRequests.
#[derive(Parser, Debug)]
#[command(
    name = "rfextract",
    version,
    disable_help_flag = true,
    after_help = AFTER_HELP
)]
pub struct Cli {
    /// Display this usage information
    #[arg(short = '?', long = "help", action = ArgAction::Help)]
    #[allow(dead_code)]
    help: Option<bool>,

    /// Verbose output
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Print debug information
    #[arg(short = 'd')]
    pub debug: bool,

    /// The URL of the web page to be rendered
    #[arg(long, value_name = "URL")]
    pub url: String,

    /// The user agent string to use. Default is the engine's RFOX user agent
    #[arg(long = "userAgent", value_name = "STRING")]
    pub user_agent: Option<String>,

    /// 0 = don't parse; 1 = ajax requests only; 2 = basic parsing; 3 = intensive parsing
    #[arg(
        long = "parseLevel",
        value_name = "LEVEL",
        default_value_t = DEFAULT_PARSE_LEVEL,
        value_parser = clap::value_parser!(u8).range(0..=3)
    )]
    pub parse_level: u8,

    /// Integer in milliseconds representing overall timeout. default 5mins
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,

    /// A JSON object containing http headers and file location of utf-8
    /// encoded text to replace the initial request
    #[arg(long, value_name = "JSON", value_parser = parse_preload)]
    pub preload: Option<serde_json::Value>,
}

fn parse_preload(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))
}

impl Cli {
    pub fn into_config(self) -> SessionConfig {
        SessionConfig {
            target_url: self.url,
            user_agent: self.user_agent,
            timeout_ms: self.timeout,
            parse_level: self.parse_level,
            preloaded_page: self.preload,
            verbose: self.verbose,
            debug: self.debug,
        }
    }
}
