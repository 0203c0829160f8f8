//! CLI flags with env var fallback for the wire protocol's bind address and
//! instrument set, parsed with a manual `while i < args.len()` scan rather
//! than an external CLI-parsing crate.

use crate::number_tool::parse_human_readable_u32;
use crate::transport::BindAddr;

/// Parsed server configuration.
pub struct ServerConfig {
    pub bind: BindAddr,
    pub instruments: Vec<String>,
    /// Number of synthetic bid/ask pairs to seed into the first configured
    /// instrument at startup, for local smoke-testing (`--seed-book-size`).
    pub seed_book_size: u32,
}

impl ServerConfig {
    /// Parses `std::env::args()`, falling back to `ENGINE_BIND` /
    /// `ENGINE_INSTRUMENTS` (comma-separated) when the corresponding flag is
    /// absent. Defaults to a Unix socket at `/tmp/lighting-match-engine.sock`
    /// and a single instrument named `AAPL` when neither flag nor env var is
    /// set.
    pub fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        Self::parse(&args)
    }

    fn parse(args: &[String]) -> Result<Self, String> {
        let mut bind_str: Option<String> = None;
        let mut unix = false;
        let mut instruments: Vec<String> = Vec::new();
        let mut seed_book_size_str: Option<String> = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--bind" => {
                    if i + 1 < args.len() {
                        bind_str = Some(args[i + 1].clone());
                        i += 1;
                    } else {
                        return Err("--bind requires a value".to_string());
                    }
                }
                "--unix" => {
                    unix = true;
                }
                "--instrument" => {
                    if i + 1 < args.len() {
                        instruments.push(args[i + 1].clone());
                        i += 1;
                    } else {
                        return Err("--instrument requires a value".to_string());
                    }
                }
                "--seed-book-size" => {
                    if i + 1 < args.len() {
                        seed_book_size_str = Some(args[i + 1].clone());
                        i += 1;
                    } else {
                        return Err("--seed-book-size requires a value".to_string());
                    }
                }
                _ => {}
            }
            i += 1;
        }

        let bind_str = bind_str.or_else(|| std::env::var("ENGINE_BIND").ok());

        if instruments.is_empty() {
            if let Ok(env_instruments) = std::env::var("ENGINE_INSTRUMENTS") {
                instruments = env_instruments.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
            }
        }
        if instruments.is_empty() {
            instruments.push("AAPL".to_string());
        }

        let bind = match bind_str {
            Some(s) if unix => BindAddr::Unix(std::path::PathBuf::from(s)),
            Some(s) => BindAddr::Tcp(s),
            None if unix => BindAddr::Unix(std::path::PathBuf::from("/tmp/lighting-match-engine.sock")),
            None => BindAddr::Tcp("127.0.0.1:7878".to_string()),
        };

        let seed_book_size = match seed_book_size_str {
            Some(s) => parse_human_readable_u32(&s)?,
            None => 0,
        };

        Ok(ServerConfig {
            bind,
            instruments,
            seed_book_size,
        })
    }
}
