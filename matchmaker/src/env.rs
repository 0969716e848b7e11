use clap::Parser;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// CLI flags for the matchmaker binary. Every flag has a layered
/// fallback: flag > `APP__`-prefixed env var > optional TOML file >
/// the built-in default baked into [`Settings::load`].
#[derive(Debug, Parser)]
#[command(name = "matchmaker", about = "1v1 matchmaking coordinator")]
pub struct Args {
    #[arg(long)]
    pub matchmaker_port: Option<u16>,

    #[arg(long)]
    pub heartbeat_timeout: Option<u64>,

    #[arg(long)]
    pub match_tick: Option<u64>,

    #[arg(long)]
    pub dispatch_timeout: Option<u64>,

    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long)]
    pub log_dir: Option<String>,

    #[arg(long)]
    pub metrics_port: Option<u16>,

    #[arg(long)]
    pub config_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub node_id: String,
    pub server: ServerSettings,
    pub matchmaking: MatchmakingSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
    pub log_level: String,
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchmakingSettings {
    pub match_tick_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
    pub dispatch_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub directory: String,
    pub filename: String,
}

impl Settings {
    /// Layers, lowest to highest precedence: built-in defaults, an
    /// optional TOML file, `APP__`-prefixed environment variables,
    /// then explicit CLI flags.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("node_id", "matchmaker")?
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.port", 50051)?
            .set_default("server.log_level", "info")?
            .set_default::<_, Option<i64>>("server.metrics_port", None)?
            .set_default("matchmaking.match_tick_seconds", 2)?
            .set_default("matchmaking.heartbeat_timeout_seconds", 30)?
            .set_default("matchmaking.dispatch_timeout_seconds", 10)?
            .set_default("logging.directory", "./logs")?
            .set_default("logging.filename", "matchmaker.log")?;

        if let Some(path) = &args.config_file {
            builder =
                builder.add_source(File::with_name(path).format(FileFormat::Toml).required(true));
        } else {
            builder = builder.add_source(
                File::with_name("config/matchmaker")
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if let Some(v) = args.matchmaker_port {
            settings.server.port = v;
        }
        if let Some(v) = args.match_tick {
            settings.matchmaking.match_tick_seconds = v;
        }
        if let Some(v) = args.heartbeat_timeout {
            settings.matchmaking.heartbeat_timeout_seconds = v;
        }
        if let Some(v) = args.dispatch_timeout {
            settings.matchmaking.dispatch_timeout_seconds = v;
        }
        if let Some(v) = &args.log_level {
            settings.server.log_level = v.clone();
        }
        if let Some(v) = &args.log_dir {
            settings.logging.directory = v.clone();
        }
        if let Some(v) = args.metrics_port {
            settings.server.metrics_port = Some(v);
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> Args {
        Args {
            matchmaker_port: None,
            heartbeat_timeout: None,
            match_tick: None,
            dispatch_timeout: None,
            log_level: None,
            log_dir: None,
            metrics_port: None,
            config_file: None,
        }
    }

    #[test]
    fn defaults_apply_when_nothing_else_is_set() {
        let settings = Settings::load(&bare_args()).unwrap();
        assert_eq!(settings.server.port, 50051);
        assert_eq!(settings.matchmaking.match_tick_seconds, 2);
        assert_eq!(settings.matchmaking.heartbeat_timeout_seconds, 30);
    }

    #[test]
    fn cli_flag_overrides_default() {
        let mut args = bare_args();
        args.matchmaker_port = Some(9999);
        args.match_tick = Some(5);
        let settings = Settings::load(&args).unwrap();
        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.matchmaking.match_tick_seconds, 5);
    }
}
