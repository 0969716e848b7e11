use clap::Parser;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(name = "game_server", about = "worker that accepts and simulates match assignments")]
pub struct Args {
    #[arg(long)]
    pub server_id: Option<String>,

    #[arg(long)]
    pub listen_addr: Option<String>,

    #[arg(long)]
    pub matchmaker_addr: Option<String>,

    #[arg(long)]
    pub heartbeat_timeout: Option<u64>,

    #[arg(long)]
    pub crash_probability: Option<f64>,

    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long)]
    pub log_dir: Option<String>,

    #[arg(long)]
    pub config_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server_id: String,
    pub listen_addr: String,
    pub matchmaker_addr: String,
    pub heartbeat_timeout_seconds: u64,
    pub crash_probability: f64,
    pub log_level: String,
    pub log_dir: String,
}

impl Settings {
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let default_server_id = format!("gs-{}", uuid::Uuid::new_v4());

        let mut builder = Config::builder()
            .set_default("server_id", default_server_id)?
            .set_default("listen_addr", "127.0.0.1:0")?
            .set_default("matchmaker_addr", "127.0.0.1:50051")?
            .set_default("heartbeat_timeout_seconds", 30)?
            .set_default("crash_probability", 0.1)?
            .set_default("log_level", "info")?
            .set_default("log_dir", "./logs")?;

        if let Some(path) = &args.config_file {
            builder =
                builder.add_source(File::with_name(path).format(FileFormat::Toml).required(true));
        } else {
            builder = builder.add_source(
                File::with_name("config/game_server")
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(Environment::with_prefix("APP").separator("__"));

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if let Some(v) = &args.server_id {
            settings.server_id = v.clone();
        }
        if let Some(v) = &args.listen_addr {
            settings.listen_addr = v.clone();
        }
        if let Some(v) = &args.matchmaker_addr {
            settings.matchmaker_addr = v.clone();
        }
        if let Some(v) = args.heartbeat_timeout {
            settings.heartbeat_timeout_seconds = v;
        }
        if let Some(v) = args.crash_probability {
            settings.crash_probability = v;
        }
        if let Some(v) = &args.log_level {
            settings.log_level = v.clone();
        }
        if let Some(v) = &args.log_dir {
            settings.log_dir = v.clone();
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> Args {
        Args {
            server_id: None,
            listen_addr: None,
            matchmaker_addr: None,
            heartbeat_timeout: None,
            crash_probability: None,
            log_level: None,
            log_dir: None,
            config_file: None,
        }
    }

    #[test]
    fn defaults_apply_when_nothing_else_is_set() {
        let settings = Settings::load(&bare_args()).unwrap();
        assert_eq!(settings.matchmaker_addr, "127.0.0.1:50051");
        assert!((settings.crash_probability - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn cli_flag_overrides_default() {
        let mut args = bare_args();
        args.crash_probability = Some(0.5);
        args.server_id = Some("gs-fixed".into());
        let settings = Settings::load(&args).unwrap();
        assert!((settings.crash_probability - 0.5).abs() < f64::EPSILON);
        assert_eq!(settings.server_id, "gs-fixed");
    }
}
