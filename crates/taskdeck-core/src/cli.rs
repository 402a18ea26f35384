use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Taskdeck: task management with calendar projections",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "taskdeckrc")]
    pub taskdeckrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// One resolved invocation: a command name plus its remaining tokens. The
/// first token naming (or unambiguously abbreviating) a known command wins;
/// an empty invocation falls back to `default.command`.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub command: String,
    pub args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let mut tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        if tokens.is_empty() {
            let cmd = cfg
                .get("default.command")
                .unwrap_or_else(|| "list".to_string());
            debug!(command = %cmd, "no explicit command, using default");
            return Ok(Self {
                command: cmd,
                args: vec![],
            });
        }

        let first = tokens.remove(0);
        let known = crate::commands::known_command_names();
        let command = crate::commands::expand_command_abbrev(&first, &known)
            .ok_or_else(|| anyhow!("unknown command: {first}"))?
            .to_string();

        debug!(token = %first, expanded = %command, "resolved command token");
        Ok(Self {
            command,
            args: tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_config() -> Config {
        Config::load(Some(std::path::Path::new("/dev/null"))).expect("config")
    }

    #[test]
    fn empty_invocation_uses_default_command() {
        let inv = Invocation::parse(&bare_config(), vec![]).expect("parse");
        assert_eq!(inv.command, "list");
    }

    #[test]
    fn expands_unambiguous_abbreviation() {
        let inv =
            Invocation::parse(&bare_config(), vec![OsString::from("cal")]).expect("parse");
        assert_eq!(inv.command, "calendar");
    }

    #[test]
    fn rejects_unknown_command() {
        let err = Invocation::parse(&bare_config(), vec![OsString::from("frobnicate")]);
        assert!(err.is_err());
    }

    #[test]
    fn keyval_parses_and_rejects() {
        let kv: KeyVal = "color = off".parse().expect("keyval");
        assert_eq!(kv.key, "color");
        assert_eq!(kv.value, "off");
        assert!("no-equals".parse::<KeyVal>().is_err());
    }
}
