//! `analyze` subcommand: one request against a freshly loaded session.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::EnvConfig;
use crate::engine::Backend;
use crate::generation::{extract_json, FALLBACK_JSON};
use crate::session::{Session, SessionConfig};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session initialization failed for {0}")]
    InitFailed(PathBuf),
    #[error("no inference backend compiled in; rebuild with --features gguf")]
    NoBackend,
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Read { .. } | Self::InitFailed(_) | Self::NoBackend => 1,
        }
    }
}

/// Parsed `analyze` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeArgs {
    pub model: Option<PathBuf>,
    pub mmproj: Option<PathBuf>,
    pub chat_template: Option<String>,
    pub system: Option<String>,
    pub system_file: Option<PathBuf>,
    pub user: Option<String>,
    pub image: Option<PathBuf>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub ctx: i32,
    pub threads: i32,
    pub extract: bool,
}

impl AnalyzeArgs {
    /// Defaults taken from the environment configuration.
    pub fn from_env(env: &EnvConfig) -> Self {
        Self {
            model: env.model_path.clone(),
            mmproj: env.mmproj_path.clone(),
            chat_template: env.chat_template.clone(),
            system: None,
            system_file: None,
            user: None,
            image: None,
            max_tokens: env.max_tokens,
            temperature: 0.0,
            ctx: i32::try_from(env.n_ctx).unwrap_or(0),
            threads: i32::try_from(env.n_threads).unwrap_or(0),
            extract: false,
        }
    }

    /// Parse flags (everything after `analyze`) over env defaults.
    pub fn parse(args: &[String], env: &EnvConfig) -> Result<Self, CliError> {
        let mut parsed = Self::from_env(env);
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            if flag == "--extract" {
                parsed.extract = true;
                continue;
            }
            let value = iter
                .next()
                .ok_or_else(|| CliError::Usage(format!("Missing value for {flag}")))?;
            match flag.as_str() {
                "--model" => parsed.model = Some(PathBuf::from(value)),
                "--mmproj" => parsed.mmproj = Some(PathBuf::from(value)),
                "--chat-template" => parsed.chat_template = Some(value.clone()),
                "--system" => parsed.system = Some(value.clone()),
                "--system-file" => parsed.system_file = Some(PathBuf::from(value)),
                "--user" => parsed.user = Some(value.clone()),
                "--image" => parsed.image = Some(PathBuf::from(value)),
                "--max-tokens" => parsed.max_tokens = parse_number(flag, value)?,
                "--temperature" => parsed.temperature = parse_number(flag, value)?,
                "--ctx" => parsed.ctx = parse_number(flag, value)?,
                "--threads" => parsed.threads = parse_number(flag, value)?,
                _ => return Err(CliError::Usage(format!("Unknown argument: {flag}"))),
            }
        }
        if parsed.system.is_some() && parsed.system_file.is_some() {
            return Err(CliError::Usage(
                "--system and --system-file are mutually exclusive".to_string(),
            ));
        }
        Ok(parsed)
    }

    fn session_config(&self, env: &EnvConfig) -> Result<SessionConfig, CliError> {
        let model = self
            .model
            .clone()
            .ok_or_else(|| CliError::Usage("--model or VLM_JSON_MODEL_PATH is required".to_string()))?;
        let mut config = SessionConfig::new(model)
            .with_context_length(self.ctx)
            .with_thread_count(self.threads);
        config.projector_path = self.mmproj.clone();
        config.chat_template = self.chat_template.clone();
        config.batch_limit = env.n_batch.max(1) as usize;
        config.n_gpu_layers = env.n_gpu_layers;
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, CliError> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Usage(format!("Invalid value for {flag}: {value}")))
}

fn read_file(path: &PathBuf) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Read { path: path.clone(), source })
}

/// Initialize `session`, run one request and shut it down.
///
/// Returns the text to print: the raw output, or with `extract` the
/// recovered JSON object (`{}` when none).
pub fn execute<B: Backend>(
    session: &Session<B>,
    args: &AnalyzeArgs,
    env: &EnvConfig,
) -> Result<String, CliError> {
    let config = args.session_config(env)?;
    let system = match &args.system_file {
        Some(path) => Some(String::from_utf8_lossy(&read_file(path)?).into_owned()),
        None => args.system.clone(),
    };
    let image = args.image.as_ref().map(read_file).transpose()?;

    if !session.initialize(&config) {
        return Err(CliError::InitFailed(config.model_path));
    }
    let output = session.analyze(
        system.as_deref(),
        args.user.as_deref(),
        image.as_deref(),
        args.temperature,
        args.max_tokens,
    );
    session.shutdown();

    if args.extract {
        Ok(extract_json(&output).unwrap_or(FALLBACK_JSON).to_string())
    } else {
        Ok(output)
    }
}

/// Run `analyze` with the compiled-in backend. Returns the exit code.
pub fn run(args: &[String], env: &EnvConfig) -> i32 {
    let result = AnalyzeArgs::parse(args, env).and_then(|parsed| run_with_backend(&parsed, env));
    match result {
        Ok(output) => {
            println!("{output}");
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

#[cfg(feature = "gguf")]
fn run_with_backend(args: &AnalyzeArgs, env: &EnvConfig) -> Result<String, CliError> {
    execute(crate::session::global_session(), args, env)
}

#[cfg(not(feature = "gguf"))]
fn run_with_backend(_args: &AnalyzeArgs, _env: &EnvConfig) -> Result<String, CliError> {
    Err(CliError::NoBackend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::LogConfig;

    fn env() -> EnvConfig {
        EnvConfig {
            model_path: Some(PathBuf::from("/env/model.gguf")),
            mmproj_path: None,
            chat_template: None,
            n_ctx: 2048,
            n_threads: 0,
            n_batch: 512,
            n_gpu_layers: 0,
            max_tokens: 64,
            log: LogConfig::default(),
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flags_override_env() {
        let parsed = AnalyzeArgs::parse(
            &args(&["--model", "/cli/m.gguf", "--max-tokens", "32", "--user", "hi", "--extract"]),
            &env(),
        )
        .unwrap();
        assert_eq!(parsed.model, Some(PathBuf::from("/cli/m.gguf")));
        assert_eq!(parsed.max_tokens, 32);
        assert_eq!(parsed.user.as_deref(), Some("hi"));
        assert!(parsed.extract);
    }

    #[test]
    fn test_env_defaults_apply() {
        let parsed = AnalyzeArgs::parse(&[], &env()).unwrap();
        assert_eq!(parsed.model, Some(PathBuf::from("/env/model.gguf")));
        assert_eq!(parsed.max_tokens, 64);
        assert_eq!(parsed.ctx, 2048);
        assert!(!parsed.extract);
    }

    #[test]
    fn test_missing_value_is_usage_error() {
        let err = AnalyzeArgs::parse(&args(&["--user"]), &env()).unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_bad_number_is_usage_error() {
        let err = AnalyzeArgs::parse(&args(&["--max-tokens", "many"]), &env()).unwrap_err();
        assert!(err.to_string().contains("--max-tokens"));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(AnalyzeArgs::parse(&args(&["--stream", "x"]), &env()).is_err());
    }

    #[test]
    fn test_system_and_system_file_conflict() {
        let err = AnalyzeArgs::parse(
            &args(&["--system", "a", "--system-file", "/tmp/s.txt"]),
            &env(),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
    }

    #[test]
    fn test_model_required() {
        let mut e = env();
        e.model_path = None;
        let parsed = AnalyzeArgs::parse(&[], &e).unwrap();
        assert!(matches!(parsed.session_config(&e), Err(CliError::Usage(_))));
    }

    #[cfg(not(feature = "gguf"))]
    #[test]
    fn test_without_backend_exits_nonzero() {
        assert_eq!(run(&args(&["--user", "hi"]), &env()), 1);
    }
}
