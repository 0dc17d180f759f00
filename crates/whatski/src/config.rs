use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use std::{env, fs, io};

use whatski_core::PollPolicy;
use whatski_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

const API_KEY: &str = "OPENAI_API_KEY";
const ASSISTANT_ID: &str = "ASSISTANT_ID";
const BASE_URL: &str = "OPENAI_BASE_URL";
const BIND: &str = "WHATSKI_BIND";
const POLL_DEADLINE_SECS: &str = "WHATSKI_POLL_DEADLINE_SECS";
const POLL_MAX_ATTEMPTS: &str = "WHATSKI_POLL_MAX_ATTEMPTS";
const MESSAGE_LIMIT: &str = "WHATSKI_MESSAGE_LIMIT";
const SESSION_TTL_SECS: &str = "WHATSKI_SESSION_TTL_SECS";
const SECRETS: &str = "WHATSKI_SECRETS";

const DEFAULT_BIND: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8501);
const DEFAULT_SECRETS_PATH: &str = ".whatski/secrets.toml";
const DEFAULT_MESSAGE_LIMIT: u8 = 5;
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Error returned when the configuration cannot be loaded.
#[derive(Debug)]
pub enum ConfigError {
    /// A required setting is absent or empty.
    Missing(&'static str),
    /// A setting could not be parsed.
    Invalid {
        /// The name of the setting.
        key: &'static str,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The secrets file exists but could not be read.
    SecretsFile {
        /// The path of the file.
        path: PathBuf,
        /// Why it could not be read.
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(
                f,
                "{key} is not set (use the environment or the secrets file)"
            ),
            ConfigError::Invalid { key, value, reason } => {
                write!(f, "invalid {key} {value:?}: {reason}")
            }
            ConfigError::SecretsFile { path, reason } => {
                write!(f, "cannot read secrets file {}: {reason}", path.display())
            }
        }
    }
}

impl Error for ConfigError {}

/// Settings of the server, read once at startup.
#[derive(Clone)]
pub struct Config {
    /// The API credential.
    pub api_key: String,
    /// The assistant that runs are started with.
    pub assistant_id: String,
    /// A custom API base URL.
    pub base_url: Option<String>,
    /// The address the server listens on.
    pub bind: SocketAddr,
    /// How turns wait for runs.
    pub poll: PollPolicy,
    /// How many recent messages are inspected for a reply.
    pub message_limit: u8,
    /// How long an idle session is kept.
    pub session_ttl: Duration,
}

impl Config {
    /// Loads the configuration from the environment, falling back to the
    /// secrets file for anything the environment does not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = env::var(SECRETS)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SECRETS_PATH));
        let secrets = load_secrets(&path)?;
        Self::from_lookup(|key| {
            env::var(key).ok().or_else(|| secrets.get(key).cloned())
        })
    }

    /// Loads the configuration from an arbitrary key-value source.
    ///
    /// Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get(API_KEY).ok_or(ConfigError::Missing(API_KEY))?;
        let assistant_id =
            get(ASSISTANT_ID).ok_or(ConfigError::Missing(ASSISTANT_ID))?;
        let bind = parse_or(&get, BIND, || DEFAULT_BIND)?;

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            deadline: Duration::from_secs(parse_or(
                &get,
                POLL_DEADLINE_SECS,
                || defaults.deadline.as_secs(),
            )?),
            max_attempts: parse_or(&get, POLL_MAX_ATTEMPTS, || {
                defaults.max_attempts
            })?,
            ..defaults
        };

        let message_limit =
            parse_or(&get, MESSAGE_LIMIT, || DEFAULT_MESSAGE_LIMIT)?;
        if !(1..=100).contains(&message_limit) {
            return Err(ConfigError::Invalid {
                key: MESSAGE_LIMIT,
                value: message_limit.to_string(),
                reason: "must be between 1 and 100".to_owned(),
            });
        }

        let session_ttl = Duration::from_secs(parse_or(
            &get,
            SESSION_TTL_SECS,
            || DEFAULT_SESSION_TTL.as_secs(),
        )?);

        Ok(Self {
            api_key,
            assistant_id,
            base_url: get(BASE_URL),
            bind,
            poll,
            message_limit,
            session_ttl,
        })
    }

    /// Returns the configuration of the assistant provider.
    pub fn openai_config(&self) -> OpenAIConfig {
        let builder = OpenAIConfigBuilder::with_credentials(
            self.api_key.clone(),
            self.assistant_id.clone(),
        );
        match &self.base_url {
            Some(base_url) => builder.with_base_url(base_url.clone()).build(),
            None => builder.build(),
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("assistant_id", &self.assistant_id)
            .field("base_url", &self.base_url)
            .field("bind", &self.bind)
            .field("poll", &self.poll)
            .field("message_limit", &self.message_limit)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

fn parse_or<T, G, D>(get: &G, key: &'static str, default: D) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
    D: FnOnce() -> T,
{
    let Some(value) = get(key) else {
        return Ok(default());
    };
    value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
        value,
    })
}

/// Reads a flat TOML table of settings. A missing file is not an error.
fn load_secrets(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(HashMap::new());
        }
        Err(err) => {
            return Err(ConfigError::SecretsFile {
                path: path.to_owned(),
                reason: err.to_string(),
            });
        }
    };
    parse_secrets(&text).map_err(|reason| ConfigError::SecretsFile {
        path: path.to_owned(),
        reason,
    })
}

fn parse_secrets(text: &str) -> Result<HashMap<String, String>, String> {
    let table: toml::Table = toml::from_str(text).map_err(|err| err.to_string())?;
    let mut secrets = HashMap::with_capacity(table.len());
    for (key, value) in table {
        let value = match value {
            toml::Value::String(s) => s,
            toml::Value::Integer(n) => n.to_string(),
            other => {
                return Err(format!("{key} must be a string, got {}", other.type_str()));
            }
        };
        secrets.insert(key, value);
    }
    Ok(secrets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(
        pairs: &'a [(&'a str, &'a str)],
    ) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            (API_KEY, "sk-secret"),
            (ASSISTANT_ID, "asst_ski"),
        ]))
        .unwrap();
        assert_eq!(config.bind, "127.0.0.1:8501".parse().unwrap());
        assert_eq!(config.poll, PollPolicy::default());
        assert_eq!(config.message_limit, 5);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.openai_config().assistant_id(), "asst_ski");
        assert!(!format!("{config:?}").contains("sk-secret"));
    }

    #[test]
    fn test_missing_secrets() {
        let err = Config::from_lookup(lookup(&[(ASSISTANT_ID, "asst_ski")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(API_KEY)));

        let err = Config::from_lookup(lookup(&[
            (API_KEY, "sk-secret"),
            (ASSISTANT_ID, "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ASSISTANT_ID)));
        assert!(err.to_string().contains("ASSISTANT_ID"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (API_KEY, "sk-secret"),
            (ASSISTANT_ID, "asst_ski"),
            (BASE_URL, "http://localhost:9000/v1"),
            (BIND, "0.0.0.0:8080"),
            (POLL_DEADLINE_SECS, "30"),
            (POLL_MAX_ATTEMPTS, "10"),
            (MESSAGE_LIMIT, "20"),
        ]))
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.poll.deadline, Duration::from_secs(30));
        assert_eq!(config.poll.max_attempts, 10);
        assert_eq!(config.message_limit, 20);
        assert_eq!(
            config.openai_config().base_url(),
            "http://localhost:9000/v1"
        );
    }

    #[test]
    fn test_invalid_values() {
        let base = [(API_KEY, "sk-secret"), (ASSISTANT_ID, "asst_ski")];

        let mut pairs = base.to_vec();
        pairs.push((POLL_MAX_ATTEMPTS, "many"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: POLL_MAX_ATTEMPTS, .. }
        ));

        let mut pairs = base.to_vec();
        pairs.push((MESSAGE_LIMIT, "0"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: MESSAGE_LIMIT, .. }));
    }

    #[test]
    fn test_secrets_file() {
        let secrets = parse_secrets(
            "OPENAI_API_KEY = \"sk-file\"\nASSISTANT_ID = \"asst_file\"\n\
             WHATSKI_POLL_MAX_ATTEMPTS = 7\n",
        )
        .unwrap();
        assert_eq!(secrets["OPENAI_API_KEY"], "sk-file");
        assert_eq!(secrets["WHATSKI_POLL_MAX_ATTEMPTS"], "7");

        let config = Config::from_lookup(|key| {
            (key == ASSISTANT_ID)
                .then(|| "asst_env".to_owned())
                .or_else(|| secrets.get(key).cloned())
        })
        .unwrap();
        assert_eq!(config.api_key, "sk-file");
        assert_eq!(config.assistant_id, "asst_env");
        assert_eq!(config.poll.max_attempts, 7);

        assert!(parse_secrets("OPENAI_API_KEY = [1, 2]").is_err());
        assert!(load_secrets(Path::new("/nonexistent/secrets.toml"))
            .unwrap()
            .is_empty());
    }

    // The only test that touches the process environment.
    #[test]
    fn test_from_env_prefers_environment() {
        let path = env::temp_dir()
            .join(format!("whatski-secrets-{}.toml", std::process::id()));
        fs::write(
            &path,
            "OPENAI_API_KEY = \"sk-file\"\nASSISTANT_ID = \"asst_file\"\n\
             WHATSKI_MESSAGE_LIMIT = 7\n",
        )
        .unwrap();

        // SAFETY: no other test reads or writes these variables.
        unsafe {
            env::set_var(SECRETS, &path);
            env::set_var(ASSISTANT_ID, "asst_env");
            env::remove_var(API_KEY);
            env::remove_var(MESSAGE_LIMIT);
        }
        let config = Config::from_env();
        unsafe {
            env::remove_var(SECRETS);
            env::remove_var(ASSISTANT_ID);
        }
        fs::remove_file(&path).unwrap();

        let config = config.unwrap();
        assert_eq!(config.api_key, "sk-file");
        assert_eq!(config.assistant_id, "asst_env");
        assert_eq!(config.message_limit, 7);
    }
}
