// Configuration loading and parsing (farmai.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub transcription: TranscriptionConfig,
    pub storage: StorageConfig,
    pub knowledge: KnowledgeConfig,
    pub report: ReportConfig,
    pub credentials: CredentialsConfig,
    /// Directory the config was loaded from. Relative paths in the config
    /// (database, manual) resolve against it.
    pub base_dir: PathBuf,
}

impl Config {
    /// Absolute path of the SQLite database, or `":memory:"` unchanged.
    pub fn db_path(&self) -> String {
        if self.storage.db_path == ":memory:" {
            return self.storage.db_path.clone();
        }
        self.resolve(&self.storage.db_path).display().to_string()
    }

    /// Absolute path of the cultivation manual text file.
    pub fn manual_path(&self) -> PathBuf {
        self.resolve(&self.knowledge.manual_path)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }
}

// ---------------------------------------------------------------------------
// farmai.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire farmai.toml file.
#[derive(Debug, Clone, Deserialize)]
struct FarmaiFile {
    llm: LlmConfig,
    transcription: TranscriptionConfig,
    storage: StorageConfig,
    knowledge: KnowledgeConfig,
    report: ReportConfig,
}

/// Chat-completion settings shared by every LLM-backed feature.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub report_max_tokens: u32,
    pub question_max_tokens: u32,
    pub ask_max_tokens: u32,
    pub final_report_max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    pub model: String,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Rest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Local database. Always used for per-farm state, and for farms and
    /// sessions when `backend = "sqlite"`.
    pub db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeConfig {
    pub manual_path: String,
}

/// Fixed header values printed on generated reports.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub consultant: String,
    pub time_slot: String,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub openai_api_key: Option<String>,
    pub rest_url: Option<String>,
    pub rest_api_key: Option<String>,
}

/// Environment variable that overrides `openai_api_key`.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/farmai.toml` and
/// (optionally) `config/credentials.toml`, both relative to `base_dir`.
///
/// Does not copy defaults and ignores the environment. Prefer
/// `load_config()` or `load_config_in()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- farmai.toml (required) ---
    let main_path = config_dir.join("farmai.toml");
    let main_text = read_file(&main_path)?;
    let file: FarmaiFile = toml::from_str(&main_text).map_err(|e| ConfigError::ParseError {
        path: main_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    assemble(file, credentials, base_dir)
}

/// Build a validated config from in-memory TOML text. Parse errors are
/// reported against the conventional file names under `base_dir/config`.
pub fn parse_config(
    main_text: &str,
    credentials_text: Option<&str>,
    base_dir: &Path,
) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");
    let file: FarmaiFile = toml::from_str(main_text).map_err(|e| ConfigError::ParseError {
        path: config_dir.join("farmai.toml"),
        source: e,
    })?;
    let credentials = match credentials_text {
        Some(text) => toml::from_str(text).map_err(|e| ConfigError::ParseError {
            path: config_dir.join("credentials.toml"),
            source: e,
        })?,
        None => CredentialsConfig::default(),
    };
    assemble(file, credentials, base_dir)
}

fn assemble(
    file: FarmaiFile,
    credentials: CredentialsConfig,
    base_dir: &Path,
) -> Result<Config, ConfigError> {
    let config = Config {
        llm: file.llm,
        transcription: file.transcription,
        storage: file.storage,
        knowledge: file.knowledge,
        report: file.report,
        credentials,
        base_dir: base_dir.to_path_buf(),
    };

    validate(&config)?;

    Ok(config)
}

/// Seed files compiled into the binary, written when `defaults/` is absent.
const EMBEDDED_DEFAULTS: &[(&str, &str)] = &[
    ("farmai.toml", include_str!("../../../defaults/farmai.toml")),
    (
        "cultivation_manual.md",
        include_str!("../../../defaults/cultivation_manual.md"),
    ),
];

/// Ensure all config files exist by copying missing ones from `defaults/`,
/// or from the embedded seeds when there is no `defaults/` directory.
/// Existing files are never overwritten. Returns the list of files that
/// were written. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    if !defaults_dir.exists() {
        for (name, content) in EMBEDDED_DEFAULTS {
            let target = config_dir.join(name);
            if write_new(&target, content.as_bytes())? {
                copied.push(target);
            }
        }
        return Ok(copied);
    }

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);
        if target.exists() {
            continue;
        }
        let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        if write_new(&target, &content)? {
            copied.push(target);
        }
    }

    Ok(copied)
}

/// Create `target` with `content` unless it already exists. Returns whether
/// the file was written.
fn write_new(target: &Path, content: &[u8]) -> Result<bool, ConfigError> {
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, content).map_err(|e| {
                ConfigError::DefaultsCopyError {
                    message: format!("failed to write {}: {e}", target.display()),
                }
            })?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", target.display()),
        }),
    }
}

/// Load config from an explicit base directory: seeds defaults, loads,
/// then applies the `OPENAI_API_KEY` environment override.
pub fn load_config_in(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    let mut config = load_config_from(base_dir)?;
    apply_api_key_override(&mut config.credentials, std::env::var(API_KEY_ENV).ok());
    Ok(config)
}

/// Convenience wrapper: resolves the base directory (see
/// `resolve_base_dir`) and loads from it.
pub fn load_config() -> Result<Config, ConfigError> {
    let base = resolve_base_dir()?;
    load_config_in(&base)
}

/// The current directory when it holds `config/` or `defaults/`, otherwise
/// the per-user config directory.
pub fn resolve_base_dir() -> Result<PathBuf, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    if cwd.join("config").exists() || cwd.join("defaults").exists() {
        return Ok(cwd);
    }
    match directories::ProjectDirs::from("", "", "farmai") {
        Some(dirs) => Ok(dirs.config_dir().to_path_buf()),
        None => Ok(cwd),
    }
}

/// A non-empty environment value replaces the key from credentials.toml.
pub fn apply_api_key_override(credentials: &mut CredentialsConfig, env_value: Option<String>) {
    if let Some(key) = env_value.filter(|k| !k.trim().is_empty()) {
        credentials.openai_api_key = Some(key);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let llm = &config.llm;

    if llm.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "llm.base_url".into(),
            message: "must not be empty".into(),
        });
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "llm.model".into(),
            message: "must not be empty".into(),
        });
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::ValidationError {
            field: "llm.temperature".into(),
            message: format!("must be between 0.0 and 2.0 inclusive, got {}", llm.temperature),
        });
    }

    let token_fields: &[(&str, u32)] = &[
        ("llm.report_max_tokens", llm.report_max_tokens),
        ("llm.question_max_tokens", llm.question_max_tokens),
        ("llm.ask_max_tokens", llm.ask_max_tokens),
        ("llm.final_report_max_tokens", llm.final_report_max_tokens),
    ];
    for (name, val) in token_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    if llm.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "llm.timeout_secs".into(),
            message: "must be > 0".into(),
        });
    }

    if config.transcription.model.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "transcription.model".into(),
            message: "must not be empty".into(),
        });
    }

    if config.transcription.language.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "transcription.language".into(),
            message: "must not be empty".into(),
        });
    }

    if config.storage.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "storage.db_path".into(),
            message: "must not be empty".into(),
        });
    }

    if config.storage.backend == StorageBackend::Rest {
        let creds = &config.credentials;
        let missing = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        if missing(&creds.rest_url) {
            return Err(ConfigError::ValidationError {
                field: "credentials.rest_url".into(),
                message: "required when storage.backend = \"rest\"".into(),
            });
        }
        if missing(&creds.rest_api_key) {
            return Err(ConfigError::ValidationError {
                field: "credentials.rest_api_key".into(),
                message: "required when storage.backend = \"rest\"".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Helper: the workspace root, which holds `defaults/`.
    fn project_root() -> PathBuf {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        assert!(
            root.join("defaults").exists(),
            "Cannot locate defaults/ directory from {:?}",
            root
        );
        root
    }

    /// Helper: fresh temp dir with `config/farmai.toml` copied from defaults.
    fn temp_base(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults/farmai.toml"),
            tmp.join("config/farmai.toml"),
        )
        .unwrap();
        tmp
    }

    fn replace_in_main(base: &Path, from: &str, to: &str) {
        let path = base.join("config/farmai.toml");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(from), "defaults should contain {from:?}");
        fs::write(&path, text.replace(from, to)).unwrap();
    }

    fn expect_validation_field(err: ConfigError, expected: &str) {
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_default_config() {
        let tmp = temp_base("farmai_config_defaults");
        let config = load_config_from(&tmp).expect("should load default config");

        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.llm.report_max_tokens, 3000);
        assert_eq!(config.llm.question_max_tokens, 800);
        assert_eq!(config.transcription.model, "whisper-1");
        assert_eq!(config.transcription.language, "ko");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.db_path, "farmai.db");
        assert_eq!(config.report.time_slot, "14:00-16:00");
        assert!(config.credentials.openai_api_key.is_none());
        assert_eq!(config.db_path(), tmp.join("farmai.db").display().to_string());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_toml_with_api_key() {
        let tmp = temp_base("farmai_config_with_creds");
        fs::write(
            tmp.join("config/credentials.toml"),
            "openai_api_key = \"sk-test-key\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("should load with credentials.toml");
        assert_eq!(config.credentials.openai_api_key.as_deref(), Some("sk-test-key"));
        assert!(config.credentials.rest_url.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_main_file_is_file_not_found() {
        let tmp = std::env::temp_dir().join("farmai_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let tmp = temp_base("farmai_config_malformed");
        fs::write(tmp.join("config/farmai.toml"), "[llm\nmodel = ").unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_temperature_out_of_range() {
        let tmp = temp_base("farmai_config_temperature");
        replace_in_main(&tmp, "temperature = 0.7", "temperature = 3.5");

        expect_validation_field(load_config_from(&tmp).unwrap_err(), "llm.temperature");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_report_tokens() {
        let tmp = temp_base("farmai_config_tokens");
        replace_in_main(&tmp, "report_max_tokens = 3000", "report_max_tokens = 0");

        expect_validation_field(load_config_from(&tmp).unwrap_err(), "llm.report_max_tokens");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rest_backend_requires_credentials() {
        let tmp = temp_base("farmai_config_rest");
        replace_in_main(&tmp, "backend = \"sqlite\"", "backend = \"rest\"");

        expect_validation_field(load_config_from(&tmp).unwrap_err(), "credentials.rest_url");

        fs::write(
            tmp.join("config/credentials.toml"),
            "rest_url = \"https://example.supabase.co\"\nrest_api_key = \"anon\"\n",
        )
        .unwrap();
        let config = load_config_from(&tmp).expect("rest backend with credentials");
        assert_eq!(config.storage.backend, StorageBackend::Rest);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_and_skips_examples() {
        let tmp = std::env::temp_dir().join("farmai_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults/farmai.toml"), "from defaults").unwrap();
        fs::write(tmp.join("defaults/credentials.toml.example"), "x").unwrap();
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/farmai.toml"), "user edited").unwrap();
        fs::write(tmp.join("defaults/cultivation_manual.md"), "manual").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config/cultivation_manual.md")]);
        assert_eq!(
            fs::read_to_string(tmp.join("config/farmai.toml")).unwrap(),
            "user edited"
        );
        assert!(!tmp.join("config/credentials.toml.example").exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn empty_dir_is_seeded_from_embedded_defaults() {
        let tmp = std::env::temp_dir().join("farmai_config_empty");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied.len(), 2);
        assert!(tmp.join("config/farmai.toml").exists());
        assert!(tmp.join("config/cultivation_manual.md").exists());

        let config = load_config_in(&tmp).expect("seeded config should load");
        assert_eq!(config.base_dir, tmp);
        assert_eq!(config.llm.model, "gpt-4o-mini");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn embedded_seeds_never_overwrite() {
        let tmp = std::env::temp_dir().join("farmai_config_partial");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/cultivation_manual.md"), "my notes").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config/farmai.toml")]);
        assert_eq!(
            fs::read_to_string(tmp.join("config/cultivation_manual.md")).unwrap(),
            "my notes"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn env_override_replaces_file_key() {
        let mut creds = CredentialsConfig {
            openai_api_key: Some("from-file".into()),
            ..Default::default()
        };
        apply_api_key_override(&mut creds, Some("from-env".into()));
        assert_eq!(creds.openai_api_key.as_deref(), Some("from-env"));

        apply_api_key_override(&mut creds, Some("   ".into()));
        assert_eq!(creds.openai_api_key.as_deref(), Some("from-env"));

        apply_api_key_override(&mut creds, None);
        assert_eq!(creds.openai_api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn parse_config_from_text() {
        let main = fs::read_to_string(project_root().join("defaults/farmai.toml")).unwrap();
        let config = parse_config(
            &main,
            Some("openai_api_key = \"sk-inline\""),
            Path::new("/srv/farmai"),
        )
        .unwrap();
        assert_eq!(config.credentials.openai_api_key.as_deref(), Some("sk-inline"));
        assert_eq!(config.manual_path(), Path::new("/srv/farmai/config/cultivation_manual.md"));

        let err = parse_config("not toml [", None, Path::new("/srv/farmai")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn memory_db_path_is_not_resolved() {
        let tmp = temp_base("farmai_config_memory");
        replace_in_main(&tmp, "db_path = \"farmai.db\"", "db_path = \":memory:\"");
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.db_path(), ":memory:");

        let _ = fs::remove_dir_all(&tmp);
    }
}
