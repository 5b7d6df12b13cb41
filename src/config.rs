use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Confirm, Input, Password, Select};
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use crate::auth::CredentialSources;

/// Upper bound for `SESSION_MAX_AGE_HOURS` (one year)
pub const MAX_SESSION_MAX_AGE_HOURS: i64 = 24 * 365;

/// Jellyfin MCP - tool server for a Jellyfin media library
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Jellyfin server URL, e.g. http://localhost:8096
    #[arg(short = 'u', long, env = "JELLYFIN_BASE_URL")]
    pub base_url: Option<String>,

    /// Pre-issued access token
    #[arg(long, env = "JELLYFIN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// User id the pre-issued token belongs to
    #[arg(long, env = "JELLYFIN_USER_ID")]
    pub user_id: Option<String>,

    /// Username for automatic sign-in
    #[arg(long, env = "JELLYFIN_USERNAME")]
    pub username: Option<String>,

    /// Password for automatic sign-in
    #[arg(long, env = "JELLYFIN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "10")]
    pub http_timeout: u64,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "5")]
    pub http_connect_timeout: u64,

    /// HTTP max retries for library reads
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value = "2")]
    pub http_retries: u32,

    /// Hours before a session must be re-established
    #[arg(long, env = "SESSION_MAX_AGE_HOURS", default_value = "24")]
    pub session_max_age_hours: i64,

    /// Path to the service description YAML
    #[arg(long, env = "SPEC_PATH", default_value = "jellyfin-mcp.spec.yaml")]
    pub spec_path: String,
}

#[derive(Clone)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Jellyfin
    pub jellyfin_base_url: String,
    pub credentials: CredentialSources,
    pub session_max_age_hours: i64,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub http_max_retries: u32,

    pub log_level: String,
    pub spec_path: PathBuf,
}

// Credentials are redacted by CredentialSources' own Debug
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("jellyfin_base_url", &self.jellyfin_base_url)
            .field("credentials", &self.credentials)
            .field("session_max_age_hours", &self.session_max_age_hours)
            .field("http_connect_timeout", &self.http_connect_timeout)
            .field("http_request_timeout", &self.http_request_timeout)
            .field("http_max_retries", &self.http_max_retries)
            .field("log_level", &self.log_level)
            .field("spec_path", &self.spec_path)
            .finish()
    }
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let base_url = non_empty(args.base_url)
            .context("JELLYFIN_BASE_URL is required (use -u or set JELLYFIN_BASE_URL env var)")?;

        Ok(Config {
            server_host: args.host,
            server_port: args.port,

            jellyfin_base_url: base_url.trim_end_matches('/').to_string(),
            credentials: CredentialSources {
                access_token: non_empty(args.token),
                user_id: non_empty(args.user_id),
                username: non_empty(args.username),
                password: non_empty(args.password),
            },
            session_max_age_hours: args.session_max_age_hours,

            http_connect_timeout: args.http_connect_timeout,
            http_request_timeout: args.http_timeout,
            http_max_retries: args.http_retries,

            log_level: args.log_level,
            spec_path: expand_tilde(&args.spec_path),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.jellyfin_base_url).with_context(|| {
            format!("JELLYFIN_BASE_URL is not a valid URL: {}", self.jellyfin_base_url)
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("JELLYFIN_BASE_URL must use http or https: {}", self.jellyfin_base_url);
        }

        if self.session_max_age_hours <= 0 {
            anyhow::bail!("SESSION_MAX_AGE_HOURS must be positive");
        }
        if self.session_max_age_hours > MAX_SESSION_MAX_AGE_HOURS {
            anyhow::bail!(
                "SESSION_MAX_AGE_HOURS must be at most {}",
                MAX_SESSION_MAX_AGE_HOURS
            );
        }
        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be at least 1 second");
        }

        let creds = &self.credentials;
        if creds.access_token.is_some() != creds.user_id.is_some() {
            tracing::warn!(
                "JELLYFIN_TOKEN and JELLYFIN_USER_ID must both be set; the token will be ignored"
            );
        }
        if creds.username.is_some() != creds.password.is_some() {
            tracing::warn!(
                "JELLYFIN_USERNAME and JELLYFIN_PASSWORD must both be set; automatic sign-in disabled"
            );
        }

        Ok(())
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(
            self.session_max_age_hours
                .clamp(1, MAX_SESSION_MAX_AGE_HOURS),
        )
    }
}

/// Treat empty strings as unset
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}


// === Interactive Setup ===

/// Check if interactive setup is needed (no .env file and no server URL)
pub fn needs_interactive_setup() -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();
    let has_base_url = std::env::var("JELLYFIN_BASE_URL")
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);

    !env_file_exists && !has_base_url
}

/// Configuration collected from interactive setup
#[derive(Clone, Default)]
pub struct InteractiveConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub server_port: String,
}

impl InteractiveConfig {
    /// Export collected values so `Config::load()` picks them up
    pub fn apply_to_env(&self) {
        std::env::set_var("JELLYFIN_BASE_URL", &self.base_url);
        std::env::set_var("SERVER_PORT", &self.server_port);
        let optional = [
            ("JELLYFIN_USERNAME", &self.username),
            ("JELLYFIN_PASSWORD", &self.password),
            ("JELLYFIN_TOKEN", &self.token),
            ("JELLYFIN_USER_ID", &self.user_id),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                std::env::set_var(key, value);
            }
        }
    }
}

/// Run interactive setup to collect required configuration
pub fn run_interactive_setup() -> Result<InteractiveConfig> {
    println!();
    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║            🔧 Jellyfin MCP - First Time Setup             ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!("No configuration found. Let's connect to your Jellyfin server.");
    println!();

    let base_url: String = Input::new()
        .with_prompt("Jellyfin server URL (JELLYFIN_BASE_URL)")
        .default("http://localhost:8096".to_string())
        .interact_text()
        .context("Failed to read JELLYFIN_BASE_URL")?;

    let mut config = InteractiveConfig {
        base_url: base_url.trim().trim_end_matches('/').to_string(),
        ..Default::default()
    };

    println!();
    let sources = vec![
        "Username and password",
        "Access token and user id",
        "None (sign in later with authenticate_user)",
    ];
    let choice = Select::new()
        .with_prompt("How should the server sign in?")
        .items(&sources)
        .default(0)
        .interact()
        .context("Failed to read credential selection")?;

    match choice {
        0 => {
            let username: String = Input::new()
                .with_prompt("Username (JELLYFIN_USERNAME)")
                .interact_text()
                .context("Failed to read JELLYFIN_USERNAME")?;
            let password = Password::new()
                .with_prompt("Password (JELLYFIN_PASSWORD)")
                .interact()
                .context("Failed to read JELLYFIN_PASSWORD")?;
            config.username = Some(username);
            config.password = Some(password);
        }
        1 => {
            let token = Password::new()
                .with_prompt("Access token (JELLYFIN_TOKEN)")
                .interact()
                .context("Failed to read JELLYFIN_TOKEN")?;
            let user_id: String = Input::new()
                .with_prompt("User id (JELLYFIN_USER_ID)")
                .interact_text()
                .context("Failed to read JELLYFIN_USER_ID")?;
            config.token = Some(token);
            config.user_id = Some(user_id);
        }
        _ => {}
    }

    println!();
    config.server_port = Input::new()
        .with_prompt("Server port")
        .default("8000".to_string())
        .interact_text()
        .context("Failed to read server port")?;

    println!();
    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&config)?;
        println!();
        println!("✅ Configuration saved to .env file");
    }

    println!();
    println!("✅ Setup complete! Starting server...");
    println!();

    Ok(config)
}

/// Save configuration to .env file
fn save_env_file(config: &InteractiveConfig) -> Result<()> {
    let mut env_content = format!(
        r#"# Jellyfin MCP Configuration
# Generated by interactive setup

# Jellyfin server (required)
JELLYFIN_BASE_URL={}

# Server settings
SERVER_HOST=127.0.0.1
SERVER_PORT={}

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        config.base_url, config.server_port,
    );

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        env_content.push_str(&format!(
            "\n# Automatic sign-in\nJELLYFIN_USERNAME={}\nJELLYFIN_PASSWORD={}\n",
            username, password
        ));
    }
    if let (Some(token), Some(user_id)) = (&config.token, &config.user_id) {
        env_content.push_str(&format!(
            "\n# Pre-issued token\nJELLYFIN_TOKEN={}\nJELLYFIN_USER_ID={}\n",
            token, user_id
        ));
    }

    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_content.as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
