use config::ConfigError;

const DEFAULT_ACCESS_TOKEN_EXPIRY: i64 = 60 * 60 * 2;
const DEFAULT_REFRESH_TOKEN_EXPIRY: i64 = 60 * 60 * 24 * 60;
// Ten years; also keeps `chrono::Duration::seconds` in range
const MAX_TOKEN_EXPIRY: i64 = 60 * 60 * 24 * 365 * 10;
// bcrypt accepts work factors in this range
const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub hashing: HashingSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (default 2 hours)
    pub refresh_token_expiry: i64,  // seconds (default 60 days)
    pub issuer: String,
}

/// bcrypt work factor used when hashing account passwords
#[derive(serde::Deserialize, Clone, Copy)]
pub struct HashingSettings {
    pub cost: u32,
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Load settings from `configuration.yaml` (optional) overridden by
/// `APP_`-prefixed environment variables, e.g. `APP_JWT__SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080)?
        .set_default("jwt.issuer", "rss-creator")?
        .set_default("jwt.access_token_expiry", DEFAULT_ACCESS_TOKEN_EXPIRY)?
        .set_default("jwt.refresh_token_expiry", DEFAULT_REFRESH_TOKEN_EXPIRY)?
        .set_default("hashing.cost", i64::from(bcrypt::DEFAULT_COST))?
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings = settings.try_deserialize::<Settings>()?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.jwt.secret.is_empty() {
        return Err(ConfigError::Message("jwt.secret must not be empty".to_string()));
    }
    if settings.jwt.access_token_expiry <= 0 || settings.jwt.refresh_token_expiry <= 0 {
        return Err(ConfigError::Message("token expiry must be positive".to_string()));
    }
    if settings.jwt.access_token_expiry > MAX_TOKEN_EXPIRY
        || settings.jwt.refresh_token_expiry > MAX_TOKEN_EXPIRY
    {
        return Err(ConfigError::Message(format!(
            "token expiry must be at most {} seconds",
            MAX_TOKEN_EXPIRY
        )));
    }
    if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&settings.hashing.cost) {
        return Err(ConfigError::Message(format!(
            "hashing.cost must be between {} and {}",
            MIN_HASH_COST, MAX_HASH_COST
        )));
    }
    Ok(())
}
