use log::warn;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub foreign_keys: bool,
    /// Log every statement at debug level.
    pub log_statements: bool,
    pub migrations_dir: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            url: "sqlite://camp.db".to_string(),
            max_connections: 5,
            foreign_keys: true,
            log_statements: false,
            migrations_dir: None,
        }
    }
}

impl DatabaseSettings {
    /// A private in-memory database. Pinned to one connection because each
    /// pooled in-memory connection would open its own empty database.
    pub fn in_memory() -> Self {
        DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub database: DatabaseSettings,
}

impl Settings {
    /// Defaults overlaid with `CAMP_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Settings::from_env`] but reading from an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut database = DatabaseSettings::default();
        if let Some(url) = lookup("CAMP_DATABASE_URL") {
            database.url = url;
        }
        if let Some(n) = parse_var(&lookup, "CAMP_DATABASE_MAX_CONNECTIONS") {
            database.max_connections = n;
        }
        if let Some(on) = parse_var(&lookup, "CAMP_DATABASE_FOREIGN_KEYS") {
            database.foreign_keys = on;
        }
        if let Some(on) = parse_var(&lookup, "CAMP_LOG_SQL") {
            database.log_statements = on;
        }
        if let Some(dir) = lookup("CAMP_MIGRATIONS_DIR") {
            database.migrations_dir = Some(dir);
        }
        Settings { database }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value, keeping default", key, raw);
            None
        }
    }
}
