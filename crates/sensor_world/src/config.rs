/// Connection settings for the remote store.
///
/// | Env Var             | Meaning                    |
/// |---------------------|----------------------------|
/// | `SUPABASE_URL`      | Project endpoint (base URL) |
/// | `SUPABASE_ANON_KEY` | Access key                 |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub endpoint: String,
    pub access_key: String,
}

pub const ENDPOINT_VAR: &str = "SUPABASE_URL";
pub const ACCESS_KEY_VAR: &str = "SUPABASE_ANON_KEY";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

impl StoreConfig {
    /// Load from the process environment, after applying a `.env` file if one
    /// exists in the working directory or its parents.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &'static str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        Ok(Self {
            endpoint: read(ENDPOINT_VAR)?,
            access_key: read(ACCESS_KEY_VAR)?,
        })
    }
}
