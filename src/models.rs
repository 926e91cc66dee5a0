use anyhow::Context;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Load configuration from the environment, once at startup.
    ///
    /// Only `JWT_SECRET` is mandatory; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./gatekeeper.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set — refusing to start with no signing key")?;

        let access_token_ttl_secs = std::env::var("ACCESS_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);

        let refresh_token_ttl_secs = std::env::var("REFRESH_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "1209600".to_string()) // 14 days
            .parse()
            .unwrap_or(1_209_600);

        let sweep_interval_secs = std::env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "86400".to_string()) // daily
            .parse()
            .unwrap_or(86_400);

        Ok(Self {
            database_path,
            port,
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            sweep_interval_secs,
        })
    }
}
