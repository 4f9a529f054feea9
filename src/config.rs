use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. The struct is immutable
/// once loaded and shared across all request handlers via the application state.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and the dev auth bypass.
    pub env: Env,
    // Secret key used to decode and validate incoming bearer JWTs.
    pub jwt_secret: String,
    // Postgres connection string. When absent the in-memory store is used.
    pub database_url: Option<String>,
    // Base URL from which media pointer URLs are derived.
    pub cdn_base_url: String,
    // S3-compatible storage endpoint URL (MinIO in local).
    pub s3_endpoint: String,
    // S3 region (often a stub for S3-compatible gateways).
    pub s3_region: String,
    // Access Key ID for S3-compatible storage.
    pub s3_key: String,
    // Secret Access Key for S3-compatible storage.
    pub s3_secret: String,
    // The bucket name holding all uploaded media objects.
    pub s3_bucket: String,
}

/// Env
///
/// Defines the runtime context, used to switch between development utilities
/// (MinIO, auth bypass, pretty logs) and production infrastructure.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Provides a safe, non-panicking AppConfig instance primarily used for
    /// test setup, without requiring any environment variables to be set.
    fn default() -> Self {
        Self {
            env: Env::Local,
            jwt_secret: "local-dev-secret-do-not-use-in-prod".to_string(),
            database_url: None,
            cdn_base_url: "https://cdn.example.com".to_string(),
            // Default MinIO credentials for local/testing convenience.
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "pikshare-test".to_string(),
        }
    }
}

impl AppConfig {
    /// The canonical function for initializing the application configuration
    /// at startup. Reads all parameters from environment variables.
    ///
    /// # Panics
    /// Panics if a critical environment variable required for the current
    /// runtime environment (especially Production) is not set, preventing the
    /// application from starting with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        // The production JWT secret is mandatory and must be explicitly set.
        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            _ => env::var("JWT_SECRET")
                .unwrap_or_else(|_| "local-dev-secret-do-not-use-in-prod".to_string()),
        };

        // Optional in both environments: without it the server runs the
        // in-memory demonstration store.
        let database_url = env::var("DATABASE_URL").ok();

        let cdn_base_url =
            env::var("CDN_BASE_URL").unwrap_or_else(|_| "https://cdn.example.com".to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                jwt_secret,
                database_url,
                cdn_base_url,
                // Local storage (MinIO) uses known default credentials.
                s3_endpoint: "http://localhost:9000".to_string(),
                s3_region: "us-east-1".to_string(),
                s3_key: "admin".to_string(),
                s3_secret: "password".to_string(),
                s3_bucket: "pikshare-media".to_string(),
            },
            Env::Production => Self {
                env: Env::Production,
                jwt_secret,
                database_url,
                cdn_base_url,
                s3_endpoint: env::var("S3_ENDPOINT").expect("FATAL: S3_ENDPOINT required in prod"),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                s3_key: env::var("S3_ACCESS_KEY").expect("FATAL: S3_ACCESS_KEY required in prod"),
                s3_secret: env::var("S3_SECRET_KEY").expect("FATAL: S3_SECRET_KEY required in prod"),
                s3_bucket: env::var("S3_BUCKET_NAME")
                    .unwrap_or_else(|_| "pikshare-media".to_string()),
            },
        }
    }
}
