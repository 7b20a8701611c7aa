#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub session_ttl_seconds: u64,
    pub session_key_prefix: String,
    pub cookie_secure: bool,
    pub cookie_domain: Option<String>,
    pub password_min_length: usize,

    // Optional bootstrap admin. When both are set, startup provisions the account
    // unless one already exists for the email.
    pub seed_admin_email: Option<String>,
    pub seed_admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3333,
            database_url: None,
            redis_url: None,
            session_ttl_seconds: 60 * 60 * 24 * 7,
            session_key_prefix: "healthvault".to_string(),
            cookie_secure: false,
            cookie_domain: None,
            password_min_length: 8,
            seed_admin_email: None,
            seed_admin_password: None,
        }
    }
}
