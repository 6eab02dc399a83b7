use std::env;

/// Runtime configuration, read from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub mongodb_uri: String,
    pub token_secret: String,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            mongodb_uri: env::var("MONGODB_URI")
                .expect("You need to add the MONGODB_URI to the env"),
            token_secret: env::var("TOKEN_SECRET")
                .expect("You need to add the TOKEN_SECRET to the env"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }
}
