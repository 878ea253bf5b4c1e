use clap::Parser;

#[derive(Debug, Parser)]
pub struct Args {
    /// Postgres connection URL of the store.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Store credential, used as the connection password.
    #[arg(long, env = "DATABASE_KEY", hide_env_values = true)]
    pub database_key: String,

    #[arg(long, env = "MQTT_HOST")]
    pub mqtt_host: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 8883)]
    pub mqtt_port: u16,

    #[arg(long, env = "MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    /// Connect without TLS.
    #[arg(long, env = "MQTT_NO_TLS")]
    pub no_mqtt_tls: bool,

    #[arg(long, env = "MQTT_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long, env = "MQTT_KEEP_ALIVE_SECS", default_value_t = 30)]
    pub keep_alive_secs: u64,

    /// Delay before the first reconnect attempt; doubles up to the maximum.
    #[arg(long, env = "MQTT_RECONNECT_INTERVAL_MS", default_value_t = 1000)]
    pub reconnect_interval_ms: u64,

    #[arg(long, env = "MQTT_MAX_RECONNECT_INTERVAL_MS", default_value_t = 30_000)]
    pub max_reconnect_interval_ms: u64,

    #[arg(long, env = "PERSIST_TIMEOUT_MS", default_value_t = 5000)]
    pub persist_timeout_ms: u64,

    #[arg(long, env = "INGEST_QUEUE_CAPACITY", default_value_t = 64)]
    pub queue_capacity: usize,
}
