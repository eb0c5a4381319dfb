use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub node: NodeConfig,
    pub identity: IdentityConfig,
    pub conntrack: ConntrackConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Name stamped on every exposed flow. Falls back to the NODE_NAME
    /// environment variable (the usual downward-API injection) when empty.
    #[serde(default)]
    pub name: String,
}

/// Where identity snapshots come from: built from the cluster API, or
/// pushed into the local cache over POST /cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    #[default]
    Cluster,
    Push,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub mode: IdentityMode,
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConntrackConfig {
    /// Helper executable emitting the flow JSON array; invoked via sh -c.
    pub script_path: String,
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

fn default_resync_interval_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        let mut config: AppConfig = toml::from_str(&s)?;
        if config.node.name.is_empty() {
            config.node.name = std::env::var("NODE_NAME").unwrap_or_default();
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests). No
    /// environment fallback here so tests stay hermetic.
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            !self.node.name.is_empty(),
            "node.name must be set (or NODE_NAME exported)"
        );
        anyhow::ensure!(
            self.identity.resync_interval_secs > 0,
            "identity.resync_interval_secs must be > 0, got {}",
            self.identity.resync_interval_secs
        );
        anyhow::ensure!(
            !self.conntrack.script_path.is_empty(),
            "conntrack.script_path must be non-empty"
        );
        anyhow::ensure!(
            self.conntrack.resync_interval_secs > 0,
            "conntrack.resync_interval_secs must be > 0, got {}",
            self.conntrack.resync_interval_secs
        );
        Ok(())
    }
}
