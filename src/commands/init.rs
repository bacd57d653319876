use anyhow::{Context, Result};
use std::path::PathBuf;

pub async fn init_config(path: PathBuf) -> Result<()> {
    let config_path = path.join("seriesdex.toml");
    if config_path.exists() {
        anyhow::bail!("Configuration file already exists: {}", config_path.display());
    }

    let toml_content = r#"# seriesdex configuration

[catalog]
ingest_queue_size = 256
# Refresh every origin periodically (0 disables)
refresh_interval_secs = 0
shutdown_timeout_secs = 10

[logging]
level = "info"
format = "text"

# Files under a directory; each relative path is matched against `pattern`,
# which needs the named groups `source` and `metric`.
[[origins]]
name = "collectd"
provider = "local"
[origins.connector]
type = "file"
path = "/var/lib/collectd/rrd"
pattern = '^(?P<source>[^/]+)/(?P<metric>.+)\.rrd$'

# Entries declared inline
[[origins]]
name = "manual"
[origins.connector]
type = "static"
entries = [
    { source = "gateway", metric = "uptime" },
]
"#;

    std::fs::create_dir_all(&path)
        .with_context(|| format!("Failed to create directory {}", path.display()))?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    Ok(())
}
