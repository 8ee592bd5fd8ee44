//! Config command implementation

use anyhow::{Context, Result};
use clap::Args;
use strata_engine::config::EngineConfig;
use strata_shared::DataType;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print the flush policy every data type resolves to instead
    #[arg(long)]
    pub policies: bool,
}

pub fn run(args: ConfigArgs, config: EngineConfig) -> Result<bool> {
    if args.policies {
        println!(
            "{:<18} {:>10} {:>12} {:>10}",
            "DATA TYPE", "BATCH", "MAX WAIT MS", "MAX QUEUE"
        );
        for data_type in DataType::ALL {
            let policy = config.cache.policy(data_type);
            println!(
                "{:<18} {:>10} {:>12} {:>10}",
                data_type.as_str(),
                policy.batch_size,
                policy.max_wait_ms,
                policy.max_queue
            );
        }
        return Ok(true);
    }

    let rendered = toml::to_string_pretty(&config).context("Render configuration")?;
    print!("{}", rendered);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_renders_as_toml() {
        let rendered = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(rendered.contains("[migration]"));
        assert!(rendered.contains("window_hours = 4"));
        assert!(rendered.contains("database = \"market_hot\""));
        assert!(rendered.contains("batch_size = 1000"));
    }
}
