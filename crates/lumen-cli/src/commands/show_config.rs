//! `lumen show-config` -- print the built-in default configuration.

use lumen_types::RunConfig;

pub fn execute() -> anyhow::Result<()> {
    let toml = toml::to_string_pretty(&RunConfig::default())?;
    println!("{toml}");
    Ok(())
}
