//! `uidwatch config` -- print the effective configuration.

use anyhow::{Context, Result};

use uidwatch_types::ConfigLoader;

/// Run `uidwatch config`.
pub fn show() -> Result<()> {
    let effective = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?;
    let config = &effective.config;

    if effective.source_files.is_empty() {
        println!("Config files: (none, using built-in defaults)");
    } else {
        println!("Config files:");
        for path in &effective.source_files {
            println!("  {}", path.display());
        }
    }
    println!();

    let serial = config.adb.serial.as_deref().unwrap_or("(adb default)");
    let rows: [(&str, String); 7] = [
        ("default_timeout_ms", config.default_timeout_ms.to_string()),
        ("ready_timeout_ms", config.ready_timeout_ms.to_string()),
        ("ready_prefix", format!("{:?}", config.ready_prefix)),
        ("teardown_grace_ms", config.teardown_grace_ms.to_string()),
        ("adb.enabled", config.adb.enabled.to_string()),
        ("adb.program", config.adb.program.clone()),
        ("adb.serial", serial.to_string()),
    ];

    for (key, value) in rows {
        let source = effective
            .sources
            .get(key)
            .map_or_else(|| "built-in default".to_string(), ToString::to_string);
        println!("{key:<20} = {value:<24} ({source})");
    }

    Ok(())
}
