use std::path::Path;

use anyhow::Context;

use slotguard_core::SlotguardConfig;

pub const CONFIG_FILE: &str = "slotguard.toml";

pub fn init(path: &str, app: &str, resource_group: &str, force: bool) -> anyhow::Result<()> {
    let output = write_scaffold(Path::new(path), app, resource_group, force)?;
    println!("✓ Generated {}", output.display());
    println!("  Review [targets] and [swap], then set swap.dry_run = false to arm it.");
    Ok(())
}

fn write_scaffold(
    dir: &Path,
    app: &str,
    resource_group: &str,
    force: bool,
) -> anyhow::Result<std::path::PathBuf> {
    let output = dir.join(CONFIG_FILE);
    if output.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let content = SlotguardConfig::scaffold(app, resource_group).to_toml_string()?;
    std::fs::write(&output, content).with_context(|| format!("writing {}", output.display()))?;
    Ok(output)
}
