// crates/noesis-engine/src/cli/config.rs
// CLI config subcommand: configuration is entirely environment-driven
// (§6 "all other configuration is programmatic"), so there is no `set` —
// only `show` and `validate`.

use anyhow::Result;

use crate::config::EnvConfig;

use super::ConfigAction;

pub fn run_config(action: ConfigAction) -> Result<()> {
    let config = EnvConfig::load();
    match action {
        ConfigAction::Show => {
            println!("workflow_workers = {}", config.workflow_workers);
            println!("log_level        = {}", config.log_level.as_deref().unwrap_or("(unset, defaults to warn)"));
            println!("db_path          = {}", config.db_path.as_deref().unwrap_or("(unset, defaults to ~/.noesis/noesis.db)"));
            println!("bearer_token     = {}", if config.bearer_token.is_some() { "(set)" } else { "(unset)" });
        }
        ConfigAction::Validate => {
            let validation = config.validate();
            println!("{}", validation.report());
            if !validation.is_valid() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
