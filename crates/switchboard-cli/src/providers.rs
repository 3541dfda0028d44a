//! `switchboard providers`: routing table, defaults and credential status.

use anyhow::Result;
use colored::Colorize;

use switchboard_core::config::{get_config_path, load_config, CredentialSource, EnvCredentials};
use switchboard_core::utils::truncate_string;
use switchboard_providers::registry::{
    ProviderSpec, DEFAULT_PROVIDER, EXACT_ROUTES, PREFIX_ROUTES, PROVIDERS,
};

/// Run the providers command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();
    let credentials = EnvCredentials;

    println!();
    println!("{}", "Switchboard".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(defaults)".dimmed().to_string()
        }
    );
    println!("  {:<18} {}", "Model:".bold(), config.defaults.model);
    println!(
        "  {:<18} {}",
        "Prompt budget:".bold(),
        format!("{} tokens", config.defaults.max_prompt_tokens).dimmed()
    );
    println!(
        "  {:<18} {}",
        "Retry:".bold(),
        format!(
            "{} attempts, {} ms base delay",
            config.retry.max_attempts, config.retry.base_delay_ms
        )
        .dimmed()
    );
    if let Some(ref system_prompt) = config.defaults.system_prompt {
        println!(
            "  {:<18} {}",
            "System prompt:".bold(),
            truncate_string(system_prompt, 60).dimmed()
        );
    }

    println!();
    println!("  {}", "Routes:".bold());
    for (model, spec) in EXACT_ROUTES {
        println!("    {:<20} → {}", format!("= {model}"), spec.display_name);
    }
    for (prefix, spec) in PREFIX_ROUTES {
        println!("    {:<20} → {}", format!("{prefix}*"), spec.display_name);
    }
    println!("    {:<20} → {}", "(anything else)", DEFAULT_PROVIDER.display_name);

    println!();
    println!("  {}", "Providers:".bold());
    for spec in PROVIDERS {
        println!(
            "    {:<20} {}",
            spec.display_name,
            credential_status(spec, &credentials)
        );
    }

    println!();

    Ok(())
}

fn credential_status(spec: &ProviderSpec, credentials: &dyn CredentialSource) -> String {
    match spec.env_key {
        None => format!("{} (no key needed)", "✓".green()),
        Some(key) if spec.is_configured(credentials) => format!("{} ({key} set)", "✓".green()),
        Some(key) => format!("{}", format!("· {key} not set").dimmed()),
    }
}
