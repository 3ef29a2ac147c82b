//! Configuration commands.
//!
//! - `config show`: Display the loaded configuration with credentials masked
//! - `config check`: Report missing settings and inconsistent mappings

use std::path::Path;

use owo_colors::OwoColorize;
use serde_json::json;

use super::{CommandOutput, OutputOptions, mask_sensitive_value};
use crate::config::{Mapping, SyncConfig};
use crate::error::{BridgeError, Result};

fn mapping_text(name: &str, mapping: &Mapping) -> String {
    let mut text = format!("{}:\n", name.cyan());
    if mapping.to_remote.is_empty() && mapping.to_local.is_empty() {
        text.push_str(&format!("  {}\n", "no mappings".dimmed()));
        return text;
    }
    for (local, remote) in &mapping.to_remote {
        text.push_str(&format!("  {local} -> {remote}\n"));
    }
    for (remote, local) in &mapping.to_local {
        text.push_str(&format!("  {local} <- {remote}\n"));
    }
    text
}

/// Show current configuration
pub fn cmd_config_show(path: &Path, output: OutputOptions) -> Result<()> {
    let config = SyncConfig::load(path)?;
    let source = &config.ticket_source;
    let login = config.login();
    let password_configured = config.password().is_some();

    let json_output = json!({
        "ticket_source": {
            "url": source.url,
            "api_path": source.api_path,
            "login": login.as_deref().map(mask_sensitive_value),
            "password_configured": password_configured,
            "board_id": source.board_id,
            "company_id": source.company_id,
        },
        "priority": config.priority,
        "status": config.status,
        "user": config.user,
        "config_file": path.to_string_lossy(),
    });

    let not_configured = || "not configured".dimmed().to_string();
    let mut text_output = String::new();
    text_output.push_str(&format!("{}\n\n", "Configuration:".cyan().bold()));

    text_output.push_str(&format!("{}:\n", "ticket_source".cyan()));
    text_output.push_str(&format!(
        "  url: {}\n",
        source.url.clone().unwrap_or_else(not_configured)
    ));
    text_output.push_str(&format!(
        "  api_path: {}\n",
        source.api_path.clone().unwrap_or_else(not_configured)
    ));
    text_output.push_str(&format!(
        "  login: {}\n",
        login
            .as_deref()
            .map(mask_sensitive_value)
            .unwrap_or_else(not_configured)
    ));
    let password_status = if password_configured {
        "configured".green().to_string()
    } else {
        not_configured()
    };
    text_output.push_str(&format!("  password: {password_status}\n"));
    text_output.push_str(&format!("  board_id: {}\n", source.board_id));
    text_output.push_str(&format!("  company_id: {}\n\n", source.company_id));

    text_output.push_str(&mapping_text("priority", &config.priority));
    text_output.push_str(&mapping_text("status", &config.status));
    text_output.push_str(&mapping_text("user", &config.user));

    text_output.push('\n');
    text_output.push_str(&format!(
        "{}",
        format!("Config file: {}", path.display()).dimmed()
    ));

    CommandOutput::new(json_output)
        .with_text(text_output)
        .print(output)
}

/// Check the configuration for problems that would break a sync
pub fn cmd_config_check(path: &Path, output: OutputOptions) -> Result<()> {
    let config = SyncConfig::load(path)?;

    let mut missing = Vec::new();
    if config.tickets_url().is_err() {
        missing.push("ticket_source.url and ticket_source.api_path");
    }
    if config.login().is_none() {
        missing.push("ticket_source.login");
    }
    if config.password().is_none() {
        missing.push("ticket_source.password");
    }
    let inconsistencies = config.mapping_inconsistencies();
    let ok = missing.is_empty() && inconsistencies.is_empty();

    let json_output = json!({
        "ok": ok,
        "missing": missing,
        "mapping_inconsistencies": inconsistencies,
    });

    let mut text_output = String::new();
    for setting in &missing {
        text_output.push_str(&format!("{} {setting} is not set\n", "missing:".red()));
    }
    for problem in &inconsistencies {
        text_output.push_str(&format!("{} {problem}\n", "mapping:".yellow()));
    }
    if ok {
        text_output.push_str(&format!("{}", "Configuration OK".green()));
    }

    CommandOutput::new(json_output)
        .with_text(text_output.trim_end())
        .print(output)?;

    if ok {
        Ok(())
    } else {
        Err(BridgeError::Config(format!(
            "{} problem(s) found in {}",
            missing.len() + inconsistencies.len(),
            path.display()
        )))
    }
}
