//! Doctor command - validate configuration and show status

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    api_token: CheckResult,
    platforms: CheckResult,
    token_store: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        api_token: CheckResult::error("Not checked"),
        platforms: CheckResult::error("Not checked"),
        token_store: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.api_token = check_api_token(config);
        report.platforms = check_platforms(config);
        report.token_store = check_token_store(config);
    }

    // Determine overall status
    let checks = [
        &report.config,
        &report.api_token,
        &report.platforms,
        &report.token_store,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        anyhow::bail!("Doctor found errors");
    }
    Ok(())
}

fn env_is_set(name: &str) -> bool {
    !name.is_empty()
        && std::env::var(name)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
}

fn check_api_token(config: &AppConfig) -> CheckResult {
    if env_is_set(&config.server.api_token_env) {
        CheckResult::ok(format!("API token present in ${}", config.server.api_token_env))
    } else {
        CheckResult::warn(format!(
            "${} is unset; guarded routes will reject all requests",
            config.server.api_token_env
        ))
    }
}

fn check_platforms(config: &AppConfig) -> CheckResult {
    let enabled = config.enabled_platforms();
    if enabled.is_empty() {
        return CheckResult::warn("No platforms enabled");
    }

    let mut missing = Vec::new();
    for (name, section) in &enabled {
        if section.client_id.is_empty() {
            missing.push(format!("{}: client_id is empty", name));
        }
        if !env_is_set(&section.client_secret_env) {
            missing.push(format!("{}: ${} is unset", name, section.client_secret_env));
        }
    }

    let names: Vec<&str> = enabled.iter().map(|(name, _)| *name).collect();
    if missing.is_empty() {
        CheckResult::ok(format!("{} platform(s) enabled", enabled.len()))
            .with_details(serde_json::json!({"enabled": names}))
    } else {
        CheckResult::error("Enabled platforms with missing credentials")
            .with_details(serde_json::json!({"enabled": names, "problems": missing}))
    }
}

fn check_token_store(config: &AppConfig) -> CheckResult {
    let path = &config.tokens.db_path;
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => CheckResult::warn(
            format!("Token store directory does not exist yet: {}", parent.display()),
        ),
        _ => CheckResult::ok(format!("Token store path: {}", path.display())),
    }
}

fn print_report(report: &DoctorReport) {
    let rows = [
        ("config", &report.config),
        ("api_token", &report.api_token),
        ("platforms", &report.platforms),
        ("token_store", &report.token_store),
    ];
    for (name, check) in rows {
        println!("[{}] {}: {}", check.status, name, check.message);
        if let Some(details) = &check.details {
            println!("        {}", details);
        }
    }
    println!();
    println!("Overall: {}", report.overall);
}
