use std::path::Path;

use anyhow::Result;

use crate::core::config::AppConfig;
use crate::core::invocation::Invocation;
use crate::core::orchestrator::Workflow;

pub fn init(force: bool) -> Result<()> {
    let path = AppConfig::config_path();
    match AppConfig::write_template(&path, force) {
        Ok(true) => {
            println!("Generated config at {}", path.display());
            println!("  Fill in the [aws], [gcp] and [azure] sections for the clouds you use.");
        }
        Ok(false) => {
            eprintln!("Config file already exists at {}", path.display());
            eprintln!("Use --force to overwrite it.");
        }
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check() -> Result<()> {
    let path = AppConfig::config_path();
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `cloud-doctor config init` to create one.");
        return Ok(());
    }
    let lines = match check_file(&path) {
        Ok(lines) => lines,
        Err(issues) => {
            eprintln!("Config issues found in {}:", path.display());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
            std::process::exit(1);
        }
    };
    println!("Config is valid: {}", path.display());
    for line in lines {
        println!("  {}", line);
    }
    Ok(())
}

/// Summary lines for a valid file, or the list of problems.
fn check_file(path: &Path) -> std::result::Result<Vec<String>, Vec<String>> {
    let config = AppConfig::load_from(path).map_err(|e| vec![e.to_string()])?;
    let issues = config.validate();
    if !issues.is_empty() {
        return Err(issues);
    }

    let mut lines = Vec::new();
    for workflow in [Workflow::Cost, Workflow::Waste] {
        let ready: Vec<_> = Invocation::from_config(workflow, &config)
            .configured_providers()
            .iter()
            .map(|p| p.id())
            .collect();
        let label = match workflow {
            Workflow::Waste => "Waste checks",
            _ => "Cost reports",
        };
        if ready.is_empty() {
            lines.push(format!("{}: no providers configured", label));
        } else {
            lines.push(format!("{}: {}", label, ready.join(", ")));
        }
    }
    Ok(lines)
}
