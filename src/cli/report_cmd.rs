use std::time::Duration;

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::aggregate::cost::{summarize_costs, CostReport};
use crate::core::aggregate::trend::{summarize_trends, TrendReport};
use crate::core::aggregate::waste::{summarize_waste, WasteReport};
use crate::core::collector::Collector;
use crate::core::config::AppConfig;
use crate::core::error::CloudError;
use crate::core::invocation::{pick, Invocation};
use crate::core::models::result::{ProviderCostResult, ProviderOutcome, ProviderWasteResult};
use crate::core::orchestrator::Workflow;
use crate::core::providers::capability::ProviderCapabilitySet;
use crate::core::providers::registry::{build_configured, CapabilityFactory, LiveProviders};
use crate::core::providers::Provider;

/// Report flags as parsed from the command line (env fallbacks already applied).
#[derive(Debug, Clone, Default)]
pub struct ReportArgs {
    pub provider: String,
    pub trend: bool,
    pub waste: bool,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub project: Option<String>,
    pub billing_account: Option<String>,
    pub subscription: Option<String>,
    pub timeout: Option<u64>,
}

#[derive(Serialize)]
struct CostPayload<'a> {
    workflow: Workflow,
    results: &'a [ProviderCostResult],
    summary: &'a CostReport,
}

#[derive(Serialize)]
struct TrendPayload<'a> {
    workflow: Workflow,
    results: &'a [ProviderCostResult],
    summary: &'a TrendReport,
}

#[derive(Serialize)]
struct WastePayload<'a> {
    workflow: Workflow,
    results: &'a [ProviderWasteResult],
    summary: &'a WasteReport,
}

/// Config values with flag values layered on top.
pub fn build_invocation(args: &ReportArgs, config: &AppConfig) -> Invocation {
    let workflow = Workflow::from_flags(args.trend, args.waste);
    let mut inv = Invocation::from_config(workflow, config);
    inv.aws.region = pick(args.region.clone(), &inv.aws.region);
    inv.aws.profile = pick(args.profile.clone(), &inv.aws.profile);
    inv.gcp.project = pick(args.project.clone(), &inv.gcp.project);
    inv.gcp.billing_account = pick(args.billing_account.clone(), &inv.gcp.billing_account);
    inv.azure.subscription = pick(args.subscription.clone(), &inv.azure.subscription);
    if let Some(secs) = args.timeout.filter(|s| *s > 0) {
        inv.timeout = Duration::from_secs(secs);
    }
    inv
}

/// Capability sets for `--provider`. A named provider must be fully configured;
/// `all` takes whichever providers are.
pub fn select_providers(
    filter: &str,
    invocation: &Invocation,
    factory: &dyn CapabilityFactory,
) -> Result<Vec<ProviderCapabilitySet>> {
    if filter.eq_ignore_ascii_case("all") {
        return Ok(build_configured(factory, invocation)?);
    }
    let Some(provider) = Provider::from_id(filter) else {
        bail!("Unknown provider: '{}' (expected aws, gcp, azure or all)", filter);
    };
    Ok(vec![factory.build(invocation, provider)?])
}

pub async fn run(args: ReportArgs, config: &AppConfig, opts: &OutputOptions) -> Result<()> {
    let invocation = build_invocation(&args, config);
    debug!(?invocation, "resolved invocation");

    let providers = select_providers(&args.provider, &invocation, &LiveProviders)?;
    let collector = Collector::new(invocation.timeout);

    match invocation.workflow {
        Workflow::Waste => {
            let results = exit_on_aggregate(collector.collect_waste(providers).await)?;
            let report = summarize_waste(&results);
            match opts.format {
                OutputFormat::Text => {
                    println!("{}", renderer::render_waste_report(&report, &results, opts.use_color))
                }
                OutputFormat::Json => println!(
                    "{}",
                    opts.to_json(&WastePayload {
                        workflow: invocation.workflow,
                        results: &results,
                        summary: &report,
                    })?
                ),
            }
            print_auth_hints(&results, opts);
        }
        workflow => {
            let results = exit_on_aggregate(collector.collect_costs(workflow, providers).await)?;
            match (opts.format, workflow) {
                (OutputFormat::Text, Workflow::Trend) => {
                    let report = summarize_trends(&results);
                    println!("{}", renderer::render_trend_report(&report, opts.use_color));
                }
                (OutputFormat::Text, _) => {
                    let report = exit_on_aggregate(usable_cost_report(&results))?;
                    println!("{}", renderer::render_cost_report(&report, opts.use_color));
                }
                (OutputFormat::Json, Workflow::Trend) => {
                    let report = summarize_trends(&results);
                    println!(
                        "{}",
                        opts.to_json(&TrendPayload {
                            workflow,
                            results: &results,
                            summary: &report,
                        })?
                    );
                }
                (OutputFormat::Json, _) => {
                    let report = exit_on_aggregate(usable_cost_report(&results))?;
                    println!(
                        "{}",
                        opts.to_json(&CostPayload {
                            workflow,
                            results: &results,
                            summary: &report,
                        })?
                    );
                }
            }
            print_auth_hints(&results, opts);
        }
    }

    Ok(())
}

/// Cost report, or `AllProvidersFailed` when no row had usable totals.
fn usable_cost_report(results: &[ProviderCostResult]) -> Result<CostReport, CloudError> {
    let report = summarize_costs(results);
    report.ensure_usable()?;
    Ok(report)
}

/// Aborting errors end the process with guidance; anything else propagates.
fn exit_on_aggregate<T>(result: Result<T, CloudError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_aggregate() => {
            eprintln!("Error: {}", e);
            if matches!(e, CloudError::NoProvidersConfigured { .. }) {
                eprintln!("Set identifiers with flags, environment variables or `cloud-doctor config init`.");
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

/// Credential pointers for failed providers, on stderr so JSON stays parseable.
fn print_auth_hints<R: ProviderOutcome>(results: &[R], opts: &OutputOptions) {
    for row in results.iter().filter(|r| r.is_failed()) {
        let provider = row.provider();
        warn!(%provider, error = row.error().unwrap_or_default(), "provider failed");
        if opts.format == OutputFormat::Text || opts.verbose {
            eprintln!(
                "{} failed; check {}",
                provider.display_name(),
                provider.auth_hint()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{AwsConfig, AzureConfig};

    fn args(provider: &str) -> ReportArgs {
        ReportArgs {
            provider: provider.into(),
            ..ReportArgs::default()
        }
    }

    #[test]
    fn flags_override_config_values() {
        let config = AppConfig {
            aws: AwsConfig {
                region: Some("eu-west-1".into()),
                profile: Some("prod".into()),
            },
            ..AppConfig::default()
        };
        let mut a = args("all");
        a.region = Some("us-east-1".into());
        a.timeout = Some(30);
        let inv = build_invocation(&a, &config);
        assert_eq!(inv.aws.region.as_deref(), Some("us-east-1"));
        assert_eq!(inv.aws.profile.as_deref(), Some("prod"));
        assert_eq!(inv.timeout, Duration::from_secs(30));
        assert_eq!(inv.workflow, Workflow::Cost);
    }

    #[test]
    fn blank_flag_falls_back_to_config() {
        let config = AppConfig {
            azure: AzureConfig {
                subscription: Some("sub-1".into()),
            },
            ..AppConfig::default()
        };
        let mut a = args("azure");
        a.subscription = Some(" ".into());
        a.waste = true;
        let inv = build_invocation(&a, &config);
        assert_eq!(inv.azure.subscription.as_deref(), Some("sub-1"));
        assert_eq!(inv.workflow, Workflow::Waste);
    }

    #[test]
    fn named_provider_without_identifier_is_a_config_error() {
        let inv = build_invocation(&args("gcp"), &AppConfig::default());
        let err = select_providers("gcp", &inv, &LiveProviders).unwrap_err();
        assert!(err.to_string().contains("--project flag is required for GCP"));
    }

    #[test]
    fn cost_report_with_no_parseable_totals_is_an_aggregate_failure() {
        let row = ProviderCostResult {
            current_total: "n/a".into(),
            last_total: "1.00 USD".into(),
            ..ProviderCostResult::empty(Provider::Aws)
        };
        let err = usable_cost_report(&[row]).unwrap_err();
        assert!(err.is_aggregate());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let inv = build_invocation(&args("oracle"), &AppConfig::default());
        let err = select_providers("oracle", &inv, &LiveProviders).unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn all_selects_only_configured_providers() {
        let mut a = args("all");
        a.profile = Some("prod".into());
        a.project = Some("acme".into());
        a.waste = true;
        let inv = build_invocation(&a, &AppConfig::default());
        let sets = select_providers("ALL", &inv, &LiveProviders).unwrap();
        let providers: Vec<_> = sets.iter().map(|s| s.provider).collect();
        assert_eq!(providers, vec![Provider::Aws, Provider::Gcp]);
    }
}
