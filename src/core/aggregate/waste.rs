use serde::Serialize;
use std::ops::AddAssign;

use crate::core::models::resource::StoppedInstance;
use crate::core::models::result::{ProviderOutcome, ProviderWasteResult};
use crate::core::providers::Provider;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WasteCounts {
    /// Unused volumes plus volumes attached to stopped instances.
    pub volumes: usize,
    pub ips: usize,
    pub stopped_instances: usize,
    pub reservations: usize,
}

impl WasteCounts {
    pub fn of(result: &ProviderWasteResult) -> Self {
        Self {
            volumes: result.unused_volumes.len() + result.attached_volumes.len(),
            ips: result.unused_ips.len(),
            stopped_instances: result.stopped_instances.len(),
            reservations: result.expiring_reservations.len(),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn total(&self) -> usize {
        self.volumes + self.ips + self.stopped_instances + self.reservations
    }
}

impl AddAssign for WasteCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.volumes += rhs.volumes;
        self.ips += rhs.ips;
        self.stopped_instances += rhs.stopped_instances;
        self.reservations += rhs.reservations;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WasteStatus {
    Healthy,
    WasteFound,
    Failed,
}

impl std::fmt::Display for WasteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Healthy => "Healthy",
            Self::WasteFound => "Waste found",
            Self::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderWasteSummary {
    pub provider: Provider,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub account_id: String,
    pub counts: WasteCounts,
    pub status: WasteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WasteReport {
    pub rows: Vec<ProviderWasteSummary>,
    /// Summed over providers that succeeded.
    pub totals: WasteCounts,
    pub all_healthy: bool,
}

/// The instance stopped for the most days; unknown durations never win.
pub fn longest_stopped(instances: &[StoppedInstance]) -> Option<&StoppedInstance> {
    instances
        .iter()
        .filter_map(|i| i.known_stopped_days().map(|d| (d, i)))
        .fold(None, |best: Option<(u32, &StoppedInstance)>, (days, inst)| match best {
            Some((b, _)) if b >= days => best,
            _ => Some((days, inst)),
        })
        .map(|(_, inst)| inst)
}

pub fn summarize_waste(results: &[ProviderWasteResult]) -> WasteReport {
    let mut totals = WasteCounts::default();
    let rows: Vec<ProviderWasteSummary> = results
        .iter()
        .map(|r| {
            if let Some(err) = r.error().filter(|e| !e.is_empty()) {
                return ProviderWasteSummary {
                    provider: r.provider,
                    account_id: String::new(),
                    counts: WasteCounts::default(),
                    status: WasteStatus::Failed,
                    error: Some(err.to_string()),
                };
            }
            let counts = WasteCounts::of(r);
            totals += counts;
            ProviderWasteSummary {
                provider: r.provider,
                account_id: r.account_id.clone(),
                counts,
                status: if counts.is_zero() {
                    WasteStatus::Healthy
                } else {
                    WasteStatus::WasteFound
                },
                error: None,
            }
        })
        .collect();

    WasteReport {
        all_healthy: totals.is_zero(),
        totals,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CloudError;
    use crate::core::models::resource::{UnusedIp, UnusedVolume, VolumeStatus};

    fn volume(id: &str, status: VolumeStatus) -> UnusedVolume {
        UnusedVolume {
            id: id.into(),
            size_gb: 10,
            status,
        }
    }

    fn stopped(id: &str, days: i64) -> StoppedInstance {
        StoppedInstance {
            id: id.into(),
            name: id.into(),
            stopped_days: days,
        }
    }

    #[test]
    fn volume_count_includes_attached_to_stopped() {
        let mut result = ProviderWasteResult::empty(Provider::Aws);
        result.unused_volumes.push(volume("a", VolumeStatus::Available));
        result.attached_volumes.push(volume("b", VolumeStatus::AttachedStopped));
        result.attached_volumes.push(volume("c", VolumeStatus::AttachedStopped));
        assert_eq!(WasteCounts::of(&result).volumes, 3);
    }

    #[test]
    fn totals_skip_failed_providers() {
        let mut aws = ProviderWasteResult::empty(Provider::Aws);
        aws.unused_ips.push(UnusedIp {
            address: "1.1.1.1".into(),
            allocation_id: "e".into(),
        });
        let azure = ProviderWasteResult::empty(Provider::Azure);
        let mut gcp = ProviderWasteResult::from_error(
            Provider::Gcp,
            &CloudError::Upstream {
                provider: Provider::Gcp,
                message: "denied".into(),
            },
        );
        // data next to an error is ignored
        gcp.unused_ips.push(UnusedIp {
            address: "2.2.2.2".into(),
            allocation_id: "x".into(),
        });

        let report = summarize_waste(&[aws, gcp, azure]);
        assert_eq!(report.totals.ips, 1);
        assert_eq!(report.rows[0].status, WasteStatus::WasteFound);
        assert_eq!(report.rows[1].status, WasteStatus::Failed);
        assert_eq!(report.rows[2].status, WasteStatus::Healthy);
        assert!(!report.all_healthy);
    }

    #[test]
    fn all_healthy_when_every_total_is_zero() {
        let report = summarize_waste(&[
            ProviderWasteResult::empty(Provider::Aws),
            ProviderWasteResult::empty(Provider::Azure),
        ]);
        assert!(report.all_healthy);
        assert_eq!(report.totals.total(), 0);
    }

    #[test]
    fn longest_stopped_ignores_unknown_durations() {
        let instances = vec![
            StoppedInstance::unknown_duration("vm-a", "vm-a"),
            stopped("i-1", 45),
            stopped("i-2", 90),
            stopped("i-3", 90),
        ];
        assert_eq!(longest_stopped(&instances).unwrap().id, "i-2");

        let unknown_only = vec![StoppedInstance::unknown_duration("vm", "vm")];
        assert!(longest_stopped(&unknown_only).is_none());
    }
}
