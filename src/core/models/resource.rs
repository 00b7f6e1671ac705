use serde::{Deserialize, Serialize};

/// Sentinel for providers that cannot report how long an instance has been stopped.
pub const UNKNOWN_STOPPED_DAYS: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeStatus {
    /// Not attached to anything
    Available,
    /// Attached to an instance that is itself stopped
    AttachedStopped,
}

impl std::fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "Available (Unattached)"),
            Self::AttachedStopped => write!(f, "Attached to Stopped Instance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedVolume {
    pub id: String,
    pub size_gb: u32,
    pub status: VolumeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedIp {
    pub address: String,
    pub allocation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoppedInstance {
    pub id: String,
    pub name: String,
    /// Days since the instance stopped, or [`UNKNOWN_STOPPED_DAYS`].
    pub stopped_days: i64,
}

impl StoppedInstance {
    pub fn unknown_duration(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stopped_days: UNKNOWN_STOPPED_DAYS,
        }
    }

    /// Stop duration in days, `None` when the provider could not report it.
    pub fn known_stopped_days(&self) -> Option<u32> {
        u32::try_from(self.stopped_days).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Expiring,
    Expired,
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expiring => write!(f, "Expiring Soon"),
            Self::Expired => write!(f, "Recently Expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub instance_type: String,
    pub status: ReservationStatus,
    /// Negative once expired (days since expiry)
    pub days_until_expiry: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_duration_is_not_a_number_of_days() {
        let vm = StoppedInstance::unknown_duration("vm-1", "vm-1");
        assert_eq!(vm.stopped_days, -1);
        assert_eq!(vm.known_stopped_days(), None);
    }

    #[test]
    fn known_duration_converts() {
        let vm = StoppedInstance {
            id: "i-1".into(),
            name: "web".into(),
            stopped_days: 45,
        };
        assert_eq!(vm.known_stopped_days(), Some(45));
    }

    #[test]
    fn statuses_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&VolumeStatus::AttachedStopped).unwrap(),
            "\"attached_stopped\""
        );
        assert_eq!(
            serde_json::to_string(&ReservationStatus::Expiring).unwrap(),
            "\"expiring\""
        );
    }
}
