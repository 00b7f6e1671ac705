pub mod aws;
pub mod azure;
pub mod capability;
pub mod gcp;
pub mod http;
pub mod registry;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
}

impl Provider {
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_lowercase().as_str() {
            "aws" | "amazon" => Some(Self::Aws),
            "gcp" | "google" => Some(Self::Gcp),
            "azure" => Some(Self::Azure),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Aws => "AWS",
            Self::Gcp => "GCP",
            Self::Azure => "Azure",
        }
    }

    /// Fixed ordering key for reports: AWS, then GCP, then Azure.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Aws => 1,
            Self::Gcp => 2,
            Self::Azure => 3,
        }
    }

    /// All providers in report order.
    pub fn all() -> &'static [Provider] {
        &[Provider::Aws, Provider::Gcp, Provider::Azure]
    }

    /// Label for the account column (AWS account, GCP project, Azure subscription).
    pub fn account_label(&self) -> &'static str {
        match self {
            Self::Aws => "Account",
            Self::Gcp => "Project",
            Self::Azure => "Subscription",
        }
    }

    /// Label used for reserved-capacity waste rows.
    pub fn reservation_label(&self) -> &'static str {
        match self {
            Self::Aws => "Reserved Instance",
            Self::Gcp => "Committed Use Discount",
            Self::Azure => "Reservation",
        }
    }

    pub fn auth_hint(&self) -> &'static str {
        match self {
            Self::Aws => "aws CLI credentials (--profile or default chain)",
            Self::Gcp => "gcloud auth or GOOGLE_OAUTH_ACCESS_TOKEN",
            Self::Azure => "az login or AZURE_ACCESS_TOKEN",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_id_accepts_aliases_case_insensitively() {
        assert_eq!(Provider::from_id("AWS"), Some(Provider::Aws));
        assert_eq!(Provider::from_id("google"), Some(Provider::Gcp));
        assert_eq!(Provider::from_id("Azure"), Some(Provider::Azure));
        assert_eq!(Provider::from_id("oracle"), None);
    }

    #[test]
    fn id_round_trips() {
        for p in Provider::all() {
            assert_eq!(Provider::from_id(p.id()), Some(*p));
        }
    }

    #[test]
    fn all_is_in_priority_order() {
        let priorities: Vec<u8> = Provider::all().iter().map(|p| p.priority()).collect();
        assert_eq!(priorities, vec![1, 2, 3]);
    }

    #[test]
    fn serializes_as_snake_case_id() {
        assert_eq!(serde_json::to_string(&Provider::Gcp).unwrap(), "\"gcp\"");
    }
}
