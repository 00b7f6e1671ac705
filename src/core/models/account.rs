use serde::{Deserialize, Serialize};

use crate::core::providers::Provider;

/// Identity of the account, project or subscription a result belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub provider: Provider,
    /// AWS account id, GCP project id or Azure subscription id
    pub account_id: String,
    /// Caller ARN, project name or subscription display name
    pub account_name: String,
}
