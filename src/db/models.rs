use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub github_username: Option<String>,
    pub linkedin_id: Option<String>,
    pub github_token: Option<String>,
    pub linkedin_token: Option<String>,
    pub github_profileurl: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values for a row created at the end of the two-hop flow.
///
/// The GitHub half comes from the pending session and may be absent when the
/// browser reached the LinkedIn callback without a GitHub hop.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedUser {
    pub github_username: Option<String>,
    pub github_token: Option<String>,
    pub github_profileurl: Option<String>,
    pub linkedin_id: String,
    pub linkedin_token: String,
}
