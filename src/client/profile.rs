use serde::Deserialize;
use strum::Display;

/// Claude subscription tier as reported by the profile endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SubscriptionLevel {
    Max,
    Pro,
}

/// Display information about the authenticated account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountProfile {
    pub account_name: Option<String>,
    pub subscription: Option<SubscriptionLevel>,
}

impl AccountProfile {
    /// Human-readable label, e.g. `Claude Usage (Ada - Max)`.
    pub fn title(&self) -> String {
        match (&self.account_name, self.subscription) {
            (Some(name), Some(level)) => format!("Claude Usage ({name} - {level})"),
            (Some(name), None) => format!("Claude Usage ({name})"),
            _ => "Claude Usage".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProfileResponse {
    #[serde(default)]
    account: ProfileAccount,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileAccount {
    display_name: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    has_claude_max: bool,
    #[serde(default)]
    has_claude_pro: bool,
}

impl From<ProfileResponse> for AccountProfile {
    fn from(response: ProfileResponse) -> Self {
        let account = response.account;
        let account_name = [account.display_name, account.full_name, account.email]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty());
        let subscription = if account.has_claude_max {
            Some(SubscriptionLevel::Max)
        } else if account.has_claude_pro {
            Some(SubscriptionLevel::Pro)
        } else {
            None
        };
        Self {
            account_name,
            subscription,
        }
    }
}
