//! Signature request state machine and related enums

use serde::{Deserialize, Serialize};

/// Expiry windows (in days) a requester may choose from.
pub const ALLOWED_EXPIRY_DAYS: [i64; 4] = [3, 7, 14, 30];

/// Lifetime of a single OTP, in minutes.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Verification attempts allowed per OTP.
pub const OTP_MAX_ATTEMPTS: i64 = 3;

/// Status of a signature request
///
/// `Pending` and `OtpSent` are open; the other four are terminal.
/// `OtpSent` is re-entered on every resend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    OtpSent,
    Signed,
    Declined,
    Expired,
    Cancelled,
}

impl RequestStatus {
    /// Terminal states admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Signed
                | RequestStatus::Declined
                | RequestStatus::Expired
                | RequestStatus::Cancelled
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition(self, next: RequestStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            // Re-entered on resend, first entered from Pending.
            RequestStatus::OtpSent => true,
            RequestStatus::Signed
            | RequestStatus::Declined
            | RequestStatus::Expired
            | RequestStatus::Cancelled => true,
            RequestStatus::Pending => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::OtpSent => "otp_sent",
            RequestStatus::Signed => "signed",
            RequestStatus::Declined => "declined",
            RequestStatus::Expired => "expired",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "otp_sent" => Ok(RequestStatus::OtpSent),
            "signed" => Ok(RequestStatus::Signed),
            "declined" => Ok(RequestStatus::Declined),
            "expired" => Ok(RequestStatus::Expired),
            "cancelled" => Ok(RequestStatus::Cancelled),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// Kind of document attached to a signature request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Quote,
    Contract,
    Custom,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentType::Quote => "quote",
            DocumentType::Contract => "contract",
            DocumentType::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Security-relevant actions recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    OtpSent,
    OtpFailed,
    Signed,
    Declined,
    Cancelled,
    Expired,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::OtpSent => "otp_sent",
            AuditAction::OtpFailed => "otp_failed",
            AuditAction::Signed => "signed",
            AuditAction::Declined => "declined",
            AuditAction::Cancelled => "cancelled",
            AuditAction::Expired => "expired",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
