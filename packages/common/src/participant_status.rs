#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gating status of one side of a private chat.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Started the chat and waits for the other user to reply.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending_sender"))]
    PendingSender,
    /// Received a chat request and has not replied yet.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending_receiver"))]
    PendingReceiver,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
}

/// Reason a participant may not send.
pub const WAITING_FOR_REPLY: &str = "waiting for the other user to reply or accept";

/// What accepting a message does to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendEffect {
    /// Both participants must become [`ParticipantStatus::Active`] before the
    /// message is stored.
    pub activate_both: bool,
}

impl ParticipantStatus {
    pub const ALL: &'static [ParticipantStatus] =
        &[Self::PendingSender, Self::PendingReceiver, Self::Active];

    /// Statuses for `(creator, recipient)` of a new chat.
    pub fn initial(mutual_follow: bool) -> (Self, Self) {
        if mutual_follow {
            (Self::Active, Self::Active)
        } else {
            (Self::PendingSender, Self::PendingReceiver)
        }
    }

    /// Decide whether a participant in this status may send a message.
    ///
    /// Returns the rejection reason when it may not.
    pub fn plan_send(self) -> Result<SendEffect, &'static str> {
        match self {
            Self::PendingSender => Err(WAITING_FOR_REPLY),
            Self::PendingReceiver => Ok(SendEffect {
                activate_both: true,
            }),
            Self::Active => Ok(SendEffect {
                activate_both: false,
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingSender => "pending_sender",
            Self::PendingReceiver => "pending_receiver",
            Self::Active => "active",
        }
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an unknown status string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid participant status '{0}'")]
pub struct ParseParticipantStatusError(String);

impl FromStr for ParticipantStatus {
    type Err = ParseParticipantStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseParticipantStatusError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_statuses_depend_on_mutual_follow() {
        assert_eq!(
            ParticipantStatus::initial(true),
            (ParticipantStatus::Active, ParticipantStatus::Active)
        );
        assert_eq!(
            ParticipantStatus::initial(false),
            (
                ParticipantStatus::PendingSender,
                ParticipantStatus::PendingReceiver
            )
        );
    }

    #[test]
    fn pending_sender_cannot_send() {
        assert_eq!(
            ParticipantStatus::PendingSender.plan_send(),
            Err(WAITING_FOR_REPLY)
        );
    }

    #[test]
    fn pending_receiver_reply_activates_both() {
        assert!(
            ParticipantStatus::PendingReceiver
                .plan_send()
                .unwrap()
                .activate_both
        );
        assert!(!ParticipantStatus::Active.plan_send().unwrap().activate_both);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ParticipantStatus::PendingReceiver).unwrap();
        assert_eq!(json, "\"pending_receiver\"");
        assert_eq!(
            "active".parse::<ParticipantStatus>().unwrap(),
            ParticipantStatus::Active
        );
        assert!("Active".parse::<ParticipantStatus>().is_err());
    }
}
