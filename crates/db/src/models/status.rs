//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding lookup table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Map a database status ID back to the enum.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Processing status of a received webhook (`webhook_statuses`).
    WebhookStatus {
        Pending = 1,
        Processing = 2,
        Completed = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Queue job lifecycle (`job_statuses`).
    JobStatus {
        Waiting = 1,
        Active = 2,
        Completed = 3,
        Failed = 4,
    }
}

define_status_enum! {
    /// Marketplace integration health (`integration_health_statuses`).
    IntegrationHealth {
        Healthy = 1,
        Unhealthy = 2,
        Disconnected = 3,
    }
}

define_status_enum! {
    /// Whether an integration is usable (`integration_connection_states`).
    ConnectionState {
        Active = 1,
        Disconnected = 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for status in [
            WebhookStatus::Pending,
            WebhookStatus::Processing,
            WebhookStatus::Completed,
            WebhookStatus::Failed,
        ] {
            assert_eq!(WebhookStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(JobStatus::from_id(9), None);
    }

    #[test]
    fn ids_match_seed_order() {
        assert_eq!(WebhookStatus::Pending.id(), 1);
        assert_eq!(WebhookStatus::Failed.id(), 4);
        assert_eq!(JobStatus::Waiting.id(), 1);
        assert_eq!(JobStatus::Active.id(), 2);
        assert_eq!(ConnectionState::Active.id(), 1);
        assert_eq!(IntegrationHealth::Unhealthy.id(), 2);
    }

    #[test]
    fn serializes_as_screaming_case() {
        assert_eq!(
            serde_json::to_string(&WebhookStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
    }
}
