// Integer identifiers for persisted rows and directory records

use serde::{Deserialize, Serialize};

macro_rules! define_id_type {
    ($name:ident, $kind:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const KIND: &'static str = $kind;

            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                raw.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| format!("invalid {} `{}`", $kind, raw))
            }
        }
    };
}

define_id_type!(OrganizationId, "organization id");
define_id_type!(FormId, "form id");
define_id_type!(WorkflowId, "workflow id");
define_id_type!(StageDefinitionId, "stage definition id");
define_id_type!(RequestId, "workflow request id");
define_id_type!(InstanceStageId, "instance stage id");
define_id_type!(EmployeeId, "employee id");
define_id_type!(PositionId, "position id");
define_id_type!(DepartmentId, "department id");
