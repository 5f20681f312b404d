use crate::model::{RequestId, StageStatus, StepKey};

/// Filter over the stage rows of one request.
///
/// Superseded rows (`is_resubmission = true`) are excluded unless asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct StageQuery {
    pub request_id: RequestId,
    pub parent_step: Option<i64>,
    pub up_to_step: Option<StepKey>,
    pub status: Option<StageStatus>,
    pub include_resubmitted: bool,
}

impl StageQuery {
    pub fn for_request(request_id: RequestId) -> Self {
        Self {
            request_id,
            parent_step: None,
            up_to_step: None,
            status: None,
            include_resubmitted: false,
        }
    }

    /// Only sub-stages of the given main step.
    pub fn children_of(mut self, main_step: i64) -> Self {
        self.parent_step = Some(main_step);
        self
    }

    /// Only rows whose step is at or before `step`.
    pub fn up_to(mut self, step: StepKey) -> Self {
        self.up_to_step = Some(step);
        self
    }

    pub fn with_status(mut self, status: StageStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn including_resubmitted(mut self) -> Self {
        self.include_resubmitted = true;
        self
    }
}
