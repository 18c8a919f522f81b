use serde::{Deserialize, Serialize};

/// Core job states reconciled from the scheduler.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Transferred,
    Queued,
    Error,
    Unknown,
    Finished,
    ExecutionError,
    QueueError,
}

impl JobStatus {
    /// Map a raw SGE state column onto a core state. Letters outside the
    /// fixed table mean the job is visible but in a state we do not track.
    pub fn from_state_letter(state: &str) -> JobStatus {
        match state {
            "r" => JobStatus::Running,
            "t" => JobStatus::Transferred,
            "qw" => JobStatus::Queued,
            "Eqw" => JobStatus::Error,
            _ => JobStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::ExecutionError | JobStatus::QueueError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_letter_table() {
        k9::assert_equal!(JobStatus::from_state_letter("r"), JobStatus::Running);
        k9::assert_equal!(JobStatus::from_state_letter("t"), JobStatus::Transferred);
        k9::assert_equal!(JobStatus::from_state_letter("qw"), JobStatus::Queued);
        k9::assert_equal!(JobStatus::from_state_letter("Eqw"), JobStatus::Error);
        k9::assert_equal!(JobStatus::from_state_letter("dr"), JobStatus::Unknown);
    }

    #[test]
    fn status_names_are_screaming_snake() {
        k9::assert_equal!(JobStatus::ExecutionError.to_string(), "EXECUTION_ERROR");
        k9::assert_equal!(
            "QUEUE_ERROR".parse::<JobStatus>().unwrap(),
            JobStatus::QueueError
        );
    }
}
