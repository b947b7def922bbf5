use log::debug;

use crate::{
    error::WriteError,
    interaction_model::{status::StatusCode, StatusIB, WriteResponseMessage},
    pending::{CorrelationId, PendingTable},
};

/// What a node answered to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Success,
    /// Status codes are passed through as received, known or not.
    Failure { code: u8, cluster_code: Option<u16> },
}

impl WriteOutcome {
    pub fn from_status(status: StatusIB) -> Self {
        if status.status == StatusCode::Success as u8 {
            WriteOutcome::Success
        } else {
            WriteOutcome::Failure {
                code: status.status,
                cluster_code: status.cluster_status,
            }
        }
    }

    /// A multi-path response succeeds only if every path did. Otherwise the
    /// first failing path decides the outcome.
    pub fn from_write_response(response: &WriteResponseMessage) -> Self {
        response
            .write_responses
            .iter()
            .map(|response| WriteOutcome::from_status(response.status))
            .find(|outcome| *outcome != WriteOutcome::Success)
            .unwrap_or(WriteOutcome::Success)
    }

    pub fn into_result(self) -> Result<(), WriteError> {
        match self {
            WriteOutcome::Success => Ok(()),
            WriteOutcome::Failure { code, cluster_code } => {
                Err(WriteError::Failure { code, cluster_code })
            }
        }
    }
}

/// Routes outcomes to the pending writes they belong to.
#[derive(Debug, Clone)]
pub struct CompletionDispatcher {
    pending: PendingTable,
}

impl CompletionDispatcher {
    pub fn new(pending: PendingTable) -> Self {
        Self { pending }
    }

    /// Complete the write `id` with `outcome`. Late and duplicate responses
    /// find no entry and are discarded.
    pub fn on_response(&self, id: CorrelationId, outcome: WriteOutcome) -> bool {
        if let WriteOutcome::Failure { code, cluster_code } = outcome {
            debug!(
                "Write {id} rejected with {:?} ({code:#04x}), cluster status {cluster_code:?}",
                StatusCode::from_code(code)
            );
        }
        self.pending.resolve(id, outcome.into_result())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        callback::completion,
        data_model::AttributePath,
        interaction_model::AttributeStatusIB,
    };

    fn status(attribute_id: u32, status: u8) -> AttributeStatusIB {
        AttributeStatusIB {
            path: AttributePath::new(1, 0x0006, attribute_id).into(),
            status: StatusIB {
                status,
                cluster_status: None,
            },
        }
    }

    #[test]
    fn test_fold_write_response() {
        let all_ok = WriteResponseMessage {
            write_responses: vec![status(0x4001, 0), status(0x4002, 0)],
        };
        assert_eq!(WriteOutcome::from_write_response(&all_ok), WriteOutcome::Success);

        let mixed = WriteResponseMessage {
            write_responses: vec![status(0x4001, 0), status(0x4002, 0x87), status(0x4003, 0x88)],
        };
        assert_eq!(
            WriteOutcome::from_write_response(&mixed),
            WriteOutcome::Failure {
                code: 0x87,
                cluster_code: None
            }
        );
    }

    #[tokio::test]
    async fn test_failure_passthrough() {
        let pending = PendingTable::new();
        let dispatcher = CompletionDispatcher::new(pending.clone());
        let (callback, completion) = completion();
        let id = pending.register(callback, Duration::from_secs(5));

        // Vendor specific codes are not interpreted
        let outcome = WriteOutcome::Failure {
            code: 0xF0,
            cluster_code: Some(7),
        };
        assert!(dispatcher.on_response(id, outcome));
        let error = completion.wait().await.unwrap_err();
        assert_eq!(
            error,
            WriteError::Failure {
                code: 0xF0,
                cluster_code: Some(7)
            }
        );
        assert_eq!(error.status(), None);

        // Duplicate response
        assert!(!dispatcher.on_response(id, WriteOutcome::Success));
    }
}
