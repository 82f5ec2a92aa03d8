use crate::{
    error::ClientError,
    types::{ClientEvent, MediaUploadAck, SendAck},
};

/// Send command success/failure before normalization into an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Send succeeded and produced a message id.
    Success { message_id: String },
    /// Send failed with client error details.
    Failure { error: ClientError },
}

/// Convert a send command outcome to a stable `ClientEvent::SendAck`.
pub fn normalize_send_outcome(
    client_txn_id: impl Into<String>,
    outcome: SendOutcome,
) -> ClientEvent {
    let client_txn_id = client_txn_id.into();
    match outcome {
        SendOutcome::Success { message_id } => ClientEvent::SendAck(SendAck {
            client_txn_id,
            message_id: Some(message_id),
            error_code: None,
        }),
        SendOutcome::Failure { error } => ClientEvent::SendAck(SendAck {
            client_txn_id,
            message_id: None,
            error_code: Some(error.code),
        }),
    }
}

/// Convert a media upload result to a stable `ClientEvent::MediaUploadAck`.
pub fn normalize_upload_outcome(
    client_txn_id: impl Into<String>,
    result: Result<String, ClientError>,
) -> ClientEvent {
    let client_txn_id = client_txn_id.into();
    match result {
        Ok(url) => ClientEvent::MediaUploadAck(MediaUploadAck {
            client_txn_id,
            url: Some(url),
            error_code: None,
        }),
        Err(error) => ClientEvent::MediaUploadAck(MediaUploadAck {
            client_txn_id,
            url: None,
            error_code: Some(error.code),
        }),
    }
}

/// Convert an error into a `FatalError` client event.
pub fn normalize_fatal_error(error: ClientError, recoverable: bool) -> ClientEvent {
    ClientEvent::FatalError {
        code: error.code,
        message: error.message,
        recoverable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientErrorCategory;

    #[test]
    fn maps_success_to_send_ack() {
        let event = normalize_send_outcome(
            "txn-1",
            SendOutcome::Success {
                message_id: "m-42".into(),
            },
        );

        match event {
            ClientEvent::SendAck(ack) => {
                assert_eq!(ack.client_txn_id, "txn-1");
                assert_eq!(ack.message_id.as_deref(), Some("m-42"));
                assert_eq!(ack.error_code, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn maps_failure_to_send_ack_with_stable_error_code() {
        let event = normalize_send_outcome(
            "txn-2",
            SendOutcome::Failure {
                error: ClientError::new(
                    ClientErrorCategory::Network,
                    "send_failed",
                    "backend unreachable",
                ),
            },
        );

        match event {
            ClientEvent::SendAck(ack) => {
                assert_eq!(ack.client_txn_id, "txn-2");
                assert_eq!(ack.message_id, None);
                assert_eq!(ack.error_code.as_deref(), Some("send_failed"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn maps_upload_result_to_ack() {
        let ok = normalize_upload_outcome("txn-3", Ok("https://cdn.example.org/a.png".into()));
        match ok {
            ClientEvent::MediaUploadAck(ack) => {
                assert_eq!(ack.url.as_deref(), Some("https://cdn.example.org/a.png"));
                assert_eq!(ack.error_code, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let failed = normalize_upload_outcome(
            "txn-4",
            Err(ClientError::new(
                ClientErrorCategory::Network,
                "upload_failed",
                "no route",
            )),
        );
        match failed {
            ClientEvent::MediaUploadAck(ack) => {
                assert_eq!(ack.url, None);
                assert_eq!(ack.error_code.as_deref(), Some("upload_failed"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
