use crate::admin::wire;
use crate::{Error, Result};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

/// Transport action name for deleting a model snapshot.
pub const ACTION_NAME: &str = "cluster:admin/xpack/ml/job/model_snapshots/delete";

/// Request to delete one model snapshot of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DeleteModelSnapshotRepr")]
pub struct DeleteModelSnapshotRequest {
    job_id: String,
    snapshot_id: String,
}

#[derive(Deserialize)]
struct DeleteModelSnapshotRepr {
    job_id: Option<String>,
    snapshot_id: Option<String>,
}

impl TryFrom<DeleteModelSnapshotRepr> for DeleteModelSnapshotRequest {
    type Error = Error;

    fn try_from(repr: DeleteModelSnapshotRepr) -> Result<Self> {
        Self::new(repr.job_id, repr.snapshot_id)
    }
}

fn require(value: Option<String>, field: &str) -> Result<String> {
    value.ok_or_else(|| Error::Validation(format!("[{}] must not be null", field)))
}

impl DeleteModelSnapshotRequest {
    pub fn new(job_id: Option<String>, snapshot_id: Option<String>) -> Result<Self> {
        Ok(Self {
            job_id: require(job_id, "job_id")?,
            snapshot_id: require(snapshot_id, "snapshot_id")?,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn write_to(&self, out: &mut impl BufMut) -> Result<()> {
        wire::write_string(out, &self.job_id)?;
        wire::write_string(out, &self.snapshot_id)
    }

    pub fn read_from(input: &mut impl Buf) -> Result<Self> {
        let job_id = wire::read_string(input)?;
        let snapshot_id = wire::read_string(input)?;
        Ok(Self { job_id, snapshot_id })
    }
}

/// Response carrying only whether the action was acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AcknowledgedResponse {
    pub acknowledged: bool,
}

impl AcknowledgedResponse {
    pub fn new(acknowledged: bool) -> Self {
        Self { acknowledged }
    }

    pub fn write_to(&self, out: &mut impl BufMut) {
        wire::write_bool(out, self.acknowledged);
    }

    pub fn read_from(input: &mut impl Buf) -> Result<Self> {
        Ok(Self {
            acknowledged: wire::read_bool(input)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_missing_ids_rejected() {
        let err = DeleteModelSnapshotRequest::new(None, Some("snap".to_string())).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: [job_id] must not be null");

        let err = DeleteModelSnapshotRequest::new(Some("job".to_string()), None).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: [snapshot_id] must not be null");
    }

    #[test]
    fn test_wire_order() {
        let req = DeleteModelSnapshotRequest::new(Some("job".into()), Some("s1".into())).unwrap();
        let mut buf = BytesMut::new();
        req.write_to(&mut buf).unwrap();
        assert_eq!(&buf[..], b"\x03job\x02s1");

        let mut input = buf.freeze();
        let decoded = DeleteModelSnapshotRequest::read_from(&mut input).unwrap();
        assert_eq!(decoded, req);
        assert!(!input.has_remaining());
    }

    #[test]
    fn test_truncated_request() {
        let mut input: &[u8] = b"\x03job";
        assert!(matches!(
            DeleteModelSnapshotRequest::read_from(&mut input),
            Err(Error::Wire(_))
        ));
    }

    #[test]
    fn test_json_requires_ids() {
        let req: DeleteModelSnapshotRequest =
            serde_json::from_str(r#"{"job_id":"job","snapshot_id":"s1"}"#).unwrap();
        assert_eq!(req.job_id(), "job");
        assert_eq!(req.snapshot_id(), "s1");

        let err = serde_json::from_str::<DeleteModelSnapshotRequest>(r#"{"job_id":"job"}"#).unwrap_err();
        assert!(err.to_string().contains("[snapshot_id] must not be null"));
    }

    #[test]
    fn test_acknowledged_is_one_byte() {
        let mut buf = BytesMut::new();
        AcknowledgedResponse::new(true).write_to(&mut buf);
        assert_eq!(&buf[..], &[1u8]);
        assert_eq!(
            AcknowledgedResponse::read_from(&mut buf.freeze()).unwrap(),
            AcknowledgedResponse { acknowledged: true }
        );
    }
}
