use job_master_core::JobMasterError;
use job_master_common::SafeDisplay;
use tonic::{Code, Status};

/// Maps the kernel's error taxonomy onto gRPC status codes: one match arm
/// per variant, rendering the message through `SafeDisplay` rather than
/// trusting `Display` to already be safe to hand back to a caller.
pub fn to_status(err: JobMasterError) -> Status {
    let message = err.to_safe_string();
    let code = match err {
        JobMasterError::UnknownPlan(_) => Code::InvalidArgument,
        JobMasterError::CapacityExceeded => Code::ResourceExhausted,
        JobMasterError::NotFound(_) => Code::NotFound,
        JobMasterError::InvalidArgument(_) => Code::InvalidArgument,
        JobMasterError::Internal(_) => Code::Internal,
    };
    Status::new(code, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use job_master_core::model::PlanId;
    use test_r::test;

    #[test]
    fn not_found_maps_to_grpc_not_found() {
        let status = to_status(JobMasterError::NotFound(PlanId(7)));
        assert_eq!(status.code(), Code::NotFound);
    }

    #[test]
    fn capacity_exceeded_maps_to_resource_exhausted() {
        let status = to_status(JobMasterError::CapacityExceeded);
        assert_eq!(status.code(), Code::ResourceExhausted);
    }
}
