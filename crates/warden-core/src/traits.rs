use std::cmp::Ordering;

use crate::types::StatusCode;

// ---------------------------------------------------------------------------
// StatusCodeComparator — the single authority on status severity
//
// Combining algorithms and the evaluation context never compare status codes
// with ad hoc conditionals; they ask the comparator.
// ---------------------------------------------------------------------------

pub trait StatusCodeComparator: Send + Sync {
    fn compare(&self, left: StatusCode, right: StatusCode) -> Ordering;

    /// The more severe of the two codes. Ties keep `current`.
    fn worst(&self, current: StatusCode, candidate: StatusCode) -> StatusCode {
        match self.compare(current, candidate) {
            Ordering::Less => candidate,
            _ => current,
        }
    }
}

/// Fixed XACML ranking: OK < MISSING_ATTRIBUTE < PROCESSING_ERROR < SYNTAX_ERROR.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCodePriority;

impl StatusCodePriority {
    pub fn rank(code: StatusCode) -> u8 {
        match code {
            StatusCode::Ok => 0,
            StatusCode::MissingAttribute => 1,
            StatusCode::ProcessingError => 2,
            StatusCode::SyntaxError => 3,
        }
    }
}

impl StatusCodeComparator for StatusCodePriority {
    fn compare(&self, left: StatusCode, right: StatusCode) -> Ordering {
        Self::rank(left).cmp(&Self::rank(right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait object is object-safe
    fn _assert_comparator_object_safe(_: &dyn StatusCodeComparator) {}

    #[test]
    fn test_priority_total_order() {
        let cmp = StatusCodePriority;
        let ordered = [
            StatusCode::Ok,
            StatusCode::MissingAttribute,
            StatusCode::ProcessingError,
            StatusCode::SyntaxError,
        ];
        for (i, a) in ordered.iter().enumerate() {
            for (j, b) in ordered.iter().enumerate() {
                assert_eq!(cmp.compare(*a, *b), i.cmp(&j));
            }
        }
    }

    #[test]
    fn test_worst_never_downgrades() {
        let cmp = StatusCodePriority;
        let mut status = StatusCode::Ok;
        status = cmp.worst(status, StatusCode::ProcessingError);
        assert_eq!(status, StatusCode::ProcessingError);
        status = cmp.worst(status, StatusCode::MissingAttribute);
        assert_eq!(status, StatusCode::ProcessingError);
        status = cmp.worst(status, StatusCode::Ok);
        assert_eq!(status, StatusCode::ProcessingError);
        status = cmp.worst(status, StatusCode::SyntaxError);
        assert_eq!(status, StatusCode::SyntaxError);
    }
}
