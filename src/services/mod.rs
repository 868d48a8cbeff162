pub mod audit_service;
pub mod submission_service;
pub mod submitter_service;
pub mod winner_service;

pub use audit_service::*;
pub use submission_service::*;
pub use submitter_service::*;
pub use winner_service::*;

use sea_orm::{DbErr, SqlErr};

/// 唯一索引冲突（重复号码、重复提交等）
pub(crate) fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_sql_error_is_not_unique_violation() {
        assert!(!is_unique_violation(&DbErr::Custom("boom".into())));
        assert!(!is_unique_violation(&DbErr::RecordNotFound("x".into())));
    }
}
