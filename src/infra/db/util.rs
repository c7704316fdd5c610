use crate::application::repos::RepoError;
use crate::domain::position::LogPosition;

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db)
            if db.message().contains("violates foreign key constraint")
                || db.message().contains("invalid input syntax") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to statement timeout")
                || db
                    .message()
                    .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}

pub fn position_from_row(millis: i64, seq: i64) -> Result<LogPosition, RepoError> {
    match (u64::try_from(millis), u64::try_from(seq)) {
        (Ok(millis), Ok(seq)) => Ok(LogPosition::new(millis, seq)),
        _ => Err(RepoError::Integrity {
            message: format!("negative log position {millis}-{seq}"),
        }),
    }
}

pub fn position_to_row(position: LogPosition) -> Result<(i64, i64), RepoError> {
    match (
        i64::try_from(position.millis()),
        i64::try_from(position.seq()),
    ) {
        (Ok(millis), Ok(seq)) => Ok((millis, seq)),
        _ => Err(RepoError::InvalidInput {
            message: format!("log position {position} exceeds the storable range"),
        }),
    }
}
