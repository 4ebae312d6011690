//! CDC 스트림 관련 에러 타입

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdcError {
    #[error("MySQL 연결 에러: {0}")]
    ConnectionError(String),

    #[error("Binlog 읽기 에러: {0}")]
    ReadError(String),

    #[error("이벤트 디코드 에러: {0}")]
    DecodeError(String),

    #[error("유효하지 않은 resume position: {0}")]
    InvalidPosition(String),

    #[error("GTID 처리 에러: {0}")]
    GtidError(String),

    #[error("쿼리 실행 에러: {0}")]
    QueryError(String),

    #[error("I/O 에러: {0}")]
    IoError(String),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Timeout 에러")]
    Timeout,
}

impl From<io::Error> for CdcError {
    fn from(err: io::Error) -> Self {
        CdcError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CdcError>;
