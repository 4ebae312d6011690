//! Binlog 재개 위치 (Position 및 BinlogPosition)
//!
//! Position은 외부 체크포인트 저장소가 만들어주는 불변 재개 토큰이며,
//! 스트림 open 시점에 한 번만 소비됩니다.
//! 예: "mysql-bin.000003" 파일의 4097 바이트 위치, 또는 GTID 집합

use crate::error::{CdcError, Result};
use crate::gtid::GtidSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binlog 파일 위치 (Source가 유지하는 현재 커서)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinlogPosition {
    /// 바이너리 로그 파일명 (e.g., "mysql-bin.000001")
    pub filename: String,
    /// 바이트 위치
    pub position: u64,
}

impl BinlogPosition {
    pub fn new(filename: String, position: u64) -> Self {
        BinlogPosition { filename, position }
    }

    /// 파일명에서 시퀀스 번호 추출
    pub fn file_sequence(&self) -> Option<u64> {
        self.filename.rsplit('.').next().and_then(|s| s.parse().ok())
    }
}

impl fmt::Display for BinlogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.position)
    }
}

/// 불변 재개 토큰
///
/// 체크포인트 소유자(이 crate 외부)가 생성하며, open 이후 변경되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Position {
    log_file: String,
    log_offset: u64,
    gtid_set: Option<String>,
}

/// Source의 resume API에 전달할 파라미터 형태
///
/// 파일+오프셋 기반 또는 GTID auto-position 중 하나입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeParams {
    FileOffset { log_file: String, log_offset: u64 },
    AutoPosition { gtid_set: GtidSet },
}

impl Position {
    pub fn new(log_file: impl Into<String>, log_offset: u64) -> Self {
        Position {
            log_file: log_file.into(),
            log_offset,
            gtid_set: None,
        }
    }

    pub fn with_gtid_set(
        log_file: impl Into<String>,
        log_offset: u64,
        gtid_set: impl Into<String>,
    ) -> Self {
        Position {
            log_file: log_file.into(),
            log_offset,
            gtid_set: Some(gtid_set.into()),
        }
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    pub fn log_offset(&self) -> u64 {
        self.log_offset
    }

    pub fn gtid_set(&self) -> Option<&str> {
        self.gtid_set.as_deref()
    }

    /// open 시점 검증: 잘못된 Position은 첫 fetch가 아닌 여기서 실패합니다.
    pub fn validate(&self) -> Result<()> {
        if self.log_file.is_empty() {
            return Err(CdcError::InvalidPosition("empty log file name".to_string()));
        }
        // MySQL binlog은 4 바이트 매직 넘버 뒤에서 첫 이벤트가 시작됨
        if self.log_offset < 4 {
            return Err(CdcError::InvalidPosition(format!(
                "offset {} is inside the binlog magic header",
                self.log_offset
            )));
        }
        if let Some(ref gtid_set) = self.gtid_set {
            let parsed = GtidSet::parse(gtid_set)?;
            if parsed.is_empty() {
                return Err(CdcError::InvalidPosition(format!(
                    "empty GTID set: {:?}",
                    gtid_set
                )));
            }
        }
        Ok(())
    }

    /// resume 파라미터로 변환
    ///
    /// GTID 집합이 있으면 auto-position, 없으면 파일+오프셋을 사용합니다.
    pub fn to_resume_params(&self) -> Result<ResumeParams> {
        match self.gtid_set {
            Some(ref gtid_set) => Ok(ResumeParams::AutoPosition {
                gtid_set: GtidSet::parse(gtid_set)?,
            }),
            None => Ok(ResumeParams::FileOffset {
                log_file: self.log_file.clone(),
                log_offset: self.log_offset,
            }),
        }
    }

    pub fn binlog_position(&self) -> BinlogPosition {
        BinlogPosition::new(self.log_file.clone(), self.log_offset)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.gtid_set {
            Some(ref gtid_set) => {
                write!(f, "{}:{} (gtid: {})", self.log_file, self.log_offset, gtid_set)
            }
            None => write!(f, "{}:{}", self.log_file, self.log_offset),
        }
    }
}
