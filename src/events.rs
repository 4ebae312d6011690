//! CDC 스트림 이벤트 타입 및 데이터 구조 정의
//!
//! Raw Event Source가 내려주는 저수준 이벤트(RawEvent)와
//! Translator가 만들어내는 다운스트림용 이벤트(StreamEvent)를 정의합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row mutation binlog 이벤트 타입
///
/// 값은 MySQL binlog 이벤트 타입 코드 (v2 row events)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RowsEventType {
    /// 알 수 없는 이벤트
    Unknown = 0,
    /// WRITE_ROWS 이벤트 (INSERT)
    WriteRows = 30,
    /// UPDATE_ROWS 이벤트 (UPDATE)
    UpdateRows = 31,
    /// DELETE_ROWS 이벤트 (DELETE)
    DeleteRows = 32,
}

impl RowsEventType {
    pub fn from_u8(val: u8) -> Self {
        match val {
            30 => RowsEventType::WriteRows,
            31 => RowsEventType::UpdateRows,
            32 => RowsEventType::DeleteRows,
            _ => RowsEventType::Unknown,
        }
    }
}

/// 트랜잭션 경계 / 스키마 마커 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaEventKind {
    /// GTID 이벤트 (트랜잭션 시작 마커)
    Gtid,
    /// 쿼리 이벤트 (DDL, BEGIN 등)
    Query,
}

/// 스키마/트랜잭션 마커 raw 이벤트 (row payload 없음)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaEvent {
    pub kind: SchemaEventKind,
    /// GTID 문자열 (format: uuid:sequence, GTID 이벤트인 경우)
    pub gtid: Option<String>,
    /// 쿼리 문자열 (쿼리 이벤트인 경우)
    pub query: Option<String>,
    /// 이벤트 타임스탬프 (epoch 초)
    pub timestamp: u64,
}

/// 셀 값 (row image 내 단일 컬럼 값)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Time(String),
    Json(serde_json::Value),
}

/// Row 하나의 변경 전/후 이미지
///
/// INSERT는 after만, DELETE는 before만, UPDATE는 둘 다 갖습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowPayload {
    pub before: Option<Vec<CellValue>>,
    pub after: Option<Vec<CellValue>>,
}

impl RowPayload {
    pub fn insert(after: Vec<CellValue>) -> Self {
        RowPayload {
            before: None,
            after: Some(after),
        }
    }

    pub fn update(before: Vec<CellValue>, after: Vec<CellValue>) -> Self {
        RowPayload {
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn delete(before: Vec<CellValue>) -> Self {
        RowPayload {
            before: Some(before),
            after: None,
        }
    }
}

/// Row mutation raw 이벤트 (binlog row-event 배치 하나)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowMutationEvent {
    /// 데이터베이스명
    pub schema: String,
    /// 테이블명
    pub table: String,
    /// binlog 이벤트 타입
    pub event_type: RowsEventType,
    /// binlog 내부 순서를 유지한 row들
    pub rows: Vec<RowPayload>,
    /// 이벤트 타임스탬프 (epoch 초)
    pub timestamp: u64,
}

/// Source가 내려주는 저수준 이벤트
///
/// 허용 목록(GTID/QUERY 마커, row mutation)에 해당하는 이벤트만
/// Source가 surface하므로 닫힌 두 variant로 충분합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RawEvent {
    Schema(SchemaEvent),
    RowMutation(RowMutationEvent),
}

/// Source 단계에서 필터링할 raw 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawEventKind {
    Gtid,
    Query,
    RowMutation,
}

impl RawEvent {
    pub fn kind(&self) -> RawEventKind {
        match self {
            RawEvent::Schema(schema) => match schema.kind {
                SchemaEventKind::Gtid => RawEventKind::Gtid,
                SchemaEventKind::Query => RawEventKind::Query,
            },
            RawEvent::RowMutation(_) => RawEventKind::RowMutation,
        }
    }
}

/// 다운스트림 메시지 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Create,
    Update,
    Delete,
    /// refresh 테이블 네이밍 규칙으로만 지정되는 스냅샷 메시지
    Refresh,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Create => "CREATE",
            MessageKind::Update => "UPDATE",
            MessageKind::Delete => "DELETE",
            MessageKind::Refresh => "REFRESH",
        }
    }
}

/// 다운스트림으로 내보내는 CDC 단위 이벤트
///
/// RowMutationEvent 하나가 row 수만큼의 DataEvent로 전개되며,
/// 전부 같은 log_file/log_position(원본 binlog 이벤트의 위치)을 갖습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEvent {
    pub schema: String,
    pub table: String,
    pub log_file: String,
    pub log_position: u64,
    pub row: RowPayload,
    pub timestamp: u64,
    pub message_kind: MessageKind,
}

impl DataEvent {
    /// 다운스트림 싱크용 JSON 인코딩
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 체크포인트 마커 이벤트
///
/// 트랜잭션 경계/DDL을 알리는 pass-through 이벤트로, row payload 없이
/// 위치 메타데이터만 갖습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerEvent {
    pub kind: SchemaEventKind,
    pub gtid: Option<String>,
    pub query: Option<String>,
    pub log_file: String,
    pub log_position: u64,
    pub timestamp: u64,
}

/// Buffer가 큐잉하고 호출자가 pop으로 소비하는 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// 트랜잭션 경계 / 체크포인트 전진용 마커
    Marker(MarkerEvent),
    /// 데이터 변경 이벤트
    Data(DataEvent),
}

impl StreamEvent {
    pub fn log_file(&self) -> &str {
        match self {
            StreamEvent::Marker(marker) => &marker.log_file,
            StreamEvent::Data(data) => &data.log_file,
        }
    }

    pub fn log_position(&self) -> u64 {
        match self {
            StreamEvent::Marker(marker) => marker.log_position,
            StreamEvent::Data(data) => data.log_position,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, StreamEvent::Data(_))
    }
}
