//! Raw Event Source — 디코드된 binlog 이벤트 공급자
//!
//! binlog 와이어 포맷 디코딩은 replication 클라이언트 라이브러리(mysql_async)가
//! 담당하고, 이 모듈은 그 결과를 RawEvent 모델로 올려보내는 역할만 합니다.
//! - open: 주어진 Position에서 스트림을 정확히 한 번 seek
//! - fetch: 다음 디코드된 이벤트를 블로킹으로 반환 (스트림 종료 시 None)
//! - 이벤트 종류 허용 목록과 테이블 허용 목록을 여기서 적용
//!
//! rotate/table-map 등 그 외의 binlog 이벤트는 내부에서 소비되며
//! Translator까지 올라가지 않습니다.

use crate::connection::ConnectionConfig;
use crate::error::{CdcError, Result};
use crate::events::{
    CellValue, RawEvent, RawEventKind, RowMutationEvent, RowPayload, RowsEventType, SchemaEvent,
    SchemaEventKind,
};
use crate::position::{BinlogPosition, Position, ResumeParams};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use futures::StreamExt;
use mysql_async::binlog::events::{Event, EventData, RowsEventData};
use mysql_async::binlog::row::BinlogRow;
use mysql_async::{BinlogStream, BinlogStreamRequest, Conn, Row, Sid, Value};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// 디코드된 raw 이벤트 공급자
///
/// replication 클라이언트 라이브러리 교체 지점입니다. Translator와 Buffer는
/// 이 trait만 알고 있습니다.
#[async_trait]
pub trait RawEventSource: Send {
    /// 다음 디코드된 이벤트를 반환. 새 데이터가 도착할 때까지 블로킹하며,
    /// 스트림이 끝났으면 None을 반환합니다.
    ///
    /// 연결 실패는 ReadError로 전파됩니다. 이 계층에서 재시도하지 않습니다.
    async fn fetch(&mut self) -> Result<Option<RawEvent>>;

    /// 현재 스트림 위치. 직전 fetch가 반환된 직후에 유효합니다.
    fn current_position(&self) -> &BinlogPosition;
}

/// Source 설정 (연결 파라미터 + 허용 목록)
///
/// 프로세스 전역 상태 대신 open 호출에 명시적으로 전달됩니다.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub connection: ConnectionConfig,
    /// surface할 raw 이벤트 종류
    pub allowed_events: HashSet<RawEventKind>,
    /// None이면 모든 테이블 허용
    pub table_allowlist: Option<Vec<String>>,
}

impl SourceConfig {
    pub fn new(connection: ConnectionConfig) -> Self {
        SourceConfig {
            connection,
            allowed_events: [
                RawEventKind::Gtid,
                RawEventKind::Query,
                RawEventKind::RowMutation,
            ]
            .into_iter()
            .collect(),
            table_allowlist: None,
        }
    }

    pub fn with_allowed_events(mut self, kinds: impl IntoIterator<Item = RawEventKind>) -> Self {
        self.allowed_events = kinds.into_iter().collect();
        self
    }

    pub fn with_table_allowlist(mut self, tables: Vec<String>) -> Self {
        self.table_allowlist = Some(tables);
        self
    }
}

fn table_allowed(allowlist: Option<&[String]>, table: &str) -> bool {
    match allowlist {
        Some(tables) => tables.iter().any(|t| t == table),
        None => true,
    }
}

/// mysql_async binlog 스트림을 감싼 구체 Source
///
/// 스트림 lifetime당 open 한 번이며 중간 re-seek은 지원하지 않습니다.
/// 재시작 후 재개는 외부 체크포인트에서 읽은 새 Position으로
/// open을 다시 호출하는 방식입니다.
pub struct BinlogStreamReader {
    stream: BinlogStream,
    allowed_events: HashSet<RawEventKind>,
    table_allowlist: Option<Vec<String>>,
    current: BinlogPosition,
}

impl BinlogStreamReader {
    /// 주어진 Position에서 binlog 스트림 시작
    ///
    /// 잘못된 Position은 첫 fetch가 아니라 여기서 즉시 실패합니다.
    pub async fn open(config: SourceConfig, position: &Position) -> Result<Self> {
        position.validate()?;
        info!("Opening binlog stream at {}", position);

        let opts = config.connection.build_opts()?;
        let conn = Conn::new(opts)
            .await
            .map_err(|e| CdcError::ConnectionError(format!("Failed to connect: {}", e)))?;

        let server_id = config.connection.server_id;
        let stream = match position.to_resume_params()? {
            ResumeParams::FileOffset {
                log_file,
                log_offset,
            } => {
                conn.get_binlog_stream(
                    BinlogStreamRequest::new(server_id)
                        .with_filename(log_file.as_bytes())
                        .with_pos(log_offset),
                )
                .await
            }
            ResumeParams::AutoPosition { gtid_set } => {
                let mut sids: Vec<Sid> = Vec::new();
                for sid_str in gtid_set.sid_strings() {
                    let sid = sid_str
                        .parse()
                        .map_err(|e| CdcError::GtidError(format!("Invalid SID {}: {}", sid_str, e)))?;
                    sids.push(sid);
                }
                conn.get_binlog_stream(
                    BinlogStreamRequest::new(server_id)
                        .with_gtid()
                        .with_gtid_set(sids),
                )
                .await
            }
        }
        .map_err(|e| CdcError::ConnectionError(format!("Failed to request binlog stream: {}", e)))?;

        Ok(BinlogStreamReader {
            stream,
            allowed_events: config.allowed_events,
            table_allowlist: config.table_allowlist,
            current: position.binlog_position(),
        })
    }

    /// binlog 이벤트 하나를 RawEvent로 올림
    ///
    /// surface 대상이 아닌 이벤트(rotate, table-map, xid 등)는 None.
    /// rotate는 현재 커서 갱신에만 사용됩니다.
    fn prepare_event(&mut self, event: &Event) -> Result<Option<RawEvent>> {
        let header = event.header();
        let timestamp = u64::from(header.timestamp());

        let data = event
            .read_data()
            .map_err(|e| CdcError::DecodeError(format!("Failed to decode event: {}", e)))?;

        match data {
            Some(EventData::RotateEvent(rotate)) => {
                let next_file = rotate.name().into_owned();
                debug!("Rotating to {}:{}", next_file, rotate.position());
                self.current = BinlogPosition::new(next_file, rotate.position());
                Ok(None)
            }
            Some(EventData::GtidEvent(gtid)) => {
                let uuid = Uuid::from_bytes(gtid.sid());
                Ok(Some(RawEvent::Schema(SchemaEvent {
                    kind: SchemaEventKind::Gtid,
                    gtid: Some(format!("{}:{}", uuid, gtid.gno())),
                    query: None,
                    timestamp,
                })))
            }
            Some(EventData::QueryEvent(query)) => Ok(Some(RawEvent::Schema(SchemaEvent {
                kind: SchemaEventKind::Query,
                gtid: None,
                query: Some(query.query().into_owned()),
                timestamp,
            }))),
            Some(EventData::RowsEvent(rows_event)) => self.prepare_rows_event(rows_event, timestamp),
            _ => Ok(None),
        }
    }

    fn prepare_rows_event(
        &self,
        rows_event: RowsEventData<'_>,
        timestamp: u64,
    ) -> Result<Option<RawEvent>> {
        let event_type = match &rows_event {
            RowsEventData::WriteRowsEvent(_) | RowsEventData::WriteRowsEventV1(_) => {
                RowsEventType::WriteRows
            }
            RowsEventData::UpdateRowsEvent(_) | RowsEventData::UpdateRowsEventV1(_) => {
                RowsEventType::UpdateRows
            }
            RowsEventData::DeleteRowsEvent(_) | RowsEventData::DeleteRowsEventV1(_) => {
                RowsEventType::DeleteRows
            }
            _ => RowsEventType::Unknown,
        };

        let table_id = rows_event.table_id();
        let tme = self.stream.get_tme(table_id).ok_or_else(|| {
            CdcError::DecodeError(format!("No table map for table id {}", table_id))
        })?;
        let schema = tme.database_name().into_owned();
        let table = tme.table_name().into_owned();

        if !table_allowed(self.table_allowlist.as_deref(), &table) {
            debug!("Skipping row event for non-allowlisted table {}.{}", schema, table);
            return Ok(None);
        }

        let mut rows = Vec::new();
        for row in rows_event.rows(tme) {
            let (before, after) =
                row.map_err(|e| CdcError::DecodeError(format!("Failed to decode row: {}", e)))?;
            rows.push(RowPayload {
                before: before.map(convert_row).transpose()?,
                after: after.map(convert_row).transpose()?,
            });
        }

        Ok(Some(RawEvent::RowMutation(RowMutationEvent {
            schema,
            table,
            event_type,
            rows,
            timestamp,
        })))
    }
}

#[async_trait]
impl RawEventSource for BinlogStreamReader {
    async fn fetch(&mut self) -> Result<Option<RawEvent>> {
        loop {
            let event = match self.stream.next().await {
                Some(event) => {
                    event.map_err(|e| CdcError::ReadError(format!("Binlog read failed: {}", e)))?
                }
                None => {
                    info!("Binlog stream ended at {}", self.current);
                    return Ok(None);
                }
            };

            // 이벤트 헤더의 log_pos가 이 이벤트 직후의 오프셋
            let log_pos = event.header().log_pos();
            if log_pos > 0 {
                self.current.position = u64::from(log_pos);
            }

            if let Some(raw) = self.prepare_event(&event)? {
                if self.allowed_events.contains(&raw.kind()) {
                    return Ok(Some(raw));
                }
            }
        }
    }

    fn current_position(&self) -> &BinlogPosition {
        &self.current
    }
}

/// 디코드된 row image를 CellValue 목록으로 변환
fn convert_row(row: BinlogRow) -> Result<Vec<CellValue>> {
    let row = Row::try_from(row)
        .map_err(|e| CdcError::DecodeError(format!("Failed to convert row: {:?}", e)))?;
    Ok(row.unwrap().into_iter().map(cell_from_value).collect())
}

fn cell_from_value(value: Value) -> CellValue {
    match value {
        Value::NULL => CellValue::Null,
        Value::Int(v) => CellValue::Int64(v),
        Value::UInt(v) => CellValue::UInt64(v),
        Value::Float(v) => CellValue::Float(v),
        Value::Double(v) => CellValue::Double(v),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => CellValue::String(text),
            Err(e) => CellValue::Bytes(e.into_bytes()),
        },
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let datetime = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|d| d.and_hms_micro_opt(
                    u32::from(hour),
                    u32::from(minute),
                    u32::from(second),
                    micros,
                ));
            match datetime {
                Some(dt) => CellValue::DateTime(Utc.from_utc_datetime(&dt)),
                None => CellValue::Null,
            }
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if negative { "-" } else { "" };
            CellValue::Time(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign,
                u32::from(hours) + days * 24,
                minutes,
                seconds,
                micros
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_allows_all_kinds_by_default() {
        let config = SourceConfig::new(ConnectionConfig::default());
        assert!(config.allowed_events.contains(&RawEventKind::Gtid));
        assert!(config.allowed_events.contains(&RawEventKind::Query));
        assert!(config.allowed_events.contains(&RawEventKind::RowMutation));
        assert!(config.table_allowlist.is_none());
    }

    #[test]
    fn test_table_allowed() {
        let allowlist = vec!["orders".to_string(), "users".to_string()];
        assert!(table_allowed(Some(&allowlist), "orders"));
        assert!(!table_allowed(Some(&allowlist), "payments"));
        assert!(table_allowed(None, "payments"));
    }

    #[test]
    fn test_cell_from_value() {
        assert_eq!(cell_from_value(Value::NULL), CellValue::Null);
        assert_eq!(cell_from_value(Value::Int(-3)), CellValue::Int64(-3));
        assert_eq!(
            cell_from_value(Value::Bytes(b"hello".to_vec())),
            CellValue::String("hello".to_string())
        );
        assert_eq!(
            cell_from_value(Value::Time(false, 1, 2, 3, 4, 0)),
            CellValue::Time("26:03:04.000000".to_string())
        );
    }
}
