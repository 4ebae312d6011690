//! Raw 이벤트 → CDC 이벤트 변환
//!
//! Raw 이벤트 하나를 0..N개의 StreamEvent로 전개합니다.
//! - 스키마/GTID 마커 → pass-through MarkerEvent 하나
//! - row mutation 배치 → row 순서를 유지한 DataEvent N개
//!
//! 모든 출력 이벤트는 원본 이벤트를 읽은 직후의 Source 위치로 스탬프됩니다.

use crate::error::{CdcError, Result};
use crate::events::{
    DataEvent, MarkerEvent, MessageKind, RawEvent, RowMutationEvent, RowsEventType, StreamEvent,
};
use crate::position::BinlogPosition;
use tracing::debug;

/// refresh 테이블 네이밍 규칙의 예약 접미사
///
/// 이 접미사로 끝나는 테이블은 제어 신호이며 일반 데이터가 아닙니다.
/// 접미사를 제거한 이름으로, 모든 row를 REFRESH로 내보냅니다.
pub const REFRESH_TABLE_SUFFIX: &str = "_data_pipeline_refresh";

/// mutation 종류의 고정 매핑 (INSERT→CREATE, UPDATE→UPDATE, DELETE→DELETE)
///
/// 매핑은 이 세 종류로 닫혀 있으며, 그 외의 타입은 스트림 손상을
/// 의미하므로 디코드 에러로 처리합니다.
fn message_kind(event_type: RowsEventType) -> Result<MessageKind> {
    match event_type {
        RowsEventType::WriteRows => Ok(MessageKind::Create),
        RowsEventType::UpdateRows => Ok(MessageKind::Update),
        RowsEventType::DeleteRows => Ok(MessageKind::Delete),
        RowsEventType::Unknown => Err(CdcError::DecodeError(
            "unmapped row mutation event type".to_string(),
        )),
    }
}

/// Raw 이벤트 하나를 StreamEvent 시퀀스로 변환
///
/// 입력이 None이면(이번 poll에 새 이벤트 없음) 빈 시퀀스를 반환합니다.
/// 에러가 아닙니다.
pub fn translate(event: Option<RawEvent>, position: &BinlogPosition) -> Result<Vec<StreamEvent>> {
    match event {
        None => Ok(Vec::new()),
        Some(RawEvent::Schema(schema)) => Ok(vec![StreamEvent::Marker(MarkerEvent {
            kind: schema.kind,
            gtid: schema.gtid,
            query: schema.query,
            log_file: position.filename.clone(),
            log_position: position.position,
            timestamp: schema.timestamp,
        })]),
        Some(RawEvent::RowMutation(row_event)) => translate_row_event(row_event, position),
    }
}

/// Row mutation 배치를 row당 DataEvent 하나로 전개
fn translate_row_event(
    event: RowMutationEvent,
    position: &BinlogPosition,
) -> Result<Vec<StreamEvent>> {
    // 매핑 조회는 refresh 덮어쓰기보다 먼저: 알 수 없는 타입은
    // refresh 테이블이라도 치명적이다.
    let mapped = message_kind(event.event_type)?;

    let (table, kind) = match event.table.strip_suffix(REFRESH_TABLE_SUFFIX) {
        Some(base_table) => (base_table.to_string(), MessageKind::Refresh),
        None => (event.table, mapped),
    };

    debug!(
        "Translating {} row(s) from {}.{} at {} as {}",
        event.rows.len(),
        event.schema,
        table,
        position,
        kind.as_str()
    );

    Ok(event
        .rows
        .into_iter()
        .map(|row| {
            StreamEvent::Data(DataEvent {
                schema: event.schema.clone(),
                table: table.clone(),
                log_file: position.filename.clone(),
                log_position: position.position,
                row,
                timestamp: event.timestamp,
                message_kind: kind,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CellValue, RowPayload, SchemaEvent, SchemaEventKind};

    fn test_position() -> BinlogPosition {
        BinlogPosition::new("mysql-bin.000007".to_string(), 9000)
    }

    fn row(id: i64) -> RowPayload {
        RowPayload::update(
            vec![CellValue::Int64(id), CellValue::String("old".to_string())],
            vec![CellValue::Int64(id), CellValue::String("new".to_string())],
        )
    }

    fn row_event(table: &str, event_type: RowsEventType, rows: Vec<RowPayload>) -> RawEvent {
        RawEvent::RowMutation(RowMutationEvent {
            schema: "shop".to_string(),
            table: table.to_string(),
            event_type,
            rows,
            timestamp: 1700000000,
        })
    }

    #[test]
    fn test_absent_event_is_empty_not_error() {
        let events = translate(None, &test_position()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_schema_event_passes_through_as_marker() {
        let raw = RawEvent::Schema(SchemaEvent {
            kind: SchemaEventKind::Gtid,
            gtid: Some("550e8400-e29b-41d4-a716-446655440000:7".to_string()),
            query: None,
            timestamp: 1700000000,
        });
        let events = translate(Some(raw), &test_position()).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Marker(marker) => {
                assert_eq!(marker.kind, SchemaEventKind::Gtid);
                assert_eq!(marker.log_file, "mysql-bin.000007");
                assert_eq!(marker.log_position, 9000);
            }
            other => panic!("expected marker, got {:?}", other),
        }
    }

    #[test]
    fn test_row_fan_out_preserves_order_and_position() {
        let raw = row_event(
            "orders",
            RowsEventType::UpdateRows,
            vec![row(1), row(2), row(3)],
        );
        let events = translate(Some(raw), &test_position()).unwrap();
        assert_eq!(events.len(), 3);

        for (i, event) in events.iter().enumerate() {
            let StreamEvent::Data(data) = event else {
                panic!("expected data event");
            };
            assert_eq!(data.message_kind, MessageKind::Update);
            assert_eq!(data.log_file, "mysql-bin.000007");
            assert_eq!(data.log_position, 9000);
            assert_eq!(
                data.row.after.as_ref().unwrap()[0],
                CellValue::Int64(i as i64 + 1)
            );
        }
    }

    #[test]
    fn test_insert_maps_to_create() {
        let raw = row_event(
            "orders",
            RowsEventType::WriteRows,
            vec![RowPayload::insert(vec![CellValue::Int64(1)])],
        );
        let events = translate(Some(raw), &test_position()).unwrap();
        let StreamEvent::Data(data) = &events[0] else {
            panic!("expected data event");
        };
        assert_eq!(data.message_kind, MessageKind::Create);
        assert_eq!(data.table, "orders");
    }

    #[test]
    fn test_refresh_table_rewrite() {
        let raw = row_event(
            "orders_data_pipeline_refresh",
            RowsEventType::DeleteRows,
            vec![RowPayload::delete(vec![CellValue::Int64(1)])],
        );
        let events = translate(Some(raw), &test_position()).unwrap();
        assert_eq!(events.len(), 1);
        let StreamEvent::Data(data) = &events[0] else {
            panic!("expected data event");
        };
        assert_eq!(data.table, "orders");
        assert_eq!(data.message_kind, MessageKind::Refresh);
    }

    #[test]
    fn test_refresh_suffix_is_stripped_only_at_end() {
        let raw = row_event(
            "orders_data_pipeline_refresh_audit",
            RowsEventType::WriteRows,
            vec![RowPayload::insert(vec![CellValue::Int64(1)])],
        );
        let events = translate(Some(raw), &test_position()).unwrap();
        let StreamEvent::Data(data) = &events[0] else {
            panic!("expected data event");
        };
        assert_eq!(data.table, "orders_data_pipeline_refresh_audit");
        assert_eq!(data.message_kind, MessageKind::Create);
    }

    #[test]
    fn test_unknown_mutation_kind_is_fatal() {
        let raw = row_event(
            "orders",
            RowsEventType::Unknown,
            vec![RowPayload::insert(vec![CellValue::Int64(1)])],
        );
        assert!(matches!(
            translate(Some(raw), &test_position()),
            Err(CdcError::DecodeError(_))
        ));
    }

    #[test]
    fn test_unknown_mutation_kind_is_fatal_even_on_refresh_table() {
        let raw = row_event(
            "orders_data_pipeline_refresh",
            RowsEventType::Unknown,
            vec![RowPayload::insert(vec![CellValue::Int64(1)])],
        );
        assert!(translate(Some(raw), &test_position()).is_err());
    }

    #[test]
    fn test_empty_row_batch_produces_no_events() {
        let raw = row_event("orders", RowsEventType::WriteRows, vec![]);
        let events = translate(Some(raw), &test_position()).unwrap();
        assert!(events.is_empty());
    }
}
