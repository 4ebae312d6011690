//! 변환된 이벤트의 FIFO 스테이징 큐
//!
//! 현재 raw 이벤트에서 전개된 StreamEvent들을 보관하며 peek/pop을 제공합니다.
//! 큐가 비어 있으면 접근 시마다 Source에서 raw 이벤트를 정확히 하나 끌어와
//! 변환해 채웁니다. 단일 소비자 전용이라 내부 잠금이 없습니다.

use crate::error::Result;
use crate::events::StreamEvent;
use crate::source::RawEventSource;
use crate::translator::translate;
use std::collections::VecDeque;

pub struct EventBuffer<S> {
    source: S,
    queue: VecDeque<StreamEvent>,
}

impl<S: RawEventSource> EventBuffer<S> {
    pub fn new(source: S) -> Self {
        EventBuffer {
            source,
            queue: VecDeque::new(),
        }
    }

    /// 큐가 비어 있으면 raw 이벤트 하나를 fetch해 변환 결과로 채움
    ///
    /// 변환 결과가 비어 있어도(마커 없는 fetch, 빈 poll) 여기서 재시도하지
    /// 않습니다. 비어 있음은 캐시되지 않고 다음 접근에서 다시 평가됩니다.
    async fn refill_if_empty(&mut self) -> Result<()> {
        if !self.queue.is_empty() {
            return Ok(());
        }

        let event = self.source.fetch().await?;
        // 체크포인트 스탬프는 해당 이벤트를 읽은 직후의 위치
        let position = self.source.current_position().clone();
        self.queue.extend(translate(event, &position)?);
        Ok(())
    }

    /// 다음 이벤트를 제거하지 않고 반환
    ///
    /// pop 없이 반복 호출하면 같은 이벤트를 반환합니다.
    pub async fn peek(&mut self) -> Result<Option<&StreamEvent>> {
        self.refill_if_empty().await?;
        Ok(self.queue.front())
    }

    /// 다음 이벤트를 제거하고 반환
    pub async fn pop(&mut self) -> Result<Option<StreamEvent>> {
        self.refill_if_empty().await?;
        Ok(self.queue.pop_front())
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CdcError;
    use crate::events::{
        CellValue, MessageKind, RawEvent, RowMutationEvent, RowPayload, RowsEventType, SchemaEvent,
        SchemaEventKind,
    };
    use crate::position::BinlogPosition;
    use async_trait::async_trait;

    /// 스크립트된 fetch 결과를 순서대로 내려주는 테스트용 Source
    struct ScriptedSource {
        script: VecDeque<Result<Option<RawEvent>>>,
        positions: VecDeque<BinlogPosition>,
        current: BinlogPosition,
    }

    impl ScriptedSource {
        fn new(script: Vec<(Result<Option<RawEvent>>, u64)>) -> Self {
            let mut events = VecDeque::new();
            let mut positions = VecDeque::new();
            for (event, offset) in script {
                events.push_back(event);
                positions.push_back(BinlogPosition::new("mysql-bin.000001".to_string(), offset));
            }
            ScriptedSource {
                script: events,
                positions,
                current: BinlogPosition::new("mysql-bin.000001".to_string(), 4),
            }
        }
    }

    #[async_trait]
    impl RawEventSource for ScriptedSource {
        async fn fetch(&mut self) -> Result<Option<RawEvent>> {
            match self.script.pop_front() {
                Some(result) => {
                    if let Some(position) = self.positions.pop_front() {
                        self.current = position;
                    }
                    result
                }
                None => Ok(None),
            }
        }

        fn current_position(&self) -> &BinlogPosition {
            &self.current
        }
    }

    fn gtid_event() -> RawEvent {
        RawEvent::Schema(SchemaEvent {
            kind: SchemaEventKind::Gtid,
            gtid: Some("550e8400-e29b-41d4-a716-446655440000:9".to_string()),
            query: None,
            timestamp: 1700000000,
        })
    }

    fn row_event(table: &str, event_type: RowsEventType, ids: &[i64]) -> RawEvent {
        RawEvent::RowMutation(RowMutationEvent {
            schema: "shop".to_string(),
            table: table.to_string(),
            event_type,
            rows: ids
                .iter()
                .map(|id| RowPayload::insert(vec![CellValue::Int64(*id)]))
                .collect(),
            timestamp: 1700000000,
        })
    }

    #[tokio::test]
    async fn test_pop_preserves_binlog_order() {
        let source = ScriptedSource::new(vec![
            (Ok(Some(gtid_event())), 120),
            (Ok(Some(row_event("orders", RowsEventType::WriteRows, &[1, 2]))), 450),
            (Ok(Some(row_event("users", RowsEventType::DeleteRows, &[7]))), 600),
        ]);
        let mut buffer = EventBuffer::new(source);

        let first = buffer.pop().await.unwrap().unwrap();
        assert!(matches!(first, StreamEvent::Marker(_)));
        assert_eq!(first.log_position(), 120);

        let second = buffer.pop().await.unwrap().unwrap();
        let third = buffer.pop().await.unwrap().unwrap();
        for event in [&second, &third] {
            let StreamEvent::Data(data) = event else {
                panic!("expected data event");
            };
            assert_eq!(data.table, "orders");
            assert_eq!(data.log_position, 450);
        }
        let StreamEvent::Data(second_data) = &second else {
            panic!("expected data event");
        };
        assert_eq!(second_data.row.after.as_ref().unwrap()[0], CellValue::Int64(1));

        let fourth = buffer.pop().await.unwrap().unwrap();
        let StreamEvent::Data(data) = &fourth else {
            panic!("expected data event");
        };
        assert_eq!(data.table, "users");
        assert_eq!(data.message_kind, MessageKind::Delete);
        assert_eq!(data.log_position, 600);

        assert!(buffer.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_peek_is_idempotent_and_pop_returns_same_event() {
        let source = ScriptedSource::new(vec![(
            Ok(Some(row_event("orders", RowsEventType::WriteRows, &[1, 2]))),
            450,
        )]);
        let mut buffer = EventBuffer::new(source);

        let first_peek = buffer.peek().await.unwrap().unwrap().clone();
        let second_peek = buffer.peek().await.unwrap().unwrap().clone();
        let popped = buffer.pop().await.unwrap().unwrap();

        for event in [&first_peek, &second_peek, &popped] {
            let StreamEvent::Data(data) = event else {
                panic!("expected data event");
            };
            assert_eq!(data.row.after.as_ref().unwrap()[0], CellValue::Int64(1));
        }
    }

    #[tokio::test]
    async fn test_peek_and_pop_agree_on_refresh_rewrite() {
        let source = ScriptedSource::new(vec![(
            Ok(Some(RawEvent::RowMutation(RowMutationEvent {
                schema: "shop".to_string(),
                table: "orders_data_pipeline_refresh".to_string(),
                event_type: RowsEventType::DeleteRows,
                rows: vec![RowPayload::delete(vec![CellValue::Int64(1)])],
                timestamp: 1700000000,
            }))),
            450,
        )]);
        let mut buffer = EventBuffer::new(source);

        let peeked = buffer.peek().await.unwrap().unwrap().clone();
        let peeked_again = buffer.peek().await.unwrap().unwrap().clone();
        let popped = buffer.pop().await.unwrap().unwrap();

        for event in [&peeked, &peeked_again, &popped] {
            let StreamEvent::Data(data) = event else {
                panic!("expected data event");
            };
            assert_eq!(data.table, "orders");
            assert_eq!(data.message_kind, MessageKind::Refresh);
            assert_eq!(data.log_position, 450);
        }
        assert!(buffer.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_translation_is_repolled_lazily() {
        // 첫 fetch는 빈 poll, 두 번째 fetch에 실제 이벤트
        let source = ScriptedSource::new(vec![
            (Ok(None), 4),
            (Ok(Some(row_event("orders", RowsEventType::WriteRows, &[1]))), 450),
        ]);
        let mut buffer = EventBuffer::new(source);

        // 빈 결과를 "스트림 종료"로 캐시하면 안 됨
        assert!(buffer.peek().await.unwrap().is_none());
        assert!(buffer.peek().await.unwrap().is_some());
        assert!(buffer.pop().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refill_pulls_exactly_one_raw_event_per_access() {
        let source = ScriptedSource::new(vec![
            (Ok(Some(gtid_event())), 120),
            (Ok(Some(gtid_event())), 190),
        ]);
        let mut buffer = EventBuffer::new(source);

        buffer.pop().await.unwrap().unwrap();
        // 두 번째 이벤트는 아직 fetch되지 않았어야 함
        assert_eq!(buffer.source().script.len(), 1);
        buffer.pop().await.unwrap().unwrap();
        assert_eq!(buffer.source().script.len(), 0);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let source = ScriptedSource::new(vec![(
            Err(CdcError::ReadError("connection reset".to_string())),
            4,
        )]);
        let mut buffer = EventBuffer::new(source);
        assert!(matches!(
            buffer.pop().await,
            Err(CdcError::ReadError(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_mutation_kind_propagates_from_pop() {
        let source = ScriptedSource::new(vec![(
            Ok(Some(row_event("orders", RowsEventType::Unknown, &[1]))),
            450,
        )]);
        let mut buffer = EventBuffer::new(source);
        assert!(matches!(
            buffer.pop().await,
            Err(CdcError::DecodeError(_))
        ));
    }
}
