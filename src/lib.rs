//! MySQL Binlog → CDC 스트림 변환 코어
//!
//! 이 라이브러리는 position 주소 기반의 MySQL binlog 복제 스트림을
//! 다운스트림 파이프라인이 소비할 수 있는 순서 보장 CDC 이벤트 열로 변환합니다.
//! 주요 기능:
//! - Position 기반 스트림 재개 (파일+오프셋 또는 GTID auto-position)
//! - Raw 이벤트 → CDC 이벤트 변환 (row 전개, refresh 테이블 규칙)
//! - peek/pop을 제공하는 FIFO 이벤트 버퍼

pub mod buffer;
pub mod connection;
pub mod error;
pub mod events;
pub mod gtid;
pub mod position;
pub mod source;
pub mod translator;

pub use buffer::EventBuffer;
pub use connection::{ConnectionConfig, MySqlConnection};
pub use error::{CdcError, Result};
pub use events::{DataEvent, MessageKind, RawEvent, StreamEvent};
pub use gtid::GtidSet;
pub use position::{BinlogPosition, Position, ResumeParams};
pub use source::{BinlogStreamReader, RawEventSource, SourceConfig};
pub use translator::{translate, REFRESH_TABLE_SUFFIX};
