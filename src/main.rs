/// MySQL binlog CDC 스트림 사용 예제
///
/// binlog 스트림을 현재 위치에서 열고 CDC 이벤트를 순서대로 출력합니다.
use mysql_cdc_stream::connection::{ConnectionConfig, MySqlConnection};
use mysql_cdc_stream::source::{BinlogStreamReader, SourceConfig};
use mysql_cdc_stream::{EventBuffer, StreamEvent};
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 초기화
    tracing_subscriber::fmt::init();

    // 연결 설정 (프로세스 전역 상태 없이 명시적으로 구성)
    let connection = ConnectionConfig {
        hostname: env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: env::var("DB_PORT")
            .unwrap_or_else(|_| "3306".to_string())
            .parse()
            .unwrap_or(3306),
        username: env::var("DB_USER").unwrap_or_else(|_| "repl".to_string()),
        password: env::var("DB_PASSWORD").unwrap_or_default(),
        database: env::var("DB_NAME").ok(),
        server_id: env::var("SERVER_ID")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .unwrap_or(1),
        timeout: std::time::Duration::from_secs(30),
    };

    info!("Connecting to {}:{}", connection.hostname, connection.port);

    // Preflight: binlog 형식 확인 및 초기 Position 결정
    let mut admin = MySqlConnection::connect(&connection).await?;
    let binlog_format = admin.get_binlog_format().await?;
    if binlog_format != "ROW" {
        // STATEMENT/MIXED 스트림에는 row image가 없음
        return Err(format!(
            "binlog_format is {} (row image CDC requires ROW)",
            binlog_format
        )
        .into());
    }

    // 외부 체크포인트가 없으므로 서버의 현재 위치에서 시작
    let position = admin.current_position().await?;
    admin.close().await?;

    info!("Starting stream at {}", position);

    let config = match env::var("TABLE_ALLOWLIST") {
        Ok(tables) => SourceConfig::new(connection)
            .with_table_allowlist(tables.split(',').map(str::to_string).collect()),
        Err(_) => SourceConfig::new(connection),
    };

    let source = BinlogStreamReader::open(config, &position).await?;
    let mut buffer = EventBuffer::new(source);

    // 이벤트를 binlog 순서대로 소비
    while let Some(event) = buffer.pop().await? {
        match event {
            StreamEvent::Marker(marker) => {
                info!(
                    "Marker {:?} at {}:{}",
                    marker.kind, marker.log_file, marker.log_position
                );
            }
            StreamEvent::Data(data) => {
                info!(
                    "{} {}.{} at {}:{}",
                    data.message_kind.as_str(),
                    data.schema,
                    data.table,
                    data.log_file,
                    data.log_position
                );
                println!("{}", data.to_json()?);
            }
        }
    }

    info!("Binlog stream ended");
    Ok(())
}
