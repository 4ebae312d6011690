//! MySQL 데이터베이스 연결 관리
//!
//! 스트림 자체가 아니라 preflight 점검과 초기 Position 부트스트랩에
//! 쓰이는 관리용 쿼리 연결입니다.

use crate::error::{CdcError, Result};
use crate::gtid::GtidSet;
use crate::position::Position;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts};
use std::time::Duration;

/// MySQL 연결 설정
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    /// 복제 토폴로지 안에서 유일해야 하는 replica server id
    pub server_id: u32,
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            hostname: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
            database: None,
            server_id: 1,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        ConnectionConfig {
            hostname: hostname.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn build_opts(&self) -> Result<Opts> {
        let connection_string = if let Some(ref db) = self.database {
            format!(
                "mysql://{}:{}@{}:{}/{}",
                self.username, self.password, self.hostname, self.port, db
            )
        } else {
            format!(
                "mysql://{}:{}@{}:{}",
                self.username, self.password, self.hostname, self.port
            )
        };

        connection_string
            .parse()
            .map_err(|_| CdcError::ConnectionError("Failed to parse connection string".to_string()))
    }
}

/// 관리용 MySQL 연결 래퍼
pub struct MySqlConnection {
    conn: Conn,
}

impl MySqlConnection {
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let opts = config.build_opts()?;

        let conn = tokio::time::timeout(config.timeout, Conn::new(opts))
            .await
            .map_err(|_| CdcError::Timeout)?
            .map_err(|e| CdcError::ConnectionError(format!("Failed to connect to MySQL: {}", e)))?;

        Ok(MySqlConnection { conn })
    }

    /// Binlog 상태 조회
    pub async fn get_binlog_status(&mut self) -> Result<BinlogStatus> {
        let result: Vec<(String, u64, String, String, String)> = self
            .conn
            .query("SHOW BINARY LOG STATUS")
            .await
            .map_err(|e| CdcError::QueryError(format!("Failed to query binlog status: {}", e)))?;

        let Some((file, position, _, _, executed_gtid_set)) = result.into_iter().next() else {
            return Err(CdcError::QueryError("No binlog status available".to_string()));
        };

        Ok(BinlogStatus {
            file,
            position,
            executed_gtid_set: GtidSet::parse(&executed_gtid_set).unwrap_or_default(),
        })
    }

    /// 외부 체크포인트가 아직 없을 때 쓸 초기 Position
    ///
    /// GTID 모드가 켜져 있으면 executed GTID 집합을 포함해
    /// auto-position resume이 가능하게 합니다.
    pub async fn current_position(&mut self) -> Result<Position> {
        let status = self.get_binlog_status().await?;
        if self.is_gtid_mode_enabled().await? && !status.executed_gtid_set.is_empty() {
            Ok(Position::with_gtid_set(
                status.file,
                status.position,
                status.executed_gtid_set.to_string(),
            ))
        } else {
            Ok(Position::new(status.file, status.position))
        }
    }

    /// GTID 모드 활성 여부 확인
    pub async fn is_gtid_mode_enabled(&mut self) -> Result<bool> {
        let result = self.get_variable("GTID_MODE").await?;
        Ok(result.as_deref() == Some("ON"))
    }

    /// 변수 조회
    pub async fn get_variable(&mut self, name: &str) -> Result<Option<String>> {
        let query = format!("SHOW GLOBAL VARIABLES LIKE '{}'", name);
        let result: Vec<(String, String)> = self
            .conn
            .query(&query)
            .await
            .map_err(|e| CdcError::QueryError(format!("Failed to query {}: {}", name, e)))?;

        Ok(result.into_iter().next().map(|(_, v)| v))
    }

    /// Binlog 형식 확인 — row image CDC에는 ROW 형식이 필요함
    pub async fn get_binlog_format(&mut self) -> Result<String> {
        self.get_variable("binlog_format")
            .await?
            .ok_or_else(|| CdcError::QueryError("Binlog format not found".to_string()))
    }

    pub async fn close(self) -> Result<()> {
        self.conn
            .disconnect()
            .await
            .map_err(|e| CdcError::ConnectionError(format!("Failed to disconnect: {}", e)))
    }
}

/// Binlog 상태
#[derive(Debug, Clone)]
pub struct BinlogStatus {
    pub file: String,
    pub position: u64,
    pub executed_gtid_set: GtidSet,
}
