//! GTID (Global Transaction ID) 집합 관리
//!
//! MySQL GTID 집합 형식: "uuid:interval[:interval]..." 을 ','로 연결
//! 예: "3e11fa47-71ca-11e1-9e33-c80aa9429562:1-5:11-18,
//!      6fa7e6ef-c49c-11e1-bbad-c80aa9429562:1-27"
//!
//! Position 검증과 auto-position resume 파라미터 생성에 사용합니다.

use crate::error::{CdcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// GTID sequence 범위 (양 끝 포함)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GtidInterval {
    pub start: u64,
    pub end: u64,
}

impl GtidInterval {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start == 0 || start > end {
            return Err(CdcError::GtidError(format!(
                "Invalid interval: {}-{}",
                start, end
            )));
        }
        Ok(GtidInterval { start, end })
    }

    pub fn contains(&self, sequence: u64) -> bool {
        sequence >= self.start && sequence <= self.end
    }

    /// 겹치거나 연접한 범위 병합
    fn merge(&self, other: &GtidInterval) -> Option<GtidInterval> {
        // end가 u64::MAX인 범위도 연접 판정이 가능해야 함
        if self.end.saturating_add(1) >= other.start && other.end.saturating_add(1) >= self.start {
            Some(GtidInterval {
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            })
        } else {
            None
        }
    }

    fn parse(part: &str) -> Result<Self> {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = start
                    .parse::<u64>()
                    .map_err(|_| CdcError::GtidError(format!("Invalid interval: {}", part)))?;
                let end = end
                    .parse::<u64>()
                    .map_err(|_| CdcError::GtidError(format!("Invalid interval: {}", part)))?;
                GtidInterval::new(start, end)
            }
            None => {
                let seq = part
                    .parse::<u64>()
                    .map_err(|_| CdcError::GtidError(format!("Invalid sequence: {}", part)))?;
                GtidInterval::new(seq, seq)
            }
        }
    }
}

impl fmt::Display for GtidInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// 서버 UUID 하나에 속한 GTID 범위들
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UuidGtidSet {
    pub uuid: String,
    pub intervals: Vec<GtidInterval>,
}

impl UuidGtidSet {
    pub fn new(uuid: String) -> Self {
        UuidGtidSet {
            uuid,
            intervals: Vec::new(),
        }
    }

    pub fn add_sequence(&mut self, sequence: u64) -> Result<()> {
        self.add_interval(GtidInterval::new(sequence, sequence)?);
        Ok(())
    }

    fn add_interval(&mut self, interval: GtidInterval) {
        self.intervals.push(interval);
        self.intervals.sort();

        // 정렬 후 인접 범위를 한 번에 병합
        let mut merged: Vec<GtidInterval> = Vec::with_capacity(self.intervals.len());
        for interval in self.intervals.drain(..) {
            match merged.last().and_then(|last| last.merge(&interval)) {
                Some(combined) => {
                    *merged.last_mut().unwrap() = combined;
                }
                None => merged.push(interval),
            }
        }
        self.intervals = merged;
    }

    pub fn contains(&self, sequence: u64) -> bool {
        self.intervals.iter().any(|r| r.contains(sequence))
    }
}

impl fmt::Display for UuidGtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uuid)?;
        for interval in &self.intervals {
            write!(f, ":{}", interval)?;
        }
        Ok(())
    }
}

/// 전체 GTID 집합 (여러 서버 UUID)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GtidSet {
    pub sets: BTreeMap<String, UuidGtidSet>,
}

impl GtidSet {
    pub fn new() -> Self {
        GtidSet {
            sets: BTreeMap::new(),
        }
    }

    /// GTID 집합 문자열 파싱
    ///
    /// 각 항목은 "uuid:interval[:interval]..." 형식이며 ','로 구분됩니다.
    /// MySQL이 반환하는 개행/공백은 무시합니다.
    pub fn parse(gtid_str: &str) -> Result<Self> {
        let mut gtid_set = GtidSet::new();

        for entry in gtid_str.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let (uuid_part, intervals_part) = entry.split_once(':').ok_or_else(|| {
                CdcError::GtidError(format!("Missing intervals in GTID entry: {}", entry))
            })?;

            let uuid = Uuid::parse_str(uuid_part)
                .map_err(|_| CdcError::GtidError(format!("Invalid server UUID: {}", uuid_part)))?
                .to_string();

            let mut uuid_set = UuidGtidSet::new(uuid);
            for part in intervals_part.split(':') {
                uuid_set.add_interval(GtidInterval::parse(part)?);
            }

            gtid_set.sets.insert(uuid_set.uuid.clone(), uuid_set);
        }

        Ok(gtid_set)
    }

    /// 단일 GTID 추가 (format: "uuid:sequence")
    pub fn add_gtid(&mut self, gtid: &str) -> Result<()> {
        let (uuid_part, seq_part) = gtid
            .split_once(':')
            .ok_or_else(|| CdcError::GtidError(format!("Invalid GTID format: {}", gtid)))?;

        let uuid = Uuid::parse_str(uuid_part)
            .map_err(|_| CdcError::GtidError(format!("Invalid server UUID: {}", uuid_part)))?
            .to_string();
        let sequence = seq_part
            .parse::<u64>()
            .map_err(|_| CdcError::GtidError(format!("Invalid sequence: {}", seq_part)))?;

        self.sets
            .entry(uuid.clone())
            .or_insert_with(|| UuidGtidSet::new(uuid))
            .add_sequence(sequence)
    }

    pub fn contains(&self, gtid: &str) -> bool {
        let Some((uuid, seq_part)) = gtid.split_once(':') else {
            return false;
        };
        let Ok(sequence) = seq_part.parse::<u64>() else {
            return false;
        };
        self.sets
            .get(uuid)
            .is_some_and(|uuid_set| uuid_set.contains(sequence))
    }

    /// auto-position resume에 쓸 서버별 GTID 문자열 목록
    pub fn sid_strings(&self) -> Vec<String> {
        self.sets.values().map(|s| s.to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.values().all(|set| set.intervals.is_empty())
    }
}

impl fmt::Display for GtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sid_strings().join(","))
    }
}
