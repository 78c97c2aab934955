// Candidate Registry - Registro temporal de buques con probable perfil militar
// Clasificación heurística por tipo AIS, prefijo de nombre y patrón de MMSI

use crate::types::PositionUpdate;
use log::debug;
use lru::LruCache;
use serde::Serialize;

/// Candidates idle longer than this are purged (2 hours).
pub const CANDIDATE_RETENTION_MS: i64 = 2 * 60 * 60 * 1000;
/// Read-time cap on serialized candidate reports.
pub const MAX_CANDIDATE_REPORTS: usize = 1500;

/// Hull/name prefixes used by navies and coast guards, matched case-insensitively.
const NAVAL_NAME_PREFIXES: &[&str] = &[
    "USS ", "USNS ", "USCGC ", "HMS ", "HMAS ", "HMCS ", "HMNZS ", "INS ", "JS ", "ROKS ",
    "TCG ", "FS ", "FGS ", "ITS ", "ESPS ", "HNLMS ", "HDMS ", "HNOMS ", "HSWMS ", "BNS ",
    "BRP ", "KRI ", "PNS ", "RSS ", "SPS ", "NRP ", "ORP ", "RFS ", "PLAN ", "CNS ",
    "WARSHIP", "NAVY", "NAVAL", "COAST GUARD", "MILITARY",
];

/// Why a vessel was flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    /// AIS ship type reserved for military / law enforcement / SAR use
    ShipType(u32),
    /// Name carries a naval prefix
    NamePrefix(&'static str),
    /// Identifier suffix pattern seen in naval MMSI allocations
    IdentifierPattern,
}

/// Military-likelihood heuristic.
pub struct CandidateClassifier {
    name_prefixes: Vec<&'static str>,
}

impl CandidateClassifier {
    pub fn new(name_prefixes: Vec<&'static str>) -> Self {
        Self { name_prefixes }
    }

    /// Returns the first matching rule, or `None` if the vessel is not a candidate.
    pub fn classify(&self, update: &PositionUpdate) -> Option<MatchReason> {
        if let Some(ship_type) = update.ship_type {
            if is_reserved_ship_type(ship_type) {
                return Some(MatchReason::ShipType(ship_type));
            }
        }

        let name = update.name.to_uppercase();
        if !name.is_empty() {
            if let Some(prefix) = self.name_prefixes.iter().find(|p| name.starts_with(*p)) {
                return Some(MatchReason::NamePrefix(*prefix));
            }
        }

        if matches_naval_identifier(&update.mmsi) {
            return Some(MatchReason::IdentifierPattern);
        }

        None
    }
}

impl Default for CandidateClassifier {
    fn default() -> Self {
        Self::new(NAVAL_NAME_PREFIXES.to_vec())
    }
}

/// 35 (military ops), 55 (law enforcement) and the whole 50-59 special-craft range.
pub fn is_reserved_ship_type(ship_type: u32) -> bool {
    ship_type == 35 || ship_type == 55 || (50..=59).contains(&ship_type)
}

/// At least 9 digits and the last six start with "00" or "99".
pub fn matches_naval_identifier(mmsi: &str) -> bool {
    if mmsi.len() < 9 || !mmsi.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let suffix = &mmsi[mmsi.len() - 6..];
    suffix.starts_with("00") || suffix.starts_with("99")
}

/// Last observed state of a flagged vessel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport {
    pub mmsi: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub ship_type: Option<u32>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    pub timestamp: i64,
}

impl CandidateReport {
    fn from_update(update: &PositionUpdate, now_ms: i64) -> Self {
        Self {
            mmsi: update.mmsi.clone(),
            name: update.name.clone(),
            lat: update.lat,
            lon: update.lon,
            ship_type: update.ship_type,
            heading: update.heading,
            speed: update.speed,
            course: update.course,
            timestamp: now_ms,
        }
    }
}

/// Time-boxed set of flagged vessels, ordered by last update.
///
/// The live registry is unbounded; the 1500 cap only applies when reports are read.
pub struct CandidateRegistry {
    classifier: CandidateClassifier,
    entries: LruCache<String, CandidateReport>,
}

impl CandidateRegistry {
    pub fn new(classifier: CandidateClassifier) -> Self {
        Self {
            classifier,
            entries: LruCache::unbounded(),
        }
    }

    /// Classifies the update and upserts a report on match. A vessel already in
    /// the registry is refreshed on every later report.
    pub fn observe(&mut self, update: &PositionUpdate, now_ms: i64) -> bool {
        let known = self.entries.contains(&update.mmsi);
        if !known {
            match self.classifier.classify(update) {
                Some(reason) => {
                    debug!("[Candidates] {} flagged ({:?})", update.mmsi, reason);
                }
                None => return false,
            }
        }
        self.entries
            .put(update.mmsi.clone(), CandidateReport::from_update(update, now_ms));
        true
    }

    /// Removes entries idle beyond the retention period, oldest first.
    pub fn purge(&mut self, now_ms: i64) -> usize {
        let mut removed = 0;
        while let Some((_, oldest)) = self.entries.peek_lru() {
            if now_ms - oldest.timestamp <= CANDIDATE_RETENTION_MS {
                break;
            }
            self.entries.pop_lru();
            removed += 1;
        }
        removed
    }

    /// Newest-first reports, truncated to `limit`.
    pub fn reports(&self, limit: usize) -> Vec<CandidateReport> {
        self.entries.iter().take(limit).map(|(_, r)| r.clone()).collect()
    }

    pub fn get(&self, mmsi: &str) -> Option<&CandidateReport> {
        self.entries.peek(mmsi)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CandidateRegistry {
    fn default() -> Self {
        Self::new(CandidateClassifier::default())
    }
}
