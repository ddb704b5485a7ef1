use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mellon_application::{AuditEvent, AuditQuery, AuditRepository};
use mellon_core::{AppError, AppResult, PrincipalIdentity};
use mellon_domain::{AuditAction, AuditEntry};
use tokio::sync::Mutex;

const HEADER: [&str; 5] = ["timestamp", "principal", "action", "actor", "detail"];

#[derive(Debug)]
struct LedgerCursor {
    next_sequence: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Append-only CSV audit ledger.
///
/// Rows follow the stable layout `timestamp,principal,action,actor,detail`.
/// The sequence of an entry is its 1-based row position. Appends are
/// serialized through one lock and flushed before returning. File work runs
/// on the blocking pool.
#[derive(Debug)]
pub struct CsvAuditRepository {
    path: PathBuf,
    cursor: Mutex<LedgerCursor>,
}

impl CsvAuditRepository {
    /// Opens or creates the ledger at `path`, resuming after any existing rows.
    pub fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let mut cursor = LedgerCursor {
            next_sequence: 1,
            last_timestamp: None,
        };
        if path.exists() {
            scan_entries(&path, |entry| {
                cursor.next_sequence = entry.sequence + 1;
                cursor.last_timestamp = Some(entry.timestamp);
                true
            })?;
        }

        if cursor.next_sequence == 1 {
            let file = File::create(&path).map_err(|error| io_error(&path, &error))?;
            let mut writer = csv::Writer::from_writer(file);
            writer
                .write_record(HEADER)
                .and_then(|()| writer.flush().map_err(csv::Error::from))
                .map_err(|error| csv_error(&path, &error))?;
        }

        Ok(Self {
            path,
            cursor: Mutex::new(cursor),
        })
    }
}

#[async_trait]
impl AuditRepository for CsvAuditRepository {
    async fn append_entry(&self, event: AuditEvent) -> AppResult<AuditEntry> {
        let mut cursor = self.cursor.lock().await;
        let timestamp = cursor
            .last_timestamp
            .map_or(event.occurred_at, |last| last.max(event.occurred_at));

        let entry = AuditEntry {
            sequence: cursor.next_sequence,
            timestamp,
            principal: event.principal,
            action: event.action,
            actor: event.actor,
            detail: event.detail,
        };

        let path = self.path.clone();
        let row = entry.clone();
        tokio::task::spawn_blocking(move || append_row(&path, &row))
            .await
            .map_err(|error| {
                AppError::Internal(format!("audit ledger write task failed: {error}"))
            })??;

        cursor.next_sequence += 1;
        cursor.last_timestamp = Some(timestamp);
        Ok(entry)
    }

    async fn list_entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        // Held so a read never sees a half-written row.
        let _cursor = self.cursor.lock().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> AppResult<Vec<AuditEntry>> {
            let mut skipped = 0;
            let mut page = Vec::new();
            scan_entries(&path, |entry| {
                if !query.matches(&entry) {
                    return true;
                }
                if skipped < query.offset {
                    skipped += 1;
                    return true;
                }
                page.push(entry);
                page.len() < query.limit
            })?;
            Ok(page)
        })
        .await
        .map_err(|error| {
            AppError::Internal(format!("audit ledger read task failed: {error}"))
        })?
    }
}

fn append_row(path: &Path, entry: &AuditEntry) -> AppResult<()> {
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|error| io_error(path, &error))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer
        .write_record([
            entry.timestamp.to_rfc3339(),
            entry.principal.as_str().to_owned(),
            entry.action.as_str().to_owned(),
            entry.actor.clone(),
            entry.detail.clone(),
        ])
        .and_then(|()| writer.flush().map_err(csv::Error::from))
        .map_err(|error| csv_error(path, &error))
}

/// Parses rows in order, handing each to `visit` until it returns false.
fn scan_entries(path: &Path, mut visit: impl FnMut(AuditEntry) -> bool) -> AppResult<()> {
    let mut reader = csv::Reader::from_path(path).map_err(|error| csv_error(path, &error))?;

    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|error| csv_error(path, &error))?;
        let field = |position: usize| record.get(position).unwrap_or_default();

        let timestamp = DateTime::parse_from_rfc3339(field(0))
            .map_err(|error| {
                AppError::Internal(format!(
                    "audit ledger '{}' row {} has an invalid timestamp: {error}",
                    path.display(),
                    index + 1
                ))
            })?
            .with_timezone(&Utc);

        let entry = AuditEntry {
            sequence: index as u64 + 1,
            timestamp,
            principal: PrincipalIdentity::new(field(1))?,
            action: field(2).parse::<AuditAction>()?,
            actor: field(3).to_owned(),
            detail: field(4).to_owned(),
        };
        if !visit(entry) {
            break;
        }
    }

    Ok(())
}

fn io_error(path: &Path, error: &std::io::Error) -> AppError {
    AppError::Internal(format!(
        "failed to open audit ledger '{}': {error}",
        path.display()
    ))
}

fn csv_error(path: &Path, error: &csv::Error) -> AppError {
    AppError::Internal(format!(
        "failed to access audit ledger '{}': {error}",
        path.display()
    ))
}
