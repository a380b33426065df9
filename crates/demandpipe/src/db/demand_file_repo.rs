//! Demand file repository: the uploaded PDFs of a demand note.

use rusqlite::{params, OptionalExtension, Row};

use super::status::SummaryStatus;
use super::{timestamp_now, Database, DatabaseError};

/// A raw demand file row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandFileRow {
    pub id: String,
    pub demand_note_id: String,
    pub file_name: String,
    pub file_path: Option<String>,
    pub summary_status: SummaryStatus,
    pub created_at: String,
}

impl DemandFileRow {
    pub fn new(
        id: impl Into<String>,
        demand_note_id: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            demand_note_id: demand_note_id.into(),
            file_name: file_name.into(),
            file_path: None,
            summary_status: SummaryStatus::NotSummarized,
            created_at: timestamp_now(),
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            demand_note_id: row.get("demandNoteId")?,
            file_name: row.get("fileName")?,
            file_path: row.get("filePath")?,
            summary_status: row.get("summaryStatus")?,
            created_at: row.get("createdAt")?,
        })
    }
}

/// Where a demand file's PDF lives and where its extraction output should go.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub demand_file_id: String,
    /// `DemandFile.filePath`, falling back to the task's copy.
    pub file_path: String,
    /// Job of the most recent task for this file, if any.
    pub job_id: Option<String>,
    /// Task file name, falling back to the demand file's.
    pub file_name: Option<String>,
    pub output_file_path: Option<String>,
}

pub fn insert(db: &Database, file: &DemandFileRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            r#"INSERT INTO "DemandFile" ("id", "demandNoteId", "fileName", "filePath",
                   "summaryStatus", "createdAt")
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                file.id,
                file.demand_note_id,
                file.file_name,
                file.file_path,
                file.summary_status,
                file.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<DemandFileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                r#"SELECT * FROM "DemandFile" WHERE "id" = ?1"#,
                params![id],
                DemandFileRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Demand files of the job's note that are not summarized yet, oldest first.
pub fn pending_for_job(db: &Database, job_id: &str) -> Result<Vec<DemandFileRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            r#"SELECT df.*
               FROM "DemandFile" df
               JOIN "Job" j ON j."demandNoteId" = df."demandNoteId"
               WHERE j."id" = ?1 AND df."summaryStatus" = ?2
               ORDER BY df."createdAt" ASC, df.rowid ASC"#,
        )?;
        let rows = stmt
            .query_map(
                params![job_id, SummaryStatus::NotSummarized],
                DemandFileRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn mark_summarized(db: &Database, id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            r#"UPDATE "DemandFile" SET "summaryStatus" = ?2 WHERE "id" = ?1"#,
            params![id, SummaryStatus::Summarized],
        )?;
        Ok(())
    })
}

/// True when the job's note has demand files and all of them are summarized.
pub fn all_summarized(db: &Database, job_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let (total, summarized): (u64, u64) = conn.query_row(
            r#"SELECT
                   COUNT(*),
                   COUNT(CASE WHEN df."summaryStatus" = ?2 THEN 1 END)
               FROM "DemandFile" df
               JOIN "Job" j ON j."demandNoteId" = df."demandNoteId"
               WHERE j."id" = ?1"#,
            params![job_id, SummaryStatus::Summarized],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(total > 0 && summarized == total)
    })
}

/// Looks up the stored PDF path and output bookkeeping for a demand file.
pub fn source_record(db: &Database, demand_file_id: &str) -> Result<SourceRecord, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                r#"SELECT
                       COALESCE(NULLIF(df."filePath", ''), t."filePath"),
                       t."jobId",
                       COALESCE(t."fileName", df."fileName"),
                       t."outputFilePath"
                   FROM "DemandFile" df
                   LEFT JOIN "Task" t ON t."demandFileId" = df."id"
                   WHERE df."id" = ?1
                   ORDER BY t."createdAt" DESC, t.rowid DESC
                   LIMIT 1"#,
                params![demand_file_id],
                |r| {
                    Ok((
                        r.get::<_, Option<String>>(0)?,
                        r.get::<_, Option<String>>(1)?,
                        r.get::<_, Option<String>>(2)?,
                        r.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let (file_path, job_id, file_name, output_file_path) =
            row.ok_or_else(|| DatabaseError::DemandFileNotFound(demand_file_id.to_string()))?;

        let file_path = file_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DatabaseError::MissingFilePath(demand_file_id.to_string()))?;

        Ok(SourceRecord {
            demand_file_id: demand_file_id.to_string(),
            file_path,
            job_id,
            file_name: file_name.filter(|n| !n.is_empty()),
            output_file_path: output_file_path.filter(|p| !p.is_empty()),
        })
    })
}
