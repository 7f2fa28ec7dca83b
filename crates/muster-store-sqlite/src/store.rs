//! [`SqliteStore`] — the SQLite implementation of [`RecordStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params, params_from_iter, types::Value};
use uuid::Uuid;

use muster_core::{
  identity::{IdentityRecord, NewIdentity},
  person::{NewAttendanceEntry, NewPersonRecord, PersonRecord, RecordPatch},
  query::{RecordQuery, SortDirection, SortField, SortSpec},
  store::{AggregateRow, AggregateSpec, RecordStore},
};

use crate::{
  Error, Result,
  encode::{
    RawAttendance, RawIdentity, RawPerson, encode_date, encode_dt,
    encode_role, encode_status, encode_subjects, encode_uuid,
  },
  error::map_db_err,
  schema::SCHEMA,
};

const PERSON_COLS: &str = "person_id, code, first_name, last_name, email, \
                           age, class_group, subjects, salary, department, \
                           is_active, created_by, created_at, updated_at";

const IDENTITY_COLS: &str = "identity_id, email, password_hash, role, \
                             is_active, person_id, last_login_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Muster record store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one person row (plus attendance) by an exact column match.
  async fn person_where(
    &self,
    column: &'static str,
    needle: String,
  ) -> Result<Option<PersonRecord>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql =
          format!("SELECT {PERSON_COLS} FROM people WHERE {column} = ?1");
        let person = conn
          .query_row(&sql, params![needle], person_row)
          .optional()?;

        let atts = match &person {
          Some(p) => attendance_for(conn, &[p.person_id.clone()])?,
          None => Vec::new(),
        };
        Ok(person.map(|p| (p, atts)))
      })
      .await?;

    raw
      .map(|(person, atts)| {
        let entries = atts
          .into_iter()
          .map(RawAttendance::into_entry)
          .collect::<Result<Vec<_>>>()?;
        person.into_record(entries)
      })
      .transpose()
  }
}

// ─── Row mappers ─────────────────────────────────────────────────────────────

fn person_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPerson> {
  Ok(RawPerson {
    person_id:   row.get(0)?,
    code:        row.get(1)?,
    first_name:  row.get(2)?,
    last_name:   row.get(3)?,
    email:       row.get(4)?,
    age:         row.get(5)?,
    class_group: row.get(6)?,
    subjects:    row.get(7)?,
    salary:      row.get(8)?,
    department:  row.get(9)?,
    is_active:   row.get(10)?,
    created_by:  row.get(11)?,
    created_at:  row.get(12)?,
    updated_at:  row.get(13)?,
  })
}

fn identity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawIdentity> {
  Ok(RawIdentity {
    identity_id:   row.get(0)?,
    email:         row.get(1)?,
    password_hash: row.get(2)?,
    role:          row.get(3)?,
    is_active:     row.get(4)?,
    person_id:     row.get(5)?,
    last_login_at: row.get(6)?,
  })
}

/// All attendance rows for the given person ids, in append (rowid) order.
fn attendance_for(
  conn: &rusqlite::Connection,
  ids: &[String],
) -> rusqlite::Result<Vec<RawAttendance>> {
  if ids.is_empty() {
    return Ok(Vec::new());
  }
  let placeholders = vec!["?"; ids.len()].join(", ");
  let sql = format!(
    "SELECT person_id, date, status, remarks, recorded_at
     FROM attendance
     WHERE person_id IN ({placeholders})
     ORDER BY rowid"
  );
  let mut stmt = conn.prepare(&sql)?;
  stmt
    .query_map(params_from_iter(ids.iter()), |row| {
      Ok(RawAttendance {
        person_id:   row.get(0)?,
        date:        row.get(1)?,
        status:      row.get(2)?,
        remarks:     row.get(3)?,
        recorded_at: row.get(4)?,
      })
    })?
    .collect()
}

// ─── Query assembly ──────────────────────────────────────────────────────────

/// Translate a normalized [`RecordQuery`] into a WHERE clause and its
/// positional parameters. Only present predicates contribute.
fn build_where(query: &RecordQuery) -> (String, Vec<Value>) {
  let mut conds: Vec<&'static str> = Vec::new();
  let mut bind: Vec<Value> = Vec::new();

  if let Some(name) = &query.name_contains {
    conds.push("(first_name LIKE ? OR last_name LIKE ?)");
    let pattern = format!("%{name}%");
    bind.push(Value::Text(pattern.clone()));
    bind.push(Value::Text(pattern));
  }
  if let Some(email) = &query.email_contains {
    conds.push("email LIKE ?");
    bind.push(Value::Text(format!("%{email}%")));
  }
  if let Some(class) = &query.class_group {
    conds.push("class_group = ?");
    bind.push(Value::Text(class.clone()));
  }
  if let Some(dept) = &query.department {
    conds.push("department = ?");
    bind.push(Value::Text(dept.clone()));
  }
  if let Some(min) = query.age_min {
    conds.push("age >= ?");
    bind.push(Value::Integer(min as i64));
  }
  if let Some(max) = query.age_max {
    conds.push("age <= ?");
    bind.push(Value::Integer(max as i64));
  }
  if let Some(subject) = &query.subject {
    conds.push(
      "EXISTS (SELECT 1 FROM json_each(people.subjects) \
       WHERE json_each.value = ?)",
    );
    bind.push(Value::Text(subject.clone()));
  }
  if let Some(active) = query.is_active {
    conds.push("is_active = ?");
    bind.push(Value::Integer(active as i64));
  }

  let clause = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };
  (clause, bind)
}

/// ORDER BY clause for a sort spec, with a stable id tiebreaker so that
/// identical queries return identical pages.
fn order_clause(sort: &SortSpec) -> String {
  let dir = match sort.direction {
    SortDirection::Asc => "ASC",
    SortDirection::Desc => "DESC",
  };
  match sort.field {
    SortField::CreatedAt => format!("created_at {dir}, person_id ASC"),
    SortField::Name => {
      format!("last_name {dir}, first_name {dir}, person_id ASC")
    }
    SortField::Age => format!("age {dir}, person_id ASC"),
    SortField::Email => format!("email {dir}, person_id ASC"),
    SortField::Code => format!("code {dir}, person_id ASC"),
  }
}

/// SET clause and parameters for a field patch; always touches
/// `updated_at`. Subjects are pre-encoded by the caller because JSON
/// encoding is fallible.
fn patch_sets(
  patch: &RecordPatch,
  subjects_json: Option<String>,
  now_str: &str,
) -> (String, Vec<Value>) {
  let mut sets: Vec<&'static str> = Vec::new();
  let mut bind: Vec<Value> = Vec::new();

  if let Some(v) = &patch.first_name {
    sets.push("first_name = ?");
    bind.push(Value::Text(v.clone()));
  }
  if let Some(v) = &patch.last_name {
    sets.push("last_name = ?");
    bind.push(Value::Text(v.clone()));
  }
  if let Some(v) = &patch.email {
    sets.push("email = ?");
    bind.push(Value::Text(v.clone()));
  }
  if let Some(v) = patch.age {
    sets.push("age = ?");
    bind.push(Value::Integer(v as i64));
  }
  if let Some(v) = &patch.class_group {
    sets.push("class_group = ?");
    bind.push(Value::Text(v.clone()));
  }
  if let Some(json) = subjects_json {
    sets.push("subjects = ?");
    bind.push(Value::Text(json));
  }
  if let Some(v) = patch.salary {
    sets.push("salary = ?");
    bind.push(Value::Real(v));
  }
  if let Some(v) = &patch.department {
    sets.push("department = ?");
    bind.push(Value::Text(v.clone()));
  }
  if let Some(v) = patch.is_active {
    sets.push("is_active = ?");
    bind.push(Value::Integer(v as i64));
  }
  sets.push("updated_at = ?");
  bind.push(Value::Text(now_str.to_owned()));

  (sets.join(", "), bind)
}

/// Join people rows with their attendance rows and decode.
fn assemble(
  people: Vec<RawPerson>,
  atts: Vec<RawAttendance>,
) -> Result<Vec<PersonRecord>> {
  use std::collections::HashMap;

  let mut by_person: HashMap<String, Vec<RawAttendance>> = HashMap::new();
  for att in atts {
    by_person.entry(att.person_id.clone()).or_default().push(att);
  }

  people
    .into_iter()
    .map(|p| {
      let entries = by_person
        .remove(&p.person_id)
        .unwrap_or_default()
        .into_iter()
        .map(RawAttendance::into_entry)
        .collect::<Result<Vec<_>>>()?;
      p.into_record(entries)
    })
    .collect()
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  // ── Person records — reads ──────────────────────────────────────────────

  async fn find(
    &self,
    query: &RecordQuery,
    sort: &SortSpec,
    skip: u64,
    limit: u64,
  ) -> Result<Vec<PersonRecord>> {
    let (where_clause, mut bind) = build_where(query);
    let order = order_clause(sort);
    bind.push(Value::Integer(limit as i64));
    bind.push(Value::Integer(skip as i64));

    let (people, atts) = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {PERSON_COLS} FROM people {where_clause}
           ORDER BY {order} LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let people = stmt
          .query_map(params_from_iter(bind), person_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let ids: Vec<String> =
          people.iter().map(|p| p.person_id.clone()).collect();
        let atts = attendance_for(conn, &ids)?;
        Ok((people, atts))
      })
      .await?;

    assemble(people, atts)
  }

  async fn count(&self, query: &RecordQuery) -> Result<u64> {
    let (where_clause, bind) = build_where(query);

    let n: i64 = self
      .conn
      .call(move |conn| {
        let sql = format!("SELECT COUNT(*) FROM people {where_clause}");
        Ok(conn.query_row(&sql, params_from_iter(bind), |r| r.get(0))?)
      })
      .await?;
    Ok(n as u64)
  }

  async fn find_by_id(&self, id: Uuid) -> Result<Option<PersonRecord>> {
    self.person_where("person_id", encode_uuid(id)).await
  }

  async fn find_by_email(&self, email: &str) -> Result<Option<PersonRecord>> {
    self.person_where("email", email.to_lowercase()).await
  }

  async fn text_search(
    &self,
    text: &str,
    skip: u64,
    limit: u64,
  ) -> Result<(Vec<PersonRecord>, u64)> {
    let pattern = format!("%{text}%");

    let (people, atts, total) = self
      .conn
      .call(move |conn| {
        const MATCH: &str = "first_name LIKE ?1 OR last_name LIKE ?1 \
                             OR email LIKE ?1 OR class_group LIKE ?1 \
                             OR department LIKE ?1 OR code LIKE ?1";

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM people WHERE {MATCH}"),
          params![pattern],
          |r| r.get(0),
        )?;

        let sql = format!(
          "SELECT {PERSON_COLS} FROM people WHERE {MATCH}
           ORDER BY created_at DESC, person_id ASC LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let people = stmt
          .query_map(
            params![pattern, limit as i64, skip as i64],
            person_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let ids: Vec<String> =
          people.iter().map(|p| p.person_id.clone()).collect();
        let atts = attendance_for(conn, &ids)?;
        Ok((people, atts, total))
      })
      .await?;

    Ok((assemble(people, atts)?, total as u64))
  }

  // ── Person records — writes ─────────────────────────────────────────────

  async fn insert(
    &self,
    new: NewPersonRecord,
    created_by: Uuid,
  ) -> Result<PersonRecord> {
    let person_id = Uuid::new_v4();
    let now = Utc::now();

    let id_str = encode_uuid(person_id);
    let creator_str = encode_uuid(created_by);
    let now_str = encode_dt(now);
    let subjects_json = encode_subjects(&new.subjects)?;
    let fields = new.clone();

    let code = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // Atomic increment-and-read; a count-then-format scheme would
        // allocate duplicate codes under concurrent creates.
        let seq: i64 = tx.query_row(
          "UPDATE counters SET value = value + 1
           WHERE name = 'person_code' RETURNING value",
          [],
          |r| r.get(0),
        )?;
        let code = format!("PER-{seq:04}");

        tx.execute(
          "INSERT INTO people (
             person_id, code, first_name, last_name, email, age,
             class_group, subjects, salary, department, is_active,
             created_by, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?12, ?12)",
          params![
            id_str,
            code,
            new.first_name,
            new.last_name,
            new.email,
            new.age as i64,
            new.class_group,
            subjects_json,
            new.salary,
            new.department,
            creator_str,
            now_str,
          ],
        )?;

        tx.commit()?;
        Ok(code)
      })
      .await
      .map_err(map_db_err)?;

    Ok(PersonRecord {
      person_id,
      code,
      first_name: fields.first_name,
      last_name: fields.last_name,
      email: fields.email,
      age: fields.age,
      class_group: fields.class_group,
      subjects: fields.subjects,
      attendance: Vec::new(),
      salary: fields.salary,
      department: fields.department,
      is_active: true,
      created_by,
      created_at: now,
      updated_at: now,
    })
  }

  async fn update_by_id(
    &self,
    id: Uuid,
    patch: RecordPatch,
  ) -> Result<Option<PersonRecord>> {
    let id_str = encode_uuid(id);
    let now_str = encode_dt(Utc::now());
    let subjects_json = patch
      .subjects
      .as_deref()
      .map(encode_subjects)
      .transpose()?;
    let (set_clause, mut bind) = patch_sets(&patch, subjects_json, &now_str);
    bind.push(Value::Text(id_str.clone()));

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          &format!("UPDATE people SET {set_clause} WHERE person_id = ?"),
          params_from_iter(bind),
        )?;
        if changed == 0 {
          return Ok(None);
        }

        let sql =
          format!("SELECT {PERSON_COLS} FROM people WHERE person_id = ?1");
        let person = conn.query_row(&sql, params![id_str], person_row)?;
        let atts = attendance_for(conn, &[id_str])?;
        Ok(Some((person, atts)))
      })
      .await
      .map_err(map_db_err)?;

    raw
      .map(|(person, atts)| {
        let entries = atts
          .into_iter()
          .map(RawAttendance::into_entry)
          .collect::<Result<Vec<_>>>()?;
        person.into_record(entries)
      })
      .transpose()
  }

  async fn update_many(
    &self,
    ids: &[Uuid],
    patch: &RecordPatch,
  ) -> Result<u64> {
    if ids.is_empty() {
      return Ok(0);
    }
    let now_str = encode_dt(Utc::now());
    let subjects_json = patch
      .subjects
      .as_deref()
      .map(encode_subjects)
      .transpose()?;
    let (set_clause, mut bind) = patch_sets(patch, subjects_json, &now_str);
    for id in ids {
      bind.push(Value::Text(encode_uuid(*id)));
    }
    let placeholders = vec!["?"; ids.len()].join(", ");

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          &format!(
            "UPDATE people SET {set_clause}
             WHERE person_id IN ({placeholders})"
          ),
          params_from_iter(bind),
        )?)
      })
      .await
      .map_err(map_db_err)?;
    Ok(changed as u64)
  }

  async fn append_attendance(
    &self,
    id: Uuid,
    entry: NewAttendanceEntry,
  ) -> Result<Option<PersonRecord>> {
    let id_str = encode_uuid(id);
    let att_id_str = encode_uuid(Uuid::new_v4());
    let now_str = encode_dt(Utc::now());
    let date_str = encode_date(entry.date);
    let status_str = encode_status(entry.status).to_owned();
    let remarks = entry.remarks;

    let raw = self
      .conn
      .call(move |conn| {
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM people WHERE person_id = ?1",
            params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(None);
        }

        conn.execute(
          "INSERT INTO attendance (
             attendance_id, person_id, date, status, remarks, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![att_id_str, id_str, date_str, status_str, remarks, now_str],
        )?;
        conn.execute(
          "UPDATE people SET updated_at = ?1 WHERE person_id = ?2",
          params![now_str, id_str],
        )?;

        let sql =
          format!("SELECT {PERSON_COLS} FROM people WHERE person_id = ?1");
        let person = conn.query_row(&sql, params![id_str], person_row)?;
        let atts = attendance_for(conn, &[id_str])?;
        Ok(Some((person, atts)))
      })
      .await?;

    raw
      .map(|(person, atts)| {
        let entries = atts
          .into_iter()
          .map(RawAttendance::into_entry)
          .collect::<Result<Vec<_>>>()?;
        person.into_record(entries)
      })
      .transpose()
  }

  // ── Aggregation ─────────────────────────────────────────────────────────

  async fn aggregate(&self, spec: AggregateSpec) -> Result<Vec<AggregateRow>> {
    let rows = self
      .conn
      .call(move |conn| {
        let rows = match spec {
          AggregateSpec::RecordCounts => {
            let (total, active): (i64, i64) = conn.query_row(
              "SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM people",
              [],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            vec![
              AggregateRow { label: Some("total".into()), value: total as f64 },
              AggregateRow {
                label: Some("active".into()),
                value: active as f64,
              },
            ]
          }
          AggregateSpec::AverageAge => {
            let avg: f64 = conn.query_row(
              "SELECT COALESCE(AVG(age), 0) FROM people",
              [],
              |r| r.get(0),
            )?;
            vec![AggregateRow { label: None, value: avg }]
          }
          AggregateSpec::AttendanceTotals => {
            let (total, present): (i64, i64) = conn.query_row(
              "SELECT COUNT(*), COALESCE(SUM(status = 'present'), 0)
               FROM attendance",
              [],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )?;
            vec![
              AggregateRow { label: Some("total".into()), value: total as f64 },
              AggregateRow {
                label: Some("present".into()),
                value: present as f64,
              },
            ]
          }
          AggregateSpec::ActiveByDepartment => {
            let mut stmt = conn.prepare(
              "SELECT department, COUNT(*) FROM people
               WHERE is_active = 1 AND department IS NOT NULL
               GROUP BY department ORDER BY department",
            )?;
            stmt
              .query_map([], |r| {
                Ok(AggregateRow {
                  label: Some(r.get(0)?),
                  value: r.get::<_, i64>(1)? as f64,
                })
              })?
              .collect::<rusqlite::Result<Vec<_>>>()?
          }
        };
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  // ── Identities ──────────────────────────────────────────────────────────

  async fn identity_by_email(
    &self,
    email: &str,
  ) -> Result<Option<IdentityRecord>> {
    let needle = email.trim().to_lowercase();

    let raw = self
      .conn
      .call(move |conn| {
        let sql =
          format!("SELECT {IDENTITY_COLS} FROM identities WHERE email = ?1");
        Ok(conn.query_row(&sql, params![needle], identity_row).optional()?)
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }

  async fn identities_by_ids(
    &self,
    ids: &[Uuid],
  ) -> Result<Vec<IdentityRecord>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let raws = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; id_strs.len()].join(", ");
        let sql = format!(
          "SELECT {IDENTITY_COLS} FROM identities
           WHERE identity_id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(id_strs.iter()), identity_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentity::into_identity).collect()
  }

  async fn insert_identity(&self, new: NewIdentity) -> Result<IdentityRecord> {
    let identity = IdentityRecord {
      identity_id:   Uuid::new_v4(),
      email:         new.email.trim().to_lowercase(),
      password_hash: new.password_hash,
      role:          new.role,
      is_active:     true,
      person_id:     new.person_id,
      last_login_at: None,
    };

    let id_str = encode_uuid(identity.identity_id);
    let email = identity.email.clone();
    let hash = identity.password_hash.clone();
    let role_str = encode_role(identity.role).to_owned();
    let person_str = identity.person_id.map(encode_uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO identities (
             identity_id, email, password_hash, role, is_active, person_id
           ) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
          params![id_str, email, hash, role_str, person_str],
        )?;
        Ok(())
      })
      .await
      .map_err(map_db_err)?;

    Ok(identity)
  }

  async fn touch_last_login(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    let now_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE identities SET last_login_at = ?1 WHERE identity_id = ?2",
          params![now_str, id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
