//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as ISO
//! `YYYY-MM-DD`, subjects as compact JSON arrays. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, Utc};
use muster_core::{
  identity::{IdentityRecord, Role},
  person::{AttendanceEntry, AttendanceStatus, PersonRecord},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  s.parse().map_err(|_| Error::Decode(format!("bad date: {s:?}")))
}

// ─── AttendanceStatus ────────────────────────────────────────────────────────

pub fn encode_status(s: AttendanceStatus) -> &'static str {
  match s {
    AttendanceStatus::Present => "present",
    AttendanceStatus::Absent => "absent",
    AttendanceStatus::Late => "late",
  }
}

pub fn decode_status(s: &str) -> Result<AttendanceStatus> {
  match s {
    "present" => Ok(AttendanceStatus::Present),
    "absent" => Ok(AttendanceStatus::Absent),
    "late" => Ok(AttendanceStatus::Late),
    other => Err(Error::Decode(format!("unknown status: {other:?}"))),
  }
}

// ─── Role ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str {
  match r {
    Role::Admin => "admin",
    Role::Member => "member",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "admin" => Ok(Role::Admin),
    "member" => Ok(Role::Member),
    other => Err(Error::Decode(format!("unknown role: {other:?}"))),
  }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

pub fn encode_subjects(subjects: &[String]) -> Result<String> {
  Ok(serde_json::to_string(subjects)?)
}

pub fn decode_subjects(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `people` row.
pub struct RawPerson {
  pub person_id:   String,
  pub code:        String,
  pub first_name:  String,
  pub last_name:   String,
  pub email:       String,
  pub age:         i64,
  pub class_group: String,
  pub subjects:    String,
  pub salary:      Option<f64>,
  pub department:  Option<String>,
  pub is_active:   bool,
  pub created_by:  String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawPerson {
  pub fn into_record(
    self,
    attendance: Vec<AttendanceEntry>,
  ) -> Result<PersonRecord> {
    let age = u8::try_from(self.age)
      .map_err(|_| Error::Decode(format!("age out of range: {}", self.age)))?;

    Ok(PersonRecord {
      person_id: decode_uuid(&self.person_id)?,
      code: self.code,
      first_name: self.first_name,
      last_name: self.last_name,
      email: self.email,
      age,
      class_group: self.class_group,
      subjects: decode_subjects(&self.subjects)?,
      attendance,
      salary: self.salary,
      department: self.department,
      is_active: self.is_active,
      created_by: decode_uuid(&self.created_by)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read from an `attendance` row, keyed by its person.
pub struct RawAttendance {
  pub person_id:   String,
  pub date:        String,
  pub status:      String,
  pub remarks:     Option<String>,
  pub recorded_at: String,
}

impl RawAttendance {
  pub fn into_entry(self) -> Result<AttendanceEntry> {
    Ok(AttendanceEntry {
      date:        decode_date(&self.date)?,
      status:      decode_status(&self.status)?,
      remarks:     self.remarks,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from an `identities` row.
pub struct RawIdentity {
  pub identity_id:   String,
  pub email:         String,
  pub password_hash: String,
  pub role:          String,
  pub is_active:     bool,
  pub person_id:     Option<String>,
  pub last_login_at: Option<String>,
}

impl RawIdentity {
  pub fn into_identity(self) -> Result<IdentityRecord> {
    Ok(IdentityRecord {
      identity_id:   decode_uuid(&self.identity_id)?,
      email:         self.email,
      password_hash: self.password_hash,
      role:          decode_role(&self.role)?,
      is_active:     self.is_active,
      person_id:     self.person_id.as_deref().map(decode_uuid).transpose()?,
      last_login_at: self
        .last_login_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
    })
  }
}
