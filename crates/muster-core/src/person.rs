//! Person records — the unit of the roster — and their attendance register.
//!
//! A record is mutable through field patches, but its sequential `code` is
//! assigned once at creation and its attendance list is strictly append-only.
//! "Deletion" flips `is_active`; rows are never physically removed, so email
//! and code uniqueness survive deletion.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, identity::IdentitySummary};

/// Inclusive age bounds enforced at the semantic layer.
pub const AGE_MIN: u8 = 18;
pub const AGE_MAX: u8 = 70;

// ─── Attendance ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
  Present,
  Absent,
  Late,
}

/// One entry in a record's attendance register. Appended, never mutated
/// or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEntry {
  pub date:        NaiveDate,
  pub status:      AttendanceStatus,
  pub remarks:     Option<String>,
  /// Server-assigned timestamp; fixes the append order.
  pub recorded_at: DateTime<Utc>,
}

/// Input to an attendance append. `recorded_at` is set by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAttendanceEntry {
  pub date:    NaiveDate,
  pub status:  AttendanceStatus,
  pub remarks: Option<String>,
}

/// Attendance rate as a percentage: present / total × 100.
/// Defined as 0 for an empty register.
pub fn attendance_rate(entries: &[AttendanceEntry]) -> f64 {
  if entries.is_empty() {
    return 0.0;
  }
  let present = entries
    .iter()
    .filter(|e| e.status == AttendanceStatus::Present)
    .count();
  present as f64 / entries.len() as f64 * 100.0
}

// ─── PersonRecord ────────────────────────────────────────────────────────────

/// A personnel record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
  pub person_id:   Uuid,
  /// Human-readable sequential code (`PER-0001`). Assigned once by the
  /// store's atomic counter; immutable thereafter.
  pub code:        String,
  pub first_name:  String,
  pub last_name:   String,
  /// Globally unique; stored lowercase.
  pub email:       String,
  pub age:         u8,
  pub class_group: String,
  /// Non-empty set of subjects.
  pub subjects:    Vec<String>,
  /// Append-only register, in insertion order.
  pub attendance:  Vec<AttendanceEntry>,
  pub salary:      Option<f64>,
  pub department:  Option<String>,
  pub is_active:   bool,
  /// Identity of the principal that created this record.
  pub created_by:  Uuid,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl PersonRecord {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }

  pub fn attendance_rate(&self) -> f64 { attendance_rate(&self.attendance) }
}

// ─── NewPersonRecord ─────────────────────────────────────────────────────────

/// Input to record creation. Identifier, code, timestamps and creator are
/// assigned by the write path, not accepted from callers.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPersonRecord {
  pub first_name:  String,
  pub last_name:   String,
  pub email:       String,
  pub age:         u8,
  pub class_group: String,
  pub subjects:    Vec<String>,
  #[serde(default)]
  pub salary:      Option<f64>,
  #[serde(default)]
  pub department:  Option<String>,
}

impl NewPersonRecord {
  /// Trim, lowercase the email, and check the semantic invariants.
  /// Structural validation (types, required fields) happens at the
  /// transport layer; only semantics live here.
  pub fn normalized(mut self) -> Result<Self> {
    self.first_name = self.first_name.trim().to_owned();
    self.last_name = self.last_name.trim().to_owned();
    self.email = normalize_email(&self.email);
    self.class_group = self.class_group.trim().to_owned();
    self.subjects = normalize_subjects(self.subjects);

    if self.first_name.is_empty() || self.last_name.is_empty() {
      return Err(Error::Validation("name must not be empty".into()));
    }
    if self.email.is_empty() {
      return Err(Error::Validation("email must not be empty".into()));
    }
    validate_age(self.age)?;
    if self.class_group.is_empty() {
      return Err(Error::Validation("class must not be empty".into()));
    }
    if self.subjects.is_empty() {
      return Err(Error::Validation("at least one subject is required".into()));
    }
    if let Some(s) = self.salary {
      validate_salary(s)?;
    }
    Ok(self)
  }
}

// ─── RecordPatch ─────────────────────────────────────────────────────────────

/// The writable fields of a record update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPatch {
  pub first_name:  Option<String>,
  pub last_name:   Option<String>,
  pub email:       Option<String>,
  pub age:         Option<u8>,
  pub class_group: Option<String>,
  pub subjects:    Option<Vec<String>>,
  pub salary:      Option<f64>,
  pub department:  Option<String>,
  pub is_active:   Option<bool>,
}

/// Discriminants for the fields a patch touches; the authorization guard
/// checks these against the member allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchField {
  FirstName,
  LastName,
  Email,
  Age,
  ClassGroup,
  Subjects,
  Salary,
  Department,
  IsActive,
}

impl PatchField {
  pub fn name(&self) -> &'static str {
    match self {
      Self::FirstName => "first_name",
      Self::LastName => "last_name",
      Self::Email => "email",
      Self::Age => "age",
      Self::ClassGroup => "class_group",
      Self::Subjects => "subjects",
      Self::Salary => "salary",
      Self::Department => "department",
      Self::IsActive => "is_active",
    }
  }
}

impl RecordPatch {
  /// The fields this patch would write, in declaration order.
  pub fn fields(&self) -> Vec<PatchField> {
    let mut out = Vec::new();
    if self.first_name.is_some() {
      out.push(PatchField::FirstName);
    }
    if self.last_name.is_some() {
      out.push(PatchField::LastName);
    }
    if self.email.is_some() {
      out.push(PatchField::Email);
    }
    if self.age.is_some() {
      out.push(PatchField::Age);
    }
    if self.class_group.is_some() {
      out.push(PatchField::ClassGroup);
    }
    if self.subjects.is_some() {
      out.push(PatchField::Subjects);
    }
    if self.salary.is_some() {
      out.push(PatchField::Salary);
    }
    if self.department.is_some() {
      out.push(PatchField::Department);
    }
    if self.is_active.is_some() {
      out.push(PatchField::IsActive);
    }
    out
  }

  pub fn is_empty(&self) -> bool { self.fields().is_empty() }

  /// Normalize and validate the present fields; same rules as creation.
  pub fn normalized(mut self) -> Result<Self> {
    if let Some(ref mut v) = self.first_name {
      *v = v.trim().to_owned();
      if v.is_empty() {
        return Err(Error::Validation("name must not be empty".into()));
      }
    }
    if let Some(ref mut v) = self.last_name {
      *v = v.trim().to_owned();
      if v.is_empty() {
        return Err(Error::Validation("name must not be empty".into()));
      }
    }
    if let Some(ref mut v) = self.email {
      *v = normalize_email(v);
      if v.is_empty() {
        return Err(Error::Validation("email must not be empty".into()));
      }
    }
    if let Some(age) = self.age {
      validate_age(age)?;
    }
    if let Some(ref mut v) = self.class_group {
      *v = v.trim().to_owned();
      if v.is_empty() {
        return Err(Error::Validation("class must not be empty".into()));
      }
    }
    if let Some(ref mut subjects) = self.subjects {
      *subjects = normalize_subjects(std::mem::take(subjects));
      if subjects.is_empty() {
        return Err(Error::Validation(
          "at least one subject is required".into(),
        ));
      }
    }
    if let Some(s) = self.salary {
      validate_salary(s)?;
    }
    Ok(self)
  }
}

// ─── Validation helpers ──────────────────────────────────────────────────────

pub fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}

fn normalize_subjects(subjects: Vec<String>) -> Vec<String> {
  subjects
    .into_iter()
    .map(|s| s.trim().to_owned())
    .filter(|s| !s.is_empty())
    .collect()
}

fn validate_age(age: u8) -> Result<()> {
  if !(AGE_MIN..=AGE_MAX).contains(&age) {
    return Err(Error::Validation(format!(
      "age must be between {AGE_MIN} and {AGE_MAX}, got {age}"
    )));
  }
  Ok(())
}

fn validate_salary(salary: f64) -> Result<()> {
  if !salary.is_finite() || salary < 0.0 {
    return Err(Error::Validation(format!(
      "salary must be non-negative, got {salary}"
    )));
  }
  Ok(())
}

// ─── Read model ──────────────────────────────────────────────────────────────

/// The expanded read model: a record with its creator resolved. This is
/// what list/get/search return and what the list cache stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordView {
  pub record:          PersonRecord,
  /// Resolved creator identity; `None` when the identity no longer exists.
  pub creator:         Option<IdentitySummary>,
  pub attendance_rate: f64,
}

impl RecordView {
  pub fn new(record: PersonRecord, creator: Option<IdentitySummary>) -> Self {
    let attendance_rate = record.attendance_rate();
    Self { record, creator, attendance_rate }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
