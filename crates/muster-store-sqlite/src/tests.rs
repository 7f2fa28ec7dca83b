//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use muster_core::{
  identity::{NewIdentity, Role},
  person::{AttendanceStatus, NewAttendanceEntry, NewPersonRecord, RecordPatch},
  query::{RecordQuery, SortDirection, SortField, SortSpec},
  store::{AggregateSpec, RecordStore},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// Every person row references its creating identity, so tests seed one.
async fn seed_admin(s: &SqliteStore) -> Uuid {
  let identity = s
    .insert_identity(NewIdentity {
      email:         "admin@example.com".into(),
      password_hash: "$argon2id$stub".into(),
      role:          Role::Admin,
      person_id:     None,
    })
    .await
    .unwrap();
  identity.identity_id
}

fn new_person(email: &str) -> NewPersonRecord {
  NewPersonRecord {
    first_name:  "Jane".into(),
    last_name:   "Smith".into(),
    email:       email.into(),
    age:         28,
    class_group: "Grade 10".into(),
    subjects:    vec!["Math".into(), "Physics".into()],
    salary:      None,
    department:  None,
  }
}

fn active_query() -> RecordQuery {
  RecordQuery { is_active: Some(true), ..RecordQuery::default() }
}

// ─── Insert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_assigns_sequential_codes() {
  let s = store().await;
  let admin = seed_admin(&s).await;

  let first = s.insert(new_person("a@example.com"), admin).await.unwrap();
  let second = s.insert(new_person("b@example.com"), admin).await.unwrap();

  assert_eq!(first.code, "PER-0001");
  assert_eq!(second.code, "PER-0002");
  assert!(first.is_active);
  assert!(first.attendance.is_empty());
  assert_eq!(first.created_by, admin);
}

#[tokio::test]
async fn insert_duplicate_email_is_rejected() {
  let s = store().await;
  let admin = seed_admin(&s).await;

  s.insert(new_person("jane@example.com"), admin).await.unwrap();
  let err = s
    .insert(new_person("jane@example.com"), admin)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate(_)), "got: {err}");

  let total = s.count(&RecordQuery::default()).await.unwrap();
  assert_eq!(total, 1);
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_by_id_roundtrip() {
  let s = store().await;
  let admin = seed_admin(&s).await;
  let inserted = s.insert(new_person("jane@example.com"), admin).await.unwrap();

  let fetched = s.find_by_id(inserted.person_id).await.unwrap().unwrap();
  assert_eq!(fetched.person_id, inserted.person_id);
  assert_eq!(fetched.email, "jane@example.com");
  assert_eq!(fetched.subjects, vec!["Math", "Physics"]);
}

#[tokio::test]
async fn find_by_id_missing_returns_none() {
  let s = store().await;
  assert!(s.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn find_by_email_is_case_insensitive() {
  let s = store().await;
  let admin = seed_admin(&s).await;
  s.insert(new_person("jane@example.com"), admin).await.unwrap();

  let found = s.find_by_email("Jane@Example.COM").await.unwrap();
  assert!(found.is_some());
}

#[tokio::test]
async fn find_filters_compose() {
  let s = store().await;
  let admin = seed_admin(&s).await;

  let mut a = new_person("a@example.com");
  a.age = 25;
  a.department = Some("Science".into());
  s.insert(a, admin).await.unwrap();

  let mut b = new_person("b@example.com");
  b.age = 40;
  b.department = Some("Science".into());
  b.subjects = vec!["History".into()];
  s.insert(b, admin).await.unwrap();

  let mut c = new_person("c@example.com");
  c.age = 40;
  c.department = Some("Arts".into());
  s.insert(c, admin).await.unwrap();

  let query = RecordQuery {
    department: Some("Science".into()),
    age_min: Some(30),
    ..RecordQuery::default()
  };
  let found = s
    .find(&query, &SortSpec::default(), 0, 10)
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].email, "b@example.com");
  assert_eq!(s.count(&query).await.unwrap(), 1);
}

#[tokio::test]
async fn find_filters_by_subject_membership() {
  let s = store().await;
  let admin = seed_admin(&s).await;

  s.insert(new_person("a@example.com"), admin).await.unwrap();
  let mut b = new_person("b@example.com");
  b.subjects = vec!["History".into()];
  s.insert(b, admin).await.unwrap();

  let query =
    RecordQuery { subject: Some("Math".into()), ..RecordQuery::default() };
  let found = s.find(&query, &SortSpec::default(), 0, 10).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].email, "a@example.com");
}

#[tokio::test]
async fn find_sorts_and_paginates() {
  let s = store().await;
  let admin = seed_admin(&s).await;

  for (email, age) in
    [("a@x.com", 30), ("b@x.com", 20), ("c@x.com", 40), ("d@x.com", 25)]
  {
    let mut p = new_person(email);
    p.age = age;
    s.insert(p, admin).await.unwrap();
  }

  let sort =
    SortSpec { field: SortField::Age, direction: SortDirection::Asc };
  let page1 = s
    .find(&RecordQuery::default(), &sort, 0, 2)
    .await
    .unwrap();
  let page2 = s
    .find(&RecordQuery::default(), &sort, 2, 2)
    .await
    .unwrap();

  let ages: Vec<u8> =
    page1.iter().chain(page2.iter()).map(|p| p.age).collect();
  assert_eq!(ages, vec![20, 25, 30, 40]);
}

#[tokio::test]
async fn text_search_matches_name_and_code() {
  let s = store().await;
  let admin = seed_admin(&s).await;
  let mut p = new_person("ada@example.com");
  p.first_name = "Ada".into();
  p.last_name = "Lovelace".into();
  s.insert(p, admin).await.unwrap();
  s.insert(new_person("other@example.com"), admin).await.unwrap();

  let (items, total) = s.text_search("lovelace", 0, 10).await.unwrap();
  assert_eq!(total, 1);
  assert_eq!(items[0].email, "ada@example.com");

  // Codes are searchable too.
  let (items, total) = s.text_search("PER-0001", 0, 10).await.unwrap();
  assert_eq!(total, 1);
  assert_eq!(items[0].first_name, "Ada");
}

// ─── Updates ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_by_id_patches_fields() {
  let s = store().await;
  let admin = seed_admin(&s).await;
  let rec = s.insert(new_person("jane@example.com"), admin).await.unwrap();

  let patch = RecordPatch {
    class_group: Some("Grade 11".into()),
    salary: Some(52_000.0),
    ..RecordPatch::default()
  };
  let updated = s.update_by_id(rec.person_id, patch).await.unwrap().unwrap();

  assert_eq!(updated.class_group, "Grade 11");
  assert_eq!(updated.salary, Some(52_000.0));
  // Untouched fields survive.
  assert_eq!(updated.email, "jane@example.com");
  assert_eq!(updated.code, rec.code);
  assert!(updated.updated_at >= rec.updated_at);
}

#[tokio::test]
async fn update_by_id_missing_returns_none() {
  let s = store().await;
  let patch =
    RecordPatch { age: Some(30), ..RecordPatch::default() };
  assert!(s.update_by_id(Uuid::new_v4(), patch).await.unwrap().is_none());
}

#[tokio::test]
async fn update_soft_delete_keeps_row() {
  let s = store().await;
  let admin = seed_admin(&s).await;
  let rec = s.insert(new_person("jane@example.com"), admin).await.unwrap();

  let patch =
    RecordPatch { is_active: Some(false), ..RecordPatch::default() };
  s.update_by_id(rec.person_id, patch).await.unwrap().unwrap();

  assert_eq!(s.count(&active_query()).await.unwrap(), 0);
  assert_eq!(s.count(&RecordQuery::default()).await.unwrap(), 1);

  // The email is still taken by the inactive row.
  let err = s
    .insert(new_person("jane@example.com"), admin)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate(_)));
}

#[tokio::test]
async fn update_many_reports_affected_count() {
  let s = store().await;
  let admin = seed_admin(&s).await;
  let a = s.insert(new_person("a@example.com"), admin).await.unwrap();
  let b = s.insert(new_person("b@example.com"), admin).await.unwrap();

  let patch =
    RecordPatch { department: Some("Science".into()), ..RecordPatch::default() };
  let affected = s
    .update_many(&[a.person_id, b.person_id, Uuid::new_v4()], &patch)
    .await
    .unwrap();
  assert_eq!(affected, 2);

  let query = RecordQuery {
    department: Some("Science".into()),
    ..RecordQuery::default()
  };
  assert_eq!(s.count(&query).await.unwrap(), 2);
}

// ─── Attendance ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_attendance_preserves_order() {
  let s = store().await;
  let admin = seed_admin(&s).await;
  let rec = s.insert(new_person("jane@example.com"), admin).await.unwrap();

  for (day, status) in [
    (2, AttendanceStatus::Present),
    (3, AttendanceStatus::Absent),
    (4, AttendanceStatus::Late),
  ] {
    s.append_attendance(rec.person_id, NewAttendanceEntry {
      date:    NaiveDate::from_ymd_opt(2024, 9, day).unwrap(),
      status,
      remarks: None,
    })
    .await
    .unwrap()
    .unwrap();
  }

  let fetched = s.find_by_id(rec.person_id).await.unwrap().unwrap();
  assert_eq!(fetched.attendance.len(), 3);
  let statuses: Vec<_> =
    fetched.attendance.iter().map(|e| e.status).collect();
  assert_eq!(statuses, vec![
    AttendanceStatus::Present,
    AttendanceStatus::Absent,
    AttendanceStatus::Late,
  ]);
}

#[tokio::test]
async fn append_attendance_missing_person_returns_none() {
  let s = store().await;
  let result = s
    .append_attendance(Uuid::new_v4(), NewAttendanceEntry {
      date:    NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
      status:  AttendanceStatus::Present,
      remarks: None,
    })
    .await
    .unwrap();
  assert!(result.is_none());
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn aggregate_record_counts_and_average_age() {
  let s = store().await;
  let admin = seed_admin(&s).await;

  let mut a = new_person("a@example.com");
  a.age = 20;
  s.insert(a, admin).await.unwrap();
  let mut b = new_person("b@example.com");
  b.age = 40;
  let b = s.insert(b, admin).await.unwrap();

  let patch =
    RecordPatch { is_active: Some(false), ..RecordPatch::default() };
  s.update_by_id(b.person_id, patch).await.unwrap();

  let counts = s.aggregate(AggregateSpec::RecordCounts).await.unwrap();
  assert_eq!(counts[0].label.as_deref(), Some("total"));
  assert_eq!(counts[0].value, 2.0);
  assert_eq!(counts[1].label.as_deref(), Some("active"));
  assert_eq!(counts[1].value, 1.0);

  // Average spans inactive records too.
  let avg = s.aggregate(AggregateSpec::AverageAge).await.unwrap();
  assert_eq!(avg[0].value, 30.0);
}

#[tokio::test]
async fn aggregate_attendance_totals() {
  let s = store().await;
  let admin = seed_admin(&s).await;
  let rec = s.insert(new_person("jane@example.com"), admin).await.unwrap();

  // Empty register: totals are zero, not an error.
  let totals = s.aggregate(AggregateSpec::AttendanceTotals).await.unwrap();
  assert_eq!(totals[0].value, 0.0);
  assert_eq!(totals[1].value, 0.0);

  for status in [
    AttendanceStatus::Present,
    AttendanceStatus::Present,
    AttendanceStatus::Absent,
  ] {
    s.append_attendance(rec.person_id, NewAttendanceEntry {
      date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
      status,
      remarks: None,
    })
    .await
    .unwrap();
  }

  let totals = s.aggregate(AggregateSpec::AttendanceTotals).await.unwrap();
  assert_eq!(totals[0].value, 3.0);
  assert_eq!(totals[1].value, 2.0);
}

#[tokio::test]
async fn aggregate_active_by_department_excludes_null_and_inactive() {
  let s = store().await;
  let admin = seed_admin(&s).await;

  let mut a = new_person("a@example.com");
  a.department = Some("Science".into());
  s.insert(a, admin).await.unwrap();

  let mut b = new_person("b@example.com");
  b.department = Some("Science".into());
  let b = s.insert(b, admin).await.unwrap();
  let patch =
    RecordPatch { is_active: Some(false), ..RecordPatch::default() };
  s.update_by_id(b.person_id, patch).await.unwrap();

  // No department: excluded from the breakdown entirely.
  s.insert(new_person("c@example.com"), admin).await.unwrap();

  let rows = s
    .aggregate(AggregateSpec::ActiveByDepartment)
    .await
    .unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].label.as_deref(), Some("Science"));
  assert_eq!(rows[0].value, 1.0);
}

// ─── Identities ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn identity_roundtrip_and_bulk_lookup() {
  let s = store().await;

  let a = s
    .insert_identity(NewIdentity {
      email:         "A@Example.com".into(),
      password_hash: "$argon2id$stub".into(),
      role:          Role::Member,
      person_id:     None,
    })
    .await
    .unwrap();
  // Email is stored lowercase.
  assert_eq!(a.email, "a@example.com");

  let found = s.identity_by_email("a@example.com").await.unwrap().unwrap();
  assert_eq!(found.identity_id, a.identity_id);
  assert_eq!(found.role, Role::Member);
  assert!(found.last_login_at.is_none());

  let bulk = s
    .identities_by_ids(&[a.identity_id, Uuid::new_v4()])
    .await
    .unwrap();
  assert_eq!(bulk.len(), 1);
}

#[tokio::test]
async fn duplicate_identity_email_rejected() {
  let s = store().await;
  seed_admin(&s).await;

  let err = s
    .insert_identity(NewIdentity {
      email:         "admin@example.com".into(),
      password_hash: "$argon2id$other".into(),
      role:          Role::Member,
      person_id:     None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Duplicate(_)));
}

#[tokio::test]
async fn touch_last_login_stamps_timestamp() {
  let s = store().await;
  let admin = seed_admin(&s).await;

  s.touch_last_login(admin).await.unwrap();
  let found = s
    .identity_by_email("admin@example.com")
    .await
    .unwrap()
    .unwrap();
  assert!(found.last_login_at.is_some());
}
