use chrono::Duration;
use course_core::model::{CourseId, ProgressRecord, QuizId, QuizResult, SectionId};
use course_core::time::fixed_now;
use storage::repository::ProgressRepository;
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_persists_full_record() {
    let repo = connect("memdb_roundtrip").await;
    let course = CourseId::new(1);

    let mut record = repo.initialize(course, fixed_now()).await.unwrap();
    record.mark_section_complete(SectionId::new(10), fixed_now());
    record.set_note(SectionId::new(10), "ownership moves values", fixed_now());
    record.record_quiz_result(
        QuizId::new(3),
        QuizResult::from_score(85, fixed_now()),
        fixed_now(),
    );
    repo.write(&record).await.unwrap();

    let fetched = repo.read(course).await.unwrap().expect("stored record");
    assert_eq!(fetched, record);
    assert!(fetched.is_section_complete(SectionId::new(10)));
    assert!(fetched.has_passed_quiz(QuizId::new(3)));
    assert_eq!(fetched.note(SectionId::new(10)), Some("ownership moves values"));
}

#[tokio::test]
async fn sqlite_initialize_is_idempotent() {
    let repo = connect("memdb_idempotent").await;
    let course = CourseId::new(2);

    let mut record = repo.initialize(course, fixed_now()).await.unwrap();
    record.mark_section_complete(SectionId::new(7), fixed_now());
    repo.write(&record).await.unwrap();

    let later = fixed_now() + Duration::hours(2);
    let again = repo.initialize(course, later).await.unwrap();
    assert_eq!(again, record);
    assert_eq!(again.completed_count(), 1);
}

#[tokio::test]
async fn sqlite_records_are_scoped_per_course() {
    let repo = connect("memdb_scoped").await;

    let a = repo.initialize(CourseId::new(1), fixed_now()).await.unwrap();
    let mut b = ProgressRecord::new(CourseId::new(2), fixed_now());
    b.mark_section_complete(SectionId::new(20), fixed_now());
    repo.write(&b).await.unwrap();

    assert_eq!(repo.read(CourseId::new(1)).await.unwrap().unwrap(), a);
    assert_eq!(repo.read(CourseId::new(2)).await.unwrap().unwrap(), b);
}

#[tokio::test]
async fn sqlite_malformed_payload_reads_as_absent() {
    let repo = connect("memdb_malformed").await;
    let course = CourseId::new(3);

    sqlx::query(
        "INSERT INTO progress_records (course_id, payload, last_updated) VALUES (?1, ?2, ?3)",
    )
    .bind(course.to_string())
    .bind("{not valid json")
    .bind(fixed_now())
    .execute(repo.pool())
    .await
    .unwrap();

    assert!(repo.read(course).await.unwrap().is_none());

    // Initialize recovers by replacing the unreadable row.
    let record = repo.initialize(course, fixed_now()).await.unwrap();
    assert_eq!(record.completed_count(), 0);
    assert_eq!(repo.read(course).await.unwrap().unwrap(), record);
}
