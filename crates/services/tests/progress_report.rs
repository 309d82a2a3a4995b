use chrono::{NaiveDate, NaiveTime};
use services::{AppServices, ProgressService};
use speech_core::model::{
    Chapter, ChapterNumber, DoctorId, Gender, Patient, PatientId, Word, WordId,
};
use storage::repository::{CurriculumRepository, InMemoryRepository, PatientRepository, Storage};

const DOCTOR: DoctorId = DoctorId::new(3);
const CODE: &str = "SP-0042";

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
}

fn at(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
}

fn chapter(number: u32, name: &str, words: &[(u64, &str)]) -> Chapter {
    let n = ChapterNumber::new(number);
    let words = words
        .iter()
        .enumerate()
        .map(|(i, (id, text))| Word::new(WordId::new(*id), n, *text, i32::try_from(i).unwrap()).unwrap())
        .collect();
    Chapter::new(n, name, words).unwrap()
}

async fn seeded() -> ProgressService {
    let repo = InMemoryRepository::new();
    let patient = Patient::new(
        PatientId::new(42),
        "Darya Moradi",
        CODE,
        Gender::Female,
        DOCTOR,
        date(1),
    )
    .unwrap();
    repo.upsert_patient(&patient).await.unwrap();

    for chapter in [
        chapter(4, "K Sound", &[(6, "kite")]),
        chapter(1, "P Sound", &[(1, "pig"), (2, "pen"), (3, "cap")]),
        chapter(3, "Z Sound", &[]),
        chapter(2, "S Sound", &[(4, "sun"), (5, "sock")]),
    ] {
        repo.upsert_chapter(&chapter).await.unwrap();
    }

    let services = AppServices::from_storage(&Storage::from_repository(repo));
    let svc = services.progress();

    let trials = [
        (1, 1, 40.0, date(1), at(8)),
        (1, 7, 55.0, date(1), at(20)),
        (1, 2, 95.0, date(2), at(9)),
        (2, 1, 65.0, date(2), at(10)),
        (4, 1, 92.0, date(3), at(9)),
        (5, 1, 90.0, date(4), at(9)),
    ];
    for (word, number, accuracy, day, time) in trials {
        svc.record_trial(DOCTOR, CODE, WordId::new(word), number, accuracy, day, time)
            .await
            .unwrap();
    }

    for day in 1..=12 {
        svc.record_session(DOCTOR, CODE, date(day), "45 min", 70.04 + f64::from(day))
            .await
            .unwrap();
    }

    (*svc).clone()
}

#[tokio::test]
async fn patient_summary_matches_dashboard_contract() {
    let svc = seeded().await;
    let report = svc.summarize_patient(DOCTOR, CODE).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["patient"]["patient_id"], CODE);
    assert_eq!(json["patient"]["first_clinic_date"], "2024-04-01");

    let chapters = json["phonemeProgress"].as_array().unwrap();
    let ids: Vec<_> = chapters.iter().map(|c| c["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 4]);

    let p = &chapters[0];
    assert_eq!(p["phoneme"], "/p/");
    assert_eq!(p["exampleWords"], serde_json::json!(["pig", "pen", "cap"]));
    assert_eq!(p["status"], "in-progress");
    assert_eq!(p["progress"], 58.7);
    assert_eq!(p["accuracy"], 80.0);
    assert_eq!(p["lastPracticed"], "2024-04-02");

    let s = &chapters[1];
    assert_eq!(s["status"], "completed");
    assert_eq!(s["progress"], 100.0);
    assert_eq!(s["accuracy"], 91.0);
    assert_eq!(s["lastPracticed"], "2024-04-04");

    let k = &chapters[2];
    assert_eq!(k["status"], "not-started");
    assert_eq!(k["progress"], 0.0);
    assert!(k["lastPracticed"].is_null());

    let stats = &json["statistics"];
    assert_eq!(stats["total_sessions"], 10);
    assert_eq!(stats["average_accuracy"], 85.5);
    assert_eq!(stats["completed_phonemes"], 1);
    assert_eq!(stats["in_progress_phonemes"], 1);
    assert_eq!(stats["not_started_phonemes"], 1);
}

#[tokio::test]
async fn recent_sessions_are_truncated_and_joined_by_date() {
    let svc = seeded().await;
    let report = svc.summarize_patient(DOCTOR, CODE).await.unwrap();

    let sessions = &report.recent_sessions;
    assert_eq!(sessions.len(), 10);
    assert_eq!(sessions[0].date, date(12));
    assert_eq!(sessions[0].accuracy, 82.0);
    assert_eq!(sessions[0].words_attempted, 0);

    let oldest = &sessions[9];
    assert_eq!(oldest.date, date(3));
    assert_eq!(oldest.words_attempted, 1);
    let labels: Vec<_> = oldest.phonemes_practiced.iter().map(|l| l.as_str()).collect();
    assert_eq!(labels, vec!["/s/"]);

    let full = svc.session_history(DOCTOR, CODE).await.unwrap();
    assert_eq!(full.len(), 12);
    assert_eq!(full[11].date, date(1));
}

#[tokio::test]
async fn word_history_is_chronological_and_ends_at_latest_trial() {
    let svc = seeded().await;
    let history = svc
        .word_trials(DOCTOR, CODE, ChapterNumber::new(1), "pig")
        .await
        .unwrap();

    let numbers: Vec<_> = history.trials.iter().map(|t| t.trial).collect();
    assert_eq!(numbers, vec![1, 7, 2]);
    assert_eq!(history.trials[2].accuracy, 95.0);
    assert_eq!(history.trials[0].month, "April");

    let json = serde_json::to_value(&history).unwrap();
    assert_eq!(json["chapter"], 1);
    assert_eq!(json["word"], "pig");
    assert_eq!(json["trials"][0]["date"], 1);
    assert_eq!(json["trials"][0]["year"], 2024);
}

#[tokio::test]
async fn graph_data_covers_every_trial_oldest_first() {
    let svc = seeded().await;
    let points = svc.graph_data(DOCTOR, CODE).await.unwrap();

    assert_eq!(points.len(), 6);
    assert_eq!(points[0].date, date(1));
    assert_eq!(points[0].word, "pig");
    assert_eq!(points[5].chapter, ChapterNumber::new(2));
}
