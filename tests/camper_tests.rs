use camp_signup::models::{
    Activity, Camper, CreateCamperRequest, Signup, UpdateCamperRequest, validate_age,
    validate_name,
};
use camp_signup::orm::{Db, auto_migrate};
use camp_signup::settings::DatabaseSettings;
use camp_signup::{Error, ValidationError};
use serde_json::json;
use std::sync::Arc;

async fn migrated_db() -> Arc<Db> {
    let db = Arc::new(Db::connect_with(&DatabaseSettings::in_memory()).await.unwrap());
    auto_migrate(db.clone()).await.unwrap();
    db
}

const AGE_MESSAGE: &str = "Camper must have an age between 8 and 18 years old.";
const NAME_MESSAGE: &str = "Camper must have a name longer than 0 characters.";

#[test]
fn test_age_bounds_are_inclusive() {
    assert_eq!(validate_age(Some(8)), Ok(8));
    assert_eq!(validate_age(Some(18)), Ok(18));
    for age in [-1, 0, 5, 7, 19, 100] {
        let err = validate_age(Some(age)).unwrap_err();
        assert_eq!(err.field, "age");
        assert_eq!(err.to_string(), AGE_MESSAGE);
    }
    assert!(validate_age(None).is_err());
}

#[test]
fn test_name_must_be_present_and_non_empty() {
    assert_eq!(validate_name(Some("Max")), Ok("Max"));
    assert_eq!(validate_name(Some(" ")), Ok(" "));
    assert_eq!(
        validate_name(Some("")),
        Err(ValidationError::new("name", NAME_MESSAGE))
    );
    assert!(validate_name(None).is_err());
}

#[test]
fn test_new_camper_validates_both_fields() {
    let camper = Camper::new("Max", 12).unwrap();
    assert_eq!(camper.name(), "Max");
    assert_eq!(camper.age(), 12);
    assert_eq!(camper.id(), None);

    assert_eq!(Camper::new("", 12).unwrap_err().field, "name");
    assert_eq!(Camper::new("Max", 5).unwrap_err().field, "age");
    assert_eq!(Camper::new("Max", 0).unwrap_err().field, "age");
}

#[test]
fn test_rejected_assignment_leaves_camper_unchanged() {
    let mut camper = Camper::new("Max", 12).unwrap();

    assert!(camper.set_age(19).is_err());
    assert!(camper.set_name("").is_err());
    assert_eq!(camper.age(), 12);
    assert_eq!(camper.name(), "Max");

    camper.set_age(15).unwrap();
    camper.set_name("Maxine").unwrap();
    assert_eq!(camper.age(), 15);
    assert_eq!(camper.name(), "Maxine");
}

#[test]
fn test_create_request_treats_missing_fields_as_absent() {
    let req: CreateCamperRequest = serde_json::from_value(json!({"name": "Ana"})).unwrap();
    assert_eq!(req.into_camper().unwrap_err().field, "age");

    let req: CreateCamperRequest = serde_json::from_value(json!({"age": 10})).unwrap();
    assert_eq!(req.into_camper().unwrap_err().field, "name");

    let req: CreateCamperRequest =
        serde_json::from_value(json!({"name": "Ana", "age": 10})).unwrap();
    let camper = req.into_camper().unwrap();
    assert_eq!((camper.name(), camper.age()), ("Ana", 10));
}

#[test]
fn test_update_request_is_all_or_nothing() {
    let mut camper = Camper::new("Max", 12).unwrap();

    let req = UpdateCamperRequest {
        name: Some("Maxwell".into()),
        age: Some(30),
    };
    assert_eq!(req.apply(&mut camper).unwrap_err().field, "age");
    assert_eq!(camper.name(), "Max");

    let req = UpdateCamperRequest {
        name: None,
        age: Some(13),
    };
    req.apply(&mut camper).unwrap();
    assert_eq!((camper.name(), camper.age()), ("Max", 13));
}

#[tokio::test]
async fn test_save_assigns_id_and_updates() {
    let db = migrated_db().await;

    let mut camper = Camper::new("Max", 12).unwrap();
    camper.save(&db).await.unwrap();
    let id = camper.id().expect("id assigned on insert");

    camper.set_age(13).unwrap();
    camper.save(&db).await.unwrap();

    let stored = Camper::get(&db, id).await.unwrap();
    assert_eq!(stored.age(), 13);
    assert_eq!(Camper::all(&db).await.unwrap().len(), 1);
    assert!(Camper::find(&db, id + 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_cascades_to_signups() {
    let db = migrated_db().await;

    let mut max = Camper::new("Max", 12).unwrap();
    max.save(&db).await.unwrap();
    let mut ana = Camper::new("Ana", 9).unwrap();
    ana.save(&db).await.unwrap();
    let mut archery = Activity::new("Archery", 3);
    archery.save(&db).await.unwrap();

    let max_id = max.id().unwrap();
    let archery_id = archery.id().unwrap();
    for time in [9, 10, 11] {
        Signup::new(time, max_id, archery_id)
            .unwrap()
            .save(&db)
            .await
            .unwrap();
    }
    let mut kept = Signup::new(14, ana.id().unwrap(), archery_id).unwrap();
    kept.save(&db).await.unwrap();

    let removed = Camper::delete(&db, max_id).await.unwrap();
    assert_eq!(removed.len(), 3);

    assert!(Camper::find(&db, max_id).await.unwrap().is_none());
    let remaining = Signup::all(&db).await.unwrap();
    assert_eq!(remaining, vec![kept]);
    assert!(remaining.iter().all(|s| s.camper_id() != Some(max_id)));
    assert!(Activity::find(&db, archery_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_missing_camper_is_not_found() {
    let db = migrated_db().await;
    let err = Camper::delete(&db, 42).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { table: "campers", id: 42 }));
}

#[tokio::test]
async fn test_update_of_deleted_camper_is_not_found() {
    let db = migrated_db().await;
    let mut camper = Camper::new("Max", 12).unwrap();
    camper.save(&db).await.unwrap();
    Camper::delete(&db, camper.id().unwrap()).await.unwrap();

    camper.set_age(14).unwrap();
    let err = camper.save(&db).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { table: "campers", .. }));
}

#[tokio::test]
async fn test_activities_are_derived_from_signups() {
    let db = migrated_db().await;

    let mut camper = Camper::new("Max", 12).unwrap();
    assert!(camper.activities(&db).await.unwrap().is_empty());
    camper.save(&db).await.unwrap();

    let mut archery = Activity::new("Archery", 3);
    archery.save(&db).await.unwrap();
    let mut canoe = Activity::new("Canoeing", 2);
    canoe.save(&db).await.unwrap();

    let camper_id = camper.id().unwrap();
    let mut first = Signup::new(15, camper_id, canoe.id().unwrap()).unwrap();
    first.save(&db).await.unwrap();
    let mut second = Signup::new(9, camper_id, archery.id().unwrap()).unwrap();
    second.save(&db).await.unwrap();

    let names: Vec<Option<String>> = camper
        .activities(&db)
        .await
        .unwrap()
        .iter()
        .map(|a| a.name().map(str::to_string))
        .collect();
    assert_eq!(
        names,
        vec![Some("Canoeing".to_string()), Some("Archery".to_string())]
    );

    // No stored copy: removing a signup is reflected immediately.
    Signup::delete(&db, first.id().unwrap()).await.unwrap();
    let activities = camper.activities(&db).await.unwrap();
    assert_eq!(activities, vec![archery]);
}

#[tokio::test]
async fn test_failed_delete_keeps_camper_and_signups() {
    let db = migrated_db().await;

    let mut camper = Camper::new("Max", 12).unwrap();
    camper.save(&db).await.unwrap();
    let mut archery = Activity::new("Archery", 3);
    archery.save(&db).await.unwrap();
    let camper_id = camper.id().unwrap();
    for time in [9, 10] {
        Signup::new(time, camper_id, archery.id().unwrap())
            .unwrap()
            .save(&db)
            .await
            .unwrap();
    }

    // The parent DELETE runs after the signups are gone, so aborting it
    // exercises rollback of the cascade step.
    db.execute(
        "CREATE TRIGGER lock_campers BEFORE DELETE ON campers \
         BEGIN SELECT RAISE(ABORT, 'campers are locked'); END",
    )
    .await
    .unwrap();

    let err = Camper::delete(&db, camper_id).await.unwrap_err();
    assert!(matches!(err, Error::Database(_)), "got {:?}", err);

    assert!(Camper::find(&db, camper_id).await.unwrap().is_some());
    assert_eq!(camper.signups(&db).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_stored_row_with_missing_age_is_rejected_on_load() {
    let db = migrated_db().await;
    db.execute("INSERT INTO campers (name) VALUES ('Legacy')")
        .await
        .unwrap();

    let err = Camper::all(&db).await.unwrap_err();
    match err {
        Error::Validation(invalid) => {
            assert_eq!(invalid.field, "age");
            assert_eq!(invalid.to_string(), AGE_MESSAGE);
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
    assert!(matches!(
        Camper::find(&db, 1).await.unwrap_err(),
        Error::Validation(ValidationError { field: "age", .. })
    ));
}

#[tokio::test]
async fn test_stored_row_with_out_of_range_age_is_rejected_on_load() {
    let db = migrated_db().await;
    db.execute("INSERT INTO campers (name, age) VALUES ('Grown', 40)")
        .await
        .unwrap();

    assert!(matches!(
        Camper::get(&db, 1).await.unwrap_err(),
        Error::Validation(ValidationError { field: "age", .. })
    ));
}
