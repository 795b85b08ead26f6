//! Integration tests for `SqliteStore` against an in-memory database.

use pharmacy_core::{
  medicine::MedicineInput,
  store::{CredentialStore, MedicineStore, StoreError as _},
  user::NewUser,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_user(name: &str) -> NewUser {
  NewUser {
    username:      name.into(),
    password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
  }
}

fn aspirin() -> MedicineInput {
  MedicineInput {
    name:        "Aspirin".into(),
    description: "Pain relief".into(),
    price:       4.99,
    quantity:    100,
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_user() {
  let s = store().await;

  let user = s.insert(new_user("alice")).await.unwrap();
  assert!(user.id > 0);

  let by_name = s.find_by_name("alice").await.unwrap().unwrap();
  assert_eq!(by_name.id, user.id);
  assert_eq!(by_name.password_hash, user.password_hash);

  let by_id = s.find_by_id(user.id).await.unwrap().unwrap();
  assert_eq!(by_id.username, "alice");
}

#[tokio::test]
async fn find_missing_user_returns_none() {
  let s = store().await;
  assert!(s.find_by_name("nobody").await.unwrap().is_none());
  assert!(s.find_by_id(42).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_is_reported_as_duplicate() {
  let s = store().await;
  s.insert(new_user("alice")).await.unwrap();

  let err = s.insert(new_user("alice")).await.unwrap_err();
  assert!(err.is_duplicate(), "unexpected error: {err}");
  assert_eq!(s.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn distinct_users_get_distinct_ids() {
  let s = store().await;
  let a = s.insert(new_user("alice")).await.unwrap();
  let b = s.insert(new_user("bob")).await.unwrap();
  assert_ne!(a.id, b.id);
  assert_eq!(s.count_users().await.unwrap(), 2);
}

// ─── Medicines ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_medicine() {
  let s = store().await;

  let created = s.create(aspirin()).await.unwrap();
  assert_eq!(created.name, "Aspirin");
  assert_eq!(created.created_at, created.updated_at);

  let fetched = s.get(created.id).await.unwrap().unwrap();
  assert_eq!(fetched.id, created.id);
  assert_eq!(fetched.quantity, 100);
  assert_eq!(fetched.description, "Pain relief");
}

#[tokio::test]
async fn list_is_ordered_by_id() {
  let s = store().await;
  let first = s.create(aspirin()).await.unwrap();
  let second = s
    .create(MedicineInput { name: "Ibuprofen".into(), ..aspirin() })
    .await
    .unwrap();

  let all = s.list().await.unwrap();
  let ids: Vec<i64> = all.iter().map(|m| m.id).collect();
  assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test]
async fn update_replaces_every_field() {
  let s = store().await;
  let created = s.create(aspirin()).await.unwrap();

  let updated = s
    .update(created.id, MedicineInput {
      name:        "Aspirin Forte".into(),
      description: "Stronger".into(),
      price:       7.5,
      quantity:    20,
    })
    .await
    .unwrap()
    .unwrap();

  assert_eq!(updated.name, "Aspirin Forte");
  assert_eq!(updated.description, "Stronger");
  assert_eq!(updated.price, 7.5);
  assert_eq!(updated.quantity, 20);
  assert_eq!(updated.created_at, created.created_at);
  assert!(updated.updated_at >= created.updated_at);
}

#[tokio::test]
async fn update_missing_returns_none() {
  let s = store().await;
  assert!(s.update(999, aspirin()).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_is_soft_and_hides_the_row() {
  let s = store().await;
  let created = s.create(aspirin()).await.unwrap();

  assert!(s.delete(created.id).await.unwrap());
  assert!(s.get(created.id).await.unwrap().is_none());
  assert!(s.list().await.unwrap().is_empty());

  // Deleting twice, or updating a deleted row, finds nothing.
  assert!(!s.delete(created.id).await.unwrap());
  assert!(s.update(created.id, aspirin()).await.unwrap().is_none());
}
