//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::HashSet, path::PathBuf};

use geoproj_core::{
  dataset::{DatasetInfo, Extent, GeometryType},
  layer::NewLayer,
  project::{ProjectArtifacts, ProjectMeta},
  store::ProjectStore,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  let s = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  s.add_user("alice", "$argon2id$fake").await.unwrap();
  s
}

fn meta(display_name: &str) -> ProjectMeta {
  ProjectMeta {
    display_name: display_name.into(),
    domain:       "parks".into(),
    description:  "city parks".into(),
    keywords:     vec!["green".into(), "city".into()],
    category:     "Other".into(),
  }
}

fn artifacts(project: &str) -> ProjectArtifacts {
  ProjectArtifacts {
    qgs_path:  PathBuf::from(format!("/srv/{project}/{project}.qgs")),
    tree_path: PathBuf::from(format!("/srv/{project}/tree.json")),
  }
}

fn layer(project: &str, name: &str) -> NewLayer {
  NewLayer {
    project_name:      project.into(),
    display_name:      name.into(),
    source_table_name: format!("{project}_{name}"),
    info:              DatasetInfo {
      geometry_type: GeometryType::Polygon,
      feature_count: 42,
      extent:        Extent::from([0.0, 0.0, 100.0, 100.0]),
    },
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_find_user() {
  let s = store().await;

  let found = s.find_user("alice").await.unwrap().unwrap();
  assert_eq!(found.username, "alice");
  assert_eq!(found.password_hash, "$argon2id$fake");

  assert!(s.find_user("bob").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_user_is_rejected() {
  let s = store().await;
  let err = s.add_user("alice", "other").await.unwrap_err();
  assert!(matches!(err, Error::UserExists(ref u) if u == "alice"));
}

// ─── Reservation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reservation_suffixes_taken_names() {
  let s = store().await;

  let first  = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  let second = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  let third  = s.reserve_project("alice", &meta("parkplan!"), 10).await.unwrap();

  assert_eq!(first.project_name, "parkplan");
  assert_eq!(second.project_name, "parkplan_1");
  assert_eq!(third.project_name, "parkplan_2");
  assert_eq!(second.display_name, "Parkplan");
}

#[tokio::test]
async fn reservation_gives_up_after_max_attempts() {
  let s = store().await;
  s.reserve_project("alice", &meta("Parkplan"), 2).await.unwrap();
  s.reserve_project("alice", &meta("Parkplan"), 2).await.unwrap();

  let err = s.reserve_project("alice", &meta("Parkplan"), 2).await.unwrap_err();
  assert!(matches!(err, Error::NamesExhausted { attempts: 2, .. }));
}

#[tokio::test]
async fn concurrent_reservations_get_distinct_names() {
  let s = store().await;

  let handles: Vec<_> = (0..10)
    .map(|_| {
      let s = s.clone();
      tokio::spawn(async move {
        s.reserve_project("alice", &meta("Parkplan"), 100).await
      })
    })
    .collect();

  let mut names = HashSet::new();
  for h in handles {
    let record = h.await.unwrap().unwrap();
    assert!(names.insert(record.project_name));
  }
  assert_eq!(names.len(), 10);
  assert!(names.contains("parkplan"));
  assert!(names.contains("parkplan_9"));
}

#[tokio::test]
async fn reservation_requires_known_owner() {
  let s = store().await;
  assert!(s.reserve_project("mallory", &meta("Parkplan"), 10).await.is_err());
}

// ─── Visibility ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn pending_projects_are_invisible() {
  let s = store().await;
  let p = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  s.register_layer(layer(&p.project_name, "Trees")).await.unwrap();

  assert!(s.get_project(&p.project_name).await.unwrap().is_none());
  assert!(s.list_projects("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn commit_makes_project_visible() {
  let s = store().await;
  let p = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  s.register_layer(layer(&p.project_name, "Trees")).await.unwrap();
  s.register_layer(layer(&p.project_name, "Paths")).await.unwrap();

  let committed = s
    .commit_project(&p.project_name, &artifacts(&p.project_name))
    .await
    .unwrap();
  assert_eq!(committed.artifacts, Some(artifacts("parkplan")));
  assert_eq!(committed.keywords, vec!["green", "city"]);

  let fetched = s.get_project("parkplan").await.unwrap().unwrap();
  assert_eq!(fetched.owner, "alice");
  assert_eq!(s.list_projects("alice").await.unwrap().len(), 1);

  let layers = s.list_layers("parkplan").await.unwrap();
  let names: Vec<_> = layers.iter().map(|l| l.display_name.as_str()).collect();
  assert_eq!(names, ["Trees", "Paths"]);
}

#[tokio::test]
async fn commit_twice_fails() {
  let s = store().await;
  let p = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  s.commit_project(&p.project_name, &artifacts("parkplan")).await.unwrap();

  let err = s
    .commit_project(&p.project_name, &artifacts("parkplan"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ProjectNotPending(_)));
}

#[tokio::test]
async fn list_projects_is_per_owner() {
  let s = store().await;
  s.add_user("bob", "hash").await.unwrap();

  let a = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  let b = s.reserve_project("bob", &meta("Rivers"), 10).await.unwrap();
  s.commit_project(&a.project_name, &artifacts("a")).await.unwrap();
  s.commit_project(&b.project_name, &artifacts("b")).await.unwrap();

  let mine = s.list_projects("alice").await.unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0].project_name, "parkplan");
}

// ─── Discard & sweep ─────────────────────────────────────────────────────────

#[tokio::test]
async fn discard_frees_the_name() {
  let s = store().await;
  let p = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  s.register_layer(layer(&p.project_name, "Trees")).await.unwrap();

  s.discard_project(&p.project_name).await.unwrap();
  assert!(s.list_layers(&p.project_name).await.unwrap().is_empty());

  let again = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  assert_eq!(again.project_name, "parkplan");
}

#[tokio::test]
async fn discard_leaves_committed_projects_alone() {
  let s = store().await;
  let p = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  s.register_layer(layer(&p.project_name, "Trees")).await.unwrap();
  s.commit_project(&p.project_name, &artifacts("parkplan")).await.unwrap();

  s.discard_project(&p.project_name).await.unwrap();
  assert!(s.get_project("parkplan").await.unwrap().is_some());
  assert_eq!(s.list_layers("parkplan").await.unwrap().len(), 1);
}

#[tokio::test]
async fn sweep_removes_only_pending() {
  let s = store().await;
  let kept = s.reserve_project("alice", &meta("Kept"), 10).await.unwrap();
  s.commit_project(&kept.project_name, &artifacts("kept")).await.unwrap();
  let stale = s.reserve_project("alice", &meta("Stale"), 10).await.unwrap();
  s.register_layer(layer(&stale.project_name, "Trees")).await.unwrap();

  let swept = s.sweep_pending().await.unwrap();
  assert_eq!(swept, vec!["stale".to_owned()]);
  assert!(s.list_layers("stale").await.unwrap().is_empty());
  assert!(s.get_project("kept").await.unwrap().is_some());

  assert!(s.sweep_pending().await.unwrap().is_empty());
}

// ─── Layers ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn registered_layers_start_unpublished() {
  let s = store().await;
  let p = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();

  let record = s.register_layer(layer(&p.project_name, "Trees")).await.unwrap();
  assert!(!record.visibility.published);
  assert!(!record.visibility.public);
  assert!(record.visibility.is_app);

  let stored = &s.list_layers(&p.project_name).await.unwrap()[0];
  assert_eq!(stored.layer_id, record.layer_id);
  assert_eq!(stored.source_table_name, "parkplan_Trees");
  assert_eq!(stored.feature_count, 42);
  assert_eq!(stored.geometry_type, GeometryType::Polygon);
  assert_eq!(stored.extent, Extent::from([0.0, 0.0, 100.0, 100.0]));
  assert_eq!(stored.visibility, record.visibility);
}

#[tokio::test]
async fn duplicate_table_in_project_is_rejected() {
  let s = store().await;
  let p = s.reserve_project("alice", &meta("Parkplan"), 10).await.unwrap();
  s.register_layer(layer(&p.project_name, "Trees")).await.unwrap();
  assert!(s.register_layer(layer(&p.project_name, "Trees")).await.is_err());
}
