//! SQL schemas for the metadata store and for spatial namespaces.
//!
//! Executed once per connection. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Metadata store DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    username      TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

-- A project is 'pending' while its import runs and 'committed' afterwards.
-- Only committed rows are ever read back.
CREATE TABLE IF NOT EXISTS projects (
    project_name TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    owner        TEXT NOT NULL REFERENCES users(username),
    domain       TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT '',
    keywords     TEXT NOT NULL DEFAULT '[]',   -- JSON array
    category     TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    state        TEXT NOT NULL DEFAULT 'pending',
    qgs_path     TEXT,
    tree_path    TEXT,
    CHECK (state IN ('pending', 'committed'))
);

CREATE TABLE IF NOT EXISTS layers (
    layer_id          TEXT PRIMARY KEY,
    project_name      TEXT NOT NULL REFERENCES projects(project_name),
    display_name      TEXT NOT NULL,
    source_table_name TEXT NOT NULL,
    geometry_type     TEXT NOT NULL,
    feature_count     INTEGER NOT NULL,
    extent            TEXT NOT NULL,               -- JSON [xmin, ymin, xmax, ymax]
    published         INTEGER NOT NULL DEFAULT 0,
    public            INTEGER NOT NULL DEFAULT 0,
    is_app            INTEGER NOT NULL DEFAULT 1,
    created_at        TEXT NOT NULL,
    UNIQUE (project_name, source_table_name)
);

CREATE INDEX IF NOT EXISTS projects_owner_idx ON projects(owner);
CREATE INDEX IF NOT EXISTS layers_project_idx ON layers(project_name);

PRAGMA user_version = 1;
";

/// DDL run once when a spatial namespace is created.
pub const NAMESPACE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS geometry_tables (
    table_name    TEXT PRIMARY KEY,
    crs           TEXT NOT NULL,
    feature_count INTEGER NOT NULL,
    loaded_at     TEXT NOT NULL
);
";
