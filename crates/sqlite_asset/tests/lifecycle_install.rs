use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::Connection;
use sqlite_asset::{
    AssetDatabase, AssetDbConfig, AssetError, DbError, DirectoryResourceStore,
    MemoryResourceStore, OpenMode,
};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const DB_NAME: &str = "catalog.db";
const DB_ASSET: &str = "databases/catalog.db";

#[test]
fn first_open_installs_bundled_database_at_target_version() {
    let data_dir = tempfile::tempdir().unwrap();
    let store = MemoryResourceStore::new().with_asset(DB_ASSET, bundled_database(0));
    let db = AssetDatabase::new(AssetDbConfig::new(DB_NAME, 3, data_dir.path()), store).unwrap();

    let handle = db.open_for_write().unwrap();

    assert_eq!(handle.mode(), OpenMode::ReadWrite);
    assert_eq!(
        handle.path(),
        data_dir.path().join("databases").join(DB_NAME)
    );
    let conn = handle.lock();
    assert_eq!(schema_version(&conn), 3);
    assert_eq!(product_names(&conn), vec!["bundled".to_string()]);
}

#[test]
fn fresh_install_ignores_version_stamped_in_asset() {
    let data_dir = tempfile::tempdir().unwrap();
    let store = MemoryResourceStore::new().with_asset(DB_ASSET, bundled_database(1));
    let db = AssetDatabase::new(AssetDbConfig::new(DB_NAME, 5, data_dir.path()), store).unwrap();

    let handle = db.open_for_write().unwrap();

    assert_eq!(schema_version(&handle.lock()), 5);
}

#[test]
fn installs_from_zip_variant() {
    let data_dir = tempfile::tempdir().unwrap();
    let store =
        MemoryResourceStore::new().with_asset(format!("{DB_ASSET}.zip"), zipped(&bundled_database(0)));
    let db = AssetDatabase::new(AssetDbConfig::new(DB_NAME, 1, data_dir.path()), store).unwrap();

    let handle = db.open_for_write().unwrap();

    assert_eq!(product_names(&handle.lock()), vec!["bundled".to_string()]);
}

#[test]
fn installs_from_gzip_variant_in_asset_directory() {
    let assets = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(assets.path().join("databases")).unwrap();
    fs::write(
        assets.path().join("databases").join(format!("{DB_NAME}.gz")),
        gzipped(&bundled_database(0)),
    )
    .unwrap();
    let store = DirectoryResourceStore::new(assets.path());
    let db = AssetDatabase::new(AssetDbConfig::new(DB_NAME, 2, data_dir.path()), store).unwrap();

    let handle = db.open_for_write().unwrap();

    let conn = handle.lock();
    assert_eq!(schema_version(&conn), 2);
    assert_eq!(product_names(&conn), vec!["bundled".to_string()]);
}

#[test]
fn missing_asset_fails_with_asset_missing() {
    let data_dir = tempfile::tempdir().unwrap();
    let db = AssetDatabase::new(
        AssetDbConfig::new(DB_NAME, 1, data_dir.path()),
        MemoryResourceStore::new(),
    )
    .unwrap();

    let err = db.open_for_write().unwrap_err();

    assert!(matches!(err, DbError::Asset(AssetError::Missing { .. })));
    assert_eq!(db.open_mode(), None);
    assert!(!data_dir.path().join("databases").join(DB_NAME).exists());
}

#[test]
fn unwritable_storage_directory_fails_with_unwritable() {
    let data_dir = tempfile::tempdir().unwrap();
    let blocker = data_dir.path().join("blocker");
    fs::write(&blocker, b"a file, not a directory").unwrap();
    let store = MemoryResourceStore::new().with_asset(DB_ASSET, bundled_database(0));
    let config = AssetDbConfig::new(DB_NAME, 1, data_dir.path()).with_storage_dir(blocker.join("db"));
    let db = AssetDatabase::new(config, store).unwrap();

    let err = db.open_for_write().unwrap_err();

    assert!(matches!(err, DbError::Asset(AssetError::Unwritable { .. })));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let data_dir = tempfile::tempdir().unwrap();
    let result = AssetDatabase::new(
        AssetDbConfig::new(DB_NAME, 0, data_dir.path()),
        MemoryResourceStore::new(),
    );

    assert!(matches!(result, Err(DbError::InvalidConfig(_))));
}

#[test]
fn writable_handle_is_cached_until_close() {
    let data_dir = tempfile::tempdir().unwrap();
    let store = MemoryResourceStore::new().with_asset(DB_ASSET, bundled_database(0));
    let db = AssetDatabase::new(AssetDbConfig::new(DB_NAME, 1, data_dir.path()), store).unwrap();

    let first = db.open_for_write().unwrap();
    let second = db.open_for_write().unwrap();
    let read = db.open_for_read().unwrap();
    assert!(first.same_connection(&second));
    assert!(first.same_connection(&read));
    assert_eq!(db.open_mode(), Some(OpenMode::ReadWrite));

    db.close().unwrap();
    assert_eq!(db.open_mode(), None);
    db.close().unwrap();

    let reopened = db.open_for_write().unwrap();
    assert!(!reopened.same_connection(&first));
}

#[test]
fn reopening_installed_database_keeps_local_changes() {
    let data_dir = tempfile::tempdir().unwrap();
    let config = AssetDbConfig::new(DB_NAME, 1, data_dir.path());
    let store = MemoryResourceStore::new().with_asset(DB_ASSET, bundled_database(0));

    let db = AssetDatabase::new(config.clone(), store.clone()).unwrap();
    db.open_for_write()
        .unwrap()
        .lock()
        .execute_batch("INSERT INTO products (name) VALUES ('local');")
        .unwrap();
    db.close().unwrap();
    drop(db);

    let db = AssetDatabase::new(config, store).unwrap();
    let handle = db.open_for_write().unwrap();
    assert_eq!(
        product_names(&handle.lock()),
        vec!["bundled".to_string(), "local".to_string()]
    );
}

#[test]
fn unstamped_installed_database_is_stamped_without_scripts() {
    let data_dir = tempfile::tempdir().unwrap();
    let config = AssetDbConfig::new(DB_NAME, 4, data_dir.path());
    write_installed(&config.database_path(), 0);
    let db = AssetDatabase::new(config, MemoryResourceStore::new()).unwrap();

    let handle = db.open_for_write().unwrap();

    assert_eq!(schema_version(&handle.lock()), 4);
}

fn bundled_database(version: u32) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.db");
    write_installed(&path, version);
    fs::read(&path).unwrap()
}

fn write_installed(path: &Path, version: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         INSERT INTO products (name) VALUES ('bundled');
         PRAGMA user_version = {version};"
    ))
    .unwrap();
}

fn zipped(bytes: &[u8]) -> Vec<u8> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(DB_NAME, options).unwrap();
    writer.write_all(bytes).unwrap();
    writer.finish().unwrap().into_inner()
}

fn gzipped(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn product_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM products ORDER BY id;")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}
