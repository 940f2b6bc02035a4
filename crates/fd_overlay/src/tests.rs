use crate::builder::{BuildStatus, OverlayBuilder, OverlayStage};
use crate::error::{Error, FailureKind};
use crate::planner::EnabledMod;
use crate::snapshot::SnapshotStore;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Fixture {
    _dir: tempfile::TempDir,
    assets: Utf8PathBuf,
    mods: Utf8PathBuf,
    data: Utf8PathBuf,
}

impl Fixture {
    fn new(base: &[(&str, &[u8])]) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let fixture = Self {
            assets: root.join("game/assets"),
            mods: root.join("Mods"),
            data: root.join("data"),
            _dir: dir,
        };
        fs::create_dir_all(&fixture.assets).unwrap();
        write_files(&fixture.assets, base);
        fixture
    }

    fn add_mod(&self, name: &str, files: &[(&str, &[u8])]) -> EnabledMod {
        let dir = self.mods.join(name);
        fs::create_dir_all(&dir).unwrap();
        write_files(&dir, files);
        EnabledMod::new(name, dir)
    }

    fn builder(&self, mods: &[&EnabledMod]) -> OverlayBuilder {
        let mut builder = OverlayBuilder::new(self.assets.clone(), self.data.clone());
        builder.set_enabled_mods(mods.iter().map(|m| (*m).clone()).collect());
        builder
    }

    fn tree(&self) -> BTreeMap<String, Vec<u8>> {
        read_tree(&self.assets)
    }
}

fn write_files(root: &Utf8Path, files: &[(&str, &[u8])]) {
    for (path, bytes) in files {
        let file = root.join(path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, bytes).unwrap();
    }
}

fn read_tree(root: &Utf8Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap();
            let key = rel.to_str().unwrap().replace('\\', "/");
            (key, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn dirs_of(root: &Utf8Path) -> Vec<String> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path().strip_prefix(root).unwrap().to_str().unwrap().replace('\\', "/"))
        .collect()
}

fn tree_of(files: &[(&str, &[u8])]) -> BTreeMap<String, Vec<u8>> {
    files
        .iter()
        .map(|(path, bytes)| (path.to_string(), bytes.to_vec()))
        .collect()
}

#[test]
fn test_easy_hard_scenario() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let easy = fx.add_mod("Easy", &[("song.ogg", b"E1")]);
    let hard = fx.add_mod("Hard", &[("song.ogg", b"H1"), ("extra.json", b"H2")]);

    // Hard has the higher priority, so it is applied last.
    let result = fx.builder(&[&easy, &hard]).build().unwrap();
    assert_eq!(result.status, BuildStatus::Clean);
    assert_eq!(
        fx.tree(),
        tree_of(&[("song.ogg", b"H1"), ("extra.json", b"H2")])
    );
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].winner, "Hard");

    // Disable Hard and rebuild.
    let result = fx.builder(&[&easy]).build().unwrap();
    assert_eq!(result.status, BuildStatus::Clean);
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"E1")]));
    assert!(result.restore.deleted.contains(&Utf8PathBuf::from("extra.json")));
}

#[test]
fn test_build_is_idempotent() {
    let fx = Fixture::new(&[("song.ogg", b"B0"), ("data/week1.json", b"W0")]);
    let a = fx.add_mod("A", &[("song.ogg", b"A1"), ("data/new/chart.json", b"C1")]);
    let b = fx.add_mod("B", &[("data/week1.json", b"W2")]);

    let mut builder = fx.builder(&[&a, &b]);
    builder.build().unwrap();
    let first = fx.tree();
    let first_dirs = dirs_of(&fx.assets);

    let result = builder.build().unwrap();

    assert_eq!(result.status, BuildStatus::Clean);
    assert_eq!(fx.tree(), first);
    assert_eq!(dirs_of(&fx.assets), first_dirs);

    let store = SnapshotStore::open(&fx.data, &fx.assets).unwrap();
    assert_eq!(store.len(), 3);
}

#[test]
fn test_build_then_restart_round_trip() {
    let base: &[(&str, &[u8])] = &[
        ("song.ogg", b"B0"),
        ("images/bf.png", b"P0"),
        ("untouched.txt", b"U0"),
    ];
    let fx = Fixture::new(base);
    let before_dirs = dirs_of(&fx.assets);
    let m = fx.add_mod(
        "Reskin",
        &[
            ("images/bf.png", b"P1"),
            ("images/gf.png", b"G1"),
            ("weeks/custom/week8.json", b"W8"),
        ],
    );

    let mut builder = fx.builder(&[&m]);
    let result = builder.build().unwrap();
    assert_eq!(result.applied.len(), 3);
    assert_eq!(fx.tree()["weeks/custom/week8.json"], b"W8");

    let report = builder.restart().unwrap();

    assert!(report.is_clean());
    assert_eq!(report.restored, vec![Utf8PathBuf::from("images/bf.png")]);
    assert_eq!(report.deleted.len(), 2);
    assert_eq!(fx.tree(), tree_of(base));
    assert_eq!(dirs_of(&fx.assets), before_dirs);
    assert!(SnapshotStore::open(&fx.data, &fx.assets).unwrap().is_empty());
}

#[test]
fn test_priority_resolution_across_paths() {
    let fx = Fixture::new(&[("a.txt", b"base-a"), ("d.txt", b"base-d")]);
    let low = fx.add_mod("Low", &[("a.txt", b"low-a"), ("b.txt", b"low-b"), ("c.txt", b"low-c")]);
    let mid = fx.add_mod("Mid", &[("b.txt", b"mid-b"), ("c.txt", b"mid-c")]);
    let high = fx.add_mod("High", &[("c.txt", b"high-c")]);

    fx.builder(&[&low, &mid, &high]).build().unwrap();

    assert_eq!(
        fx.tree(),
        tree_of(&[
            ("a.txt", b"low-a"),
            ("b.txt", b"mid-b"),
            ("c.txt", b"high-c"),
            ("d.txt", b"base-d"),
        ])
    );
}

#[test]
fn test_restart_on_clean_tree_writes_nothing() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);

    let report = fx.builder(&[]).restart().unwrap();

    assert_eq!(report.touched(), 0);
    assert!(report.is_clean());
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"B0")]));
    assert!(!fx.data.as_std_path().exists());
}

#[test]
fn test_restart_twice_is_noop() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let m = fx.add_mod("M", &[("song.ogg", b"M1")]);
    let mut builder = fx.builder(&[&m]);
    builder.build().unwrap();

    builder.restart().unwrap();
    let second = builder.restart().unwrap();

    assert_eq!(second.touched(), 0);
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"B0")]));
}

#[test]
fn test_unlisted_mod_contributes_nothing() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let enabled = fx.add_mod("Enabled", &[("a.txt", b"A")]);
    let _disabled = fx.add_mod("Disabled", &[("song.ogg", b"D1"), ("b.txt", b"B")]);

    fx.builder(&[&enabled]).build().unwrap();

    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"B0"), ("a.txt", b"A")]));
}

#[test]
fn test_snapshot_survives_restart_of_the_manager() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let m = fx.add_mod("M", &[("song.ogg", b"M1"), ("new.json", b"N")]);

    {
        let mut builder = fx.builder(&[&m]);
        builder.build().unwrap();
    }

    // A fresh builder (as after a crash) only knows the on-disk store.
    let report = crate::builder::restart(&fx.assets, &fx.data).unwrap();

    assert!(report.is_clean());
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"B0")]));
}

#[test]
fn test_loadout_is_recorded() {
    let fx = Fixture::new(&[]);
    let a = fx.add_mod("A", &[("a.txt", b"a")]);
    let b = fx.add_mod("B", &[("b.txt", b"b")]);

    fx.builder(&[&a, &b]).build().unwrap();

    let store = SnapshotStore::open(&fx.data, &fx.assets).unwrap();
    assert_eq!(store.loadout(), ["A".to_string(), "B".to_string()]);
}

#[test]
fn test_copy_failure_is_partial_and_restorable() {
    // A file named "data" blocks the mod's "data/" directory.
    let fx = Fixture::new(&[("data", b"not a dir"), ("song.ogg", b"B0")]);
    let m = fx.add_mod("M", &[("data/week1.json", b"W"), ("song.ogg", b"M1")]);

    let mut builder = fx.builder(&[&m]);
    let result = builder.build().unwrap();

    assert_eq!(result.status, BuildStatus::Partial);
    assert_eq!(result.failed_paths(), vec![Utf8PathBuf::from("data/week1.json")]);
    assert_eq!(result.failures[0].kind, FailureKind::Copy);
    assert_eq!(result.applied, vec![Utf8PathBuf::from("song.ogg")]);
    assert_eq!(fx.tree()["song.ogg"], b"M1");

    builder.restart().unwrap();
    assert_eq!(
        fx.tree(),
        tree_of(&[("data", b"not a dir"), ("song.ogg", b"B0")])
    );
}

#[test]
fn test_unreachable_path_is_retried_on_next_restore() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let m = fx.add_mod("M", &[("extra.json", b"X"), ("song.ogg", b"M1")]);
    let mut builder = fx.builder(&[&m]);
    builder.build().unwrap();

    // Something outside the engine replaced the introduced file with a directory.
    fs::remove_file(fx.assets.join("extra.json")).unwrap();
    fs::create_dir_all(fx.assets.join("extra.json/locked")).unwrap();

    let result = builder.build().unwrap();
    assert_eq!(result.status, BuildStatus::Partial);
    assert_eq!(result.restore.failures.len(), 1);
    assert_eq!(result.restore.failures[0].relative_path, Utf8PathBuf::from("extra.json"));
    assert_eq!(fx.tree()["song.ogg"], b"M1");

    let store = SnapshotStore::open(&fx.data, &fx.assets).unwrap();
    assert!(store.contains(Utf8Path::new("extra.json")));
    drop(store);

    fs::remove_dir_all(fx.assets.join("extra.json")).unwrap();
    let report = builder.restart().unwrap();

    assert!(report.is_clean());
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"B0")]));
}

#[test]
fn test_vanished_mod_directory_is_skipped() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let kept = fx.add_mod("Kept", &[("song.ogg", b"K1")]);
    let gone = fx.add_mod("Gone", &[("song.ogg", b"G1")]);
    fs::remove_dir_all(&gone.mod_dir).unwrap();

    let result = fx.builder(&[&kept, &gone]).build().unwrap();

    assert_eq!(result.status, BuildStatus::Clean);
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"K1")]));
}

#[test]
fn test_progress_stages_in_order() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let m = fx.add_mod("M", &[("song.ogg", b"M1"), ("x.json", b"X")]);

    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let mut builder = OverlayBuilder::new(fx.assets.clone(), fx.data.clone()).with_progress(
        move |progress| {
            sink.lock().unwrap().push((progress.stage, progress.current, progress.total));
        },
    );
    builder.set_enabled_mods(vec![m]);
    builder.build().unwrap();

    let stages = stages.lock().unwrap();
    assert_eq!(
        *stages,
        vec![
            (OverlayStage::Restoring, 0, 0),
            (OverlayStage::Planning, 0, 0),
            (OverlayStage::Applying, 1, 2),
            (OverlayStage::Applying, 2, 2),
            (OverlayStage::Complete, 2, 2),
        ]
    );
}

#[test]
fn test_build_from_mod_dirs() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let easy = fx.add_mod("Easy", &[("song.ogg", b"E1")]);
    let hard = fx.add_mod("Hard", &[("song.ogg", b"H1")]);

    let result =
        crate::builder::build(&fx.assets, &fx.data, &[easy.mod_dir, hard.mod_dir]).unwrap();

    assert_eq!(result.conflicts[0].contributing_mods, vec!["Hard", "Easy"]);
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"H1")]));
}

#[test]
fn test_every_spelling_of_the_root_shares_one_snapshot() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let m = fx.add_mod("M", &[("song.ogg", b"M1"), ("extra.json", b"X")]);
    let aliased = fx.assets.parent().unwrap().join("../game/./assets");

    fx.builder(&[&m]).build().unwrap();

    let mut through_alias = OverlayBuilder::new(aliased.clone(), fx.data.clone());
    through_alias.set_enabled_mods(vec![m.clone()]);
    let result = through_alias.build().unwrap();
    assert_eq!(result.restore.touched(), 2);
    assert_eq!(result.status, BuildStatus::Clean);

    let report = OverlayBuilder::new(aliased, fx.data.clone()).restart().unwrap();

    assert!(report.is_clean());
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"B0")]));
    assert!(SnapshotStore::open(&fx.data, &fx.assets).unwrap().is_empty());
}

#[test]
fn test_fatal_abort_rolls_back_applied_files() {
    let fx = Fixture::new(&[("b.txt", b"B0")]);
    let m = fx.add_mod("M", &[("a.txt", b"A1"), ("b.txt", b"B1")]);

    // A plain file where the backups folder belongs makes every backup fail.
    let store_dir = SnapshotStore::open(&fx.data, &fx.assets)
        .unwrap()
        .store_dir()
        .to_path_buf();
    fs::create_dir_all(&store_dir).unwrap();
    fs::write(store_dir.join("backups"), b"in the way").unwrap();

    let err = fx.builder(&[&m]).build().unwrap_err();

    assert!(matches!(err, Error::StoreWrite { ref path, .. } if path.as_str() == "b.txt"));
    assert_eq!(fx.tree(), tree_of(&[("b.txt", b"B0")]));
    assert!(SnapshotStore::open(&fx.data, &fx.assets).unwrap().is_empty());
}

#[cfg(unix)]
#[test]
fn test_failed_overwrite_of_untouched_path_leaves_no_record() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    // A dangling symlink where the mod needs a directory: the path reads as
    // absent, but its parent can never be created.
    std::os::unix::fs::symlink(fx.assets.join("nowhere"), fx.assets.join("data")).unwrap();
    let m = fx.add_mod("M", &[("data/week1.json", b"W"), ("song.ogg", b"M1")]);

    let mut builder = fx.builder(&[&m]);
    let result = builder.build().unwrap();

    assert_eq!(result.status, BuildStatus::Partial);
    assert_eq!(result.failed_paths(), vec![Utf8PathBuf::from("data/week1.json")]);
    assert_eq!(result.failures[0].kind, FailureKind::Copy);

    let store = SnapshotStore::open(&fx.data, &fx.assets).unwrap();
    assert!(!store.contains(Utf8Path::new("data/week1.json")));
    assert!(store.contains(Utf8Path::new("song.ogg")));
    drop(store);

    let report = builder.restart().unwrap();
    assert!(report.is_clean());
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"B0")]));
    assert!(SnapshotStore::open(&fx.data, &fx.assets).unwrap().is_empty());
}

#[test]
fn test_build_without_changes_writes_no_store() {
    let fx = Fixture::new(&[("song.ogg", b"B0")]);
    let empty = fx.add_mod("Empty", &[]);

    let result = fx.builder(&[&empty]).build().unwrap();
    assert_eq!(result.status, BuildStatus::Clean);
    let result = fx.builder(&[]).build().unwrap();
    assert_eq!(result.status, BuildStatus::Clean);

    assert!(!fx.data.as_std_path().exists());
    assert_eq!(fx.tree(), tree_of(&[("song.ogg", b"B0")]));
}
