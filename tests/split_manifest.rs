use std::collections::HashSet;
use std::fs;

use tempfile::tempdir;

use loghunks::config::SplitConfig;
use loghunks::data::Hunk;
use loghunks::splits::{SplitLabel, SplitManifest};
use loghunks::store::{PathRemap, RecordStore};

fn seed_dataset(store: &RecordStore, tasks: usize) {
    for task in 0..tasks {
        let id = format!("proj-{task:03}");
        for index in 0..2 {
            let hunk = Hunk {
                task_id: id.clone(),
                context_window: 20,
                index,
                context_lines: vec![format!("ctx {index}"), format!("boom {index}")],
                answer_lines: vec![format!("boom {index}")],
            };
            store.persist(&id, &hunk).unwrap();
        }
        store.mark_complete(&id).unwrap();
    }
}

#[test]
fn manifest_is_reproducible_and_covers_every_task() {
    let dir = tempdir().unwrap();
    let store = RecordStore::new(dir.path(), 20);
    seed_dataset(&store, 35);

    let first = SplitManifest::build(&store, 20, SplitConfig::default()).unwrap();
    let second = SplitManifest::build(&store, 20, SplitConfig::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.tasks(SplitLabel::Test).len(), 3);
    assert_eq!(first.tasks(SplitLabel::Train).len(), 32);

    let ids: HashSet<&str> = first
        .train
        .iter()
        .chain(&first.test)
        .map(|task| task.task_id.as_str())
        .collect();
    assert_eq!(ids.len(), 35);
    for task in &first.train {
        assert_eq!(task.hunks.len(), 2);
        assert_eq!(task.hunks[1].ctx, "hunk_20_1_ctx.log");
        assert_eq!(task.hunks[1].ans, "hunk_20_1_ans.log");
    }
}

#[test]
fn manifest_json_lists_paths_and_file_names() {
    let dir = tempdir().unwrap();
    let store = RecordStore::new(dir.path().join("data"), 20);
    seed_dataset(&store, 3);
    let manifest = SplitManifest::build(&store, 20, SplitConfig::default()).unwrap();
    let path = dir.path().join("meta/train_test.json");
    manifest.save(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["seed"], 6745);
    assert_eq!(json["test"].as_array().unwrap().len(), 0);
    let first = &json["train"][0];
    assert!(first["path"].as_str().unwrap().ends_with(first["task_id"].as_str().unwrap()));
    assert_eq!(first["hunks"][0]["ctx"], "hunk_20_0_ctx.log");
}

#[test]
fn manifest_loads_through_a_path_remap_after_the_dataset_moves() {
    let original = tempdir().unwrap();
    let store = RecordStore::new(original.path(), 20);
    seed_dataset(&store, 4);
    let manifest = SplitManifest::build(&store, 20, SplitConfig::default()).unwrap();

    let moved = tempdir().unwrap();
    for entry in fs::read_dir(original.path()).unwrap() {
        let entry = entry.unwrap();
        let target = moved.path().join(entry.file_name());
        fs::create_dir_all(&target).unwrap();
        for file in fs::read_dir(entry.path()).unwrap() {
            let file = file.unwrap();
            fs::copy(file.path(), target.join(file.file_name())).unwrap();
        }
    }
    fs::remove_dir_all(original.path().join("proj-000")).unwrap();

    let remapped = RecordStore::new(moved.path(), 20).with_remap(PathRemap::new(
        original.path().to_string_lossy(),
        moved.path().to_string_lossy(),
    ));
    for task in manifest.train.iter().chain(&manifest.test) {
        let hunks = remapped.load_ref(task).unwrap();
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].answer_lines, vec!["boom 1"]);
    }

    let plain = RecordStore::new(original.path(), 20);
    let removed = manifest
        .train
        .iter()
        .chain(&manifest.test)
        .find(|task| task.task_id == "proj-000")
        .unwrap();
    assert!(plain.load_ref(removed).is_err());
}
