use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    fn new(name: &str) -> Self {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = env::temp_dir().join(format!("labeltool_main_test_{name}_{suffix}"));
        fs::create_dir_all(&dir).expect("temp dir");
        Self { dir }
    }

    fn path(&self, file: &str) -> String {
        self.dir.join(file).to_string_lossy().into_owned()
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn exec(args: &[&str]) -> Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("labeltool").chain(args.iter().copied()))?;
    run(cli, &Settings::default())
}

#[test]
fn edits_are_saved_back_to_the_project() {
    let scratch = Scratch::new("edits");
    let project = scratch.path("project.json");
    let project = project.as_str();

    exec(&[project, "new"]).expect("new");
    let added = exec(&[project, "add-group", "Frame", "--color", "FF0000"]).expect("group");
    assert!(added.contains("added group 0"));
    exec(&[project, "add-picture", "p1.png"]).expect("picture");
    let out = exec(&[project, "add-label", "p1.png", "--group", "Frame", "hello"])
        .expect("label");
    assert!(out.contains("added label 1"));

    let file = read_document(Path::new(project)).expect("reload");
    assert_eq!(file.group_list, vec![Group::new("Frame", "FF0000")]);
    assert_eq!(file.trans_map["p1.png"][0].text, "hello");
}

#[test]
fn add_group_without_arguments_uses_suggestion() {
    let scratch = Scratch::new("suggest");
    let project = scratch.path("project.json");
    let project = project.as_str();

    exec(&[project, "new"]).expect("new");
    exec(&[project, "add-group"]).expect("group");

    let file = read_document(Path::new(project)).expect("reload");
    assert_eq!(file.group_list, vec![Group::new("New Group 1", "FF0000")]);
}

#[test]
fn tree_prints_grouped_rows() {
    let scratch = Scratch::new("tree");
    let project = scratch.path("project.json");
    let project = project.as_str();

    exec(&[project, "new"]).expect("new");
    exec(&[project, "add-group", "A"]).expect("group A");
    exec(&[project, "add-group", "B"]).expect("group B");
    exec(&[project, "add-picture", "p1.png"]).expect("picture");
    exec(&[project, "add-label", "p1.png", "--group", "B", "yo"]).expect("label");

    let tree = exec(&[project, "--mode", "grouped", "tree", "p1.png"]).expect("tree");
    assert_eq!(tree, "p1.png\n  A #FF0000\n  B #0000FF\n    [1] yo\n");

    let flat = exec(&[project, "--mode", "flat", "tree", "p1.png"]).expect("tree");
    assert_eq!(flat, "p1.png\n  [1] yo\n");
}

#[test]
fn deleting_a_used_group_is_refused() {
    let scratch = Scratch::new("delete");
    let project = scratch.path("project.json");
    let project = project.as_str();

    exec(&[project, "new"]).expect("new");
    exec(&[project, "add-group", "A"]).expect("group");
    exec(&[project, "add-picture", "p1.png"]).expect("picture");
    exec(&[project, "add-label", "p1.png", "--group", "A", "x"]).expect("label");

    let err = exec(&[project, "delete-group", "A"]).unwrap_err();
    assert!(err.to_string().contains("still referenced"));
    let file = read_document(Path::new(project)).expect("reload");
    assert_eq!(file.group_list.len(), 1);
}

#[test]
fn output_flag_leaves_input_untouched() {
    let scratch = Scratch::new("output");
    let project = scratch.path("project.json");
    let project = project.as_str();
    let copy = scratch.path("copy.json");
    let copy = copy.as_str();

    exec(&[project, "new"]).expect("new");
    exec(&[project, "--output", copy, "add-picture", "p1.png"]).expect("picture");

    assert!(read_document(Path::new(project))
        .expect("original")
        .trans_map
        .is_empty());
    assert!(read_document(Path::new(copy))
        .expect("copy")
        .trans_map
        .contains_key("p1.png"));
}

#[test]
fn unknown_view_mode_is_rejected() {
    let scratch = Scratch::new("mode");
    let project = scratch.path("project.json");
    let project = project.as_str();
    exec(&[project, "new"]).expect("new");

    let err = exec(&[project, "--mode", "sideways", "inspect"]).unwrap_err();
    assert!(err.to_string().contains("unknown view mode"));
}

#[test]
fn malformed_color_is_refused_and_project_stays_readable() {
    let scratch = Scratch::new("color");
    let project = scratch.path("project.json");
    let project = project.as_str();

    exec(&[project, "new"]).expect("new");
    let err = exec(&[project, "add-group", "X", "--color", "zz"]).unwrap_err();
    assert!(err.to_string().contains("not six hex digits"));

    exec(&[project, "add-group", "A"]).expect("group");
    let err = exec(&[project, "recolor-group", "A", "zz"]).unwrap_err();
    assert!(err.to_string().contains("not six hex digits"));

    let out = exec(&[project, "inspect"]).expect("inspect");
    assert!(out.contains("groups (1):"));
}
