use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use editor_core::{GroupDefaults, NodeKind, Session};
use shared::{
    domain::{Group, GroupId, LabelIndex, ViewMode},
    protocol::TransFile,
};
use tracing::info;

mod config;
mod lp_export;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "labeltool", about = "Inspect and edit picture label projects")]
struct Cli {
    /// Project file (JSON).
    file: PathBuf,
    /// Tree shape used by `tree`; defaults to the configured mode.
    #[arg(long)]
    mode: Option<String>,
    /// Write the edited project here instead of overwriting the input.
    #[arg(long)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty project.
    New,
    Inspect,
    Tree {
        picture: String,
    },
    AddGroup {
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    RenameGroup {
        group: String,
        new_name: String,
    },
    RecolorGroup {
        group: String,
        color: String,
    },
    DeleteGroup {
        group: String,
    },
    AddPicture {
        picture: String,
    },
    RemovePicture {
        picture: String,
    },
    AddLabel {
        picture: String,
        #[arg(long)]
        group: String,
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        #[arg(long, default_value_t = 0.0)]
        y: f64,
        text: String,
    },
    RemoveLabels {
        picture: String,
        #[arg(required = true)]
        indices: Vec<i64>,
    },
    SetText {
        picture: String,
        index: i64,
        text: String,
    },
    MoveToGroup {
        picture: String,
        group: String,
        #[arg(required = true)]
        indices: Vec<i64>,
    },
    Reindex {
        picture: String,
        from: i64,
        to: i64,
    },
    /// Write the legacy text format.
    ExportLp {
        target: PathBuf,
    },
}

fn main() -> Result<()> {
    let settings = load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    let cli = Cli::parse();
    let output = run(cli, &settings)?;
    print!("{output}");
    Ok(())
}

fn read_document(path: &Path) -> Result<TransFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    TransFile::from_json(&raw).with_context(|| format!("failed to parse '{}'", path.display()))
}

fn write_document(path: &Path, file: &TransFile) -> Result<()> {
    let json = file.to_json().context("failed to serialize project")?;
    fs::write(path, json).with_context(|| format!("failed to write '{}'", path.display()))
}

fn group_id(session: &Session, name: &str) -> Result<GroupId> {
    session
        .store()
        .group_id_by_name(name)
        .with_context(|| format!("unknown group '{name}'"))
}

fn indices(raw: &[i64]) -> Vec<LabelIndex> {
    raw.iter().copied().map(LabelIndex).collect()
}

/// Executes one command and returns what should be printed.
fn run(cli: Cli, settings: &Settings) -> Result<String> {
    let mode = match &cli.mode {
        Some(raw) => raw.parse::<ViewMode>().map_err(anyhow::Error::msg)?,
        None => settings.view_mode,
    };
    let target = cli.output.clone().unwrap_or_else(|| cli.file.clone());

    let create = matches!(cli.command, Command::New);
    let session = if create {
        Session::new_document(mode)
    } else {
        let document = read_document(&cli.file)?;
        Session::open(document, mode)
            .with_context(|| format!("invalid project '{}'", cli.file.display()))?
    };
    let mut session = session.with_group_defaults(GroupDefaults {
        names: settings.default_group_names.clone(),
        colors: settings.default_group_colors.clone(),
    });

    let mut out = String::new();
    match cli.command {
        Command::New => writeln!(out, "created {}", target.display())?,
        Command::Inspect => return describe(&session),
        Command::Tree { picture } => {
            session.show_picture(&picture)?;
            return render_tree(&session);
        }
        Command::ExportLp { target } => {
            lp_export::export(session.store(), &target)?;
            return Ok(format!("exported {}\n", target.display()));
        }
        Command::AddGroup { name, color } => {
            let suggested = session.suggest_group();
            let group = Group::new(
                name.unwrap_or(suggested.name),
                color.unwrap_or(suggested.color_hex),
            );
            let id = session.add_group(group)?;
            writeln!(out, "added group {id}")?;
        }
        Command::RenameGroup { group, new_name } => {
            let id = group_id(&session, &group)?;
            session.rename_group(id, &new_name)?;
        }
        Command::RecolorGroup { group, color } => {
            let id = group_id(&session, &group)?;
            session.recolor_group(id, &color)?;
        }
        Command::DeleteGroup { group } => {
            let id = group_id(&session, &group)?;
            session.delete_group(id)?;
        }
        Command::AddPicture { picture } => session.add_picture(&picture)?,
        Command::RemovePicture { picture } => session.remove_picture(&picture)?,
        Command::AddLabel {
            picture,
            group,
            x,
            y,
            text,
        } => {
            let id = group_id(&session, &group)?;
            let index = session.add_label(&picture, id, x, y, &text)?;
            writeln!(out, "added label {index}")?;
        }
        Command::RemoveLabels { picture, indices: raw } => {
            let removed = session.remove_labels(&picture, &indices(&raw))?;
            writeln!(out, "removed {removed} labels")?;
        }
        Command::SetText {
            picture,
            index,
            text,
        } => session.set_label_text(&picture, LabelIndex(index), &text)?,
        Command::MoveToGroup {
            picture,
            group,
            indices: raw,
        } => {
            let id = group_id(&session, &group)?;
            let moved = session.move_labels_to_group(&picture, &indices(&raw), id)?;
            writeln!(out, "moved {moved} labels")?;
        }
        Command::Reindex { picture, from, to } => {
            session.move_label_to_index(&picture, LabelIndex(from), LabelIndex(to))?;
        }
    }

    if let Some(description) = session.undo_description() {
        writeln!(out, "{description}")?;
    }
    if create || session.is_changed() {
        write_document(&target, &session.snapshot())?;
        session.mark_saved();
        info!(path = %target.display(), "project saved");
    }
    Ok(out)
}

fn describe(session: &Session) -> Result<String> {
    let store = session.store();
    let mut out = String::new();
    let [major, minor] = store.version();
    writeln!(out, "version {major}.{minor}")?;
    writeln!(out, "groups ({}):", store.group_count())?;
    for (position, group) in store.groups().iter().enumerate() {
        let used = if store.is_group_unused(GroupId::from_position(position)) {
            ""
        } else {
            " *"
        };
        writeln!(out, "  {position}: {} #{}{used}", group.name, group.color_hex)?;
    }
    writeln!(out, "pictures ({}):", store.pic_count())?;
    for picture in store.sorted_pic_names() {
        writeln!(out, "  {picture}: {} labels", store.labels(picture)?.len())?;
    }
    Ok(out)
}

fn render_tree(session: &Session) -> Result<String> {
    let store = session.store();
    let view = session.view();
    let picture = view.picture().unwrap_or_default();
    let mut out = String::new();
    for row in view.rows() {
        let indent = "  ".repeat(row.depth);
        match row.kind {
            NodeKind::Root => writeln!(out, "{indent}{picture}")?,
            NodeKind::Group(group_id) => {
                let group = store.get_group(group_id)?;
                writeln!(out, "{indent}{} #{}", group.name, group.color_hex)?;
            }
            NodeKind::Label(index) => {
                let label = store.get_label(picture, index)?;
                writeln!(out, "{indent}[{index}] {}", label.text)?;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
