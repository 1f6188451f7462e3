//! Writer for the legacy line-oriented translation text format.

use std::{fmt::Write as _, fs, path::Path};

use anyhow::{bail, Context, Result};
use storage::EntityStore;
use tracing::info;

const BOM: &[u8] = b"\xEF\xBB\xBF";
const PIC_START: &str = ">>>>>>>>[";
const PIC_END: &str = "]<<<<<<<<";
const LABEL_START: &str = "----------------[";
const LABEL_END: &str = "]----------------";
const SEPARATOR: &str = "-";

/// Group ids are written as a single digit, so the format holds at most nine.
pub const MAX_GROUPS: usize = 9;

/// Renders `store` without the byte order mark.
pub fn render(store: &EntityStore) -> Result<String> {
    let group_count = store.group_count();
    if group_count > MAX_GROUPS {
        bail!("the text format supports at most {MAX_GROUPS} groups, document has {group_count}");
    }

    let [major, minor] = store.version();
    let mut out = String::new();
    writeln!(out, "{major},{minor}")?;
    writeln!(out, "{SEPARATOR}")?;
    for name in store.group_names() {
        writeln!(out, "{name}")?;
    }
    writeln!(out, "{SEPARATOR}")?;
    writeln!(out, "{}", store.comment())?;
    out.push_str("\n\n");

    for picture in store.sorted_pic_names() {
        writeln!(out, "{PIC_START}{picture}{PIC_END}")?;
        let mut labels: Vec<_> = store.labels(picture)?.iter().collect();
        labels.sort_by_key(|label| label.index);
        for label in labels {
            writeln!(
                out,
                "{LABEL_START}{}{LABEL_END}[{:?},{:?},{}]",
                label.index,
                label.x,
                label.y,
                label.group_id.0 + 1
            )?;
            writeln!(out, "{}", label.text)?;
            out.push('\n');
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn export(store: &EntityStore, path: &Path) -> Result<()> {
    let text = render(store)?;
    let mut bytes = Vec::with_capacity(BOM.len() + text.len());
    bytes.extend_from_slice(BOM);
    bytes.extend_from_slice(text.as_bytes());
    fs::write(path, bytes).with_context(|| format!("failed to write '{}'", path.display()))?;
    info!(path = %path.display(), pictures = store.pic_count(), "text export written");
    Ok(())
}

#[cfg(test)]
#[path = "tests/lp_export_tests.rs"]
mod tests;
