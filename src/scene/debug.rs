//! Human-readable hierarchy layout, for logs and failed assertions

use std::fmt;

use super::hierarchy::{Hierarchy, NULL_INDEX};

/// Table of a hierarchy's structural columns, one row per slot
pub struct HierarchyDump<'a> {
    hierarchy: &'a Hierarchy,
}

impl Hierarchy {
    /// Render the layout as a table. Formatting is deferred until the
    /// value is displayed.
    pub fn dump(&self) -> HierarchyDump<'_> {
        HierarchyDump { hierarchy: self }
    }
}

impl fmt::Display for HierarchyDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.hierarchy;
        writeln!(
            f,
            "{:>5} {:<16} {:<12} {:>6} {:>6} {:>6} {:>5}",
            "slot", "name", "entity", "parent", "first", "count", "dirty"
        )?;
        for index in 0..h.len() as u32 {
            let slot = index as usize;
            let parent = match h.parent_index[slot] {
                NULL_INDEX => "-".to_string(),
                p => p.to_string(),
            };
            writeln!(
                f,
                "{:>5} {:<16} {:<12} {:>6} {:>6} {:>6} {:>5}",
                index,
                h.name(index).unwrap_or("-"),
                format!("{:?}", h.entity[slot]),
                parent,
                h.child_index[slot],
                h.child_count[slot],
                if h.modified[slot] { "*" } else { "" },
            )?;
        }
        Ok(())
    }
}
