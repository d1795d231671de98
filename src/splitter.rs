//! Splits an input line on `;`, `&&` and `||`.
//!
//! `;` separates groups. Inside a group `&&` and `||` separate command-units;
//! each unit records the connector that follows it. Empty units are kept as
//! placeholders so every connector stays attached to the right neighbour.

use crate::command::{CommandGroup, Connector, Link};

/// Finds the leftmost `&&` or `||` in `text`.
fn next_connector(text: &str) -> Option<(usize, Connector)> {
    let and = text.find("&&").map(|at| (at, Connector::And));
    let or = text.find("||").map(|at| (at, Connector::Or));
    match (and, or) {
        (Some(a), Some(o)) => Some(if a.0 < o.0 { a } else { o }),
        (a, o) => a.or(o),
    }
}

fn split_group(group: &str, terminal: Option<Connector>) -> CommandGroup {
    let mut links = Vec::new();
    let mut rest = group;
    while let Some((at, connector)) = next_connector(rest) {
        links.push(Link {
            unit: rest[..at].to_string(),
            connector: Some(connector),
        });
        rest = &rest[at + 2..];
    }
    links.push(Link {
        unit: rest.to_string(),
        connector: terminal,
    });
    CommandGroup { links }
}

/// Splits one raw input line into command groups, in source order.
///
/// The last unit of every group but the final one carries
/// [`Connector::Sequential`]; the final unit of the line carries none.
pub fn split_line(line: &str) -> Vec<CommandGroup> {
    let groups: Vec<&str> = line.split(';').collect();
    let last = groups.len() - 1;
    groups
        .into_iter()
        .enumerate()
        .map(|(i, group)| {
            let terminal = (i < last).then_some(Connector::Sequential);
            split_group(group, terminal)
        })
        .collect()
}
