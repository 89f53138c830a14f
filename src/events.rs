use std::fmt;

use tracing::info;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityKind {
    Movie,
    Person,
    Genre,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Movie => "movie",
            EntityKind::Person => "person",
            EntityKind::Genre => "genre",
        })
    }
}

/// Notified once per newly created row, after the write is committed.
pub trait EntityObserver {
    fn entity_created(&self, kind: EntityKind, id: i32, label: &str);
}

pub struct LogObserver;

impl EntityObserver for LogObserver {
    fn entity_created(&self, kind: EntityKind, id: i32, label: &str) {
        info!(kind = %kind, id = id, "new {kind} created: '{label}'");
    }
}
