//! SQL migrations compiled into the binary, in application order

pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[Migration {
    id: "001_event_store",
    sql: include_str!("../../migrations/001_event_store.sql"),
}];
