//! CLI subcommand implementations.

pub mod chart;
pub mod cylinder;
pub mod import;
pub mod record;
pub mod replay;
pub mod scan;
pub mod status;
pub mod summary;
pub mod util;

#[cfg(test)]
pub(crate) async fn memory_services() -> crate::Services {
    let db = gauge_db::Database::open_in_memory().unwrap();
    crate::Services::from_database(db, &crate::Config::default())
        .await
        .unwrap()
}
