pub mod db;
pub mod directory;

pub use db::PgDocumentStore;
pub use directory::DocumentStudentDirectory;
