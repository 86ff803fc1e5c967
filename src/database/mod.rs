/*!
 * Database module for persistent storage of resume markers.
 *
 * SQLite-backed, with versioned schema initialization and async-safe
 * access through `spawn_blocking`.
 */

pub mod connection;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
