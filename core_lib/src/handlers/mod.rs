pub mod files;
pub mod routes;
pub mod users;
