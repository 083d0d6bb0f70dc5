pub mod csv_io;
pub mod format;
pub mod manager;
