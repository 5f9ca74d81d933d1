//! Market event tables and their file I/O

pub mod io;
pub mod table;

pub use io::{load_csv_data, save_data};
pub use table::{Column, EventTable};
