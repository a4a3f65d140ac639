pub mod db_utils;
pub mod error;
pub mod lenient;
pub mod local_time;
pub mod text;
