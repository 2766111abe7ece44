pub mod compare;
pub mod evaluate;
pub mod grade;
pub mod init;
pub mod list_judges;
pub mod stats;
pub mod validate;
