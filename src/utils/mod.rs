pub mod human_format;
pub mod url;
