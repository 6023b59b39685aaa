use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    /// An explicitly requested page starts past the last match
    #[error("This page does not exist")]
    PageNotFound,
}
