//! CLI commands implementation

pub mod drafts;
pub mod init;
pub mod installation;
pub mod serve;
pub mod status;
pub mod template;

pub use drafts::*;
pub use init::*;
pub use installation::*;
pub use serve::*;
pub use status::*;
pub use template::*;
