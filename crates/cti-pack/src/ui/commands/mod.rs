mod init;
mod pack;
mod pkg;
mod sync;
mod validate;

pub use init::init_package;
pub use pack::pack_package;
pub use pkg::{get_dependencies, tidy_dependencies};
pub use sync::sync_package;
pub use validate::validate_package;
