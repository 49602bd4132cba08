//! Local repository backend for knife-sync
//!
//! Implements [`repo_tree::ObjectTree`] over a directory tree, honoring
//! chefignore rules and the versioned/unversioned cookbook layout.

pub mod chefignore;
pub mod cookbook_dir;
pub mod io;
pub mod local;

pub use chefignore::Chefignore;
pub use cookbook_dir::CookbookDir;
pub use local::LocalTree;
