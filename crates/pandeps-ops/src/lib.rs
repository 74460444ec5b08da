pub mod installer;
pub mod ops_exec;
pub mod ops_install;
