mod action;
mod serve;
mod util;

pub(crate) use action::cmd_action;
pub(crate) use serve::cmd_serve;

pub(crate) use util::require_store_path;
