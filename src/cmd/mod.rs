//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `recon`   | `Recon`          |
//! | `status`  | `Status`         |
//! | `session` | `Attach`, `Kill` |

pub mod recon;
pub mod session;
pub mod status;

pub use recon::cmd_recon;
pub use session::{cmd_attach, cmd_kill};
pub use status::cmd_status;
