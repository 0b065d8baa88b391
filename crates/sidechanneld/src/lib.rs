//! sidechannel self-updater - exposes modules for the daemon and for testing.
//!
//! The polling [`Scheduler`] and operator requests share one [`Updater`]:
//!
//! ```no_run
//! # async fn run(config: sidechannel_shared::UpdateConfig) {
//! use sidechanneld::{Scheduler, Updater};
//! use std::sync::Arc;
//!
//! let updater = Arc::new(Updater::from_config(config));
//! let mut scheduler = Scheduler::new(Arc::clone(&updater));
//! scheduler.start();
//!
//! // Operator asked to update
//! let outcome = updater.apply_update().await;
//! println!("{}", outcome);
//!
//! scheduler.stop().await;
//! updater.wait_idle().await;
//! # }
//! ```

pub mod applier;
pub mod checker;
pub mod command;
pub mod git;
pub mod notifier;
pub mod scheduler;
pub mod state;
pub mod supervisor;
pub mod testing;
pub mod updater;

pub use command::{CommandResult, CommandRunner, ProcessRunner};
pub use notifier::{CommandNotifier, LogNotifier, Notifier};
pub use scheduler::Scheduler;
pub use supervisor::{ExitSupervisor, ProcessSupervisor};
pub use updater::Updater;
