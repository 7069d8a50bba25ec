//! # Events Module
//!
//! Event-driven progress reporting for the conversion run.
//!
//! ## Design
//! The core library emits events through channels, allowing any UI
//! (CLI, GUI, web) to subscribe and display progress.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = events::channel();
//!
//! // In a separate thread, listen for events
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Discover(DiscoverEvent::Progress(p)) => {
//!                 println!("Seen {} files", p.files_seen)
//!             }
//!             Event::Job(JobEvent::Finished { source, outcome, .. }) => {
//!                 println!("{}: {}", source.display(), outcome)
//!             }
//!             _ => {}
//!         }
//!     }
//! });
//!
//! // Run the pipeline with the sender
//! run.execute_with_events(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{bounded_channel, channel, null_sender, EventReceiver, EventSender};
pub use types::{
    BudgetEvent, DiscoverEvent, DiscoverProgress, Event, JobEvent, RunEvent, RunPhase, RunSummary,
};
