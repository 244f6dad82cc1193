//! Services that turn an active document into moved declarations

pub mod cancel;
pub mod document;
pub mod dry_run;
pub mod explode_service;
pub mod invoker_factory;
pub mod local_split;
pub mod reporter;

pub use cancel::CancelFlag;
pub use document::load_document;
pub use dry_run::{DryRunInvoker, DryRunSelection};
pub use explode_service::{ExplodeOutcome, ExplodeService, Refusal, NO_DECLARATIONS_MESSAGE};
pub use invoker_factory::build_invoker;
pub use local_split::{destination_stem, LocalSplitInvoker};
pub use reporter::{CompositeReporter, ConsoleReporter, MemoryReporter, OutputChannel, ReportEvent};
