pub mod services;

// Re-export commonly used types at crate root for convenience
pub use services::{
    build_invoker, load_document, CancelFlag, CompositeReporter, ConsoleReporter, DryRunInvoker,
    ExplodeOutcome, ExplodeService, LocalSplitInvoker, MemoryReporter, OutputChannel,
    Refusal, NO_DECLARATIONS_MESSAGE,
};
