// ============================================================
// Layer 2 — Application Layer
// ============================================================
// One use case per subcommand. Converts configuration into wired
// collaborators and runs the pipeline; owns no ML or I/O details.

pub mod sample_use_case;
pub mod train_use_case;
