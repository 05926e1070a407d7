pub mod stage0_export;
pub mod stage1_generate;
pub mod stage2_reconcile;
pub mod stage3_finish;

pub use stage0_export::*;
pub use stage1_generate::*;
pub use stage2_reconcile::*;
pub use stage3_finish::*;
